//! Diseases, contagion triggers and the immune response.
//!
//! A disease is an immutable tag signature plus a penalty vector. Agents
//! carry attached diseases; their effective traits are the base endowment
//! plus the sum of all attached penalties, recomputed on every query.

use crate::config::DiseaseConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Disease identifier
pub type DiseaseId = u32;

/// When a disease passes from one agent to another
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseTrigger {
    /// Passed from parents to a newborn
    Hereditary,
    /// Passed on adjacency, predation and trade
    Infectious,
    /// Never transmitted; only present from genesis
    Dormant,
}

/// Kind of encounter between two agents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contact {
    /// Occupying adjacent cells
    Adjacent,
    /// One agent preyed on the other
    Prey,
    /// The agents traded
    Trade,
    /// Parent to child
    Birth,
}

impl DiseaseTrigger {
    /// Whether this trigger fires for a given contact
    pub fn fires_on(self, contact: Contact) -> bool {
        match self {
            DiseaseTrigger::Hereditary => contact == Contact::Birth,
            DiseaseTrigger::Infectious => {
                matches!(contact, Contact::Adjacent | Contact::Prey | Contact::Trade)
            }
            DiseaseTrigger::Dormant => false,
        }
    }
}

/// Additive trait penalties
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiseasePenalties {
    pub sugar_metabolism: f64,
    pub spice_metabolism: f64,
    pub vision: i32,
    pub movement: i32,
    pub fertility: f64,
    pub aggression: f64,
}

impl DiseasePenalties {
    /// Component-wise sum
    pub fn combine(self, other: DiseasePenalties) -> DiseasePenalties {
        DiseasePenalties {
            sugar_metabolism: self.sugar_metabolism + other.sugar_metabolism,
            spice_metabolism: self.spice_metabolism + other.spice_metabolism,
            vision: self.vision + other.vision,
            movement: self.movement + other.movement,
            fertility: self.fertility + other.fertility,
            aggression: self.aggression + other.aggression,
        }
    }
}

/// A disease definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Disease {
    pub id: DiseaseId,
    /// Signature the immune system must learn to match
    pub tags: Vec<bool>,
    pub penalties: DiseasePenalties,
    pub trigger: DiseaseTrigger,
}

impl Disease {
    /// Draw a random disease from the configured ranges
    pub fn generate<R: Rng + ?Sized>(
        id: DiseaseId,
        config: &DiseaseConfig,
        trigger: DiseaseTrigger,
        rng: &mut R,
    ) -> Self {
        let length = config.tag_length.sample(rng) as usize;
        let tags = (0..length).map(|_| rng.gen::<bool>()).collect();
        let penalties = DiseasePenalties {
            sugar_metabolism: config.sugar_metabolism_penalty.sample(rng),
            spice_metabolism: config.spice_metabolism_penalty.sample(rng),
            vision: config.vision_penalty.sample(rng),
            movement: config.movement_penalty.sample(rng),
            fertility: config.fertility_penalty.sample(rng),
            aggression: config.aggression_penalty.sample(rng),
        };
        Self {
            id,
            tags,
            penalties,
            trigger,
        }
    }

    /// Generate the disease pool for a run, rotating through the configured triggers
    pub fn generate_pool<R: Rng + ?Sized>(config: &DiseaseConfig, rng: &mut R) -> Vec<Arc<Disease>> {
        (0..config.count)
            .map(|i| {
                let trigger = config.triggers[i % config.triggers.len()];
                Arc::new(Disease::generate(i as DiseaseId, config, trigger, rng))
            })
            .collect()
    }
}

/// Hamming distance between a pattern and a window of `bits` starting at `start`
fn window_distance(bits: &[bool], start: usize, pattern: &[bool]) -> usize {
    bits[start..start + pattern.len()]
        .iter()
        .zip(pattern)
        .filter(|(a, b)| a != b)
        .count()
}

/// Bit-string immune system that adapts toward attached disease tags
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImmuneSystem {
    pub bits: Vec<bool>,
}

impl ImmuneSystem {
    /// Random immune string
    pub fn random<R: Rng + ?Sized>(length: usize, rng: &mut R) -> Self {
        Self {
            bits: (0..length).map(|_| rng.gen::<bool>()).collect(),
        }
    }

    /// Whether the tags appear verbatim somewhere in the immune string
    pub fn recognizes(&self, tags: &[bool]) -> bool {
        self.closest_window(tags).map_or(false, |(_, d)| d == 0)
    }

    fn closest_window(&self, tags: &[bool]) -> Option<(usize, usize)> {
        if tags.is_empty() || tags.len() > self.bits.len() {
            return None;
        }
        (0..=self.bits.len() - tags.len())
            .map(|start| (start, window_distance(&self.bits, start, tags)))
            .min_by_key(|&(start, d)| (d, start))
    }

    /// Flip one bit of the closest window toward `tags`.
    /// Returns true once the tags are matched.
    pub fn respond(&mut self, tags: &[bool]) -> bool {
        let Some((start, distance)) = self.closest_window(tags) else {
            return false;
        };
        if distance == 0 {
            return true;
        }
        if let Some(offset) = (0..tags.len()).find(|&i| self.bits[start + i] != tags[i]) {
            self.bits[start + offset] = tags[offset];
        }
        distance == 1
    }
}

/// Diseases carried by one agent
#[derive(Clone, Debug, Default)]
pub struct Afflictions {
    diseases: Vec<Arc<Disease>>,
}

impl Afflictions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a disease; a no-op when one with the same tags is already attached.
    /// Returns whether it was newly attached.
    pub fn attach(&mut self, disease: Arc<Disease>) -> bool {
        if self.diseases.iter().any(|d| d.tags == disease.tags) {
            return false;
        }
        self.diseases.push(disease);
        true
    }

    /// Detach by id; returns whether anything was removed
    pub fn detach(&mut self, id: DiseaseId) -> bool {
        let before = self.diseases.len();
        self.diseases.retain(|d| d.id != id);
        before != self.diseases.len()
    }

    /// Sum of all attached penalties
    pub fn penalties(&self) -> DiseasePenalties {
        self.diseases
            .iter()
            .fold(DiseasePenalties::default(), |acc, d| acc.combine(d.penalties))
    }

    /// Diseases that would pass on this kind of contact
    pub fn transmissible(&self, contact: Contact) -> Vec<Arc<Disease>> {
        self.diseases
            .iter()
            .filter(|d| d.trigger.fires_on(contact))
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Disease>> {
        self.diseases.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.diseases.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.diseases.len()
    }
}

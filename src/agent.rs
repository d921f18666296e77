//! Agent structure and life-cycle bookkeeping.

use crate::cell::CellId;
use crate::config::{Config, EndowmentMode, Span};
use crate::decision::DecisionModel;
use crate::disease::{Afflictions, Disease, DiseasePenalties, ImmuneSystem};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Unique agent identifier, assigned in birth order
pub type AgentId = u64;

/// Wealth below this after metabolism is fatal
pub const STARVATION_THRESHOLD: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

/// Cause of death tracking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeathCause {
    Starvation,
    Aging,
    Combat,
    /// Removed by the central planner
    Culled,
}

/// Inherited traits and strategy parameters fixed at birth
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Endowment {
    pub sugar_metabolism: f64,
    pub spice_metabolism: f64,
    pub vision: u32,
    pub movement: u32,
    pub starting_sugar: f64,
    pub starting_spice: f64,
    pub max_age: Option<u64>,
    pub aggression: f64,
    pub tribe: u32,
    pub sex: Sex,
    pub fertility_age: u64,
    pub infertility_age: u64,
    pub fertility: f64,
    pub selfishness: Option<f64>,
    pub lookahead_discount: f64,
    pub tribal_factor: Option<f64>,
}

impl Default for Endowment {
    fn default() -> Self {
        Self {
            sugar_metabolism: 1.0,
            spice_metabolism: 0.0,
            vision: 1,
            movement: 1,
            starting_sugar: 5.0,
            starting_spice: 0.0,
            max_age: None,
            aggression: 0.0,
            tribe: 0,
            sex: Sex::Female,
            fertility_age: 12,
            infertility_age: 50,
            fertility: 1.0,
            selfishness: None,
            lookahead_discount: 0.5,
            tribal_factor: None,
        }
    }
}

/// Values `min..=max` repeated up to `count`, then shuffled
fn cyclic<R: Rng + ?Sized>(span: Span<u64>, count: usize, rng: &mut R) -> Vec<u64> {
    let width = (span.max() - span.min() + 1) as usize;
    let mut values: Vec<u64> = (0..count)
        .map(|i| span.min() + (i % width) as u64)
        .collect();
    values.shuffle(rng);
    values
}

fn widen(span: Span<u32>) -> Span<u64> {
    Span(u64::from(span.min()), u64::from(span.max()))
}

/// Draw starting endowments for `count` agents.
///
/// In cyclic mode every integer trait list walks its range and is shuffled
/// on its own, so traits are uncorrelated across agents. Fractional traits
/// are always drawn uniformly.
pub fn draw_endowments<R: Rng + ?Sized>(config: &Config, count: usize, rng: &mut R) -> Vec<Endowment> {
    let agents = &config.agents;
    let reproduction = &config.reproduction;
    let decision = &config.decision;

    let integer_trait = |span: Span<u64>, rng: &mut R| -> Vec<u64> {
        match agents.endowment_mode {
            EndowmentMode::Cyclic => cyclic(span, count, rng),
            EndowmentMode::Random => (0..count).map(|_| span.sample(rng)).collect(),
        }
    };

    let sugar_metabolism = integer_trait(widen(agents.sugar_metabolism), rng);
    let spice_metabolism = integer_trait(widen(agents.spice_metabolism), rng);
    let vision = integer_trait(widen(agents.vision), rng);
    let movement = integer_trait(widen(agents.movement_range()), rng);
    let starting_sugar = integer_trait(widen(agents.starting_sugar), rng);
    let starting_spice = integer_trait(widen(agents.starting_spice), rng);
    let max_age = agents.max_age.map(|span| integer_trait(span, rng));
    let tribes = integer_trait(Span(0, u64::from(agents.tribes - 1)), rng);
    let sexes = integer_trait(Span(0, 1), rng);
    let fertility_age = integer_trait(reproduction.fertility_age, rng);

    (0..count)
        .map(|i| {
            let sex = if sexes[i] == 0 { Sex::Female } else { Sex::Male };
            let infertility_age = match sex {
                Sex::Female => reproduction.female_infertility_age.sample(rng),
                Sex::Male => reproduction.male_infertility_age.sample(rng),
            };
            Endowment {
                sugar_metabolism: sugar_metabolism[i] as f64,
                spice_metabolism: spice_metabolism[i] as f64,
                vision: vision[i] as u32,
                movement: movement[i] as u32,
                starting_sugar: starting_sugar[i] as f64,
                starting_spice: starting_spice[i] as f64,
                max_age: max_age.as_ref().map(|ages| ages[i]),
                aggression: agents.aggression.sample(rng),
                tribe: tribes[i] as u32,
                sex,
                fertility_age: fertility_age[i],
                infertility_age,
                fertility: reproduction.fertility_factor.sample(rng),
                selfishness: decision.selfishness.map(|s| s.sample(rng)),
                lookahead_discount: decision.lookahead_discount.sample(rng),
                tribal_factor: decision.tribal_factor.map(|t| t.sample(rng)),
            }
        })
        .collect()
}

/// Cobb-Douglas welfare `sugar^(ms/mt) * spice^(mp/mt)` with `mt = ms + mp`.
/// Falls back to total wealth when both metabolisms are zero.
pub fn welfare(sugar: f64, spice: f64, sugar_metabolism: f64, spice_metabolism: f64) -> f64 {
    let sugar = sugar.max(0.0);
    let spice = spice.max(0.0);
    let total = sugar_metabolism + spice_metabolism;
    if total <= 0.0 {
        return sugar + spice;
    }
    sugar.powf(sugar_metabolism / total) * spice.powf(spice_metabolism / total)
}

/// An agent in the simulation
#[derive(Clone, Debug)]
pub struct Agent {
    // Identity
    pub id: AgentId,
    pub born: u64,
    pub age: u64,
    pub model: DecisionModel,

    // Location; kept in step with the cell's occupant by the orchestrator
    cell: CellId,

    // State
    pub endowment: Endowment,
    pub sugar: f64,
    pub spice: f64,
    alive: bool,
    pub cause_of_death: Option<DeathCause>,

    // Health
    pub afflictions: Afflictions,
    pub immune: Option<ImmuneSystem>,

    // Statistics
    pub children: u32,
    pub last_harvest: (f64, f64),
}

impl Agent {
    /// Create a living agent on `cell` holding its starting wealth
    pub fn new(id: AgentId, born: u64, cell: CellId, endowment: Endowment, model: DecisionModel) -> Self {
        Self {
            id,
            born,
            age: 0,
            model,
            cell,
            sugar: endowment.starting_sugar,
            spice: endowment.starting_spice,
            endowment,
            alive: true,
            cause_of_death: None,
            afflictions: Afflictions::new(),
            immune: None,
            children: 0,
            last_harvest: (0.0, 0.0),
        }
    }

    #[inline]
    pub fn cell(&self) -> CellId {
        self.cell
    }

    pub(crate) fn set_cell(&mut self, cell: CellId) {
        self.cell = cell;
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Record death; the orchestrator unlinks the agent from its cell
    pub(crate) fn mark_dead(&mut self, cause: DeathCause) {
        if self.alive {
            self.alive = false;
            self.cause_of_death = Some(cause);
        }
    }

    // ------------------------------------------------------------------
    // Effective traits: base endowment plus attached disease penalties
    // ------------------------------------------------------------------

    pub fn penalties(&self) -> DiseasePenalties {
        self.afflictions.penalties()
    }

    pub fn sugar_metabolism(&self) -> f64 {
        (self.endowment.sugar_metabolism + self.penalties().sugar_metabolism).max(0.0)
    }

    pub fn spice_metabolism(&self) -> f64 {
        (self.endowment.spice_metabolism + self.penalties().spice_metabolism).max(0.0)
    }

    pub fn total_metabolism(&self) -> f64 {
        self.sugar_metabolism() + self.spice_metabolism()
    }

    pub fn vision(&self) -> u32 {
        (i64::from(self.endowment.vision) + i64::from(self.penalties().vision)).max(0) as u32
    }

    pub fn movement(&self) -> u32 {
        (i64::from(self.endowment.movement) + i64::from(self.penalties().movement)).max(0) as u32
    }

    /// How far this agent can both see and travel
    pub fn reach(&self) -> u32 {
        self.vision().min(self.movement())
    }

    pub fn fertility(&self) -> f64 {
        self.endowment.fertility + self.penalties().fertility
    }

    pub fn aggression(&self) -> f64 {
        self.endowment.aggression + self.penalties().aggression
    }

    #[inline]
    pub fn tribe(&self) -> u32 {
        self.endowment.tribe
    }

    #[inline]
    pub fn is_sick(&self) -> bool {
        !self.afflictions.is_empty()
    }

    // ------------------------------------------------------------------
    // Wealth
    // ------------------------------------------------------------------

    #[inline]
    pub fn wealth(&self) -> f64 {
        self.sugar + self.spice
    }

    /// Cobb-Douglas welfare of current wealth plus a prospective gain.
    /// Reduces to plain sugar when the agent has no spice metabolism.
    pub fn welfare_with(&self, extra_sugar: f64, extra_spice: f64) -> f64 {
        welfare(
            self.sugar + extra_sugar,
            self.spice + extra_spice,
            self.sugar_metabolism(),
            self.spice_metabolism(),
        )
    }

    /// Ticks until starvation or old age, whichever comes first,
    /// assuming no further income
    pub fn estimated_remaining_lifespan(&self) -> f64 {
        self.lifespan_with(0.0, 0.0)
    }

    /// Remaining lifespan after collecting the given amounts
    pub fn lifespan_with(&self, extra_sugar: f64, extra_spice: f64) -> f64 {
        let by_sugar = match self.sugar_metabolism() {
            m if m > 0.0 => (self.sugar + extra_sugar).max(0.0) / m,
            _ => f64::INFINITY,
        };
        let by_spice = match self.spice_metabolism() {
            m if m > 0.0 => (self.spice + extra_spice).max(0.0) / m,
            _ => f64::INFINITY,
        };
        let by_age = self
            .endowment
            .max_age
            .map_or(f64::INFINITY, |max| max.saturating_sub(self.age) as f64);
        by_sugar.min(by_spice).min(by_age)
    }

    /// Wealth relative to upkeep, in `[0, 1)`
    pub fn happiness(&self) -> f64 {
        let wealth = self.wealth().max(0.0);
        let upkeep = self.total_metabolism();
        if wealth + upkeep <= 0.0 {
            0.0
        } else {
            wealth / (wealth + upkeep)
        }
    }

    /// Would this agent survive one tick after collecting the given amounts
    pub fn survives_with(&self, sugar: f64, spice: f64) -> bool {
        let sugar_left = self.sugar + sugar - self.sugar_metabolism();
        let spice_left = self.spice + spice - self.spice_metabolism();
        sugar_left > 0.0 && (self.spice_metabolism() <= 0.0 || spice_left > 0.0)
    }

    // ------------------------------------------------------------------
    // Life cycle
    // ------------------------------------------------------------------

    /// Add harvested resources
    pub fn collect(&mut self, sugar: f64, spice: f64) {
        self.sugar += sugar;
        self.spice += spice;
        self.last_harvest = (sugar, spice);
    }

    /// Pay metabolism; returns the amounts burned
    pub fn metabolize(&mut self) -> (f64, f64) {
        let burned = (self.sugar_metabolism(), self.spice_metabolism());
        self.sugar -= burned.0;
        self.spice -= burned.1;
        burned
    }

    /// Wealth of a metabolized resource below the survival threshold
    pub fn is_starving(&self) -> bool {
        (self.sugar_metabolism() > 0.0 && self.sugar < STARVATION_THRESHOLD)
            || (self.spice_metabolism() > 0.0 && self.spice < STARVATION_THRESHOLD)
    }

    /// Age by one tick; returns whether the age limit was reached
    pub fn grow_older(&mut self) -> bool {
        self.age += 1;
        self.endowment.max_age.map_or(false, |max| self.age >= max)
    }

    /// Whether this agent can prey on `victim` under the combat rule:
    /// aggressive, different tribe, strictly poorer victim
    pub fn can_prey_on(&self, victim: &Agent) -> bool {
        self.alive
            && victim.alive
            && self.id != victim.id
            && self.aggression() > 0.0
            && self.tribe() != victim.tribe()
            && victim.wealth() < self.wealth()
    }

    /// Old enough, not too old, and rich enough to have a child
    pub fn is_fertile(&self) -> bool {
        self.alive
            && self.age >= self.endowment.fertility_age
            && self.age < self.endowment.infertility_age
            && self.fertility() > 0.0
            && self.sugar >= self.endowment.starting_sugar
            && self.spice >= self.endowment.starting_spice
    }

    /// Attach a disease; no-op if already carried
    pub fn catch(&mut self, disease: Arc<Disease>) -> bool {
        self.afflictions.attach(disease)
    }

    /// Read-only view placed at the agent's cell coordinates
    pub fn snapshot(&self, x: usize, y: usize) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            x,
            y,
            age: self.age,
            alive: self.alive,
            sugar: self.sugar,
            spice: self.spice,
            sugar_metabolism: self.sugar_metabolism(),
            spice_metabolism: self.spice_metabolism(),
            vision: self.vision(),
            movement: self.movement(),
            tribe: self.tribe(),
            sex: self.endowment.sex,
            diseases: self.afflictions.len(),
            model: self.model,
        }
    }

    /// One immune step per attached disease; detaches those now recognised.
    /// Returns how many were cured.
    pub fn immune_response(&mut self) -> usize {
        let Some(immune) = self.immune.as_mut() else {
            return 0;
        };
        let cured: Vec<_> = self
            .afflictions
            .iter()
            .filter_map(|d| immune.respond(&d.tags).then_some(d.id))
            .collect();
        for id in &cured {
            self.afflictions.detach(*id);
        }
        cured.len()
    }
}

/// Read-only view of an agent for external collaborators
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub x: usize,
    pub y: usize,
    pub age: u64,
    pub alive: bool,
    pub sugar: f64,
    pub spice: f64,
    pub sugar_metabolism: f64,
    pub spice_metabolism: f64,
    pub vision: u32,
    pub movement: u32,
    pub tribe: u32,
    pub sex: Sex,
    pub diseases: usize,
    pub model: DecisionModel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disease::DiseaseTrigger;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn agent() -> Agent {
        Agent::new(1, 0, 0, Endowment::default(), DecisionModel::Greedy)
    }

    fn sickness(vision: i32, sugar: f64) -> Arc<Disease> {
        Arc::new(Disease {
            id: 0,
            tags: vec![true, false, true],
            penalties: DiseasePenalties {
                vision,
                sugar_metabolism: sugar,
                ..DiseasePenalties::default()
            },
            trigger: DiseaseTrigger::Infectious,
        })
    }

    #[test]
    fn test_agent_creation() {
        let a = agent();
        assert!(a.is_alive());
        assert_eq!(a.sugar, 5.0);
        assert_eq!(a.cell(), 0);
    }

    #[test]
    fn test_metabolism_and_starvation() {
        let mut a = agent();
        a.endowment.sugar_metabolism = 3.0;
        a.sugar = 3.5;
        assert_eq!(a.metabolize(), (3.0, 0.0));
        assert!(a.is_starving());

        a.sugar = 4.0;
        a.metabolize();
        assert!(!a.is_starving());
    }

    #[test]
    fn test_spice_ignored_without_spice_metabolism() {
        let mut a = agent();
        a.spice = 0.0;
        a.sugar = 10.0;
        assert!(!a.is_starving());
        assert_eq!(a.welfare_with(2.0, 0.0), 12.0);
    }

    #[test]
    fn test_disease_penalties_are_effective_not_base() {
        let mut a = agent();
        a.endowment.vision = 3;
        assert!(a.catch(sickness(-5, 1.5)));
        assert_eq!(a.vision(), 0);
        assert_eq!(a.sugar_metabolism(), 2.5);
        assert_eq!(a.endowment.vision, 3);
        a.afflictions.detach(0);
        assert_eq!(a.vision(), 3);
    }

    #[test]
    fn test_lifespan_estimate() {
        let mut a = agent();
        a.endowment.sugar_metabolism = 2.0;
        a.sugar = 9.0;
        assert_eq!(a.estimated_remaining_lifespan(), 4.5);
        a.endowment.max_age = Some(10);
        a.age = 8;
        assert_eq!(a.estimated_remaining_lifespan(), 2.0);
    }

    #[test]
    fn test_aging() {
        let mut a = agent();
        a.endowment.max_age = Some(2);
        assert!(!a.grow_older());
        assert!(a.grow_older());
    }

    #[test]
    fn test_prey_rule() {
        let mut hunter = agent();
        hunter.endowment.aggression = 1.0;
        hunter.sugar = 10.0;
        let mut victim = Agent::new(2, 0, 1, Endowment::default(), DecisionModel::Greedy);
        victim.sugar = 3.0;
        assert!(!hunter.can_prey_on(&victim), "same tribe");
        victim.endowment.tribe = 1;
        assert!(hunter.can_prey_on(&victim));
        victim.sugar = 10.0;
        assert!(!hunter.can_prey_on(&victim), "victim not poorer");
    }

    #[test]
    fn test_immune_response_cures() {
        let mut a = agent();
        a.immune = Some(ImmuneSystem {
            bits: vec![true, false, false, false],
        });
        a.catch(sickness(0, 1.0));
        let mut cured = 0;
        for _ in 0..4 {
            cured += a.immune_response();
        }
        assert_eq!(cured, 1);
        assert!(!a.is_sick());
    }

    #[test]
    fn test_cyclic_endowments_cover_ranges() {
        let config = Config::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let endowments = draw_endowments(&config, 240, &mut rng);
        assert_eq!(endowments.len(), 240);
        for m in 1..=4 {
            let count = endowments
                .iter()
                .filter(|e| e.sugar_metabolism == m as f64)
                .count();
            assert_eq!(count, 60);
        }
        for v in 1..=6 {
            assert_eq!(endowments.iter().filter(|e| e.vision == v).count(), 40);
        }
        // Movement falls back to the vision range but is shuffled on its own
        assert_eq!(endowments.iter().filter(|e| e.movement == 6).count(), 40);
    }
}

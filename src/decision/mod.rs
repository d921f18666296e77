//! Cell selection: candidate gathering, scoring and tie-breaking.
//!
//! Every agent shares one life cycle; only target selection varies. A
//! [`Valuation`] scores one candidate cell for one agent, and
//! [`find_best_cell`] scans the shuffled candidates keeping the highest
//! value, preferring the shorter trip on equal value. The first candidate in
//! shuffled order wins a full tie.

pub mod bentham;
pub mod greedy;
pub mod leader;

pub use bentham::Bentham;
pub use greedy::Greedy;
pub use leader::{LeaderPlan, Urgency};

use crate::agent::{Agent, AgentId};
use crate::cell::CellId;
use crate::environment::Environment;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which policy agents use to pick a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionModel {
    /// Best local welfare within reach
    Greedy,
    /// Utilitarian valuation over the visible neighbourhood
    Bentham,
    /// Centralized per-tick assignment by urgency
    Leader,
}

impl DecisionModel {
    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            DecisionModel::Greedy => "greedy",
            DecisionModel::Bentham => "bentham",
            DecisionModel::Leader => "leader",
        }
    }
}

/// A cell an agent could move to this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub cell: CellId,
    /// Wraparound-aware travel distance, capped at `vision + 1`
    pub distance: u32,
    /// Occupant that would be killed by moving here
    pub prey: Option<AgentId>,
}

/// Read-only view of the world shared by all valuations
pub struct Context<'a> {
    pub env: &'a Environment,
    pub agents: &'a BTreeMap<AgentId, Agent>,
    /// Living agents at the start of the tick
    pub population: usize,
    /// Combat is enabled when positive
    pub max_combat_loot: f64,
}

impl<'a> Context<'a> {
    pub fn new(env: &'a Environment, agents: &'a BTreeMap<AgentId, Agent>, max_combat_loot: f64) -> Self {
        let population = agents.values().filter(|a| a.is_alive()).count();
        Self {
            env,
            agents,
            population,
            max_combat_loot,
        }
    }

    #[inline]
    pub fn combat_enabled(&self) -> bool {
        self.max_combat_loot > 0.0
    }

    /// Living agent standing on `cell`
    pub fn occupant(&self, cell: CellId) -> Option<&'a Agent> {
        self.env
            .cell(cell)
            .occupant()
            .and_then(|id| self.agents.get(&id))
            .filter(|a| a.is_alive())
    }

    /// Resources taken from a victim, capped per resource
    pub fn loot(&self, victim: &Agent) -> (f64, f64) {
        (
            victim.sugar.max(0.0).min(self.max_combat_loot),
            victim.spice.max(0.0).min(self.max_combat_loot),
        )
    }

    /// Everything collected by ending the move on `candidate`
    pub fn gain(&self, candidate: &Candidate) -> (f64, f64) {
        let cell = self.env.cell(candidate.cell);
        let (loot_sugar, loot_spice) = candidate
            .prey
            .and_then(|id| self.agents.get(&id))
            .map_or((0.0, 0.0), |victim| self.loot(victim));
        (cell.sugar() + loot_sugar, cell.spice() + loot_spice)
    }

    /// Living agents on cells within `agent`'s vision, the agent included
    pub fn neighborhood(&self, agent: &Agent) -> Vec<&'a Agent> {
        let mut found: Vec<&'a Agent> = self
            .env
            .cells_in_range(agent.cell(), agent.vision())
            .into_iter()
            .filter_map(|(cell, _)| self.occupant(cell))
            .collect();
        if let Some(me) = self.agents.get(&agent.id) {
            found.push(me);
        }
        found
    }
}

/// Scores one candidate cell for one agent; higher is better
pub trait Valuation {
    fn value(&self, agent: &Agent, candidate: &Candidate, ctx: &Context<'_>) -> f64;
}

/// Build a valuation for a per-agent decision model.
/// The leader auction is not per-agent; its followers are placed by
/// [`LeaderPlan`] and the leader itself forages greedily.
pub fn valuation_for(model: DecisionModel, agent: &Agent, ctx: &Context<'_>) -> Box<dyn Valuation> {
    match model {
        DecisionModel::Greedy | DecisionModel::Leader => Box::new(Greedy),
        DecisionModel::Bentham => Box::new(Bentham::for_agent(agent, ctx)),
    }
}

/// Cells the agent could end its move on: its own cell, free cells within
/// reach, and occupied cells whose occupant it may prey on. Unshuffled.
pub fn reachable_cells(agent: &Agent, ctx: &Context<'_>) -> Vec<Candidate> {
    let origin = agent.cell();
    let cap = agent.vision() + 1;
    let mut found = vec![Candidate {
        cell: origin,
        distance: 0,
        prey: None,
    }];
    for (cell, _) in ctx.env.cells_in_range(origin, agent.reach()) {
        let prey = match ctx.env.cell(cell).occupant() {
            None => None,
            Some(other) => match ctx.agents.get(&other) {
                Some(victim) if ctx.combat_enabled() && agent.can_prey_on(victim) => Some(other),
                _ => continue,
            },
        };
        found.push(Candidate {
            cell,
            distance: ctx.env.travel_distance(origin, cell).min(cap),
            prey,
        });
    }
    found
}

/// Reachable cells in a fresh random order
pub fn candidates<R: Rng + ?Sized>(agent: &Agent, ctx: &Context<'_>, rng: &mut R) -> Vec<Candidate> {
    let mut found = reachable_cells(agent, ctx);
    found.shuffle(rng);
    found
}

/// Highest value wins; on equal value the shorter trip wins; a full tie
/// keeps the earlier candidate.
pub fn select_best<F>(candidates: &[Candidate], mut value: F) -> Option<Candidate>
where
    F: FnMut(&Candidate) -> f64,
{
    let mut best: Option<(f64, Candidate)> = None;
    for candidate in candidates {
        let v = value(candidate);
        let better = match &best {
            None => true,
            Some((best_value, best)) => {
                v > *best_value || (v == *best_value && candidate.distance < best.distance)
            }
        };
        if better {
            best = Some((v, *candidate));
        }
    }
    best.map(|(_, c)| c)
}

/// Pick the agent's target for this tick
pub fn find_best_cell<R: Rng + ?Sized>(
    agent: &Agent,
    valuation: &dyn Valuation,
    ctx: &Context<'_>,
    rng: &mut R,
) -> Option<Candidate> {
    let candidates = candidates(agent, ctx, rng);
    select_best(&candidates, |c| valuation.value(agent, c, ctx))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agent::Endowment;
    use crate::config::{Config, Landscape, Span};

    /// Flat empty grid for decision tests
    pub(crate) fn world(width: usize, height: usize, vision: u32) -> (Environment, BTreeMap<AgentId, Agent>) {
        let mut config = Config::default();
        config.environment.width = width;
        config.environment.height = height;
        config.environment.landscape = Landscape::Uniform;
        config.agents.vision = Span(vision, vision);
        let mut env = Environment::new(&config);
        for id in 0..width * height {
            env.cell_mut(id).set_stock(0.0, 0.0);
        }
        (env, BTreeMap::new())
    }

    pub(crate) fn place(
        env: &mut Environment,
        agents: &mut BTreeMap<AgentId, Agent>,
        id: AgentId,
        cell: CellId,
        vision: u32,
    ) {
        let endowment = Endowment {
            vision,
            movement: vision,
            ..Endowment::default()
        };
        env.cell_mut(cell).set_occupant(id).unwrap();
        agents.insert(id, Agent::new(id, 0, cell, endowment, DecisionModel::Greedy));
    }

    #[test]
    fn test_select_prefers_value_then_distance() {
        let c = |cell, distance| Candidate {
            cell,
            distance,
            prey: None,
        };
        let candidates = [c(1, 3), c(2, 1), c(3, 2)];
        let best = select_best(&candidates, |_| 1.0).unwrap();
        assert_eq!(best.cell, 2);

        let best = select_best(&candidates, |c| if c.cell == 3 { 2.0 } else { 1.0 }).unwrap();
        assert_eq!(best.cell, 3);

        // Full tie keeps the first
        let tied = [c(7, 1), c(8, 1)];
        assert_eq!(select_best(&tied, |_| 1.0).unwrap().cell, 7);
        assert!(select_best(&[], |_| 1.0).is_none());
    }

    #[test]
    fn test_reachable_skips_occupied_without_combat() {
        let (mut env, mut agents) = world(5, 1, 4);
        place(&mut env, &mut agents, 1, 0, 4);
        place(&mut env, &mut agents, 2, 2, 4);
        let ctx = Context::new(&env, &agents, 0.0);
        let cells: Vec<CellId> = reachable_cells(&agents[&1], &ctx)
            .iter()
            .map(|c| c.cell)
            .collect();
        assert!(cells.contains(&0));
        assert!(!cells.contains(&2));
        assert!(cells.contains(&4));
    }

    #[test]
    fn test_zero_vision_stays_put() {
        let (mut env, mut agents) = world(3, 3, 1);
        place(&mut env, &mut agents, 1, 4, 0);
        env.cell_mut(5).set_stock(4.0, 0.0);
        let ctx = Context::new(&env, &agents, 0.0);
        let mut rng = rand::thread_rng();
        let best = find_best_cell(&agents[&1], &Greedy, &ctx, &mut rng).unwrap();
        assert_eq!(best.cell, 4);
    }

    #[test]
    fn test_travel_distance_capped() {
        let (mut env, mut agents) = world(10, 1, 9);
        place(&mut env, &mut agents, 1, 0, 2);
        let ctx = Context::new(&env, &agents, 0.0);
        for c in reachable_cells(&agents[&1], &ctx) {
            assert!(c.distance <= 3);
        }
    }
}

//! Utilitarian valuation.
//!
//! A candidate cell is worth the weighted sum, over every agent in the
//! decider's visible neighbourhood, of that agent's hedonic value for the
//! cell:
//!
//! ```text
//! certainty * proximity * (extent * (intensity + duration)
//!     + discount * future_extent * (future_intensity + future_duration))
//! ```
//!
//! The decider's own term counts positively. Every other agent's term is
//! an opportunity cost and counts negatively; an agent that would be killed
//! by the move costs at least one unit. Selfishness weights self against
//! others, the tribal factor weights same-tribe against other-tribe
//! neighbours.

use super::{Candidate, Context, Valuation};
use crate::agent::{Agent, AgentId};

/// Cost floor for a neighbour killed by the move
const DISPLACEMENT_PENALTY: f64 = -1.0;

/// Bentham valuation bound to one decider's neighbourhood
#[derive(Debug, Clone)]
pub struct Bentham {
    neighbors: Vec<AgentId>,
}

impl Bentham {
    /// Snapshot the decider's neighbourhood (itself included)
    pub fn for_agent(agent: &Agent, ctx: &Context<'_>) -> Self {
        Self {
            neighbors: ctx.neighborhood(agent).iter().map(|a| a.id).collect(),
        }
    }

    pub fn neighbors(&self) -> &[AgentId] {
        &self.neighbors
    }

    fn can_reach(neighbor: &Agent, candidate: &Candidate, ctx: &Context<'_>) -> bool {
        ctx.env
            .range_distance(neighbor.cell(), candidate.cell)
            .map_or(false, |d| d <= neighbor.reach())
    }

    fn weight(decider: &Agent, neighbor: &Agent) -> f64 {
        let is_self = decider.id == neighbor.id;
        let selfish = match decider.endowment.selfishness {
            Some(s) if is_self => s,
            Some(s) => 1.0 - s,
            None => 1.0,
        };
        let tribal = match decider.endowment.tribal_factor {
            _ if is_self => 1.0,
            Some(t) if neighbor.tribe() == decider.tribe() => t,
            Some(t) => 1.0 - t,
            None => 1.0,
        };
        selfish * tribal
    }
}

impl Valuation for Bentham {
    fn value(&self, agent: &Agent, candidate: &Candidate, ctx: &Context<'_>) -> f64 {
        let cell = ctx.env.cell(candidate.cell);
        let population = ctx.population.max(1) as f64;
        let max_wealth = cell.max_wealth();
        let cleanliness = 1.0 / (1.0 + cell.pollution.max(0.0));

        let (sugar, spice) = ctx.gain(candidate);
        let wealth = sugar + spice;
        // The cell after being harvested and regrown once
        let future_wealth = ctx.env.sugar_regrow_rate().min(cell.max_sugar())
            + ctx.env.spice_regrow_rate().min(cell.max_spice());

        let members: Vec<&Agent> = self
            .neighbors
            .iter()
            .filter_map(|id| ctx.agents.get(id))
            .filter(|a| a.is_alive())
            .collect();
        let reachers = members
            .iter()
            .filter(|n| n.id == agent.id || Self::can_reach(n, candidate, ctx))
            .count();
        let extent = members.len() as f64 / population;
        let future_extent = reachers as f64 / population;
        let discount = agent.endowment.lookahead_discount;

        let mut total = 0.0;
        for neighbor in members {
            let is_self = neighbor.id == agent.id;
            let certainty = if is_self || Self::can_reach(neighbor, candidate, ctx) {
                1.0
            } else {
                continue;
            };
            // Only single-tick moves are modelled
            let proximity = 1.0;

            let metabolism = neighbor.total_metabolism();
            let per_upkeep = |w: f64| if metabolism > 0.0 { w / metabolism } else { w };
            let (duration, future_duration) = if max_wealth > 0.0 {
                (per_upkeep(wealth) / max_wealth, per_upkeep(future_wealth) / max_wealth)
            } else {
                (0.0, 0.0)
            };
            let intensity = cleanliness / (1.0 + neighbor.estimated_remaining_lifespan());
            let future_intensity = cleanliness / (1.0 + neighbor.lifespan_with(sugar, spice));

            let value = certainty
                * proximity
                * (extent * (intensity + duration)
                    + discount * future_extent * (future_intensity + future_duration));

            let mut contribution = if is_self { value } else { -value };
            if candidate.prey == Some(neighbor.id) {
                contribution = contribution.min(DISPLACEMENT_PENALTY);
            }
            total += contribution * Self::weight(agent, neighbor);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::tests::{place, world};
    use crate::decision::{find_best_cell, Candidate};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Decider on cell 2 (vision 3), rival on cell 5 (vision 1),
    /// equal stock on cells 0 and 4
    fn contested() -> (
        crate::environment::Environment,
        std::collections::BTreeMap<AgentId, Agent>,
    ) {
        let (mut env, mut agents) = world(7, 1, 3);
        place(&mut env, &mut agents, 1, 2, 3);
        place(&mut env, &mut agents, 2, 5, 1);
        env.cell_mut(0).set_stock(4.0, 0.0);
        env.cell_mut(4).set_stock(4.0, 0.0);
        (env, agents)
    }

    #[test]
    fn test_neighborhood_includes_self_and_visible() {
        let (env, agents) = contested();
        let ctx = Context::new(&env, &agents, 0.0);
        let bentham = Bentham::for_agent(&agents[&1], &ctx);
        assert_eq!(bentham.neighbors().len(), 2);
        assert!(bentham.neighbors().contains(&1));

        // The rival sees only one cell each way
        let rival = Bentham::for_agent(&agents[&2], &ctx);
        assert_eq!(rival.neighbors(), &[2]);
    }

    #[test]
    fn test_avoids_cell_a_neighbor_needs() {
        let (env, agents) = contested();
        let ctx = Context::new(&env, &agents, 0.0);
        let bentham = Bentham::for_agent(&agents[&1], &ctx);
        for seed in 0..10 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let best = find_best_cell(&agents[&1], &bentham, &ctx, &mut rng).unwrap();
            assert_eq!(best.cell, 0);
        }
    }

    #[test]
    fn test_fully_selfish_ignores_neighbors() {
        let (env, mut agents) = contested();
        if let Some(a) = agents.get_mut(&1) {
            a.endowment.selfishness = Some(1.0);
        }
        let ctx = Context::new(&env, &agents, 0.0);
        let bentham = Bentham::for_agent(&agents[&1], &ctx);
        let decider = &agents[&1];
        let at = |cell| Candidate {
            cell,
            distance: 2,
            prey: None,
        };
        let contested = bentham.value(decider, &at(4), &ctx);
        let free = bentham.value(decider, &at(0), &ctx);
        assert!(contested >= free);
    }

    #[test]
    fn test_tribal_factor_weights_neighbors() {
        // Decider on cell 3 sees both ends; each neighbour can reach only
        // the cell next to it
        let (mut env, mut agents) = world(7, 1, 3);
        place(&mut env, &mut agents, 1, 3, 3);
        place(&mut env, &mut agents, 2, 0, 1);
        place(&mut env, &mut agents, 3, 6, 1);
        env.cell_mut(1).set_stock(4.0, 0.0);
        env.cell_mut(5).set_stock(4.0, 0.0);
        if let Some(a) = agents.get_mut(&1) {
            // Weightless self isolates the neighbour terms
            a.endowment.selfishness = Some(0.0);
            a.endowment.tribal_factor = Some(0.8);
        }
        if let Some(a) = agents.get_mut(&3) {
            a.endowment.tribe = 1;
        }

        let ctx = Context::new(&env, &agents, 0.0);
        let bentham = Bentham::for_agent(&agents[&1], &ctx);
        let at = |cell| Candidate {
            cell,
            distance: 2,
            prey: None,
        };
        let same_tribe = bentham.value(&agents[&1], &at(1), &ctx);
        let other_tribe = bentham.value(&agents[&1], &at(5), &ctx);
        assert!(same_tribe < 0.0 && other_tribe < 0.0);
        assert!((same_tribe / other_tribe - 0.8 / 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_lookahead_discount_scales_future_terms() {
        let (mut env, mut agents) = world(3, 1, 1);
        place(&mut env, &mut agents, 1, 0, 1);
        env.cell_mut(1).set_stock(4.0, 0.0);
        let target = Candidate {
            cell: 1,
            distance: 1,
            prey: None,
        };

        let value_with = |agents: &std::collections::BTreeMap<AgentId, Agent>, discount: f64| {
            let mut agents = agents.clone();
            if let Some(a) = agents.get_mut(&1) {
                a.endowment.lookahead_discount = discount;
            }
            let ctx = Context::new(&env, &agents, 0.0);
            Bentham::for_agent(&agents[&1], &ctx).value(&agents[&1], &target, &ctx)
        };

        // Alone on the grid: future extent 1, regrowth of 1 sugar on a
        // 4-capacity cell, 5 + 4 sugar at metabolism 1
        let agent = &agents[&1];
        let future_intensity = 1.0 / (1.0 + agent.lifespan_with(4.0, 0.0));
        let future_duration = 1.0 / agent.total_metabolism() / 4.0;
        let future_extent = 1.0;
        let future_terms = future_extent * (future_intensity + future_duration);
        assert!((future_terms - 0.35).abs() < 1e-9);

        let shift = value_with(&agents, 1.0) - value_with(&agents, 0.0);
        assert!((shift - future_terms).abs() < 1e-9);
        let half = value_with(&agents, 0.5) - value_with(&agents, 0.0);
        assert!((half - 0.5 * future_terms).abs() < 1e-9);
    }

    #[test]
    fn test_displacement_costs_at_least_one_unit() {
        let (mut env, mut agents) = world(3, 1, 1);
        place(&mut env, &mut agents, 1, 0, 1);
        place(&mut env, &mut agents, 2, 1, 1);
        if let Some(a) = agents.get_mut(&1) {
            a.endowment.selfishness = Some(0.0);
        }
        let ctx = Context::new(&env, &agents, 2.0);
        let bentham = Bentham::for_agent(&agents[&1], &ctx);
        let strike = Candidate {
            cell: 1,
            distance: 1,
            prey: Some(2),
        };
        assert!(bentham.value(&agents[&1], &strike, &ctx) <= DISPLACEMENT_PENALTY);
    }
}

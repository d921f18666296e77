//! Local greedy foraging.

use super::{Candidate, Context, Valuation};
use crate::agent::Agent;

/// Welfare after collecting the candidate's resources, discounted by the
/// cell's pollution. With no spice metabolism and no pollution this orders
/// cells by sugar alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl Valuation for Greedy {
    fn value(&self, agent: &Agent, candidate: &Candidate, ctx: &Context<'_>) -> f64 {
        let (sugar, spice) = ctx.gain(candidate);
        let pollution = ctx.env.cell(candidate.cell).pollution.max(0.0);
        agent.welfare_with(sugar, spice) / (1.0 + pollution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::find_best_cell;
    use crate::decision::tests::{place, world};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_prefers_richer_cell() {
        let (mut env, mut agents) = world(7, 1, 3);
        place(&mut env, &mut agents, 1, 3, 3);
        env.cell_mut(1).set_stock(2.0, 0.0);
        env.cell_mut(6).set_stock(4.0, 0.0);
        let ctx = Context::new(&env, &agents, 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let best = find_best_cell(&agents[&1], &Greedy, &ctx, &mut rng).unwrap();
        assert_eq!(best.cell, 6);
    }

    #[test]
    fn test_equal_amount_prefers_nearer() {
        let (mut env, mut agents) = world(7, 1, 3);
        place(&mut env, &mut agents, 1, 3, 3);
        env.cell_mut(1).set_stock(4.0, 0.0);
        env.cell_mut(4).set_stock(4.0, 0.0);
        let ctx = Context::new(&env, &agents, 0.0);
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let best = find_best_cell(&agents[&1], &Greedy, &ctx, &mut rng).unwrap();
            assert_eq!(best.cell, 4);
        }
    }

    #[test]
    fn test_full_tie_split_across_seeds() {
        let (mut env, mut agents) = world(7, 1, 3);
        place(&mut env, &mut agents, 1, 3, 3);
        env.cell_mut(2).set_stock(4.0, 0.0);
        env.cell_mut(4).set_stock(4.0, 0.0);
        let ctx = Context::new(&env, &agents, 0.0);
        let mut west = 0;
        let runs = 400;
        for seed in 0..runs {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            if find_best_cell(&agents[&1], &Greedy, &ctx, &mut rng).unwrap().cell == 2 {
                west += 1;
            }
        }
        let share = west as f64 / runs as f64;
        assert!((0.4..=0.6).contains(&share), "west share {}", share);
    }

    #[test]
    fn test_pollution_discounts_cell() {
        let (mut env, mut agents) = world(5, 1, 2);
        place(&mut env, &mut agents, 1, 2, 2);
        env.cell_mut(1).set_stock(4.0, 0.0);
        env.cell_mut(3).set_stock(3.0, 0.0);
        env.cell_mut(1).pollution = 10.0;
        let ctx = Context::new(&env, &agents, 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert_eq!(find_best_cell(&agents[&1], &Greedy, &ctx, &mut rng).unwrap().cell, 3);
    }
}

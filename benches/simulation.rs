//! Performance benchmarks for Sugarscape

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sugarscape::config::{RangeMode, Span};
use sugarscape::decision::{self, leader::LeaderPlan};
use sugarscape::{Config, DecisionModel, Environment, Sugarscape};

fn benchmark_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    for population in [100, 500, 1000].iter() {
        let mut config = Config::default();
        config.agents.starting_agents = *population;
        config.environment.width = 80;
        config.environment.height = 80;
        config.environment.sugar_regrow_rate = 4.0;

        let mut sim = Sugarscape::new_with_seed(config, 42).unwrap();

        // Warm up
        sim.run(10).unwrap();

        group.bench_with_input(BenchmarkId::new("population", population), population, |b, _| {
            b.iter(|| sim.step().unwrap());
        });
    }

    group.finish();
}

fn benchmark_cell_ranges(c: &mut Criterion) {
    let mut group = c.benchmark_group("environment_new");

    for mode in [RangeMode::Cardinal, RangeMode::Radial] {
        let mut config = Config::default();
        config.agents.range_mode = mode;
        config.agents.vision = Span(1, 6);

        group.bench_function(format!("{:?}", mode), |b| {
            b.iter(|| Environment::new(black_box(&config)));
        });
    }

    group.finish();
}

fn benchmark_decision_models(c: &mut Criterion) {
    let mut group = c.benchmark_group("decision");

    for model in [DecisionModel::Greedy, DecisionModel::Bentham] {
        let mut config = Config::default();
        config.decision.model = model;
        let sim = Sugarscape::new_with_seed(config, 42).unwrap();
        let ctx = sim.decision_context();
        let agents: Vec<_> = sim.agents().collect();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        group.bench_function(model.name(), |b| {
            b.iter(|| {
                for agent in &agents {
                    let valuation = decision::valuation_for(model, agent, &ctx);
                    black_box(decision::find_best_cell(agent, valuation.as_ref(), &ctx, &mut rng));
                }
            });
        });
    }

    group.finish();
}

fn benchmark_leader_plan(c: &mut Criterion) {
    let mut config = Config::default();
    config.decision.model = DecisionModel::Leader;
    let sim = Sugarscape::new_with_seed(config, 42).unwrap();
    let ctx = sim.decision_context();

    c.bench_function("leader_plan", |b| {
        b.iter(|| LeaderPlan::build(black_box(&ctx)));
    });
}

criterion_group!(
    benches,
    benchmark_step,
    benchmark_cell_ranges,
    benchmark_decision_models,
    benchmark_leader_plan,
);
criterion_main!(benches);

//! Simulation engine: owns the grid and the population and runs the tick loop.
//!
//! Each tick the environment advances first (seasons, pollution, regrowth),
//! then every agent living at the start of the tick takes its turn in
//! sequence against the live grid: later agents see earlier moves. A turn
//! is select, move, harvest, trade, reproduce, contagion, metabolize, age.
//! Agents killed mid-tick are unlinked at once and skipped; the dead are
//! dropped from the population before the tick ends.

use crate::agent::{draw_endowments, Agent, AgentId, AgentSnapshot, DeathCause};
use crate::cell::{CellId, CellSnapshot};
use crate::config::{AgentOrder, Config};
use crate::decision::{self, Candidate, Context, DecisionModel, LeaderPlan};
use crate::disease::{Contact, Disease, ImmuneSystem};
use crate::environment::Environment;
use crate::error::{Result, SimError};
use crate::reproduction;
use crate::stats::{Stats, StatsHistory, TickCounters};
use crate::trade::{self, Trader};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The simulation
pub struct Sugarscape {
    // Configuration
    pub config: Config,

    // Environment
    pub environment: Environment,

    // Population, ascending id = insertion order
    agents: BTreeMap<AgentId, Agent>,
    diseases: Vec<Arc<Disease>>,

    // State
    pub timestep: u64,

    // Statistics
    pub stats: Stats,
    pub stats_history: StatsHistory,
    counters: TickCounters,

    // ID generation
    next_agent_id: AgentId,

    // Random number generator (seeded for reproducibility)
    rng: ChaCha8Rng,
    seed: u64,
}

impl Sugarscape {
    /// Create a simulation; uses `config.seed` or draws a fresh seed
    pub fn new(config: Config) -> Result<Self> {
        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        Self::new_with_seed(config, seed)
    }

    /// Create a simulation with a specific seed for reproducibility
    pub fn new_with_seed(config: Config, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut environment = Environment::new(&config);
        let diseases = Disease::generate_pool(&config.diseases, &mut rng);

        let count = config.agents.starting_agents;
        let endowments = draw_endowments(&config, count, &mut rng);
        let cells: Vec<CellId> =
            rand::seq::index::sample(&mut rng, environment.cells().len(), count).into_vec();

        let mut agents = BTreeMap::new();
        let mut next_agent_id: AgentId = 0;
        for (endowment, cell) in endowments.into_iter().zip(cells) {
            let id = next_agent_id;
            next_agent_id += 1;
            let mut agent = Agent::new(id, 0, cell, endowment, config.decision.model);
            if config.diseases.immune_system_length > 0 {
                agent.immune = Some(ImmuneSystem::random(
                    config.diseases.immune_system_length as usize,
                    &mut rng,
                ));
            }
            if !diseases.is_empty() {
                let infections = config.diseases.per_agent.sample(&mut rng) as usize;
                for disease in diseases.choose_multiple(&mut rng, infections) {
                    agent.catch(Arc::clone(disease));
                }
            }
            environment.cell_mut(cell).set_occupant(id)?;
            agents.insert(id, agent);
        }

        log::info!(
            "Genesis: {} agents on {}x{} grid, {} diseases, seed {}",
            agents.len(),
            environment.width,
            environment.height,
            diseases.len(),
            seed
        );

        let counters = TickCounters::default();
        let stats = Stats::collect(0, agents.values(), &environment, &counters);
        let mut stats_history = StatsHistory::new(config.logging.stats_interval);
        stats_history.record(stats.clone());

        Ok(Self {
            config,
            environment,
            agents,
            diseases,
            timestep: 0,
            stats,
            stats_history,
            counters,
            next_agent_id,
            rng,
            seed,
        })
    }

    /// Main simulation step
    pub fn step(&mut self) -> Result<()> {
        self.timestep += 1;
        self.counters = TickCounters::default();

        // Phase 1: regrowth, seasons, pollution
        self.environment.do_timestep(self.timestep);

        // Phase 2: centralized placement, if in use
        let population = self.population();
        let plan = match self.config.decision.model {
            DecisionModel::Leader => Some(LeaderPlan::build(&self.context(population))),
            _ => None,
        };
        if let Some(plan) = plan.as_ref().filter(|_| self.config.decision.leader_cull) {
            for &id in plan.unplaced() {
                self.kill(id, DeathCause::Culled)?;
            }
        }

        // Phase 3: agent turns against the live grid
        for id in self.agent_order() {
            if self.agents.get(&id).map_or(false, Agent::is_alive) {
                self.agent_turn(id, plan.as_ref(), population)?;
            }
        }

        // Phase 4: remove the dead, verify, record
        self.reap();
        self.check_invariants()?;
        self.update_stats();

        if self.is_extinct() {
            log::info!("Population extinct at tick {}", self.timestep);
        }
        Ok(())
    }

    /// Read-only view handed to the decision layer
    pub fn decision_context(&self) -> Context<'_> {
        self.context(self.population())
    }

    fn context(&self, population: usize) -> Context<'_> {
        Context {
            env: &self.environment,
            agents: &self.agents,
            population,
            max_combat_loot: self.config.environment.max_combat_loot,
        }
    }

    /// Living agents in this tick's order
    fn agent_order(&mut self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self
            .agents
            .values()
            .filter(|a| a.is_alive())
            .map(|a| a.id)
            .collect();
        if self.config.agents.order == AgentOrder::Shuffled {
            ids.shuffle(&mut self.rng);
        }
        ids
    }

    fn lookup(agents: &BTreeMap<AgentId, Agent>, id: AgentId) -> Result<&Agent> {
        let agent = agents.get(&id).ok_or(SimError::UnknownAgent(id))?;
        if !agent.is_alive() {
            return Err(SimError::DeadAgent(id));
        }
        Ok(agent)
    }

    fn living(&self, id: AgentId) -> Result<&Agent> {
        Self::lookup(&self.agents, id)
    }

    fn living_mut(&mut self, id: AgentId) -> Result<&mut Agent> {
        let agent = self.agents.get_mut(&id).ok_or(SimError::UnknownAgent(id))?;
        if !agent.is_alive() {
            return Err(SimError::DeadAgent(id));
        }
        Ok(agent)
    }

    fn agent_turn(&mut self, id: AgentId, plan: Option<&LeaderPlan>, population: usize) -> Result<()> {
        let target = self.select_target(id, plan, population)?;

        if let Some(victim) = target.prey {
            self.prey_on(id, victim)?;
        }
        self.move_agent(id, target.cell)?;
        self.harvest(id)?;

        if self.config.trade.enabled {
            self.trade_with_neighbors(id)?;
        }
        if self.config.reproduction.enabled {
            self.mate_with_neighbors(id)?;
        }
        if !self.diseases.is_empty() {
            self.spread_disease(id)?;
        }

        self.metabolize(id)
    }

    /// Target cell for this turn; the current cell when nothing better exists
    fn select_target(&mut self, id: AgentId, plan: Option<&LeaderPlan>, population: usize) -> Result<Candidate> {
        let agent = Self::lookup(&self.agents, id)?;
        let stay = Candidate {
            cell: agent.cell(),
            distance: 0,
            prey: None,
        };
        let ctx = Context {
            env: &self.environment,
            agents: &self.agents,
            population,
            max_combat_loot: self.config.environment.max_combat_loot,
        };

        let target = match plan {
            Some(plan) if !plan.is_leader(id) => plan
                .target(id)
                .filter(|c| LeaderPlan::may_enter(agent, c.cell, &ctx))
                .map(|c| Candidate {
                    prey: ctx.occupant(c.cell).map(|o| o.id).filter(|&o| o != id),
                    ..*c
                }),
            _ => {
                let valuation = decision::valuation_for(agent.model, agent, &ctx);
                decision::find_best_cell(agent, valuation.as_ref(), &ctx, &mut self.rng)
            }
        };
        Ok(target.unwrap_or(stay))
    }

    /// Move as one logical step: claim the target, release the origin,
    /// update the agent's reference
    pub fn move_agent(&mut self, id: AgentId, to: CellId) -> Result<()> {
        let from = self.living(id)?.cell();
        if from == to {
            return Ok(());
        }
        self.environment.cell_mut(to).set_occupant(id)?;
        self.environment.cell_mut(from).clear_occupant(id)?;
        self.living_mut(id)?.set_cell(to);
        Ok(())
    }

    fn harvest(&mut self, id: AgentId) -> Result<()> {
        let cell_id = self.living(id)?.cell();
        let cell = self.environment.cell_mut(cell_id);
        let (sugar, spice) = cell.harvest();
        cell.add_production_pollution(sugar, spice, &self.config.environment.pollution);
        self.living_mut(id)?.collect(sugar, spice);
        Ok(())
    }

    /// Kill the victim, take capped loot and any disease it carries
    fn prey_on(&mut self, attacker: AgentId, victim: AgentId) -> Result<()> {
        let max_loot = self.config.environment.max_combat_loot;
        let prey = self.living(victim)?;
        let loot = (
            prey.sugar.max(0.0).min(max_loot),
            prey.spice.max(0.0).min(max_loot),
        );
        let diseases = prey.afflictions.transmissible(Contact::Prey);
        self.kill(victim, DeathCause::Combat)?;

        let hunter = self.living_mut(attacker)?;
        hunter.sugar += loot.0;
        hunter.spice += loot.1;
        let caught = diseases.into_iter().filter(|d| hunter.catch(Arc::clone(d))).count();
        self.counters.infections += caught;
        log::trace!("Agent {} killed agent {} for {:?}", attacker, victim, loot);
        Ok(())
    }

    /// Living agents on cells adjacent to `id`
    fn neighbors_of(&self, id: AgentId) -> Result<Vec<AgentId>> {
        let cell = self.living(id)?.cell();
        Ok(self
            .environment
            .cell(cell)
            .neighbors()
            .filter_map(|n| self.environment.cell(n).occupant())
            .filter(|&other| other != id && self.agents.get(&other).map_or(false, Agent::is_alive))
            .collect())
    }

    fn trade_with_neighbors(&mut self, id: AgentId) -> Result<()> {
        for other in self.neighbors_of(id)? {
            let mut a = Trader::from(self.living(id)?);
            let mut b = Trader::from(self.living(other)?);
            let outcome = trade::bargain(&mut a, &mut b);
            if outcome.lots == 0 {
                continue;
            }
            self.counters.trade(outcome.lots, &outcome.prices);
            {
                let me = self.living_mut(id)?;
                me.sugar = a.sugar;
                me.spice = a.spice;
            }
            {
                let them = self.living_mut(other)?;
                them.sugar = b.sugar;
                them.spice = b.spice;
            }
            self.exchange_diseases(id, other, Contact::Trade)?;
        }
        Ok(())
    }

    fn mate_with_neighbors(&mut self, id: AgentId) -> Result<()> {
        let mut partners = self.neighbors_of(id)?;
        partners.shuffle(&mut self.rng);
        for partner in partners {
            if !self.living(id)?.is_fertile() {
                break;
            }
            self.give_birth(id, partner)?;
        }
        Ok(())
    }

    /// Returns whether a child was born
    fn give_birth(&mut self, a: AgentId, b: AgentId) -> Result<bool> {
        let (pa, pb) = (Self::lookup(&self.agents, a)?, Self::lookup(&self.agents, b)?);
        if !reproduction::can_mate(pa, pb) {
            return Ok(false);
        }
        let Some(cell) = reproduction::birth_cell(&self.environment, pa.cell(), pb.cell(), &mut self.rng)
        else {
            return Ok(false);
        };
        if !reproduction::conceives(pa, pb, &mut self.rng) {
            return Ok(false);
        }
        let endowment = reproduction::child_endowment(pa, pb, &self.config.reproduction, &mut self.rng);
        let mut inherited = pa.afflictions.transmissible(Contact::Birth);
        inherited.extend(pb.afflictions.transmissible(Contact::Birth));
        let shares = [(a, reproduction::parental_share(pa)), (b, reproduction::parental_share(pb))];

        for (parent, (sugar, spice)) in shares {
            let parent = self.living_mut(parent)?;
            parent.sugar -= sugar;
            parent.spice -= spice;
            parent.children += 1;
        }

        let id = self.next_agent_id;
        self.next_agent_id += 1;
        let mut child = Agent::new(id, self.timestep, cell, endowment, self.config.decision.model);
        if self.config.diseases.immune_system_length > 0 {
            child.immune = Some(ImmuneSystem::random(
                self.config.diseases.immune_system_length as usize,
                &mut self.rng,
            ));
        }
        for disease in inherited {
            child.catch(disease);
        }
        self.environment.cell_mut(cell).set_occupant(id)?;
        self.agents.insert(id, child);
        self.counters.births += 1;
        log::trace!("Agents {} and {} had child {} at cell {}", a, b, id, cell);
        Ok(true)
    }

    /// Pass one random transmissible disease each way
    fn exchange_diseases(&mut self, a: AgentId, b: AgentId, contact: Contact) -> Result<()> {
        for (from, to) in [(a, b), (b, a)] {
            let pool = self.living(from)?.afflictions.transmissible(contact);
            if let Some(disease) = pool.choose(&mut self.rng) {
                if self.living_mut(to)?.catch(Arc::clone(disease)) {
                    self.counters.infections += 1;
                }
            }
        }
        Ok(())
    }

    /// Catch from each neighbour, then one immune step
    fn spread_disease(&mut self, id: AgentId) -> Result<()> {
        for other in self.neighbors_of(id)? {
            let pool = self.living(other)?.afflictions.transmissible(Contact::Adjacent);
            if let Some(disease) = pool.choose(&mut self.rng) {
                if self.living_mut(id)?.catch(Arc::clone(disease)) {
                    self.counters.infections += 1;
                    log::trace!("Agent {} infected agent {} with disease {}", other, id, disease.id);
                }
            }
        }
        let cured = self.living_mut(id)?.immune_response();
        self.counters.cures += cured;
        Ok(())
    }

    /// Pay upkeep, pollute, then die of starvation or age
    fn metabolize(&mut self, id: AgentId) -> Result<()> {
        let agent = self.living_mut(id)?;
        let (sugar, spice) = agent.metabolize();
        let cell = agent.cell();
        let cause = if agent.is_starving() {
            Some(DeathCause::Starvation)
        } else if agent.grow_older() {
            Some(DeathCause::Aging)
        } else {
            None
        };
        self.environment
            .cell_mut(cell)
            .add_consumption_pollution(sugar, spice, &self.config.environment.pollution);
        if let Some(cause) = cause {
            self.kill(id, cause)?;
        }
        Ok(())
    }

    /// Mark dead and unlink from the grid in one step
    fn kill(&mut self, id: AgentId, cause: DeathCause) -> Result<()> {
        let agent = self.living_mut(id)?;
        agent.mark_dead(cause);
        let cell = agent.cell();
        self.environment.cell_mut(cell).clear_occupant(id)?;
        self.counters.death(cause);
        log::trace!("Agent {} died ({:?}) at tick {}", id, cause, self.timestep);
        Ok(())
    }

    /// Drop dead agents from the population
    fn reap(&mut self) {
        self.agents.retain(|_, a| a.is_alive());
    }

    /// Verify bounded stock and bidirectional occupancy
    pub fn check_invariants(&self) -> Result<()> {
        self.environment.check_stock_invariants()?;
        for agent in self.agents.values().filter(|a| a.is_alive()) {
            if self.environment.cell(agent.cell()).occupant() != Some(agent.id) {
                return Err(SimError::OccupancyMismatch {
                    agent: agent.id,
                    cell: agent.cell(),
                });
            }
        }
        for cell in self.environment.cells() {
            if let Some(id) = cell.occupant() {
                let agent = self.living(id)?;
                if agent.cell() != cell.id {
                    return Err(SimError::OccupancyMismatch { agent: id, cell: cell.id });
                }
            }
        }
        Ok(())
    }

    /// Update statistics
    fn update_stats(&mut self) {
        self.stats = Stats::collect(self.timestep, self.agents.values(), &self.environment, &self.counters);
        self.stats_history.record(self.stats.clone());
        log::debug!("{}", self.stats.summary());
    }

    /// Run up to `steps` ticks, stopping early on extinction.
    /// Returns the number of ticks executed.
    pub fn run(&mut self, steps: u64) -> Result<u64> {
        self.run_with_callback(steps, |_| {})
    }

    /// Run with a callback after every tick
    pub fn run_with_callback<F>(&mut self, steps: u64, mut callback: F) -> Result<u64>
    where
        F: FnMut(&Sugarscape),
    {
        for done in 0..steps {
            if self.is_extinct() {
                return Ok(done);
            }
            self.step()?;
            callback(self);
        }
        Ok(steps)
    }

    // ------------------------------------------------------------------
    // Query surface
    // ------------------------------------------------------------------

    /// Get current population count
    pub fn population(&self) -> usize {
        self.agents.values().filter(|a| a.is_alive()).count()
    }

    /// Check if population is extinct
    pub fn is_extinct(&self) -> bool {
        self.population() == 0
    }

    /// Get seed for reproducibility
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Living agents in id order
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values().filter(|a| a.is_alive())
    }

    pub fn diseases(&self) -> &[Arc<Disease>] {
        &self.diseases
    }

    pub fn cell_snapshots(&self) -> Vec<CellSnapshot> {
        self.environment.cells().iter().map(CellSnapshot::from).collect()
    }

    pub fn agent_snapshots(&self) -> Vec<AgentSnapshot> {
        self.agents()
            .map(|a| {
                let cell = self.environment.cell(a.cell());
                a.snapshot(cell.x, cell.y)
            })
            .collect()
    }
}

//! Statistics tracking for the simulation.

use crate::agent::{Agent, DeathCause};
use crate::environment::Environment;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Events counted while a tick runs
#[derive(Clone, Debug, Default)]
pub struct TickCounters {
    pub births: usize,
    pub deaths: BTreeMap<DeathCause, usize>,
    pub trade_lots: u64,
    pub trade_price_sum: f64,
    pub trade_prices: u64,
    pub infections: usize,
    pub cures: usize,
}

impl TickCounters {
    pub fn death(&mut self, cause: DeathCause) {
        *self.deaths.entry(cause).or_default() += 1;
    }

    pub fn deaths_by(&self, cause: DeathCause) -> usize {
        self.deaths.get(&cause).copied().unwrap_or(0)
    }

    pub fn trade(&mut self, lots: u32, prices: &[f64]) {
        self.trade_lots += u64::from(lots);
        self.trade_price_sum += prices.iter().sum::<f64>();
        self.trade_prices += prices.len() as u64;
    }
}

/// Flat per-tick record. Field names are stable identifiers for
/// downstream tooling; new fields are only ever added.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub timestep: u64,
    pub population: usize,
    pub mean_sugar_metabolism: f64,
    pub mean_spice_metabolism: f64,
    pub mean_metabolism: f64,
    pub mean_vision: f64,
    pub mean_movement: f64,
    pub mean_age: f64,
    pub agent_wealth_total: f64,
    pub agent_sugar_total: f64,
    pub agent_spice_total: f64,
    pub gini: f64,
    pub trade_volume: u64,
    pub mean_trade_price: f64,
    pub births: usize,
    pub agent_starvation_deaths: usize,
    pub agent_combat_deaths: usize,
    pub agent_aging_deaths: usize,
    pub agent_culled_deaths: usize,
    pub diseased: usize,
    pub infections: usize,
    pub cures: usize,
    pub tribes: usize,
    pub largest_tribe: usize,
    pub environment_sugar: f64,
    pub environment_spice: f64,
    pub environment_pollution: f64,
}

/// Persisted log record
pub type LogRecord = Stats;

impl Stats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute stats from the living population and the grid
    pub fn collect<'a, I>(timestep: u64, agents: I, env: &Environment, counters: &TickCounters) -> Self
    where
        I: IntoIterator<Item = &'a Agent>,
    {
        let alive: Vec<&Agent> = agents.into_iter().filter(|a| a.is_alive()).collect();
        let n = alive.len();
        let mean = |f: &dyn Fn(&Agent) -> f64| -> f64 {
            if n == 0 {
                0.0
            } else {
                alive.iter().map(|a| f(*a)).sum::<f64>() / n as f64
            }
        };

        let mut tribes: BTreeMap<u32, usize> = BTreeMap::new();
        for agent in &alive {
            *tribes.entry(agent.tribe()).or_default() += 1;
        }
        let wealth: Vec<f64> = alive.iter().map(|a| a.wealth()).collect();

        Self {
            timestep,
            population: n,
            mean_sugar_metabolism: mean(&|a| a.sugar_metabolism()),
            mean_spice_metabolism: mean(&|a| a.spice_metabolism()),
            mean_metabolism: mean(&|a| a.total_metabolism()),
            mean_vision: mean(&|a| f64::from(a.vision())),
            mean_movement: mean(&|a| f64::from(a.movement())),
            mean_age: mean(&|a| a.age as f64),
            agent_wealth_total: wealth.iter().sum(),
            agent_sugar_total: alive.iter().map(|a| a.sugar).sum(),
            agent_spice_total: alive.iter().map(|a| a.spice).sum(),
            gini: gini(&wealth),
            trade_volume: counters.trade_lots,
            mean_trade_price: if counters.trade_prices > 0 {
                counters.trade_price_sum / counters.trade_prices as f64
            } else {
                0.0
            },
            births: counters.births,
            agent_starvation_deaths: counters.deaths_by(DeathCause::Starvation),
            agent_combat_deaths: counters.deaths_by(DeathCause::Combat),
            agent_aging_deaths: counters.deaths_by(DeathCause::Aging),
            agent_culled_deaths: counters.deaths_by(DeathCause::Culled),
            diseased: alive.iter().filter(|a| a.is_sick()).count(),
            infections: counters.infections,
            cures: counters.cures,
            tribes: tribes.len(),
            largest_tribe: tribes.values().copied().max().unwrap_or(0),
            environment_sugar: env.total_sugar(),
            environment_spice: env.total_spice(),
            environment_pollution: env.total_pollution(),
        }
    }

    /// One JSON object on a single line
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "T:{:6} | Pop:{:5} | Met:{:.2} | Vis:{:.2} | Wealth:{:.0} | Gini:{:.3} | Sugar:{:.0}",
            self.timestep,
            self.population,
            self.mean_metabolism,
            self.mean_vision,
            self.agent_wealth_total,
            self.gini,
            self.environment_sugar
        )
    }
}

/// Gini coefficient of non-negative values; 0 for empty or all-zero input
pub fn gini(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().map(|v| v.max(0.0)).collect();
    let n = sorted.len();
    let total: f64 = sorted.iter().sum();
    if n == 0 || total <= 0.0 {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, v)| (i + 1) as f64 * v)
        .sum();
    let n = n as f64;
    (2.0 * weighted) / (n * total) - (n + 1.0) / n
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    /// All recorded stats snapshots
    pub snapshots: Vec<Stats>,
    /// Recording interval
    pub interval: u64,
}

impl StatsHistory {
    /// Create new history with recording interval
    pub fn new(interval: u64) -> Self {
        Self {
            snapshots: Vec::new(),
            interval: interval.max(1),
        }
    }

    /// Keep the record if it falls on the interval
    pub fn record(&mut self, stats: Stats) -> bool {
        if stats.timestep % self.interval != 0 {
            return false;
        }
        self.snapshots.push(stats);
        true
    }

    /// Get population over time
    pub fn population_series(&self) -> Vec<(u64, usize)> {
        self.snapshots
            .iter()
            .map(|s| (s.timestep, s.population))
            .collect()
    }

    /// Write every record as JSON lines
    pub fn save_json_lines<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for stats in &self.snapshots {
            writeln!(file, "{}", stats.to_json_line()?)?;
        }
        file.flush()?;
        Ok(())
    }

    /// Read records written by [`StatsHistory::save_json_lines`]
    pub fn load_json_lines<P: AsRef<Path>>(path: P, interval: u64) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut history = Self::new(interval);
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            history.snapshots.push(serde_json::from_str(line)?);
        }
        Ok(history)
    }
}

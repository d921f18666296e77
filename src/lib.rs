//! # Sugarscape
//!
//! Spatial artificial society simulator: agents forage on a regrowing
//! sugar/spice grid, metabolize, trade, reproduce, fall ill and die under a
//! pluggable decision policy.
//!
//! ## Features
//!
//! - **Pluggable ethics**: greedy, utilitarian (Bentham) or centralized (Leader) cell selection
//! - **Topology**: bounded or wraparound grids, von Neumann or Moore neighbourhoods
//! - **Dynamics**: seasons, pollution diffusion, combat, trade, disease and immunity
//! - **Configurable**: YAML configuration files
//! - **Reproducible**: one seeded random source per run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sugarscape::{Config, Sugarscape};
//!
//! let config = Config::default();
//! let mut sim = Sugarscape::new_with_seed(config, 42).unwrap();
//!
//! // Stops early if the population dies out
//! sim.run(1000).unwrap();
//!
//! println!("Population: {}", sim.population());
//! println!("Gini: {:.3}", sim.stats.gini);
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use sugarscape::config::Span;
//! use sugarscape::{Config, DecisionModel};
//!
//! let mut config = Config::default();
//! config.environment.wraparound = true;
//! config.agents.vision = Span(1, 10);
//! config.decision.model = DecisionModel::Bentham;
//! assert!(config.validate().is_ok());
//! ```

pub mod agent;
pub mod cell;
pub mod config;
pub mod decision;
pub mod disease;
pub mod environment;
pub mod error;
pub mod landscape;
pub mod reproduction;
pub mod stats;
pub mod sugarscape;
pub mod trade;

// Re-export main types
pub use agent::{Agent, AgentId, AgentSnapshot, DeathCause};
pub use cell::{Cell, CellId, CellSnapshot, Season};
pub use config::Config;
pub use decision::DecisionModel;
pub use environment::Environment;
pub use error::{ConfigError, Result, SimError};
pub use stats::{LogRecord, Stats};
pub use sugarscape::Sugarscape;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

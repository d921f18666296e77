//! Error types for the simulator.
//!
//! Configuration problems are reported with the offending option key and
//! stop a run before it begins. Invariant violations inside a tick are
//! defects in the core and abort the run.

use crate::agent::AgentId;
use crate::cell::CellId;

/// Invalid or inconsistent configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An option holds a value outside its accepted domain.
    #[error("invalid value for `{key}`: {reason}")]
    Invalid {
        /// Dotted option path, e.g. `environment.width`.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A `[min, max]` range has `min > max`.
    #[error("range `{key}` has min greater than max")]
    InvertedRange {
        /// Dotted option path.
        key: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the simulation core.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Configuration rejected at startup.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Two agents claimed the same cell.
    #[error("cell {cell} already occupied by agent {occupant}, cannot place agent {agent}")]
    DoubleOccupancy {
        /// The contested cell.
        cell: CellId,
        /// Agent already on the cell.
        occupant: AgentId,
        /// Agent being placed.
        agent: AgentId,
    },

    /// A cell's occupant and an agent's cell reference disagree.
    #[error("agent {agent} and cell {cell} disagree about occupancy")]
    OccupancyMismatch {
        /// The agent.
        agent: AgentId,
        /// The cell it claims.
        cell: CellId,
    },

    /// An operation was attempted through a dead agent.
    #[error("agent {0} is dead")]
    DeadAgent(AgentId),

    /// An agent id did not resolve to a living population member.
    #[error("agent {0} not found in population")]
    UnknownAgent(AgentId),

    /// Coordinates outside the grid.
    #[error("coordinates ({x}, {y}) outside {width}x{height} grid")]
    OutOfBounds {
        /// Column.
        x: i64,
        /// Row.
        y: i64,
        /// Grid width.
        width: usize,
        /// Grid height.
        height: usize,
    },

    /// A cell stock or capacity left `0 <= stock <= capacity`.
    #[error("cell {cell} {resource} stock {stock} outside [0, {capacity}]")]
    StockOutOfBounds {
        /// The cell.
        cell: CellId,
        /// `sugar` or `spice`.
        resource: &'static str,
        /// Current stock.
        stock: f64,
        /// Capacity.
        capacity: f64,
    },

    /// File access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization failed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T, E = SimError> = std::result::Result<T, E>;

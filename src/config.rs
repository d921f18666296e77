//! Configuration system for the simulation.
//!
//! Supports YAML configuration files with sensible defaults. Every section
//! may be omitted; missing fields fall back to their defaults.

use crate::decision::DecisionModel;
use crate::disease::DiseaseTrigger;
use crate::error::{ConfigError, Result};
use rand::distributions::uniform::SampleUniform;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inclusive `[min, max]` range, written as a two-element list in YAML.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span<T>(pub T, pub T);

impl<T: Copy + PartialOrd> Span<T> {
    /// Lower bound
    #[inline]
    pub fn min(&self) -> T {
        self.0
    }

    /// Upper bound
    #[inline]
    pub fn max(&self) -> T {
        self.1
    }

    fn check(&self, key: &'static str) -> Result<(), ConfigError> {
        if self.0 > self.1 {
            return Err(ConfigError::InvertedRange { key });
        }
        Ok(())
    }
}

impl<T: SampleUniform + PartialOrd + Copy> Span<T> {
    /// Uniform draw from the inclusive range
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        rng.gen_range(self.0..=self.1)
    }
}

impl Span<f64> {
    fn check_finite(&self, key: &'static str) -> Result<(), ConfigError> {
        if !self.0.is_finite() || !self.1.is_finite() {
            return Err(ConfigError::invalid(key, "bounds must be finite"));
        }
        self.check(key)
    }

    fn check_unit(&self, key: &'static str) -> Result<(), ConfigError> {
        self.check_finite(key)?;
        if self.0 < 0.0 || self.1 > 1.0 {
            return Err(ConfigError::invalid(key, "bounds must lie in [0, 1]"));
        }
        Ok(())
    }
}

/// Which adjacent cells count as neighbours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborhoodMode {
    /// The four cardinal cells
    VonNeumann,
    /// Cardinal plus diagonal cells
    Moore,
}

/// Shape of agent vision and movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeMode {
    /// Along one axis at a time
    Cardinal,
    /// Euclidean disc
    Radial,
}

/// Initial resource capacity layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Landscape {
    /// Every cell at the global maxima
    Uniform,
    /// Two sugar peaks (and two spice peaks on the other diagonal)
    TwinPeaks,
}

/// How starting endowments are drawn from their ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndowmentMode {
    /// Cycle through each range, then shuffle each trait list independently
    Cyclic,
    /// Uniform draw per agent
    Random,
}

/// Order in which living agents act within a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOrder {
    /// One fresh shuffle per tick
    Shuffled,
    /// Ascending agent id (population insertion order)
    Insertion,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fixed seed; a random one is drawn when absent
    pub seed: Option<u64>,
    pub environment: EnvironmentConfig,
    pub agents: AgentConfig,
    pub decision: DecisionConfig,
    pub diseases: DiseaseConfig,
    pub reproduction: ReproductionConfig,
    pub trade: TradeConfig,
    pub logging: LoggingConfig,
}

/// Grid and resource dynamics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub height: usize,
    pub width: usize,
    pub wraparound: bool,
    pub neighborhood: NeighborhoodMode,
    /// Row splitting the hemispheres; half the height when absent
    pub equator: Option<usize>,
    pub max_sugar: f64,
    pub max_spice: f64,
    pub sugar_regrow_rate: f64,
    pub spice_regrow_rate: f64,
    /// Ticks between season flips; 0 disables seasons
    pub season_interval: u64,
    /// Ticks between regrowth pulses in the dry hemisphere
    pub seasonal_growback_delay: u64,
    /// Combat is enabled when positive
    pub max_combat_loot: f64,
    pub landscape: Landscape,
    pub pollution: PollutionConfig,
}

/// Pollution accrual and diffusion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollutionConfig {
    /// Pollution per unit of sugar metabolized
    pub sugar_consumption: f64,
    /// Pollution per unit of spice metabolized
    pub spice_consumption: f64,
    /// Pollution per unit of sugar gathered
    pub sugar_production: f64,
    /// Pollution per unit of spice gathered
    pub spice_production: f64,
    /// Ticks between diffusion passes; 0 disables diffusion
    pub diffusion_delay: u64,
    /// Ticks (inclusive) during which diffusion runs
    pub diffusion_timeframe: Span<u64>,
}

/// Population genesis and endowment ranges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub starting_agents: usize,
    pub sugar_metabolism: Span<u32>,
    pub spice_metabolism: Span<u32>,
    pub vision: Span<u32>,
    /// Falls back to the vision range when absent
    pub movement: Option<Span<u32>>,
    pub starting_sugar: Span<u32>,
    pub starting_spice: Span<u32>,
    /// Agents are immortal when absent
    pub max_age: Option<Span<u64>>,
    pub aggression: Span<f64>,
    pub tribes: u32,
    pub range_mode: RangeMode,
    pub endowment_mode: EndowmentMode,
    pub order: AgentOrder,
}

/// Decision model selection and its per-agent parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub model: DecisionModel,
    /// Weight on self versus others in utilitarian valuation
    pub selfishness: Option<Span<f64>>,
    /// Weight on projected future utility
    pub lookahead_discount: Span<f64>,
    /// Weight on same-tribe versus other-tribe neighbours
    pub tribal_factor: Option<Span<f64>>,
    /// Cull agents the leader could not place anywhere viable
    pub leader_cull: bool,
}

/// Disease generation and immunity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiseaseConfig {
    /// Number of distinct diseases generated at genesis
    pub count: usize,
    /// Starting infections per agent
    pub per_agent: Span<u32>,
    pub tag_length: Span<u32>,
    /// Immune string length; 0 disables recovery
    pub immune_system_length: u32,
    pub sugar_metabolism_penalty: Span<f64>,
    pub spice_metabolism_penalty: Span<f64>,
    pub vision_penalty: Span<i32>,
    pub movement_penalty: Span<i32>,
    pub fertility_penalty: Span<f64>,
    pub aggression_penalty: Span<f64>,
    /// Assigned to generated diseases in rotation
    pub triggers: Vec<DiseaseTrigger>,
}

/// Sexual reproduction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReproductionConfig {
    pub enabled: bool,
    /// Age at which fertility begins
    pub fertility_age: Span<u64>,
    pub female_infertility_age: Span<u64>,
    pub male_infertility_age: Span<u64>,
    /// Base fertility factor; a birth happens with this probability
    pub fertility_factor: Span<f64>,
}

/// Bilateral sugar/spice trade
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    pub enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Ticks between recorded history entries
    pub stats_interval: u64,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            height: 50,
            width: 50,
            wraparound: false,
            neighborhood: NeighborhoodMode::VonNeumann,
            equator: None,
            max_sugar: 4.0,
            max_spice: 0.0,
            sugar_regrow_rate: 1.0,
            spice_regrow_rate: 0.0,
            season_interval: 0,
            seasonal_growback_delay: 0,
            max_combat_loot: 0.0,
            landscape: Landscape::TwinPeaks,
            pollution: PollutionConfig::default(),
        }
    }
}

impl Default for PollutionConfig {
    fn default() -> Self {
        Self {
            sugar_consumption: 0.0,
            spice_consumption: 0.0,
            sugar_production: 0.0,
            spice_production: 0.0,
            diffusion_delay: 0,
            diffusion_timeframe: Span(0, u64::MAX),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            starting_agents: 250,
            sugar_metabolism: Span(1, 4),
            spice_metabolism: Span(0, 0),
            vision: Span(1, 6),
            movement: None,
            starting_sugar: Span(1, 5),
            starting_spice: Span(0, 0),
            max_age: None,
            aggression: Span(0.0, 0.0),
            tribes: 1,
            range_mode: RangeMode::Cardinal,
            endowment_mode: EndowmentMode::Cyclic,
            order: AgentOrder::Shuffled,
        }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            model: DecisionModel::Greedy,
            selfishness: None,
            lookahead_discount: Span(0.5, 0.5),
            tribal_factor: None,
            leader_cull: false,
        }
    }
}

impl Default for DiseaseConfig {
    fn default() -> Self {
        Self {
            count: 0,
            per_agent: Span(0, 0),
            tag_length: Span(10, 10),
            immune_system_length: 0,
            sugar_metabolism_penalty: Span(0.0, 1.0),
            spice_metabolism_penalty: Span(0.0, 1.0),
            vision_penalty: Span(-1, 0),
            movement_penalty: Span(-1, 0),
            fertility_penalty: Span(-0.5, 0.0),
            aggression_penalty: Span(0.0, 0.0),
            triggers: vec![DiseaseTrigger::Infectious],
        }
    }
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fertility_age: Span(12, 15),
            female_infertility_age: Span(40, 50),
            male_infertility_age: Span(50, 60),
            fertility_factor: Span(1.0, 1.0),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stats_interval: 1,
            log_level: "info".to_string(),
        }
    }
}

impl EnvironmentConfig {
    /// Equator row, defaulting to half the height
    pub fn equator_row(&self) -> usize {
        self.equator.unwrap_or(self.height / 2)
    }
}

impl AgentConfig {
    /// Movement range, falling back to vision
    pub fn movement_range(&self) -> Span<u32> {
        self.movement.unwrap_or(self.vision)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let env = &self.environment;
        if env.height == 0 {
            return Err(ConfigError::invalid("environment.height", "must be > 0"));
        }
        if env.width == 0 {
            return Err(ConfigError::invalid("environment.width", "must be > 0"));
        }
        if let Some(equator) = env.equator {
            if equator > env.height {
                return Err(ConfigError::invalid(
                    "environment.equator",
                    format!("row {} beyond height {}", equator, env.height),
                ));
            }
        }
        for (key, value) in [
            ("environment.max_sugar", env.max_sugar),
            ("environment.max_spice", env.max_spice),
            ("environment.sugar_regrow_rate", env.sugar_regrow_rate),
            ("environment.spice_regrow_rate", env.spice_regrow_rate),
            ("environment.max_combat_loot", env.max_combat_loot),
            ("environment.pollution.sugar_consumption", env.pollution.sugar_consumption),
            ("environment.pollution.spice_consumption", env.pollution.spice_consumption),
            ("environment.pollution.sugar_production", env.pollution.sugar_production),
            ("environment.pollution.spice_production", env.pollution.spice_production),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(key, "must be a finite value >= 0"));
            }
        }
        env.pollution
            .diffusion_timeframe
            .check("environment.pollution.diffusion_timeframe")?;

        let agents = &self.agents;
        if agents.starting_agents == 0 {
            return Err(ConfigError::invalid("agents.starting_agents", "must be > 0"));
        }
        let cells = env.height * env.width;
        if agents.starting_agents > cells {
            return Err(ConfigError::invalid(
                "agents.starting_agents",
                format!("{} agents do not fit on {} cells", agents.starting_agents, cells),
            ));
        }
        if agents.tribes == 0 {
            return Err(ConfigError::invalid("agents.tribes", "must be >= 1"));
        }
        agents.sugar_metabolism.check("agents.sugar_metabolism")?;
        agents.spice_metabolism.check("agents.spice_metabolism")?;
        agents.vision.check("agents.vision")?;
        agents.movement_range().check("agents.movement")?;
        agents.starting_sugar.check("agents.starting_sugar")?;
        agents.starting_spice.check("agents.starting_spice")?;
        if let Some(max_age) = agents.max_age {
            max_age.check("agents.max_age")?;
        }
        agents.aggression.check_finite("agents.aggression")?;

        let decision = &self.decision;
        if let Some(selfishness) = decision.selfishness {
            selfishness.check_unit("decision.selfishness")?;
        }
        decision.lookahead_discount.check_unit("decision.lookahead_discount")?;
        if let Some(tribal) = decision.tribal_factor {
            tribal.check_unit("decision.tribal_factor")?;
        }

        let diseases = &self.diseases;
        diseases.per_agent.check("diseases.per_agent")?;
        diseases.tag_length.check("diseases.tag_length")?;
        diseases
            .sugar_metabolism_penalty
            .check_finite("diseases.sugar_metabolism_penalty")?;
        diseases
            .spice_metabolism_penalty
            .check_finite("diseases.spice_metabolism_penalty")?;
        diseases.vision_penalty.check("diseases.vision_penalty")?;
        diseases.movement_penalty.check("diseases.movement_penalty")?;
        diseases.fertility_penalty.check_finite("diseases.fertility_penalty")?;
        diseases.aggression_penalty.check_finite("diseases.aggression_penalty")?;
        if diseases.count > 0 {
            if diseases.tag_length.min() == 0 {
                return Err(ConfigError::invalid("diseases.tag_length", "must be >= 1"));
            }
            if diseases.triggers.is_empty() {
                return Err(ConfigError::invalid("diseases.triggers", "must not be empty"));
            }
            if diseases.per_agent.max() as usize > diseases.count {
                return Err(ConfigError::invalid(
                    "diseases.per_agent",
                    "cannot exceed diseases.count",
                ));
            }
        }
        if diseases.immune_system_length > 0
            && diseases.immune_system_length < diseases.tag_length.max()
        {
            return Err(ConfigError::invalid(
                "diseases.immune_system_length",
                "must be >= the longest disease tag",
            ));
        }

        let reproduction = &self.reproduction;
        reproduction.fertility_age.check("reproduction.fertility_age")?;
        reproduction
            .female_infertility_age
            .check("reproduction.female_infertility_age")?;
        reproduction
            .male_infertility_age
            .check("reproduction.male_infertility_age")?;
        reproduction
            .fertility_factor
            .check_finite("reproduction.fertility_factor")?;

        if self.logging.stats_interval == 0 {
            return Err(ConfigError::invalid("logging.stats_interval", "must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let loaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.environment.width, loaded.environment.width);
        assert_eq!(config.agents.vision, loaded.agents.vision);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "environment:\n  width: 10\n  height: 10\n  wraparound: true\nagents:\n  starting_agents: 5\n  vision: [2, 3]\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.environment.width, 10);
        assert!(config.environment.wraparound);
        assert_eq!(config.agents.vision, Span(2, 3));
        assert_eq!(config.agents.sugar_metabolism, Span(1, 4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_width_reports_key() {
        let mut config = Config::default();
        config.environment.width = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("environment.width"));
    }

    #[test]
    fn test_inverted_range_reports_key() {
        let mut config = Config::default();
        config.agents.vision = Span(6, 1);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("agents.vision"));
    }

    #[test]
    fn test_too_many_agents() {
        let mut config = Config::default();
        config.environment.width = 5;
        config.environment.height = 5;
        config.agents.starting_agents = 26;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_equator_defaults_to_half_height() {
        let mut config = Config::default();
        config.environment.height = 30;
        assert_eq!(config.environment.equator_row(), 15);
        config.environment.equator = Some(4);
        assert_eq!(config.environment.equator_row(), 4);
    }
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::aligner::{Alignment, CollisionGating};
use super::calculator::{BunchScheme, LuminosityCalculator, LuminosityModel, RegimeThreshold};
use super::constants::*;
use super::error::ConfigError;
use super::ingest::ColumnOrder;
use super::input::InputFilter;
use super::series_writer::SentinelPolicy;
use super::timestamp::{ReferenceEpoch, TimestampFormat, TimestampNormalizer};

/// What a channel's values mean to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    /// LER beam current in A; HER, bunch currents and luminosity are derived from it
    BeamCurrent,
    /// Any other instrumentation channel, passed through as-is
    #[default]
    Auxiliary,
}

/// Where the finished series are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Hdf5,
}

/// Describes one input channel: where it lives and how to read it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub path: PathBuf,
    pub role: ChannelRole,
    pub timestamp_format: TimestampFormat,
    pub column_order: ColumnOrder,
    #[serde(default)]
    pub skip_zero: bool,
    pub display_name: String,
    pub style_index: u32,
}

/// Constants of the derived metric calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub her_to_ler_ratio: f64,
    pub nominal_bunch_count: f64,
    pub filling_bunch_count: f64,
    /// LER currents (A) below this use the filling scheme; 0 disables it
    pub filling_current_threshold: f64,
    /// `YYYY-MM-DD`; samples on or before this date are pre-collision
    pub collision_start: String,
    pub luminosity_normalization: f64,
    pub nominal_model: LuminosityModel,
    /// Falls back to the nominal model if not given
    pub filling_model: Option<LuminosityModel>,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            her_to_ler_ratio: DEFAULT_HER_TO_LER_RATIO,
            nominal_bunch_count: DEFAULT_NOMINAL_BUNCH_COUNT,
            filling_bunch_count: DEFAULT_FILLING_BUNCH_COUNT,
            filling_current_threshold: 0.0,
            collision_start: String::from(DEFAULT_COLLISION_START),
            luminosity_normalization: DEFAULT_LUMINOSITY_NORMALIZATION,
            nominal_model: LuminosityModel::default(),
            filling_model: None,
        }
    }
}

impl PhysicsConfig {
    /// Resolve the collision start date and build the calculator
    pub fn build_calculator(
        &self,
        normalizer: &TimestampNormalizer,
    ) -> Result<LuminosityCalculator, ConfigError> {
        let collision_start =
            normalizer.normalize(&self.collision_start, TimestampFormat::DateOnly)?;
        let filling_model = self
            .filling_model
            .clone()
            .unwrap_or_else(|| self.nominal_model.clone());
        Ok(LuminosityCalculator::new(
            RegimeThreshold {
                collision_start,
                filling_current: self.filling_current_threshold,
            },
            BunchScheme::new(self.nominal_bunch_count, self.nominal_model.clone()),
            BunchScheme::new(self.filling_bunch_count, filling_model),
            self.luminosity_normalization,
        ))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("physics.nominal_bunch_count", self.nominal_bunch_count),
            ("physics.filling_bunch_count", self.filling_bunch_count),
            (
                "physics.luminosity_normalization",
                self.luminosity_normalization,
            ),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue {
                    key: String::from(key),
                    reason: format!("{value} is not a positive number"),
                });
            }
        }
        Ok(())
    }
}

/// Structure representing the application configuration. Contains pathing, channel and
/// physics information.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// `YYYY-MM-DD`; all timestamps are seconds since midnight of this date
    pub reference_date: String,
    pub output_path: PathBuf,
    pub output_format: OutputFormat,
    pub n_threads: i32,
    pub alignment: Alignment,
    pub collision_gating: CollisionGating,
    /// Write this number in place of pre-collision values instead of omitting them
    pub legacy_sentinel: Option<f64>,
    pub input_filter: InputFilter,
    pub physics: PhysicsConfig,
    pub channels: Vec<ChannelConfig>,
}

impl Default for Config {
    /// Generate a new Config object with a single beam current channel
    fn default() -> Self {
        Self {
            reference_date: String::from(DEFAULT_REFERENCE_DATE),
            output_path: PathBuf::from("./output"),
            output_format: OutputFormat::default(),
            n_threads: 1,
            alignment: Alignment::default(),
            collision_gating: CollisionGating::default(),
            legacy_sentinel: None,
            input_filter: InputFilter::default(),
            physics: PhysicsConfig::default(),
            channels: vec![ChannelConfig {
                name: String::from("ler"),
                path: PathBuf::from("./data/ler.csv"),
                role: ChannelRole::BeamCurrent,
                timestamp_format: TimestampFormat::DateOnly,
                column_order: ColumnOrder::ValueFirst,
                skip_zero: false,
                display_name: String::from("LER"),
                style_index: 2,
            }],
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check everything serde cannot: exactly one beam current channel, unique
    /// channel names, sane physics constants and parseable dates
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::MissingKey(String::from("channels")));
        }
        let n_beam = self
            .channels
            .iter()
            .filter(|c| c.role == ChannelRole::BeamCurrent)
            .count();
        if n_beam == 0 {
            return Err(ConfigError::MissingKey(String::from(
                "channels[role: beam_current]",
            )));
        } else if n_beam > 1 {
            return Err(ConfigError::InvalidValue {
                key: String::from("channels"),
                reason: format!("expected one beam_current channel, found {n_beam}"),
            });
        }
        for (idx, channel) in self.channels.iter().enumerate() {
            if channel.name.trim().is_empty() {
                return Err(ConfigError::MissingKey(format!("channels[{idx}].name")));
            }
            if DERIVED_SERIES_NAMES.contains(&channel.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: format!("channels[{idx}].name"),
                    reason: format!("{} is reserved for a derived series", channel.name),
                });
            }
            if self.channels[..idx].iter().any(|c| c.name == channel.name) {
                return Err(ConfigError::InvalidValue {
                    key: format!("channels[{idx}].name"),
                    reason: format!("duplicate channel name {}", channel.name),
                });
            }
        }
        if !self.is_n_threads_valid() {
            return Err(ConfigError::InvalidValue {
                key: String::from("n_threads"),
                reason: String::from("must be at least 1"),
            });
        }
        self.physics.validate()?;
        let normalizer = TimestampNormalizer::new(self.reference_epoch()?);
        normalizer.normalize(&self.physics.collision_start, TimestampFormat::DateOnly)?;
        Ok(())
    }

    pub fn reference_epoch(&self) -> Result<ReferenceEpoch, ConfigError> {
        Ok(ReferenceEpoch::parse(&self.reference_date)?)
    }

    pub fn beam_channel(&self) -> Option<&ChannelConfig> {
        self.channels
            .iter()
            .find(|c| c.role == ChannelRole::BeamCurrent)
    }

    pub fn sentinel_policy(&self) -> SentinelPolicy {
        match self.legacy_sentinel {
            Some(value) => SentinelPolicy::Legacy(value),
            None => SentinelPolicy::Skip,
        }
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }
}

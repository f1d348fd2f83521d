//! Configuration types for staircase experiments.
//!
//! An experiment is described by a TOML document with three parts:
//! - `[experiment]`: name, output path, staircase count and swap policy
//! - `[staircase_defaults]`: the settings every staircase shares
//! - `[[staircase]]`: one entry per staircase carrying its start value

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a configuration.
///
/// All of these are fatal: the experiment is not started.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize configuration: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
    #[error("staircase count must be at least 1 (got {0})")]
    NoStaircases(usize),
    #[error("staircase count is {declared} but {defined} [[staircase]] entries are defined")]
    StaircaseCountMismatch { declared: usize, defined: usize },
    #[error("{field} must be a finite number (got {value})")]
    NotFinite { field: &'static str, value: f64 },
    #[error("{field} must be non-zero")]
    ZeroStep { field: &'static str },
    #[error("{field} must be at least 1")]
    ZeroThreshold { field: &'static str },
    #[error("staircase {index} starts at the reference value {reference}")]
    StartAtReference { index: usize, reference: f64 },
    #[error("unknown swap policy: {0}. Valid: serial, alternate, random")]
    UnknownSwapPolicy(String),
}

/// How the scheduler chooses the next staircase among the open ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapPolicy {
    /// Run one staircase to completion before starting the next
    #[default]
    Serial,
    /// Change staircase after every trial
    Alternate,
    /// Uniform random pick from the open staircases
    Random,
}

impl SwapPolicy {
    /// Get all policies, in the order they are offered to the operator.
    pub fn all() -> Vec<Self> {
        vec![Self::Alternate, Self::Random, Self::Serial]
    }

    /// Get the name of this policy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Alternate => "alternate",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for SwapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SwapPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "alternate" => Ok(Self::Alternate),
            "random" => Ok(Self::Random),
            _ => Err(ConfigError::UnknownSwapPolicy(s.to_string())),
        }
    }
}

/// Top-level experiment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub experiment: ExperimentSection,
    pub staircase_defaults: StaircaseDefaults,
    #[serde(rename = "staircase", default)]
    pub staircases: Vec<StaircaseEntry>,
}

/// The `[experiment]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSection {
    /// Experiment name
    pub name: String,
    /// Directory under which per-subject results are written
    pub path: PathBuf,
    /// Number of staircases to run
    pub staircase_count: usize,
    /// Swap policy (serial when omitted, as single-staircase setups leave it out)
    #[serde(default)]
    pub swap_policy: SwapPolicy,
    /// Random seed for reproducible swaps and presentation order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// The `[staircase_defaults]` section: settings shared by every staircase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaircaseDefaults {
    /// Unit descriptor (e.g. "gram"), display only
    pub units: String,
    /// Wording for the greater value (e.g. "heavier")
    pub comparison: String,
    /// Magnitude of a harder step (toward the reference)
    pub step_up: f64,
    /// Magnitude of an easier step (away from the reference)
    pub step_down: f64,
    /// The fixed comparison stimulus
    pub reference: f64,
    /// Consecutive correct answers needed before the task gets harder
    pub reversals_to_step_change: u32,
    /// Reversals after which a staircase is finished
    pub reversals_to_finish: u32,
    /// Tighten on every correct answer until the first error
    #[serde(default)]
    pub require_first_error: bool,
}

/// One `[[staircase]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaircaseEntry {
    pub start_value: f64,
}

/// Fully resolved settings for a single staircase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaircaseSettings {
    pub name: String,
    pub units: String,
    pub comparison: String,
    pub reference: f64,
    pub start_value: f64,
    pub step_up: f64,
    pub step_down: f64,
    pub reversals_to_step_change: u32,
    pub reversals_to_finish: u32,
    pub require_first_error: bool,
}

impl ExperimentConfig {
    /// Load, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML text.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }

    /// Write the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = self.to_toml_string()?;
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check everything serde cannot: counts, finiteness and thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let declared = self.experiment.staircase_count;
        if declared < 1 {
            return Err(ConfigError::NoStaircases(declared));
        }
        if declared != self.staircases.len() {
            return Err(ConfigError::StaircaseCountMismatch {
                declared,
                defined: self.staircases.len(),
            });
        }

        let defaults = &self.staircase_defaults;
        check_finite("reference", defaults.reference)?;
        check_step("step_up", defaults.step_up)?;
        check_step("step_down", defaults.step_down)?;
        if defaults.reversals_to_step_change == 0 {
            return Err(ConfigError::ZeroThreshold {
                field: "reversals_to_step_change",
            });
        }
        if defaults.reversals_to_finish == 0 {
            return Err(ConfigError::ZeroThreshold {
                field: "reversals_to_finish",
            });
        }

        for (i, entry) in self.staircases.iter().enumerate() {
            check_finite("start_value", entry.start_value)?;
            if entry.start_value == defaults.reference {
                return Err(ConfigError::StartAtReference {
                    index: i + 1,
                    reference: defaults.reference,
                });
            }
        }

        Ok(())
    }

    /// Resolve the settings for the staircase at `index` (0-based).
    ///
    /// # Panics
    /// Panics if `index` is out of range for the `[[staircase]]` entries.
    pub fn staircase_settings(&self, index: usize) -> StaircaseSettings {
        let defaults = &self.staircase_defaults;
        StaircaseSettings {
            name: format!("Staircase {}", index + 1),
            units: defaults.units.clone(),
            comparison: defaults.comparison.clone(),
            reference: defaults.reference,
            start_value: self.staircases[index].start_value,
            step_up: defaults.step_up,
            step_down: defaults.step_down,
            reversals_to_step_change: defaults.reversals_to_step_change,
            reversals_to_finish: defaults.reversals_to_finish,
            require_first_error: defaults.require_first_error,
        }
    }

    /// Resolve the settings for every staircase, in declaration order.
    pub fn all_staircase_settings(&self) -> Vec<StaircaseSettings> {
        (0..self.staircases.len())
            .map(|i| self.staircase_settings(i))
            .collect()
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}

fn check_step(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check_finite(field, value)?;
    if value == 0.0 {
        return Err(ConfigError::ZeroStep { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[experiment]
name = "Weight discrimination"
path = "data"
staircase_count = 2
swap_policy = "alternate"

[staircase_defaults]
units = "gram"
comparison = "heavier"
step_up = 10.0
step_down = 5.0
reference = 100.0
reversals_to_step_change = 2
reversals_to_finish = 6
require_first_error = true

[[staircase]]
start_value = 50.0

[[staircase]]
start_value = 150
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = ExperimentConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.experiment.name, "Weight discrimination");
        assert_eq!(config.experiment.swap_policy, SwapPolicy::Alternate);
        assert_eq!(config.experiment.seed, None);
        assert_eq!(config.staircases.len(), 2);
        assert!(config.staircase_defaults.require_first_error);
    }

    #[test]
    fn test_staircase_settings_resolve_defaults() {
        let config = ExperimentConfig::from_toml_str(SAMPLE).unwrap();
        let settings = config.staircase_settings(1);

        assert_eq!(settings.name, "Staircase 2");
        assert_eq!(settings.start_value, 150.0);
        assert_eq!(settings.reference, 100.0);
        assert_eq!(settings.step_up, 10.0);
        assert_eq!(settings.units, "gram");
    }

    #[test]
    fn test_swap_policy_defaults_to_serial() {
        let text = SAMPLE.replace("swap_policy = \"alternate\"\n", "");
        let config = ExperimentConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.experiment.swap_policy, SwapPolicy::Serial);
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let text = SAMPLE.replace("reference = 100.0\n", "");
        let err = ExperimentConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_non_numeric_value_is_parse_error() {
        let text = SAMPLE.replace("step_up = 10.0", "step_up = \"ten\"");
        let err = ExperimentConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_staircases_rejected() {
        let mut config = ExperimentConfig::from_toml_str(SAMPLE).unwrap();
        config.experiment.staircase_count = 0;
        config.staircases.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoStaircases(0))
        ));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let text = SAMPLE.replace("staircase_count = 2", "staircase_count = 3");
        let err = ExperimentConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::StaircaseCountMismatch {
                declared: 3,
                defined: 2
            }
        ));
    }

    #[test]
    fn test_start_at_reference_rejected() {
        let text = SAMPLE.replace("start_value = 150", "start_value = 100");
        let err = ExperimentConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::StartAtReference { index: 2, .. }));
    }

    #[test]
    fn test_zero_thresholds_rejected() {
        let text = SAMPLE.replace("reversals_to_finish = 6", "reversals_to_finish = 0");
        let err = ExperimentConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ZeroThreshold {
                field: "reversals_to_finish"
            }
        ));
    }

    #[test]
    fn test_toml_roundtrip_preserves_config() {
        let config = ExperimentConfig::from_toml_str(SAMPLE).unwrap();
        let text = config.to_toml_string().unwrap();
        let reparsed = ExperimentConfig::from_toml_str(&text).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_swap_policy_parse_is_case_insensitive() {
        assert_eq!("Alternate".parse::<SwapPolicy>().unwrap(), SwapPolicy::Alternate);
        assert_eq!("RANDOM".parse::<SwapPolicy>().unwrap(), SwapPolicy::Random);
        assert!("round-robin".parse::<SwapPolicy>().is_err());
    }
}

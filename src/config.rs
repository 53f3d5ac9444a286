use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::topology::{Domain, LogLevel};

/// How the machine model order of dynamic generators is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorModel {
    /// Use the `model` column of the dynamic data.
    FromData,
    Order3,
    #[default]
    Order4,
    Order5,
    Order6,
}

/// Component used for the reference bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlackModel {
    #[default]
    SynchronousGenerator,
    NetworkInjection,
}

/// Settings for reading a case and building its topology. Every field has a
/// default, so a config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// System frequency (Hz).
    pub frequency: f64,
    pub domain: Domain,
    pub with_pss: bool,
    pub with_avr: bool,
    pub with_tg: bool,
    pub generator_model: GeneratorModel,
    pub slack_model: SlackModel,
    pub log_level: LogLevel,
    /// Struct name inside the static case file.
    pub case_name: String,
    /// Struct name inside the dynamic data file.
    pub dyn_case_name: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            frequency: 60.0,
            domain: Domain::Pf,
            with_pss: true,
            with_avr: true,
            with_tg: true,
            generator_model: GeneratorModel::Order4,
            slack_model: SlackModel::SynchronousGenerator,
            log_level: LogLevel::Info,
            case_name: "mpc".to_string(),
            dyn_case_name: "mpc".to_string(),
        }
    }
}

impl ReaderConfig {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frequency > 0.0 && self.frequency.is_finite() {
            Ok(())
        } else {
            Err(Error::InvalidFrequency(self.frequency))
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn angular_frequency(&self) -> f64 {
        crate::units::angular_frequency(self.frequency)
    }
}

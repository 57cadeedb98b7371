//! Grounding configuration, persisted as TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::partition::{PartitionLayout, PartitionRegistry};
use crate::store::MemDatabase;

/// Names of the partitions a store is laid out over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionNames {
    /// Evidence partitions; atoms here are observed.
    #[serde(default = "default_read_partitions")]
    pub read: Vec<String>,
    /// Target partition that activated atoms end up in.
    #[serde(default = "default_write_partition")]
    pub write: String,
    /// Staging partition for atoms being activated.
    #[serde(default = "default_lazy_partition")]
    pub lazy: String,
}

fn default_read_partitions() -> Vec<String> {
    vec!["observations".into()]
}

fn default_write_partition() -> String {
    "targets".into()
}

fn default_lazy_partition() -> String {
    "lazy".into()
}

impl Default for PartitionNames {
    fn default() -> Self {
        Self {
            read: default_read_partitions(),
            write: default_write_partition(),
            lazy: default_lazy_partition(),
        }
    }
}

/// Grounding and lazy-activation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingConfig {
    /// Lazy atoms whose value reaches this are activated. Must be in (0, 1].
    #[serde(default = "default_activation_threshold")]
    pub activation_threshold: f64,
    /// Value given to atoms that are not stored.
    #[serde(default = "default_value")]
    pub default_value: f64,
    #[serde(default)]
    pub partitions: PartitionNames,
}

fn default_activation_threshold() -> f64 {
    0.01
}

fn default_value() -> f64 {
    0.0
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            activation_threshold: default_activation_threshold(),
            default_value: default_value(),
            partitions: PartitionNames::default(),
        }
    }
}

impl GroundingConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<string>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let t = self.activation_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(ConfigError::InvalidValue {
                key: "activation_threshold",
                message: format!("{t} is outside (0, 1]"),
            });
        }
        if !(0.0..=1.0).contains(&self.default_value) {
            return Err(ConfigError::InvalidValue {
                key: "default_value",
                message: format!("{} is outside [0, 1]", self.default_value),
            });
        }
        if self.partitions.read.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "partitions.read",
                message: "at least one read partition is required".into(),
            });
        }
        Ok(())
    }

    /// Resolve the partition names to ids in `registry`.
    pub fn partition_layout(&self, registry: &mut PartitionRegistry) -> ConfigResult<PartitionLayout> {
        let read: Vec<&str> = self.partitions.read.iter().map(String::as_str).collect();
        PartitionLayout::named(registry, &read, &self.partitions.write, &self.partitions.lazy).map_err(
            |e| ConfigError::InvalidValue {
                key: "partitions",
                message: e.to_string(),
            },
        )
    }

    /// An empty in-memory store over this configuration's partitions.
    pub fn mem_database(&self, registry: &mut PartitionRegistry) -> ConfigResult<MemDatabase> {
        let layout = self.partition_layout(registry)?;
        Ok(MemDatabase::new(layout).with_default_value(self.default_value))
    }
}

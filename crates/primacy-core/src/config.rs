//! primacy.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Group, Instance};

/// Environment variable carrying this process's instance id.
pub const INSTANCE_ID_ENV: &str = "PRIMACY_INSTANCE_ID";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrimacyConfig {
    #[serde(default)]
    pub election: ElectionConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Group name prefix. Unset means standalone: always primary.
    pub group: Option<String>,
    /// Period between background rounds.
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Upper bound on each remote query within a round.
    #[serde(default = "default_query_timeout")]
    pub query_timeout: String,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            group: None,
            interval: default_interval(),
            query_timeout: default_query_timeout(),
        }
    }
}

fn default_interval() -> String {
    "60s".to_string()
}

fn default_query_timeout() -> String {
    "10s".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub instance_id: Option<String>,
}

/// Where group membership and launch times come from.
///
/// Either a `path` to an inventory file re-read on every round, or an
/// inline inventory (`[[inventory.groups]]`, `[[inventory.instances]]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub path: Option<PathBuf>,
    #[serde(flatten)]
    pub inline: InventoryFile,
}

/// On-disk inventory format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryFile {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

impl InventoryFile {
    pub fn from_toml(path: &str, content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }
}

/// Which `ExternalServices` implementation to build at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicesBackend {
    /// Log every call, publish nothing, always primary.
    #[default]
    Noop,
    /// Publish through cached clients and run the election.
    Managed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub backend: ServicesBackend,
    /// Directory backing object transfers for the managed backend.
    pub object_root: Option<PathBuf>,
}

impl PrimacyConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::from_toml(&display, &content)
    }

    pub fn from_toml(path: &str, content: &str) -> ConfigResult<Self> {
        let config: PrimacyConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check durations and the inventory source up front so a bad value
    /// fails at startup rather than in the background task.
    pub fn validate(&self) -> ConfigResult<()> {
        self.election.interval()?;
        self.election.query_timeout()?;
        if self.inventory.path.is_some() && !self.inventory.inline.groups.is_empty() {
            return Err(ConfigError::Invalid(
                "inventory.path and inline inventory.groups are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

impl ElectionConfig {
    pub fn interval(&self) -> ConfigResult<Duration> {
        parse_duration(&self.interval)
            .filter(|d| !d.is_zero())
            .ok_or_else(|| ConfigError::InvalidDuration {
                field: "election.interval",
                value: self.interval.clone(),
            })
    }

    pub fn query_timeout(&self) -> ConfigResult<Duration> {
        parse_duration(&self.query_timeout)
            .filter(|d| !d.is_zero())
            .ok_or_else(|| ConfigError::InvalidDuration {
                field: "election.query_timeout",
                value: self.query_timeout.clone(),
            })
    }

    /// The configured group, treating blank values as unset.
    pub fn group_name(&self) -> Option<&str> {
        self.group.as_deref().map(str::trim).filter(|g| !g.is_empty())
    }
}

/// Parse `"500ms"`, `"30s"`, `"2m"`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

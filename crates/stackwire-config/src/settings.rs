//! Deployment settings
//!
//! Everything here is fixed per project. Per-invocation parameters (profile,
//! artifact version) come from the command line instead.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level settings file (`stackwire.yaml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Stack name, used as the prefix of every resource id
    pub stack_name: String,

    /// Target region
    pub region: String,

    pub network: NetworkSettings,

    pub database: DatabaseSettings,

    pub registry: RegistrySettings,

    /// State directory, relative to the settings file's directory
    pub state_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stack_name: "InfraStack".to_string(),
            region: "us-east-1".to_string(),
            network: NetworkSettings::default(),
            database: DatabaseSettings::default(),
            registry: RegistrySettings::default(),
            state_dir: PathBuf::from(".stackwire"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSettings {
    /// Address space of the VPC
    pub cidr: String,

    /// Number of availability zones to spread subnets over
    pub max_azs: u8,

    /// Prefix length of each subnet
    pub subnet_mask: u8,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            max_azs: 2,
            subnet_mask: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSettings {
    /// Default database created in the cluster
    pub name: String,

    /// Master username stored alongside the generated password
    pub username: String,

    /// Address range operators connect from
    pub operator_cidr: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            name: "tradingbot".to_string(),
            username: "dbadmin".to_string(),
            operator_cidr: "10.239.0.0/16".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySettings {
    /// Container image repository of the service
    pub repository: String,

    /// Tags published to the repository
    pub tags: Vec<String>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            repository: "poe-infra-services".to_string(),
            tags: vec!["latest".to_string()],
        }
    }
}

impl Settings {
    /// Parse a settings file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if settings.state_dir.is_relative()
            && let Some(parent) = path.parent()
        {
            settings.state_dir = parent.join(&settings.state_dir);
        }

        settings.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Apply environment overrides (`STACKWIRE_REGION`, then `CDK_DEFAULT_REGION`)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(region) =
            std::env::var("STACKWIRE_REGION").or_else(|_| std::env::var("CDK_DEFAULT_REGION"))
            && !region.is_empty()
        {
            self.region = region;
        }
        self
    }

    /// Check values the provider would otherwise reject late
    pub fn validate(&self) -> Result<()> {
        if self.stack_name.trim().is_empty() {
            return Err(invalid("stack_name", "must not be empty"));
        }
        if self.region.trim().is_empty() {
            return Err(invalid("region", "must not be empty"));
        }

        let vpc_mask = cidr_prefix(&self.network.cidr)
            .ok_or_else(|| invalid("network.cidr", "expected a CIDR block like 10.0.0.0/16"))?;
        if self.network.subnet_mask <= vpc_mask || self.network.subnet_mask > 28 {
            return Err(invalid(
                "network.subnet_mask",
                &format!("must be between {} and 28", vpc_mask + 1),
            ));
        }
        if self.network.max_azs == 0 {
            return Err(invalid("network.max_azs", "must be at least 1"));
        }

        cidr_prefix(&self.database.operator_cidr).ok_or_else(|| {
            invalid(
                "database.operator_cidr",
                "expected a CIDR block like 10.239.0.0/16",
            )
        })?;
        if self.database.name.is_empty() || self.database.username.is_empty() {
            return Err(invalid("database", "name and username must not be empty"));
        }
        if self.registry.repository.is_empty() {
            return Err(invalid("registry.repository", "must not be empty"));
        }

        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Prefix length of an IPv4 CIDR block, if well formed
fn cidr_prefix(cidr: &str) -> Option<u8> {
    let (addr, prefix) = cidr.split_once('/')?;
    let octets: Vec<&str> = addr.split('.').collect();
    if octets.len() != 4 || octets.iter().any(|o| o.parse::<u8>().is_err()) {
        return None;
    }
    prefix.parse::<u8>().ok().filter(|p| *p <= 32)
}

//! Runtime configuration map delivered to the service
//!
//! The provider bakes the service environment in at creation time, so the map
//! must be complete before the compute component submits anything.

use crate::context::DeploymentContext;
use crate::error::ComposeError;
use crate::graph::ComponentId;
use serde::Serialize;
use std::collections::BTreeMap;

/// Environment variable names
pub mod keys {
    pub const PROFILE: &str = "PROFILE";
    pub const REGION: &str = "REGION";
    pub const ECS: &str = "ECS";
    pub const VERSION: &str = "VERSION";
    pub const DB_HOST: &str = "DB_HOST";
    pub const DB_PORT: &str = "DB_PORT";
    pub const DB_USERNAME: &str = "DB_USERNAME";
    pub const DB_DATABASE: &str = "DB_DATABASE";
    pub const DB_LOGGING: &str = "DB_LOGGING";
    pub const DB_AUTOLOAD_ENTITIES: &str = "DB_AUTOLOAD_ENTITIES";
    pub const DB_SCHEMA: &str = "DB_SCHEMA";
    pub const REDIS_ENDPOINT: &str = "REDIS_ENDPOINT";
    pub const REDIS_PORT: &str = "REDIS_PORT";
    pub const REDIS_TYPE: &str = "REDIS_TYPE";
    pub const COGNITO_USER_POOL_ID: &str = "COGNITO_USER_POOL_ID";
    pub const COGNITO_CLIENT_ID: &str = "COGNITO_CLIENT_ID";
    pub const CORS_ORIGIN: &str = "CORS_ORIGIN";
}

/// Keys the service refuses to start without
pub const REQUIRED_KEYS: [&str; 17] = [
    keys::PROFILE,
    keys::REGION,
    keys::ECS,
    keys::VERSION,
    keys::DB_HOST,
    keys::DB_PORT,
    keys::DB_USERNAME,
    keys::DB_DATABASE,
    keys::DB_LOGGING,
    keys::DB_AUTOLOAD_ENTITIES,
    keys::DB_SCHEMA,
    keys::REDIS_ENDPOINT,
    keys::REDIS_PORT,
    keys::REDIS_TYPE,
    keys::COGNITO_USER_POOL_ID,
    keys::COGNITO_CLIENT_ID,
    keys::CORS_ORIGIN,
];

/// Environment variable name to string value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeConfig {
    entries: BTreeMap<String, String>,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries known before any component runs: profile, region, version and
    /// feature flags
    pub fn base(deployment: &DeploymentContext) -> Self {
        let mut config = Self::new();
        config.set(keys::PROFILE, deployment.profile.as_str());
        config.set(keys::REGION, &deployment.settings.region);
        config.set(keys::ECS, "enable");
        config.set(keys::VERSION, &deployment.version);
        config.set(keys::DB_LOGGING, "true");
        config.set(keys::DB_AUTOLOAD_ENTITIES, "true");
        config.set(keys::DB_SCHEMA, "true");
        config
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Required keys absent from the map (empty values count as absent)
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|key| self.get(key).is_none_or(str::is_empty))
            .collect()
    }

    /// Fail with a configuration error naming `component` if any required key is absent
    pub fn require_all(&self, component: ComponentId, required: &[&str]) -> Result<(), ComposeError> {
        let missing = self.missing(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ComposeError::Configuration {
                component,
                missing: missing.into_iter().map(str::to_string).collect(),
            })
        }
    }
}

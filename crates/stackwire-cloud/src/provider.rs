//! Cloud provider trait definition

use crate::action::{ApplyResult, Plan};
use crate::error::Result;
use crate::state::ProviderState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Cloud provider abstraction trait
///
/// The composition engine talks to a provider in two steps per component:
/// [`plan`](CloudProvider::plan) turns the declarative requests into actions
/// (create what is absent, leave what already exists), and
/// [`apply`](CloudProvider::apply) executes them and reports the resulting
/// attributes of every resource in the plan.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "local")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Get the current state of all resources managed by this provider
    async fn get_state(&self) -> Result<ProviderState>;

    /// Calculate the actions needed to materialize the desired resources
    async fn plan(&self, desired: &ResourceSet) -> Result<Plan>;

    /// Apply the planned actions.
    ///
    /// The first rejected action aborts the apply and is returned as the
    /// error. Actions applied before it are left in place.
    async fn apply(&self, plan: &Plan) -> Result<ApplyResult>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Ordered set of resource requests submitted together.
///
/// Submission order is preserved so that a provider can create a resource's
/// prerequisites (e.g. a subnet group) before the resource itself. Adding a
/// request with an existing key replaces it in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    resources: Vec<ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: ResourceConfig) {
        let key = resource.key();
        match self.resources.iter_mut().find(|r| r.key() == key) {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    pub fn with(mut self, resource: ResourceConfig) -> Self {
        self.add(resource);
        self
    }

    pub fn get(&self, resource_type: &str, id: &str) -> Option<&ResourceConfig> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn by_type(&self, resource_type: &str) -> Vec<&ResourceConfig> {
        self.resources
            .iter()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }
}

impl Extend<ResourceConfig> for ResourceSet {
    fn extend<I: IntoIterator<Item = ResourceConfig>>(&mut self, iter: I) {
        for resource in iter {
            self.add(resource);
        }
    }
}

/// Declarative request for a single cloud resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "vpc", "cache-cluster", "gateway-route")
    pub resource_type: String,

    /// Resource identifier, stable across deployments
    pub id: String,

    /// Resource-specific configuration
    pub config: serde_json::Value,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            config,
        }
    }

    /// Get the full resource key (type:id)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_set_preserves_submission_order() {
        let set = ResourceSet::new()
            .with(ResourceConfig::new("cache-subnet-group", "redis", json!({})))
            .with(ResourceConfig::new("cache-cluster", "redis", json!({})));

        let types: Vec<_> = set.iter().map(|r| r.resource_type.as_str()).collect();
        assert_eq!(types, vec!["cache-subnet-group", "cache-cluster"]);
    }

    #[test]
    fn test_resource_set_replaces_same_key() {
        let mut set = ResourceSet::new();
        set.add(ResourceConfig::new("vpc", "main", json!({"cidr": "10.0.0.0/16"})));
        set.add(ResourceConfig::new("vpc", "main", json!({"cidr": "10.1.0.0/16"})));

        assert_eq!(set.len(), 1);
        let vpc = set.get("vpc", "main").unwrap();
        assert_eq!(vpc.get_config::<String>("cidr").as_deref(), Some("10.1.0.0/16"));
    }

    #[test]
    fn test_by_type() {
        let set = ResourceSet::new()
            .with(ResourceConfig::new("subnet", "a", json!({})))
            .with(ResourceConfig::new("subnet", "b", json!({})))
            .with(ResourceConfig::new("vpc", "main", json!({})));

        assert_eq!(set.by_type("subnet").len(), 2);
        assert!(set.get("subnet", "c").is_none());
    }
}

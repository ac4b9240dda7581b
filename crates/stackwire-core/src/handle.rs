//! Component handles
//!
//! A handle carries the identifying attributes of what a component created.
//! The component that produced it owns the underlying resources; every other
//! component only receives a shared reference through the [`HandleStore`].

use crate::graph::ComponentId;
use crate::rules::SecurityGroupRef;
use crate::runtime::{RuntimeConfig, keys};
use crate::scaling::ScalingPolicy;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkHandle {
    pub vpc_id: String,
    pub cidr: String,
    pub public_subnet_ids: Vec<String>,
    /// Ordered by availability zone
    pub private_subnet_ids: Vec<String>,
    pub internal: SecurityGroupRef,
    pub external: SecurityGroupRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheHandle {
    pub endpoint: String,
    pub port: u16,
    /// Client topology mode, e.g. "cluster"
    pub mode: String,
}

/// Opaque reference to a generated credential secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretRef {
    pub name: String,
    pub arn: String,
    /// Changes only if the secret value is regenerated
    pub version_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseHandle {
    pub endpoint: String,
    pub read_endpoint: String,
    pub port: u16,
    pub username: String,
    pub database_name: String,
    pub secret: SecretRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authorizer {
    pub id: String,
    pub name: String,
    /// Request attribute carrying the identity token
    pub identity_source: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy statement has no actions")]
    NoActions,

    #[error("wildcard '{0}' is not allowed in a policy statement")]
    Wildcard(String),
}

/// Least-privilege authorization policy artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyStatement {
    actions: Vec<String>,
    resources: Vec<String>,
}

impl PolicyStatement {
    /// Build a statement, rejecting wildcard actions and resources
    pub fn new<A, R>(actions: A, resources: R) -> Result<Self, PolicyError>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        let actions: Vec<String> = actions.into_iter().map(Into::into).collect();
        let resources: Vec<String> = resources.into_iter().map(Into::into).collect();

        if actions.is_empty() {
            return Err(PolicyError::NoActions);
        }
        if let Some(wildcard) = actions.iter().chain(&resources).find(|s| s.contains('*')) {
            return Err(PolicyError::Wildcard(wildcard.clone()));
        }

        Ok(Self { actions, resources })
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityHandle {
    pub pool_id: String,
    pub pool_arn: String,
    pub client_id: String,
    pub authorizer: Authorizer,
    pub management_policy: PolicyStatement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeHandle {
    pub domain: String,
    pub bucket_name: String,
    pub distribution_id: String,
}

impl EdgeHandle {
    pub fn url(&self) -> String {
        format!("https://{}", self.domain)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputeHandle {
    /// Gateway base URL
    pub service_url: String,
    pub cluster_name: String,
    pub service_name: String,
    pub load_balancer_dns: String,
    pub scaling: ScalingPolicy,
}

/// Handle produced by one component
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "component", rename_all = "snake_case")]
pub enum Handle {
    Edge(EdgeHandle),
    Network(NetworkHandle),
    Identity(IdentityHandle),
    Cache(CacheHandle),
    Database(DatabaseHandle),
    Compute(ComputeHandle),
}

impl Handle {
    /// The component kind that produces this handle
    pub fn kind(&self) -> ComponentId {
        match self {
            Handle::Edge(_) => ComponentId::Edge,
            Handle::Network(_) => ComponentId::Network,
            Handle::Identity(_) => ComponentId::Identity,
            Handle::Cache(_) => ComponentId::Cache,
            Handle::Database(_) => ComponentId::Database,
            Handle::Compute(_) => ComponentId::Compute,
        }
    }

    /// Add the runtime configuration entries this handle provides
    pub fn contribute(&self, config: &mut RuntimeConfig) {
        match self {
            Handle::Edge(edge) => {
                config.set(keys::CORS_ORIGIN, edge.url());
            }
            Handle::Cache(cache) => {
                config.set(keys::REDIS_ENDPOINT, &cache.endpoint);
                config.set(keys::REDIS_PORT, cache.port.to_string());
                config.set(keys::REDIS_TYPE, &cache.mode);
            }
            Handle::Database(db) => {
                config.set(keys::DB_HOST, &db.endpoint);
                config.set(keys::DB_PORT, db.port.to_string());
                config.set(keys::DB_USERNAME, &db.username);
                config.set(keys::DB_DATABASE, &db.database_name);
            }
            Handle::Identity(identity) => {
                config.set(keys::COGNITO_USER_POOL_ID, &identity.pool_id);
                config.set(keys::COGNITO_CLIENT_ID, &identity.client_id);
            }
            Handle::Network(_) | Handle::Compute(_) => {}
        }
    }
}

/// Handles produced so far in a run, owned by the composition root
#[derive(Debug, Clone, Default, Serialize)]
pub struct HandleStore {
    handles: BTreeMap<ComponentId, Handle>,
}

impl HandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handle. Returns the previous one if the component already ran.
    pub fn insert(&mut self, component: ComponentId, handle: Handle) -> Option<Handle> {
        self.handles.insert(component, handle)
    }

    pub fn get(&self, component: ComponentId) -> Option<&Handle> {
        self.handles.get(&component)
    }

    pub fn contains(&self, component: ComponentId) -> bool {
        self.handles.contains_key(&component)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ComponentId, &Handle)> {
        self.handles.iter()
    }

    pub fn database(&self) -> Option<&DatabaseHandle> {
        match self.get(ComponentId::Database)? {
            Handle::Database(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn identity(&self) -> Option<&IdentityHandle> {
        match self.get(ComponentId::Identity)? {
            Handle::Identity(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn edge(&self) -> Option<&EdgeHandle> {
        match self.get(ComponentId::Edge)? {
            Handle::Edge(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn compute(&self) -> Option<&ComputeHandle> {
        match self.get(ComponentId::Compute)? {
            Handle::Compute(handle) => Some(handle),
            _ => None,
        }
    }
}

//! Per-deployment and per-component context
//!
//! Everything a component needs is passed to it explicitly through
//! [`ComponentContext`]: the deployment parameters, the provider, and read
//! access to the handles of the components it declared as inputs.

use crate::error::{ComposeError, GraphError};
use crate::graph::{ComponentDescriptor, ComponentId};
use crate::handle::{
    CacheHandle, DatabaseHandle, EdgeHandle, Handle, HandleStore, IdentityHandle, NetworkHandle,
};
use crate::profile::{CapacityParams, Profile};
use crate::runtime::RuntimeConfig;
use stackwire_cloud::{ApplyResult, CloudProvider, ResourceSet, ResourceState};
use stackwire_config::Settings;

/// Invocation parameters plus project settings
#[derive(Debug, Clone)]
pub struct DeploymentContext {
    pub settings: Settings,
    pub profile: Profile,
    /// Deployable artifact version (container image tag)
    pub version: String,
}

impl DeploymentContext {
    pub fn new(settings: Settings, profile: Profile, version: impl Into<String>) -> Self {
        Self {
            settings,
            profile,
            version: version.into(),
        }
    }

    pub fn capacity(&self) -> &'static CapacityParams {
        self.profile.capacity()
    }

    pub fn stack_name(&self) -> &str {
        &self.settings.stack_name
    }

    /// Stack-scoped resource id
    pub fn resource_id(&self, suffix: &str) -> String {
        format!("{}-{}", self.settings.stack_name, suffix)
    }
}

/// What a component sees while it is instantiated
pub struct ComponentContext<'a> {
    descriptor: &'a ComponentDescriptor,
    deployment: &'a DeploymentContext,
    handles: &'a HandleStore,
    runtime: &'a RuntimeConfig,
    provider: &'a dyn CloudProvider,
}

impl<'a> ComponentContext<'a> {
    pub fn new(
        descriptor: &'a ComponentDescriptor,
        deployment: &'a DeploymentContext,
        handles: &'a HandleStore,
        runtime: &'a RuntimeConfig,
        provider: &'a dyn CloudProvider,
    ) -> Self {
        Self {
            descriptor,
            deployment,
            handles,
            runtime,
            provider,
        }
    }

    pub fn component(&self) -> ComponentId {
        self.descriptor.name
    }

    pub fn deployment(&self) -> &'a DeploymentContext {
        self.deployment
    }

    pub fn settings(&self) -> &'a Settings {
        &self.deployment.settings
    }

    pub fn capacity(&self) -> &'static CapacityParams {
        self.deployment.capacity()
    }

    pub fn resource_id(&self, suffix: &str) -> String {
        self.deployment.resource_id(suffix)
    }

    /// Runtime configuration assembled from every component instantiated so far
    pub fn runtime(&self) -> &'a RuntimeConfig {
        self.runtime
    }

    /// Handle of a declared input
    pub fn resolve(&self, producer: ComponentId) -> Result<&'a Handle, GraphError> {
        let component = self.component();
        let reference = self
            .descriptor
            .inputs
            .iter()
            .find(|r| r.component == producer)
            .ok_or(GraphError::UndeclaredInput {
                component,
                producer,
            })?;

        self.handles
            .get(producer)
            .ok_or(GraphError::UnresolvedReference {
                component,
                producer,
                output: reference.output,
            })
    }

    pub fn network(&self) -> Result<&'a NetworkHandle, GraphError> {
        match self.resolve(ComponentId::Network)? {
            Handle::Network(handle) => Ok(handle),
            _ => Err(self.unresolved(ComponentId::Network)),
        }
    }

    pub fn cache(&self) -> Result<&'a CacheHandle, GraphError> {
        match self.resolve(ComponentId::Cache)? {
            Handle::Cache(handle) => Ok(handle),
            _ => Err(self.unresolved(ComponentId::Cache)),
        }
    }

    pub fn database(&self) -> Result<&'a DatabaseHandle, GraphError> {
        match self.resolve(ComponentId::Database)? {
            Handle::Database(handle) => Ok(handle),
            _ => Err(self.unresolved(ComponentId::Database)),
        }
    }

    pub fn identity(&self) -> Result<&'a IdentityHandle, GraphError> {
        match self.resolve(ComponentId::Identity)? {
            Handle::Identity(handle) => Ok(handle),
            _ => Err(self.unresolved(ComponentId::Identity)),
        }
    }

    pub fn edge(&self) -> Result<&'a EdgeHandle, GraphError> {
        match self.resolve(ComponentId::Edge)? {
            Handle::Edge(handle) => Ok(handle),
            _ => Err(self.unresolved(ComponentId::Edge)),
        }
    }

    fn unresolved(&self, producer: ComponentId) -> GraphError {
        let output = self
            .descriptor
            .inputs
            .iter()
            .find(|r| r.component == producer)
            .map_or("handle", |r| r.output);
        GraphError::UnresolvedReference {
            component: self.component(),
            producer,
            output,
        }
    }

    /// Plan and apply one batch of resource requests
    pub async fn submit(&self, resources: ResourceSet) -> Result<ApplyResult, ComposeError> {
        let component = self.component();
        let plan = self
            .provider
            .plan(&resources)
            .await
            .map_err(|e| ComposeError::provider(component, e))?;

        tracing::info!(%component, provider = self.provider.name(), "{}", plan.summary());
        for action in &plan.actions {
            tracing::debug!(%component, "{}: {}", action.action_type, action.description);
        }

        let result = self
            .provider
            .apply(&plan)
            .await
            .map_err(|e| ComposeError::provider(component, e))?;

        tracing::debug!(%component, "applied in {}ms", result.duration_ms);
        Ok(result)
    }

    /// State the provider reported for a submitted resource
    pub fn state<'r>(
        &self,
        result: &'r ApplyResult,
        resource_type: &str,
        id: &str,
    ) -> Result<&'r ResourceState, ComposeError> {
        result.resource(resource_type, id).ok_or_else(|| {
            ComposeError::provider(
                self.component(),
                stackwire_cloud::CloudError::ResourceNotFound(format!("{resource_type}:{id}")),
            )
        })
    }

    /// Required string attribute of a submitted resource
    pub fn attribute(
        &self,
        result: &ApplyResult,
        resource_type: &str,
        id: &str,
        key: &str,
    ) -> Result<String, ComposeError> {
        self.state(result, resource_type, id)?
            .require_str(key)
            .map_err(|e| ComposeError::provider(self.component(), e))
    }
}

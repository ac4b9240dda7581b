//! Local provider implementation

use crate::generate::{self, SECRET_STRING};
use crate::registry::ImageRegistry;
use async_trait::async_trait;
use stackwire_cloud::{
    Action, ActionType, ApplyResult, AuthStatus, CloudError, CloudProvider, GlobalState, Plan,
    ProviderState, ResourceConfig, ResourceSet, ResourceState, Result, StateManager,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tokio::sync::RwLock;

const PROVIDER: &str = "local";

/// Resource type whose image is resolved against the registry
const CONTAINER_SERVICE: &str = "container-service";

/// Simulated provider persisting resources to a state file
///
/// Creation generates identifiers, endpoints and secret values once; a
/// resource already present in the state file is never regenerated.
/// Reads of the state file wait for an apply in progress to finish.
pub struct LocalProvider {
    state: StateManager,
    region: String,
    registry: ImageRegistry,
    limits: BTreeMap<String, usize>,
    state_guard: RwLock<()>,
}

impl LocalProvider {
    pub fn new(state_dir: impl AsRef<Path>, region: impl Into<String>) -> Self {
        Self {
            state: StateManager::new(state_dir),
            region: region.into(),
            registry: ImageRegistry::new(),
            limits: BTreeMap::new(),
            state_guard: RwLock::new(()),
        }
    }

    /// Publish image tags to the simulated registry
    pub fn with_images<I, T>(mut self, repository: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.registry.publish(repository, tags);
        self
    }

    /// Cap the number of resources of one type (account quota)
    pub fn with_limit(mut self, resource_type: impl Into<String>, max: usize) -> Self {
        self.limits.insert(resource_type.into(), max);
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn state_dir(&self) -> &Path {
        self.state.state_dir()
    }

    /// Stored value of a generated secret
    pub async fn secret_value(&self, name: &str) -> Result<Option<serde_json::Value>> {
        let _guard = self.state_guard.read().await;
        let state = self.state.load().await?;
        Ok(state
            .get_resource(&state_key("secret", name))
            .and_then(|s| s.attributes.get(SECRET_STRING).cloned()))
    }

    async fn load_provider_state(&self) -> Result<ProviderState> {
        Ok(self.state.load().await?.provider_state(PROVIDER))
    }

    /// Resolve a service's image against the registry
    fn check_image(&self, resource: &ResourceConfig) -> Result<()> {
        if resource.resource_type != CONTAINER_SERVICE {
            return Ok(());
        }
        let image = resource.get_config::<String>("image").ok_or_else(|| {
            CloudError::InvalidRequest(format!("{} has no image", resource.key()))
        })?;
        self.registry.resolve(&image)
    }

    /// Enforce the per-type quota for a resource about to be created
    fn check_limit(&self, state: &GlobalState, resource: &ResourceConfig) -> Result<()> {
        let Some(max) = self.limits.get(&resource.resource_type) else {
            return Ok(());
        };
        let existing = state
            .provider_state(PROVIDER)
            .by_type(&resource.resource_type)
            .count();
        if existing >= *max {
            return Err(CloudError::ResourceLimitExceeded(format!(
                "{} allows at most {} resources of type {}",
                PROVIDER, max, resource.resource_type
            )));
        }
        Ok(())
    }

    async fn apply_locked(&self, plan: &Plan) -> Result<ApplyResult> {
        let start = Instant::now();
        let mut state = self.state.load().await?;
        let mut result = ApplyResult::new();

        for action in &plan.actions {
            let resource = &action.resource;
            let key = state_key(&resource.resource_type, &resource.id);

            // A resource created since planning is treated as existing
            let (resource_state, message) = match (action.action_type, state.get_resource(&key)) {
                (_, Some(existing)) => {
                    self.check_image(resource)?;
                    warn_image_change(resource, existing);
                    (existing.clone(), format!("{} unchanged", resource.key()))
                }
                (ActionType::Create, None) => {
                    self.check_image(resource)?;
                    self.check_limit(&state, resource)?;
                    let created = generate::create(resource, &self.region)?;
                    state.set_resource(key, created.clone());
                    self.state.save(&state).await?;
                    tracing::info!("Created {}", resource.key());
                    (created, format!("{} created", resource.key()))
                }
                (ActionType::NoOp, None) => {
                    return Err(CloudError::ResourceNotFound(resource.key()));
                }
            };

            result.add_success(action.id.clone(), message);
            result.record(resource.key(), generate::redact(&resource_state));
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}

/// Existing services keep the image they were created with
fn warn_image_change(resource: &ResourceConfig, existing: &ResourceState) {
    if resource.resource_type != CONTAINER_SERVICE {
        return;
    }
    let requested = resource.get_config::<String>("image");
    let recorded = existing.get_attribute::<String>("image");
    if let (Some(requested), Some(recorded)) = (requested, recorded) {
        if requested != recorded {
            tracing::warn!(
                "{} keeps image {}, requested {} is not rolled out",
                resource.key(),
                recorded,
                requested
            );
        }
    }
}

fn state_key(resource_type: &str, id: &str) -> String {
    format!("{}:{}:{}", PROVIDER, resource_type, id)
}

#[async_trait]
impl CloudProvider for LocalProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn display_name(&self) -> &str {
        "Local simulation"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        Ok(AuthStatus::ok(format!(
            "{} ({})",
            self.region,
            self.state.state_dir().display()
        )))
    }

    async fn get_state(&self) -> Result<ProviderState> {
        let _guard = self.state_guard.read().await;
        self.load_provider_state().await
    }

    async fn plan(&self, desired: &ResourceSet) -> Result<Plan> {
        let current = {
            let _guard = self.state_guard.read().await;
            self.load_provider_state().await?
        };

        let actions = desired
            .iter()
            .map(|resource| {
                if current.contains(&resource.key()) {
                    Action::no_op(resource.clone())
                } else {
                    Action::create(resource.clone())
                }
            })
            .collect();

        Ok(Plan::new(actions))
    }

    async fn apply(&self, plan: &Plan) -> Result<ApplyResult> {
        let _guard = self.state_guard.write().await;
        let lock = self.state.acquire_lock().await?;

        let result = self.apply_locked(plan).await;
        lock.release().await?;

        if let Err(e) = &result {
            tracing::warn!("Apply stopped: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn service(tag: &str) -> ResourceConfig {
        ResourceConfig::new(
            CONTAINER_SERVICE,
            "InfraStack-service",
            json!({ "image": format!("poe-infra-services:{tag}") }),
        )
    }

    async fn submit(provider: &LocalProvider, resources: ResourceSet) -> Result<ApplyResult> {
        let plan = provider.plan(&resources).await?;
        provider.apply(&plan).await
    }

    #[tokio::test]
    async fn test_plan_creates_then_noops() {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::new(dir.path(), "us-east-1");
        let resources = ResourceSet::new().with(ResourceConfig::new(
            "vpc",
            "InfraStack-vpc",
            json!({ "cidr": "10.0.0.0/16" }),
        ));

        let plan = provider.plan(&resources).await.unwrap();
        assert_eq!(plan.summary().create, 1);
        let first = provider.apply(&plan).await.unwrap();

        let plan = provider.plan(&resources).await.unwrap();
        assert!(!plan.has_changes);
        let second = provider.apply(&plan).await.unwrap();

        let vpc_id = |r: &ApplyResult| {
            r.resource("vpc", "InfraStack-vpc")
                .unwrap()
                .require_str("vpc_id")
                .unwrap()
        };
        assert_eq!(vpc_id(&first), vpc_id(&second));
    }

    #[tokio::test]
    async fn test_state_survives_new_provider() {
        let dir = tempdir().unwrap();
        let resources = ResourceSet::new().with(ResourceConfig::new(
            "secret",
            "InfraStack-db-secret",
            json!({ "generate": { "username": "dbadmin" } }),
        ));

        let first = submit(&LocalProvider::new(dir.path(), "us-east-1"), resources.clone())
            .await
            .unwrap();
        let provider = LocalProvider::new(dir.path(), "us-east-1");
        let second = submit(&provider, resources).await.unwrap();

        let version = |r: &ApplyResult| {
            r.resource("secret", "InfraStack-db-secret")
                .unwrap()
                .require_str("version_id")
                .unwrap()
        };
        assert_eq!(version(&first), version(&second));
        assert!(provider.get_state().await.unwrap().contains("secret:InfraStack-db-secret"));
    }

    #[tokio::test]
    async fn test_secret_value_not_returned() {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::new(dir.path(), "us-east-1");
        let resources = ResourceSet::new().with(ResourceConfig::new(
            "secret",
            "InfraStack-db-secret",
            json!({ "generate": { "username": "dbadmin", "password_length": 30 } }),
        ));

        let result = submit(&provider, resources).await.unwrap();
        let secret = result.resource("secret", "InfraStack-db-secret").unwrap();
        assert!(secret.get_attribute::<serde_json::Value>(SECRET_STRING).is_none());

        let value = provider
            .secret_value("InfraStack-db-secret")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value["username"], "dbadmin");
        assert_eq!(value["password"].as_str().unwrap().len(), 30);
    }

    #[tokio::test]
    async fn test_missing_image_is_rejected() {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::new(dir.path(), "us-east-1")
            .with_images("poe-infra-services", ["v1.2.0"]);

        let err = submit(&provider, ResourceSet::new().with(service("v9.9.9")))
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::ImageNotFound { ref tag, .. } if tag == "v9.9.9"));
        assert!(provider.get_state().await.unwrap().is_empty());

        submit(&provider, ResourceSet::new().with(service("v1.2.0")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_redeploy_keeps_recorded_image() {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::new(dir.path(), "us-east-1")
            .with_images("poe-infra-services", ["v1.2.0", "v1.3.0"]);

        submit(&provider, ResourceSet::new().with(service("v1.2.0")))
            .await
            .unwrap();
        let result = submit(&provider, ResourceSet::new().with(service("v1.3.0")))
            .await
            .unwrap();

        let service = result
            .resource(CONTAINER_SERVICE, "InfraStack-service")
            .unwrap();
        assert_eq!(
            service.require_str("image").unwrap(),
            "poe-infra-services:v1.2.0"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_plan_while_applying() {
        let dir = tempdir().unwrap();
        let provider = std::sync::Arc::new(LocalProvider::new(dir.path(), "us-east-1"));
        let watched =
            ResourceSet::new().with(ResourceConfig::new("vpc", "InfraStack-vpc", json!({})));

        let writer = {
            let provider = provider.clone();
            tokio::spawn(async move {
                for i in 0..40 {
                    let bucket = ResourceConfig::new("bucket", format!("b{i}"), json!({}));
                    submit(&provider, ResourceSet::new().with(bucket)).await?;
                }
                Ok::<_, CloudError>(())
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let provider = provider.clone();
                let watched = watched.clone();
                tokio::spawn(async move {
                    for _ in 0..40 {
                        provider.plan(&watched).await?;
                        provider.get_state().await?;
                        provider.secret_value("InfraStack-db-secret").await?;
                    }
                    Ok::<_, CloudError>(())
                })
            })
            .collect();

        writer.await.unwrap().unwrap();
        for reader in readers {
            reader.await.unwrap().unwrap();
        }
        assert_eq!(provider.get_state().await.unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_apply_stops_at_first_rejection() {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::new(dir.path(), "us-east-1").with_limit("vpc", 1);
        let resources = ResourceSet::new()
            .with(ResourceConfig::new("vpc", "InfraStack-vpc", json!({})))
            .with(ResourceConfig::new("vpc", "InfraStack-vpc-2", json!({})))
            .with(ResourceConfig::new("bucket", "InfraStack-frontend", json!({})));

        let err = submit(&provider, resources).await.unwrap_err();
        assert!(matches!(err, CloudError::ResourceLimitExceeded(_)));

        // Created before the rejection, left in place
        let state = provider.get_state().await.unwrap();
        assert!(state.contains("vpc:InfraStack-vpc"));
        assert!(!state.contains("bucket:InfraStack-frontend"));
    }

    #[tokio::test]
    async fn test_lock_released_after_failure() {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::new(dir.path(), "us-east-1");

        let resources = ResourceSet::new().with(ResourceConfig::new("mainframe", "m1", json!({})));
        assert!(submit(&provider, resources).await.is_err());

        assert!(!dir.path().join("lock.json").exists());
        submit(
            &provider,
            ResourceSet::new().with(ResourceConfig::new("bucket", "b1", json!({}))),
        )
        .await
        .unwrap();
    }
}

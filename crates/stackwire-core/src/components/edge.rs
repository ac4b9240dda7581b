use super::{Component, ComponentOutput};
use crate::context::ComponentContext;
use crate::error::Result;
use crate::graph::{ComponentDescriptor, ComponentId};
use crate::handle::{EdgeHandle, Handle};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use stackwire_cloud::{ResourceConfig, ResourceSet};

const INDEX_DOCUMENT: &str = "index.html";

const BUCKET: &str = "bucket";
const DISTRIBUTION: &str = "distribution";

/// Rewrite of an origin error into a served page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub response_status: u16,
    pub response_page_path: String,
}

/// Client-side routing fallback: missing paths are answered with the
/// application shell so the browser router can resolve them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpaFallback {
    responses: Vec<ErrorResponse>,
}

impl Default for SpaFallback {
    fn default() -> Self {
        Self::new(format!("/{INDEX_DOCUMENT}"))
    }
}

impl SpaFallback {
    pub fn new(page_path: impl Into<String>) -> Self {
        let page_path = page_path.into();
        let responses = [403, 404]
            .into_iter()
            .map(|status| ErrorResponse {
                status,
                response_status: 200,
                response_page_path: page_path.clone(),
            })
            .collect();
        Self { responses }
    }

    pub fn error_responses(&self) -> &[ErrorResponse] {
        &self.responses
    }

    /// Status and path actually served for an origin response
    pub fn rewrite(&self, status: u16, path: &str) -> (u16, String) {
        match self.responses.iter().find(|r| r.status == status) {
            Some(response) => (response.response_status, response.response_page_path.clone()),
            None => (status, path.to_string()),
        }
    }
}

/// Private bucket for the static frontend behind a distribution
pub struct EdgeComponent;

#[async_trait]
impl Component for EdgeComponent {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(ComponentId::Edge).output("domain")
    }

    async fn instantiate(&self, ctx: &ComponentContext<'_>) -> Result<ComponentOutput> {
        let bucket_key = ctx.resource_id("frontend");
        let distribution_key = ctx.resource_id("distribution");

        let resources = ResourceSet::new()
            .with(ResourceConfig::new(
                BUCKET,
                &bucket_key,
                json!({
                    "block_public_access": true,
                    "auto_delete_objects": true,
                }),
            ))
            .with(ResourceConfig::new(
                DISTRIBUTION,
                &distribution_key,
                json!({
                    "origin": { "bucket": bucket_key, "access": "origin_access_control" },
                    "viewer_protocol_policy": "redirect-to-https",
                    "cache_policy": "caching-optimized",
                    "default_root_object": INDEX_DOCUMENT,
                    "error_responses": SpaFallback::default().error_responses(),
                }),
            ));

        let result = ctx.submit(resources).await?;
        let handle = EdgeHandle {
            domain: ctx.attribute(&result, DISTRIBUTION, &distribution_key, "domain_name")?,
            bucket_name: ctx.attribute(&result, BUCKET, &bucket_key, "bucket_name")?,
            distribution_id: ctx.attribute(&result, DISTRIBUTION, &distribution_key, "distribution_id")?,
        };

        tracing::info!(domain = %handle.domain, "edge ready");
        Ok(ComponentOutput::new(Handle::Edge(handle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::Fixture;
    use crate::profile::Profile;

    #[test]
    fn test_spa_fallback() {
        let fallback = SpaFallback::default();

        assert_eq!(fallback.rewrite(404, "/orders/42"), (200, "/index.html".to_string()));
        assert_eq!(fallback.rewrite(403, "/settings"), (200, "/index.html".to_string()));
        assert_eq!(fallback.rewrite(500, "/orders"), (500, "/orders".to_string()));
        assert_eq!(fallback.rewrite(200, "/app.js"), (200, "/app.js".to_string()));
    }

    #[tokio::test]
    async fn test_edge_handle() {
        let fixture = Fixture::new(Profile::Staging);
        let descriptor = EdgeComponent.descriptor();

        let output = EdgeComponent
            .instantiate(&fixture.context(&descriptor))
            .await
            .unwrap();

        let Handle::Edge(edge) = output.handle else {
            panic!("expected an edge handle");
        };
        assert!(!edge.domain.is_empty());
        assert_eq!(edge.url(), format!("https://{}", edge.domain));
        assert_eq!(edge.bucket_name, "infrastack-frontend");
    }
}

//! Deployment outputs handed to the next pipeline stage

use crate::error::GraphError;
use crate::graph::{ComponentId, OutputRef};
use crate::handle::HandleStore;
use serde::{Deserialize, Serialize};

/// Producers of the deployment outputs; checked before anything is submitted
pub const OUTPUT_SOURCES: [OutputRef; 4] = [
    OutputRef::new(ComponentId::Compute, "service_url"),
    OutputRef::new(ComponentId::Identity, "pool_id"),
    OutputRef::new(ComponentId::Identity, "client_id"),
    OutputRef::new(ComponentId::Edge, "domain"),
];

/// Fixed, flat set of values consumed by downstream build/release tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentOutputs {
    /// API base URL, baked into the frontend build
    pub api_url: String,
    pub identity_pool_id: String,
    pub identity_client_id: String,
    pub edge_domain: String,
}

impl DeploymentOutputs {
    /// Collect the outputs once every component has been instantiated
    pub fn collect(handles: &HandleStore) -> Result<Self, GraphError> {
        let missing = |index: usize| GraphError::MissingDeploymentOutput(OUTPUT_SOURCES[index]);

        let compute = handles.compute().ok_or_else(|| missing(0))?;
        let identity = handles.identity().ok_or_else(|| missing(1))?;
        let edge = handles.edge().ok_or_else(|| missing(3))?;

        Ok(Self {
            api_url: compute.service_url.clone(),
            identity_pool_id: identity.pool_id.clone(),
            identity_client_id: identity.client_id.clone(),
            edge_domain: edge.domain.clone(),
        })
    }

    pub fn frontend_url(&self) -> String {
        format!("https://{}", self.edge_domain)
    }

    /// Flat JSON object of every named output, including the derived ones
    pub fn to_json(&self) -> serde_json::Value {
        self.entries()
            .into_iter()
            .map(|(name, value, _)| (name.to_string(), serde_json::Value::String(value)))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }

    /// Named outputs with a short description, in display order
    pub fn entries(&self) -> Vec<(&'static str, String, &'static str)> {
        vec![
            (
                "ApiUrl",
                self.api_url.clone(),
                "API gateway base URL, used as the frontend's API URL at build time",
            ),
            (
                "IdentityPoolId",
                self.identity_pool_id.clone(),
                "User pool id",
            ),
            (
                "IdentityClientId",
                self.identity_client_id.clone(),
                "User pool app client id",
            ),
            ("EdgeDomain", self.edge_domain.clone(), "Distribution domain"),
            (
                "FrontendUrl",
                self.frontend_url(),
                "Distribution URL",
            ),
        ]
    }
}

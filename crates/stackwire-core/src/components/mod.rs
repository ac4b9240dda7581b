//! Infrastructure components
//!
//! Each component declares what it reads and produces through a
//! [`ComponentDescriptor`] and materializes its resources in
//! [`Component::instantiate`]. Components never touch each other's state:
//! they receive upstream handles through the [`ComponentContext`] and return
//! their own handle plus the security rules they need. The composition root
//! owns everything else.

mod cache;
mod compute;
mod database;
mod edge;
mod identity;
mod network;

pub use cache::{CacheComponent, REDIS_PORT};
pub use compute::{CONTAINER_PORT, ComputeComponent};
pub use database::{DatabaseComponent, POSTGRES_PORT};
pub use edge::{EdgeComponent, SpaFallback};
pub use identity::{IdentityComponent, MANAGEMENT_ACTIONS, PasswordPolicy, TokenValidity};
pub use network::NetworkComponent;

use crate::context::ComponentContext;
use crate::error::Result;
use crate::graph::ComponentDescriptor;
use crate::handle::Handle;
use crate::rules::SecurityRule;
use async_trait::async_trait;

/// A unit of infrastructure instantiated once per deployment
#[async_trait]
pub trait Component: Send + Sync {
    /// Declared inputs and outputs
    fn descriptor(&self) -> ComponentDescriptor;

    /// Create the component's resources and return its handle.
    ///
    /// Every handle read through `ctx` must be declared as an input in
    /// [`descriptor`](Component::descriptor).
    async fn instantiate(&self, ctx: &ComponentContext<'_>) -> Result<ComponentOutput>;
}

/// What a component hands back to the composition root
#[derive(Debug, Clone)]
pub struct ComponentOutput {
    pub handle: Handle,
    pub rules: Vec<SecurityRule>,
}

impl ComponentOutput {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            rules: Vec::new(),
        }
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = SecurityRule>) -> Self {
        self.rules.extend(rules);
        self
    }
}

/// The six components of a standard deployment
pub fn standard_components() -> Vec<Box<dyn Component>> {
    vec![
        Box::new(EdgeComponent),
        Box::new(NetworkComponent),
        Box::new(IdentityComponent),
        Box::new(CacheComponent),
        Box::new(DatabaseComponent),
        Box::new(ComputeComponent),
    ]
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ComponentId, CompositionPlan};
    use crate::outputs::OUTPUT_SOURCES;

    #[test]
    fn test_standard_components_form_a_valid_plan() {
        let descriptors = standard_components()
            .iter()
            .map(|c| c.descriptor())
            .collect();
        let plan = CompositionPlan::build(descriptors).unwrap();

        plan.require_outputs(&OUTPUT_SOURCES).unwrap();
        assert_eq!(plan.layers().len(), 3);
        assert_eq!(plan.layers()[2], vec![ComponentId::Compute]);
    }

    #[test]
    fn test_compute_reads_edge_domain() {
        let compute = ComputeComponent.descriptor();
        assert!(
            compute
                .inputs
                .iter()
                .any(|r| r.component == ComponentId::Edge && r.output == "domain")
        );
    }
}

//! Composition root
//!
//! The [`Composer`] owns every piece of cross-component state: the handles
//! produced so far, the runtime configuration map and the accumulated
//! security rules. It validates the component graph up front, then walks the
//! layers of the [`CompositionPlan`], instantiating the components of one
//! layer concurrently and folding their outputs in before the next layer
//! starts.

use crate::components::{Component, ComponentOutput, standard_components};
use crate::context::{ComponentContext, DeploymentContext};
use crate::error::{ComposeError, Result};
use crate::graph::{ComponentDescriptor, ComponentId, CompositionPlan};
use crate::handle::HandleStore;
use crate::outputs::{DeploymentOutputs, OUTPUT_SOURCES};
use crate::profile::Profile;
use crate::rules::{SecurityRule, SecurityRuleSet};
use crate::runtime::RuntimeConfig;
use futures_util::future::join_all;
use serde::Serialize;
use stackwire_cloud::{CloudProvider, ResourceSet};
use stackwire_config::Settings;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// How the instantiation order is derived
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Sequencing {
    /// Layers computed from the declared inputs
    #[default]
    Topological,
    /// Operator-fixed order, one component at a time
    Fixed(Vec<ComponentId>),
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct Deployment {
    pub profile: Profile,
    pub version: String,
    pub outputs: DeploymentOutputs,
    pub runtime_config: RuntimeConfig,
    pub rules: SecurityRuleSet,
    pub handles: HandleStore,
    pub layers: Vec<Vec<ComponentId>>,
}

pub struct Composer {
    settings: Settings,
    provider: Arc<dyn CloudProvider>,
    components: Vec<Box<dyn Component>>,
    sequencing: Sequencing,
}

impl Composer {
    /// Composer over the standard component set
    pub fn new(settings: Settings, provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            settings,
            provider,
            components: standard_components(),
            sequencing: Sequencing::Topological,
        }
    }

    pub fn with_components(mut self, components: Vec<Box<dyn Component>>) -> Self {
        self.components = components;
        self
    }

    pub fn with_sequencing(mut self, sequencing: Sequencing) -> Self {
        self.sequencing = sequencing;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Validate the component graph and derive the instantiation order.
    ///
    /// Never calls the provider.
    pub fn plan(&self) -> Result<CompositionPlan> {
        let descriptors: Vec<ComponentDescriptor> =
            self.components.iter().map(|c| c.descriptor()).collect();

        let plan = match &self.sequencing {
            Sequencing::Topological => CompositionPlan::build(descriptors)?,
            Sequencing::Fixed(order) => CompositionPlan::sequenced(descriptors, order)?,
        };
        plan.require_outputs(&OUTPUT_SOURCES)?;
        Ok(plan)
    }

    /// Run the deployment and return its outputs
    pub async fn compose(&self, profile: Profile, version: &str) -> Result<DeploymentOutputs> {
        Ok(self.run(profile, version).await?.outputs)
    }

    /// Run the deployment and return the full report
    pub async fn run(&self, profile: Profile, version: &str) -> Result<Deployment> {
        let started = Instant::now();
        let plan = self.plan()?;

        let components: BTreeMap<ComponentId, &dyn Component> = self
            .components
            .iter()
            .map(|c| (c.descriptor().name, c.as_ref()))
            .collect();

        let deployment = DeploymentContext::new(self.settings.clone(), profile, version);
        let mut runtime = RuntimeConfig::base(&deployment);
        let mut handles = HandleStore::new();
        let mut rules = SecurityRuleSet::new();

        tracing::info!(
            stack = deployment.stack_name(),
            %profile,
            version,
            provider = self.provider.name(),
            layers = plan.layers().len(),
            "starting deployment"
        );

        for (index, layer) in plan.layers().iter().enumerate() {
            tracing::info!(
                layer = index,
                "instantiating {}",
                layer.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
            );

            let mut tasks = Vec::with_capacity(layer.len());
            for id in layer {
                let (Some(component), Some(descriptor)) = (components.get(id), plan.descriptor(*id))
                else {
                    return Err(ComposeError::definition(*id, "component is not registered"));
                };
                let ctx = ComponentContext::new(
                    descriptor,
                    &deployment,
                    &handles,
                    &runtime,
                    self.provider.as_ref(),
                );
                tasks.push(instantiate(*component, ctx));
            }

            // Siblings run to completion; the first failure in layer order wins
            let results = join_all(tasks).await;

            let mut outputs = Vec::with_capacity(results.len());
            for result in results {
                outputs.push(result?);
            }
            for output in outputs {
                let component = output.handle.kind();
                output.handle.contribute(&mut runtime);
                rules.extend(output.rules);
                handles.insert(component, output.handle);
            }
        }

        let outputs = DeploymentOutputs::collect(&handles)?;

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            rules = rules.len(),
            api_url = %outputs.api_url,
            "deployment complete"
        );

        Ok(Deployment {
            profile,
            version: version.to_string(),
            outputs,
            runtime_config: runtime,
            rules,
            handles,
            layers: plan.layers().to_vec(),
        })
    }
}

/// Instantiate one component and submit the rules it declares
async fn instantiate(
    component: &dyn Component,
    ctx: ComponentContext<'_>,
) -> Result<ComponentOutput> {
    let id = ctx.component();
    let output = component.instantiate(&ctx).await.inspect_err(|e| {
        tracing::error!(component = %id, "instantiation failed: {e}");
    })?;

    if output.handle.kind() != id {
        return Err(ComposeError::definition(
            id,
            format!("returned a '{}' handle", output.handle.kind()),
        ));
    }

    if !output.rules.is_empty() {
        let mut resources = ResourceSet::new();
        resources.extend(output.rules.iter().map(SecurityRule::to_resource));
        ctx.submit(resources).await?;
    }

    tracing::info!(component = %id, rules = output.rules.len(), "instantiated");
    Ok(output)
}

//! Stackwire composition engine
//!
//! Provisions a multi-tier deployment (network, cache, database, identity,
//! compute with API ingress, edge delivery) through a
//! [`CloudProvider`](stackwire_cloud::CloudProvider).
//!
//! ## Architecture
//!
//! ```text
//! Composer
//!   ├── CompositionPlan      declared inputs -> validated layers
//!   ├── Component (x6)       instantiate(ctx) -> handle + security rules
//!   │     └── ComponentContext   upstream handles, runtime config, provider
//!   ├── HandleStore          handles produced so far
//!   ├── RuntimeConfig        environment map for the service
//!   └── SecurityRuleSet      additive, duplicate-free rules
//! ```
//!
//! Capacity is selected once through [`Profile::capacity`]; no other module
//! branches on the profile.

pub mod components;
pub mod composer;
pub mod context;
pub mod error;
pub mod graph;
pub mod handle;
pub mod outputs;
pub mod profile;
pub mod rules;
pub mod runtime;
pub mod scaling;

pub use components::{Component, ComponentOutput, standard_components};
pub use composer::{Composer, Deployment, Sequencing};
pub use context::{ComponentContext, DeploymentContext};
pub use error::{ComposeError, GraphError, Result};
pub use graph::{ComponentDescriptor, ComponentId, CompositionPlan, OutputRef};
pub use handle::{
    CacheHandle, ComputeHandle, DatabaseHandle, EdgeHandle, Handle, HandleStore, IdentityHandle,
    NetworkHandle, PolicyError, PolicyStatement, SecretRef,
};
pub use outputs::DeploymentOutputs;
pub use profile::{CAPACITY_TABLE, CacheNodeType, CapacityParams, MAX_SERVICE_REPLICAS, Profile, ProfileParseError};
pub use rules::{Direction, Peer, SecurityGroupRef, SecurityRule, SecurityRuleSet};
pub use runtime::{REQUIRED_KEYS, RuntimeConfig};
pub use scaling::{Autoscaler, ScalingDecision, ScalingPolicy};

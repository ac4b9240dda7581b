//! Local provider for Stackwire
//!
//! Simulates a cloud account on the local filesystem. Resources are recorded
//! in `state.json` under the state directory through
//! [`StateManager`](stackwire_cloud::StateManager), so repeated deployments
//! against the same directory see what earlier runs created.
//!
//! - identifiers, endpoints and ARNs are generated on creation
//! - secret values are generated once and never returned from `apply`
//! - container images are resolved against an in-memory [`ImageRegistry`]
//! - per-type quotas can be set with [`LocalProvider::with_limit`]

mod generate;
mod provider;
mod registry;

pub use generate::SUPPORTED_TYPES;
pub use provider::LocalProvider;
pub use registry::ImageRegistry;

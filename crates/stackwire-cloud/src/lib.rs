//! Stackwire Cloud Provider Abstraction
//!
//! This crate defines the boundary between the Stackwire composition engine
//! and a cloud provider's control plane. The engine only describes *what* to
//! create (a [`ResourceSet`] of declarative requests); the provider decides
//! *how*, and reports back generated identifiers and endpoints as
//! [`ResourceState`] attributes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 stackwire CLI                    │
//! │             (stackwire deploy/plan)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                stackwire-core                    │
//! │   Composer ─ CompositionPlan ─ Components        │
//! └─────────────────┬───────────────────────────────┘
//!                   │ ResourceSet / Plan
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackwire-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait CloudProvider { plan, apply, .. }  │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ Plan/Action  │  │  State Mgmt  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼────────┐
//!           │ local provider │
//!           └────────────────┘
//! ```

pub mod action;
pub mod error;
pub mod provider;
pub mod state;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use provider::{AuthStatus, CloudProvider, ResourceConfig, ResourceSet};
pub use state::{
    GlobalState, ProviderState, ResourceState, ResourceStatus, StateLock, StateManager,
};

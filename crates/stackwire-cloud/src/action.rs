//! Action types for cloud resource provisioning

use crate::provider::ResourceConfig;
use crate::state::ResourceState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Represents a planned action for a cloud resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// The request this action materializes
    pub resource: ResourceConfig,

    /// Description of the action
    pub description: String,
}

impl Action {
    pub fn create(resource: ResourceConfig) -> Self {
        Self {
            id: format!("create-{}", resource.key()),
            action_type: ActionType::Create,
            description: format!("create {} {}", resource.resource_type, resource.id),
            resource,
        }
    }

    pub fn no_op(resource: ResourceConfig) -> Self {
        Self {
            id: format!("noop-{}", resource.key()),
            action_type: ActionType::NoOp,
            description: format!("{} {} already exists", resource.resource_type, resource.id),
            resource,
        }
    }
}

/// Type of action to perform
///
/// Provisioning is additive: a deployment creates what is missing and leaves
/// everything else untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Resource already exists
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of applying a plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Applied actions, in plan order
    pub succeeded: Vec<ActionResult>,

    /// Resulting state of every resource in the plan, keyed by `type:id`
    pub resources: BTreeMap<String, ResourceState>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_success(&mut self, action_id: String, message: String) {
        self.succeeded.push(ActionResult { action_id, message });
    }

    pub fn record(&mut self, key: String, state: ResourceState) {
        self.resources.insert(key, state);
    }

    /// Look up the resulting state of a resource by type and id
    pub fn resource(&self, resource_type: &str, id: &str) -> Option<&ResourceState> {
        self.resources.get(&format!("{}:{}", resource_type, id))
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// ID of the action
    pub action_id: String,

    /// Success message
    pub message: String,
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} unchanged",
            self.create, self.no_change
        )
    }
}

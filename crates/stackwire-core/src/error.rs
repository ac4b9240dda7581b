//! Composition error types

use crate::graph::{ComponentId, OutputRef};
use stackwire_cloud::CloudError;
use thiserror::Error;

/// Errors in the declared component graph.
///
/// All of these are detected while the composition plan is built, before
/// any request reaches the provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Component '{0}' is declared more than once")]
    DuplicateComponent(ComponentId),

    #[error("Component '{component}' references unknown output '{reference}'")]
    UnknownOutput {
        component: ComponentId,
        reference: OutputRef,
    },

    #[error("Dependency cycle detected: {}", format_path(.path))]
    DependencyCycle { path: Vec<ComponentId> },

    #[error(
        "Component '{component}' needs '{producer}.{output}', but '{producer}' has not been instantiated yet"
    )]
    UnresolvedReference {
        component: ComponentId,
        producer: ComponentId,
        output: &'static str,
    },

    #[error("Component '{component}' reads from '{producer}' without declaring it as an input")]
    UndeclaredInput {
        component: ComponentId,
        producer: ComponentId,
    },

    #[error("No component produces deployment output '{0}'")]
    MissingDeploymentOutput(OutputRef),

    #[error("Instantiation order does not match the declared components: {0}")]
    SequenceMismatch(String),
}

fn format_path(path: &[ComponentId]) -> String {
    path.iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Terminal error of a composition run
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Component '{component}' was rejected by the provider: {source}")]
    Provider {
        component: ComponentId,
        #[source]
        source: CloudError,
    },

    #[error(
        "Component '{component}' is missing runtime configuration: {}",
        .missing.join(", ")
    )]
    Configuration {
        component: ComponentId,
        missing: Vec<String>,
    },

    #[error("Component '{component}' has an invalid definition: {message}")]
    Definition {
        component: ComponentId,
        message: String,
    },
}

impl ComposeError {
    pub fn provider(component: ComponentId, source: CloudError) -> Self {
        Self::Provider { component, source }
    }

    pub fn definition(component: ComponentId, message: impl Into<String>) -> Self {
        Self::Definition {
            component,
            message: message.into(),
        }
    }

    /// The component the failure is attributed to, if any
    pub fn component(&self) -> Option<ComponentId> {
        match self {
            ComposeError::Graph(GraphError::DuplicateComponent(c)) => Some(*c),
            ComposeError::Graph(GraphError::UnknownOutput { component, .. })
            | ComposeError::Graph(GraphError::UnresolvedReference { component, .. })
            | ComposeError::Graph(GraphError::UndeclaredInput { component, .. }) => {
                Some(*component)
            }
            ComposeError::Graph(_) => None,
            ComposeError::Provider { component, .. }
            | ComposeError::Configuration { component, .. }
            | ComposeError::Definition { component, .. } => Some(*component),
        }
    }

    pub fn is_graph_error(&self) -> bool {
        matches!(self, ComposeError::Graph(_))
    }
}

pub type Result<T> = std::result::Result<T, ComposeError>;

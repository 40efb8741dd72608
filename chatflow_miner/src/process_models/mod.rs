//! Process Models
//!
//! Pluggable discovery strategies ([`ProcessModel`]) turning an event table into a
//! [`ModelArtifact`], lazy cached [`ProcessModelView`]s over an [`EventLogView`](crate::event_log::EventLogView),
//! and the named [`ProcessModelRegistry`] cataloging them.
use std::{
    fmt::{Debug, Display},
    rc::Rc,
};

use serde::{Deserialize, Serialize};

use crate::{
    filters::FilterError,
    table::{EventTable, MissingColumnsError},
};

mod dfg;
/// DOT (Graphviz) rendering of discovered models
pub mod image_export;
mod model_registry;
mod performance_dfg;
/// Quality metrics of directly-follows models
pub mod quality;
mod view;

#[doc(inline)]
pub use dfg::{DFGModel, DirectlyFollowsGraph};
#[doc(inline)]
pub use model_registry::{
    BatchResult, ErrorPolicy, FrozenRegistry, MissingPolicy, ProcessModelRegistry, RegistryEntry,
    RegistryError,
};
#[doc(inline)]
pub use performance_dfg::{PerformanceDFGModel, PerformanceDirectlyFollowsGraph};
#[doc(inline)]
pub use quality::QualityMetrics;
#[doc(inline)]
pub use view::ProcessModelView;

///
/// Errors of process model discovery, rendering and evaluation
///
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The event table lacks columns required by the model
    MissingColumns(MissingColumnsError),
    /// Computing the filtered event table failed
    Filter(FilterError),
    /// The artifact passed to a model was produced by a different kind of model
    ArtifactMismatch {
        /// Name of the model the artifact was passed to
        model: String,
        /// Kind of the artifact that was passed
        found: &'static str,
    },
    /// No model is known under the requested name
    UnknownModel(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::MissingColumns(e) => write!(f, "{e}"),
            ModelError::Filter(e) => write!(f, "Could not compute event log: {e}"),
            ModelError::ArtifactMismatch { model, found } => {
                write!(f, "Model '{model}' cannot handle artifacts of kind '{found}'")
            }
            ModelError::UnknownModel(name) => write!(f, "Unknown process model: {name}"),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::MissingColumns(e) => Some(e),
            ModelError::Filter(e) => Some(e),
            ModelError::ArtifactMismatch { .. } | ModelError::UnknownModel(_) => None,
        }
    }
}

impl From<MissingColumnsError> for ModelError {
    fn from(e: MissingColumnsError) -> Self {
        Self::MissingColumns(e)
    }
}

impl From<FilterError> for ModelError {
    fn from(e: FilterError) -> Self {
        Self::Filter(e)
    }
}

///
/// Result of a model discovery
///
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Frequency annotated directly-follows graph
    Dfg(DirectlyFollowsGraph),
    /// Directly-follows graph annotated with mean waiting and sojourn times
    PerformanceDfg(PerformanceDirectlyFollowsGraph),
}

impl ModelArtifact {
    /// Short name of the artifact kind
    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::Dfg(_) => "dfg",
            ModelArtifact::PerformanceDfg(_) => "performance_dfg",
        }
    }

    /// The frequency directly-follows graph underlying this artifact
    pub fn dfg(&self) -> &DirectlyFollowsGraph {
        match self {
            ModelArtifact::Dfg(dfg) => dfg,
            ModelArtifact::PerformanceDfg(perf) => &perf.frequencies,
        }
    }

    /// Try to get the performance annotations (only set for [`ModelArtifact::PerformanceDfg`])
    pub fn try_as_performance_dfg(&self) -> Option<&PerformanceDirectlyFollowsGraph> {
        match self {
            ModelArtifact::PerformanceDfg(perf) => Some(perf),
            ModelArtifact::Dfg(_) => None,
        }
    }
}

impl From<DirectlyFollowsGraph> for ModelArtifact {
    fn from(value: DirectlyFollowsGraph) -> Self {
        Self::Dfg(value)
    }
}

impl From<PerformanceDirectlyFollowsGraph> for ModelArtifact {
    fn from(value: PerformanceDirectlyFollowsGraph) -> Self {
        Self::PerformanceDfg(value)
    }
}

///
/// Rendering options for [`ProcessModel::to_graphviz`]
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphvizOptions {
    /// Background color of the graph
    pub bgcolor: String,
    /// Layout direction (e.g., `LR` or `TB`)
    pub rankdir: String,
    /// Maximum number of arcs to render; the most frequent arcs are kept
    pub max_num_edges: usize,
}

impl Default for GraphvizOptions {
    fn default() -> Self {
        Self {
            bgcolor: "white".to_string(),
            rankdir: "LR".to_string(),
            max_num_edges: usize::MAX,
        }
    }
}

///
/// Strategy for discovering, rendering and evaluating a process model
///
/// Implementations are stateless: every call only depends on its arguments.
pub trait ProcessModel: Debug {
    /// Name of the model (e.g., used in log messages and errors)
    fn name(&self) -> &str;

    /// Discover a model artifact from an event table
    fn compute(&self, table: &EventTable) -> Result<ModelArtifact, ModelError>;

    /// Render an artifact as DOT source
    fn to_graphviz(
        &self,
        artifact: &ModelArtifact,
        options: &GraphvizOptions,
    ) -> Result<String, ModelError>;

    /// Evaluate an artifact against an event table
    fn quality_metrics(
        &self,
        table: &EventTable,
        artifact: &ModelArtifact,
    ) -> Result<QualityMetrics, ModelError>;
}

/// Names accepted by [`model_by_name`]
pub const MODEL_NAMES: [&str; 2] = ["dfg", "performance_dfg"];

///
/// Look up a built-in model strategy by name (case-insensitive, `-` and `_` are equivalent)
///
pub fn model_by_name(name: &str) -> Result<Rc<dyn ProcessModel>, ModelError> {
    match name.trim().to_lowercase().replace('-', "_").as_str() {
        "dfg" => Ok(Rc::new(DFGModel)),
        "performance_dfg" => Ok(Rc::new(PerformanceDFGModel)),
        _ => Err(ModelError::UnknownModel(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn models_by_name() {
        for name in MODEL_NAMES {
            assert_eq!(model_by_name(name).unwrap().name(), name);
        }
        assert_eq!(model_by_name(" Performance-DFG").unwrap().name(), "performance_dfg");
        assert!(matches!(model_by_name("petri_net"), Err(ModelError::UnknownModel(_))));
    }
}

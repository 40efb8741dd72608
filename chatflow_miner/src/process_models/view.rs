use std::{
    cell::{OnceCell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use crate::event_log::EventLogView;

use super::{GraphvizOptions, ModelArtifact, ModelError, ProcessModel, QualityMetrics};

///
/// Lazy process model over an [`EventLogView`]
///
/// The model artifact is discovered on first use and cached afterwards; renderings are cached
/// per [`GraphvizOptions`] and quality metrics once. Errors are not cached.
///
/// ```rust
/// use chatflow_miner::{
///     event_log::EventLogView,
///     event_table,
///     process_models::{DFGModel, GraphvizOptions, ProcessModelView},
/// };
///
/// let log = EventLogView::new(event_table!(
///     ["CASE_ID", "ACTIVITY", "START_TIMESTAMP"];
///     ["c1", "greet", "2024-01-01 10:00:00"],
///     ["c1", "answer", "2024-01-01 10:01:00"],
/// ));
/// let view = ProcessModelView::new(log, DFGModel);
/// assert_eq!(view.compute().unwrap().dfg().activities.len(), 2);
/// assert!(view.to_graphviz(&GraphvizOptions::default()).unwrap().contains("digraph"));
/// ```
#[derive(Debug, Clone)]
pub struct ProcessModelView {
    log_view: EventLogView,
    model: Rc<dyn ProcessModel>,
    artifact: OnceCell<ModelArtifact>,
    graphviz: RefCell<HashMap<GraphvizOptions, String>>,
    quality: OnceCell<QualityMetrics>,
}

impl ProcessModelView {
    /// Create a new view discovering `model` from `log_view`
    pub fn new(log_view: EventLogView, model: impl ProcessModel + 'static) -> Self {
        Self::with_shared_model(log_view, Rc::new(model))
    }

    /// Create a new view using an already shared model strategy
    pub fn with_shared_model(log_view: EventLogView, model: Rc<dyn ProcessModel>) -> Self {
        Self {
            log_view,
            model,
            artifact: OnceCell::new(),
            graphviz: RefCell::new(HashMap::new()),
            quality: OnceCell::new(),
        }
    }

    /// The underlying event log view
    pub fn log_view(&self) -> &EventLogView {
        &self.log_view
    }

    /// The model strategy
    pub fn model(&self) -> &dyn ProcessModel {
        self.model.as_ref()
    }

    /// Whether the artifact was already discovered
    pub fn is_computed(&self) -> bool {
        self.artifact.get().is_some()
    }

    ///
    /// Discover (or return the cached) model artifact
    ///
    pub fn compute(&self) -> Result<&ModelArtifact, ModelError> {
        if let Some(artifact) = self.artifact.get() {
            return Ok(artifact);
        }
        let table = self.log_view.compute()?;
        let artifact = self.model.compute(&table)?;
        tracing::debug!(
            model = self.model.name(),
            kind = artifact.kind(),
            events = table.len(),
            "Discovered process model"
        );
        Ok(self.artifact.get_or_init(|| artifact))
    }

    ///
    /// Render the model as DOT source (cached per `options`)
    ///
    pub fn to_graphviz(&self, options: &GraphvizOptions) -> Result<String, ModelError> {
        if let Some(dot) = self.graphviz.borrow().get(options) {
            return Ok(dot.clone());
        }
        let dot = self.model.to_graphviz(self.compute()?, options)?;
        self.graphviz
            .borrow_mut()
            .insert(options.clone(), dot.clone());
        Ok(dot)
    }

    ///
    /// Evaluate the model against the (filtered) event log (cached)
    ///
    pub fn quality_metrics(&self) -> Result<QualityMetrics, ModelError> {
        if let Some(metrics) = self.quality.get() {
            return Ok(*metrics);
        }
        let artifact = self.compute()?;
        let table = self.log_view.compute()?;
        let metrics = self.model.quality_metrics(&table, artifact)?;
        Ok(*self.quality.get_or_init(|| metrics))
    }
}

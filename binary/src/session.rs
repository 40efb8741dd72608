//! Batch sessions described by a JSON configuration
//!
//! ```json
//! {
//!   "input": "chats.csv",
//!   "filters": [{ "type": "agent", "agent": "ai" }],
//!   "aggregation": { "type": "variant", "args": { "ignore_syst": true } },
//!   "models": [
//!     { "name": "Overview", "model": "dfg" },
//!     { "name": "Escalations", "model": "performance_dfg",
//!       "filters": [{ "type": "case_has_activity", "activity": "escalate" }] }
//!   ],
//!   "graphviz": { "rankdir": "TB" },
//!   "on_error": "none"
//! }
//! ```
use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

use chatflow_miner::{
    constants::NEW_MODEL_PLACEHOLDER,
    filters::FilterSpec,
    process_models::{
        model_by_name, BatchResult, ErrorPolicy, GraphvizOptions, ProcessModelRegistry, ProcessModelView,
        QualityMetrics,
    },
    table::io::CsvLoadOptions,
};
use serde::{Deserialize, Serialize};

use crate::{
    commands::{aggregate, build_filters, load_log},
    error::CliError,
};

fn default_model() -> String {
    "dfg".to_string()
}

///
/// A named process model of a session
///
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEntryConfig {
    /// Registry name of the model
    pub name: String,
    /// Discovery strategy (default: `dfg`)
    #[serde(default = "default_model")]
    pub model: String,
    /// Additional filters, applied on top of the session filters
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

///
/// Configuration of a session
///
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Event table to load (may be overridden on the command line)
    pub input: Option<PathBuf>,
    /// CSV loading options
    pub csv: CsvLoadOptions,
    /// Filters applied to every computation of the session
    pub filters: Vec<FilterSpec>,
    /// Normalize timestamps before aggregating
    pub normalize_timestamps: bool,
    /// Declarative aggregator specification (`{"type": ..., "args": {...}}`)
    pub aggregation: Option<serde_json::Value>,
    /// Process models to catalog
    pub models: Vec<ModelEntryConfig>,
    /// Rendering options for all models
    pub graphviz: GraphvizOptions,
    /// How failing models are reported
    pub on_error: ErrorPolicy,
}

/// Output of one model of a session
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub name: String,
    pub dot: Option<String>,
    pub quality: Option<QualityMetrics>,
}

/// Output of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub events: usize,
    pub cases: usize,
    pub aggregation: Option<serde_json::Value>,
    pub models: Vec<ModelReport>,
}

///
/// Catalog the configured models, starting from a registry holding only the placeholder entry
///
pub fn build_registry(
    config: &SessionConfig,
    log: &chatflow_miner::EventLogView,
) -> Result<ProcessModelRegistry, CliError> {
    let mut registry = ProcessModelRegistry::with_placeholder();
    for entry in &config.models {
        let view = ProcessModelView::with_shared_model(
            log.filter_all(build_filters(&entry.filters)?),
            model_by_name(&entry.model)?,
        );
        registry.add(&entry.name, Some(Rc::new(view)), false)?;
    }
    Ok(registry)
}

///
/// Run a session: load and filter the event table, aggregate, and discover, render and
/// evaluate every configured model
///
/// `input` takes precedence over the input of the configuration. If `dot_dir` is given, every
/// rendered model is also written to `<dot_dir>/<name>.dot`.
pub fn run_session(
    config: &SessionConfig,
    input: Option<&Path>,
    dot_dir: Option<&Path>,
) -> Result<SessionReport, CliError> {
    let input = input.or(config.input.as_deref()).ok_or_else(|| {
        CliError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no input file given (neither in the configuration nor on the command line)",
        ))
    })?;
    let log = load_log(input, &config.csv, &config.filters)?;

    let aggregation = config
        .aggregation
        .as_ref()
        .map(|spec| aggregate(&log, spec, config.normalize_timestamps))
        .transpose()?;

    let registry = build_registry(config, &log)?;
    let names: Vec<&str> = registry
        .names()
        .filter(|name| *name != NEW_MODEL_PLACEHOLDER)
        .collect();
    let mut dots =
        registry.to_graphviz_map(Some(names.as_slice()), config.on_error, &config.graphviz)?;
    let mut qualities = registry.quality_map(Some(names.as_slice()), config.on_error)?;

    let mut models = Vec::with_capacity(names.len());
    for name in &names {
        let dot = take_result(&mut dots, name);
        let quality = take_result(&mut qualities, name);
        if let (Some(dir), Some(dot)) = (dot_dir, &dot) {
            let path = dir.join(format!("{}.dot", file_stem(name)));
            std::fs::write(&path, dot)?;
            tracing::info!(model = name, path = %path.display(), "Wrote DOT file");
        }
        models.push(ModelReport {
            name: name.to_string(),
            dot,
            quality,
        });
    }

    Ok(SessionReport {
        events: log.num_events()?,
        cases: log.num_cases()?,
        aggregation,
        models,
    })
}

fn take_result<T>(results: &mut BatchResult<T>, name: &str) -> Option<T> {
    let i = results.iter().position(|(n, _)| n == name)?;
    results.remove(i).1
}

/// File name for a model name (alphanumerics, `-` and `_` kept, everything else replaced)
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

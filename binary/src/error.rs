use std::fmt::Display;

use chatflow_miner::{
    aggregations::AggregationError,
    event_log::ViewExportError,
    filters::FilterError,
    process_models::{ModelError, RegistryError},
    table::io::TableIOError,
};

///
/// Errors surfaced by the command line interface
///
#[derive(Debug)]
pub enum CliError {
    /// Reading or writing a file failed
    Io(std::io::Error),
    /// A JSON document (configuration, specification) is malformed
    Json(serde_json::Error),
    /// Loading the event table failed
    Load(TableIOError),
    /// Building or applying filters failed
    Filter(FilterError),
    /// Running an aggregation failed
    Aggregation(AggregationError),
    /// Discovering, rendering or evaluating a model failed
    Model(ModelError),
    /// Cataloging models failed
    Registry(RegistryError),
    /// Exporting a view failed
    Export(ViewExportError),
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "IO Error: {e}"),
            CliError::Json(e) => write!(f, "Invalid JSON: {e}"),
            CliError::Load(e) => write!(f, "Could not load event table: {e}"),
            CliError::Filter(e) => write!(f, "Filter error: {e}"),
            CliError::Aggregation(e) => write!(f, "Aggregation error: {e}"),
            CliError::Model(e) => write!(f, "Process model error: {e}"),
            CliError::Registry(e) => write!(f, "Model registry error: {e}"),
            CliError::Export(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Load(e) => Some(e),
            CliError::Filter(e) => Some(e),
            CliError::Aggregation(e) => Some(e),
            CliError::Model(e) => Some(e),
            CliError::Registry(e) => Some(e),
            CliError::Export(e) => Some(e),
        }
    }
}

macro_rules! cli_error_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for CliError {
                fn from(e: $source) -> Self {
                    Self::$variant(e)
                }
            }
        )*
    };
}

cli_error_from!(
    std::io::Error => Io,
    serde_json::Error => Json,
    TableIOError => Load,
    FilterError => Filter,
    AggregationError => Aggregation,
    ModelError => Model,
    RegistryError => Registry,
    ViewExportError => Export,
);

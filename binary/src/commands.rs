use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

use chatflow_miner::{
    aggregations::{build_aggregator_from_spec, CaseAggView, NormalizeTimestampsOp},
    event_log::EventLogView,
    filters::{Filter, FilterSpec},
    process_models::{model_by_name, GraphvizOptions, ProcessModelView},
    table::io::{import_event_table_csv_path, CsvLoadOptions},
};
use clap::{Args, ValueEnum};

use crate::error::CliError;

/// Event table input shared by all subcommands
#[derive(Debug, Args)]
pub struct InputArgs {
    /// CSV file with (at least) CASE_ID, ACTIVITY, START_TIMESTAMP and END_TIMESTAMP columns
    pub input: PathBuf,
    /// Field delimiter of the CSV file
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,
    /// Date format to try first when parsing timestamps (chrono syntax)
    #[arg(long)]
    pub date_format: Option<String>,
    /// JSON file holding a list of filter specifications
    #[arg(long)]
    pub filters: Option<PathBuf>,
}

/// What `discover` prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiscoverOutput {
    /// DOT source of the rendered model
    Dot,
    /// Quality metrics as JSON
    Quality,
    /// The model artifact as JSON
    Json,
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub fn build_filters(specs: &[FilterSpec]) -> Result<Vec<Filter>, CliError> {
    Ok(specs.iter().map(FilterSpec::build).collect::<Result<_, _>>()?)
}

pub fn load_log(
    path: &Path,
    options: &CsvLoadOptions,
    filters: &[FilterSpec],
) -> Result<EventLogView, CliError> {
    let table = import_event_table_csv_path(path, options)?;
    tracing::info!(path = %path.display(), events = table.len(), "Loaded event table");
    Ok(EventLogView::new(table).filter_all(build_filters(filters)?))
}

impl InputArgs {
    pub fn load(&self) -> Result<EventLogView, CliError> {
        let options = CsvLoadOptions {
            delimiter: self.delimiter,
            date_format: self.date_format.clone(),
            ..Default::default()
        };
        let specs: Vec<FilterSpec> = match &self.filters {
            Some(path) => read_json(path)?,
            None => Vec::new(),
        };
        load_log(&self.input, &options, &specs)
    }
}

/// Run a declarative aggregation over the (filtered) log
pub fn aggregate(
    log: &EventLogView,
    spec: &serde_json::Value,
    normalize: bool,
) -> Result<serde_json::Value, CliError> {
    let aggregator = build_aggregator_from_spec(spec)?;
    let mut view = CaseAggView::new(log.compute()?);
    if normalize {
        view = view.with_aux(NormalizeTimestampsOp);
    }
    let result = view.with_aggregator(aggregator).compute()?;
    Ok(serde_json::to_value(&result)?)
}

/// Discover a model from the (filtered) log and render the requested output
pub fn discover(
    log: EventLogView,
    model: &str,
    output: DiscoverOutput,
    options: &GraphvizOptions,
) -> Result<String, CliError> {
    let view = ProcessModelView::with_shared_model(log, model_by_name(model)?);
    Ok(match output {
        DiscoverOutput::Dot => view.to_graphviz(options)?,
        DiscoverOutput::Quality => serde_json::to_string_pretty(&view.quality_metrics()?)?,
        DiscoverOutput::Json => serde_json::to_string_pretty(view.compute()?)?,
    })
}

/// Write the (filtered) log as CSV to `output` (or stdout)
pub fn export(log: &EventLogView, output: Option<&Path>) -> Result<(), CliError> {
    match output {
        Some(path) => log.to_csv(path)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            log.write_csv(&mut stdout)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::chat_log_path;

    fn args(filters: Option<PathBuf>) -> InputArgs {
        InputArgs {
            input: chat_log_path(),
            delimiter: ',',
            date_format: None,
            filters,
        }
    }

    #[test]
    fn aggregate_variants() {
        let log = args(None).load().unwrap();
        let result = aggregate(&log, &serde_json::json!({"type": "variant"}), true).unwrap();
        let cases = result.as_object().unwrap();
        assert_eq!(cases.len(), 4);
        assert!(cases["conv-1"]["variant"].as_str().unwrap().starts_with("session_start>greet"));
    }

    #[test]
    fn discover_with_filter_file() {
        let dir = tempfile::tempdir().unwrap();
        let filters = dir.path().join("filters.json");
        std::fs::write(
            &filters,
            r#"[{"type": "case", "case_ids": ["conv-1"]}]"#,
        )
        .unwrap();
        let log = args(Some(filters)).load().unwrap();
        assert_eq!(log.num_cases().unwrap(), 1);

        let dot = discover(log.clone(), "dfg", DiscoverOutput::Dot, &GraphvizOptions::default())
            .unwrap();
        assert!(dot.contains("digraph"));
        let quality: serde_json::Value = serde_json::from_str(
            &discover(log, "dfg", DiscoverOutput::Quality, &GraphvizOptions::default()).unwrap(),
        )
        .unwrap();
        assert_eq!(quality["fitness"], 1.0);
    }

    #[test]
    fn unknown_model_is_reported() {
        let log = args(None).load().unwrap();
        let err = discover(log, "inductive", DiscoverOutput::Dot, &GraphvizOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("inductive"));
    }

    #[test]
    fn export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.csv");
        export(&args(None).load().unwrap(), Some(&out)).unwrap();
        let written = std::fs::read_to_string(out).unwrap();
        assert!(written.starts_with("CASE_ID,ACTIVITY"));
    }
}

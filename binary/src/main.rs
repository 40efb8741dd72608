//! Command line interface of `chatflow_miner`
use std::{path::PathBuf, process::ExitCode};

use chatflow_miner::process_models::{GraphvizOptions, MODEL_NAMES};
use clap::{Parser, Subcommand};

mod commands;
mod error;
mod logging;
mod session;

use commands::{DiscoverOutput, InputArgs};
use error::CliError;

#[derive(Debug, Parser)]
#[command(
    name = "chatflow-miner",
    about = "Filter, aggregate and mine process models from chatbot event logs",
    version
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute one value per case (variant, case_date or case_duration) and print it as JSON
    Aggregate {
        #[command(flatten)]
        input: InputArgs,
        /// Aggregator specification, e.g. '{"type": "variant", "args": {"ignore_syst": true}}'
        #[arg(long, default_value = r#"{"type": "variant"}"#)]
        spec: String,
        /// Normalize start/end timestamps before aggregating
        #[arg(long)]
        normalize: bool,
    },

    /// Discover a process model and print its DOT rendering, quality metrics or artifact
    Discover {
        #[command(flatten)]
        input: InputArgs,
        /// Discovery strategy
        #[arg(short, long, default_value = "dfg")]
        model: String,
        /// What to print
        #[arg(short, long, value_enum, default_value_t = DiscoverOutput::Dot)]
        output: DiscoverOutput,
        /// Layout direction of the rendering
        #[arg(long, default_value = "LR")]
        rankdir: String,
        /// Background color of the rendering
        #[arg(long, default_value = "white")]
        bgcolor: String,
        /// Only render the most frequent arcs
        #[arg(long)]
        max_edges: Option<usize>,
    },

    /// Write the filtered event log as CSV
    Export {
        #[command(flatten)]
        input: InputArgs,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a session described by a JSON configuration and print a JSON report
    Session {
        /// Session configuration file
        config: PathBuf,
        /// Event table (overrides the input of the configuration)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Directory to write one DOT file per model to
        #[arg(long)]
        dot_dir: Option<PathBuf>,
    },

    /// List the available discovery strategies
    Models,
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Aggregate {
            input,
            spec,
            normalize,
        } => {
            let spec: serde_json::Value = serde_json::from_str(&spec)?;
            let result = commands::aggregate(&input.load()?, &spec, normalize)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Discover {
            input,
            model,
            output,
            rankdir,
            bgcolor,
            max_edges,
        } => {
            let options = GraphvizOptions {
                bgcolor,
                rankdir,
                max_num_edges: max_edges.unwrap_or(usize::MAX),
            };
            println!(
                "{}",
                commands::discover(input.load()?, &model, output, &options)?
            );
        }
        Commands::Export { input, output } => {
            commands::export(&input.load()?, output.as_deref())?;
        }
        Commands::Session {
            config,
            input,
            dot_dir,
        } => {
            let config: session::SessionConfig = commands::read_json(&config)?;
            let report = session::run_session(&config, input.as_deref(), dot_dir.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Models => {
            for name in MODEL_NAMES {
                println!("{name}");
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.debug);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drill_anomaly_engine::{self as engine, BatchRequest, EngineConfig, Record};

#[derive(Parser, Debug)]
#[command(
    name = "drillctl",
    about = "Deterministic anomaly-detection fixture harness for the drilling telemetry engine"
)]
struct Cli {
    /// Override path to an EngineConfig JSON file (defaults to built-in config)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the batch orchestrator over a JSON fixture of records
    Batch {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long, default_value = "z_score")]
        method: String,
        #[arg(long)]
        window: Option<usize>,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Replay a JSON fixture through the stream orchestrator in an
    /// accelerated (no-sleep) variant, printing one frame per line
    Stream {
        #[arg(long)]
        fixture: PathBuf,
    },
}

fn main() -> ExitCode {
    engine::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .map(EngineConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Batch {
            fixture,
            method,
            window,
            threshold,
        } => run_batch(&config, &fixture, &method, window, threshold),
        Commands::Stream { fixture } => run_stream(&config, &fixture),
    }
}

fn load_records(path: &PathBuf) -> Result<Vec<Record>> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading fixture {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing fixture {}", path.display()))
}

fn run_batch(
    config: &EngineConfig,
    fixture: &PathBuf,
    method: &str,
    window: Option<usize>,
    threshold: Option<f64>,
) -> Result<ExitCode> {
    let records = load_records(fixture)?;
    let request = BatchRequest {
        method,
        window,
        threshold,
        records: &records,
    };

    let runtime = tokio::runtime::Runtime::new().context("building tokio runtime")?;
    let response = runtime
        .block_on(engine::run_batch(request, config))
        .map_err(|err| anyhow::anyhow!("{err}"))?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(ExitCode::from(0))
}

fn run_stream(config: &EngineConfig, fixture: &PathBuf) -> Result<ExitCode> {
    let records = load_records(fixture)?;

    let mut accelerated = config.clone();
    accelerated.stream.emission_pause_min = std::time::Duration::from_millis(0);
    accelerated.stream.emission_pause_max = std::time::Duration::from_millis(1);

    let runtime = tokio::runtime::Runtime::new().context("building tokio runtime")?;
    runtime.block_on(async move {
        let (_control_tx, control_rx) = tokio::sync::mpsc::channel(4);
        let (outbound_tx, mut outbound_rx) = tokio::sync::mpsc::channel(records.len().max(1));

        let total = records.len();
        let producer = tokio::spawn(async move {
            engine::run_stream(&records, control_rx, outbound_tx, &accelerated).await;
        });

        for _ in 0..total {
            if let Some(frame) = outbound_rx.recv().await {
                println!("{}", serde_json::to_string(&frame)?);
            }
        }
        producer.abort();
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(ExitCode::from(0))
}

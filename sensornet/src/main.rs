use anyhow::Context;
use clap::{Parser, Subcommand};
use sensornet::generator::{reference_layout, ScenarioConfig};
use sensornet::workflow::{CollectorConfig, NodeConfig, Runner};
use sensornet::{collector, node};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use tdoacore::Point2;

#[derive(Parser)]
#[command(author, version, about = "Acoustic TDOA sensor network")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a sensor node: periodic detections plus the peer relay listener
    Node {
        /// Load the node config from YAML
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "ESP32_1")]
        id: String,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        y: f64,
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: SocketAddr,
        #[arg(long, default_value = "http://127.0.0.1:5000/data")]
        collector: String,
        #[arg(long, default_value = "http://127.0.0.1:8081/data")]
        peer: String,
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        delivery_timeout_ms: Option<u64>,
    },
    /// Run the collector that correlates detections and solves positions
    Collector {
        #[arg(long)]
        config: PathBuf,
    },
    /// Push synthetic events through a local aggregator and report the estimates
    Simulate {
        /// Collector config providing the sensor layout and solver settings
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 6.0, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, default_value_t = 10.0, allow_hyphen_values = true)]
        y: f64,
        #[arg(long, default_value_t = 1)]
        events: usize,
        /// Uniform timestamp jitter half-width, in seconds
        #[arg(long, default_value_t = 0.0)]
        jitter: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Append one line per estimate to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Node {
            config,
            id,
            x,
            y,
            listen,
            collector,
            peer,
            interval_ms,
            delivery_timeout_ms,
        } => {
            let mut node_config = match config {
                Some(path) => NodeConfig::load(path)?,
                None => NodeConfig::from_args(id, Point2::new(x, y), listen, collector, peer),
            };
            if let Some(interval_ms) = interval_ms {
                node_config.interval_ms = interval_ms;
            }
            if let Some(timeout_ms) = delivery_timeout_ms {
                node_config.delivery_timeout_ms = timeout_ms;
            }
            build_runtime()?.block_on(node::run_node(node_config))
        }
        Command::Collector { config } => {
            let collector_config = CollectorConfig::load(config)?;
            build_runtime()?.block_on(collector::run_collector(collector_config))
        }
        Command::Simulate {
            config,
            x,
            y,
            events,
            jitter,
            seed,
            report,
        } => {
            let collector_config = match config {
                Some(path) => CollectorConfig::load(path)?,
                None => CollectorConfig::with_nodes(reference_layout()),
            };
            let scenario = ScenarioConfig {
                source: Point2::new(x, y),
                speed_of_sound: collector_config.speed_of_sound,
                jitter,
                seed,
                events,
                ..Default::default()
            };
            simulate(collector_config, &scenario, report)
        }
    }
}

fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")
}

fn simulate(
    config: CollectorConfig,
    scenario: &ScenarioConfig,
    report_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let runner = Runner::new(config);
    let result = runner.execute(scenario)?;

    let mut lines = Vec::with_capacity(result.estimates.len());
    for estimate in &result.estimates {
        let error = estimate
            .error_m()
            .map(|e| format!("{:.4}", e))
            .unwrap_or_else(|| "n/a".to_string());
        lines.push(format!(
            "event={} truth=({:.3}, {:.3}) error_m={} {}",
            estimate.index,
            estimate.truth.x,
            estimate.truth.y,
            error,
            estimate.report.summary()
        ));
    }

    println!(
        "Simulation -> events {}, windows {}, located {}, incomplete {}, rejected reports {}",
        scenario.events,
        result.estimates.len(),
        result.located(),
        result.incomplete(),
        result.rejected_reports
    );
    let unreported = result.unreported_events(scenario.events);
    if !unreported.is_empty() {
        println!("events without any window: {:?}", unreported);
    }
    for line in &lines {
        println!("{}", line);
    }

    if let Some(path) = report_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening report file {}", path.display()))?;
        for line in &lines {
            writeln!(file, "{}", line)?;
        }
    }

    Ok(())
}

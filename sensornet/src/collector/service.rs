use crate::collector::endpoint::collector_routes;
use crate::workflow::config::CollectorConfig;
use anyhow::Context;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tdoacore::{DetectionAggregator, EstimateReport};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub type CollectorAggregator = DetectionAggregator<UnboundedSender<EstimateReport>>;

/// Running collector: HTTP endpoint, timeout sweeper and estimate sink.
pub struct CollectorHandle {
    pub addr: SocketAddr,
    pub aggregator: Arc<CollectorAggregator>,
    tasks: Vec<JoinHandle<()>>,
}

impl CollectorHandle {
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Starts every collector task on the current tokio runtime.
pub fn start_collector(config: &CollectorConfig) -> anyhow::Result<CollectorHandle> {
    let (sender, receiver) = mpsc::unbounded_channel();
    let aggregator = DetectionAggregator::new(config.to_aggregator_config(), sender)
        .context("building detection aggregator")?;
    let aggregator = Arc::new(aggregator);

    let (addr, server) = warp::serve(collector_routes(aggregator.clone()))
        .try_bind_ephemeral(config.listen)
        .with_context(|| format!("binding collector listener on {}", config.listen))?;
    info!("collector listening on {}", addr);

    let tasks = vec![
        tokio::spawn(server),
        tokio::spawn(sweep_windows(aggregator.clone(), config.sweep_interval())),
        tokio::spawn(drain_reports(receiver, config.report_path.clone())),
    ];

    Ok(CollectorHandle {
        addr,
        aggregator,
        tasks,
    })
}

pub async fn run_collector(config: CollectorConfig) -> anyhow::Result<()> {
    let handle = start_collector(&config)?;
    tokio::signal::ctrl_c()
        .await
        .context("awaiting Ctrl+C to exit")?;
    info!("collector shutting down");
    handle.shutdown();
    Ok(())
}

async fn sweep_windows(aggregator: Arc<CollectorAggregator>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let expired = aggregator.expire(Instant::now());
        if !expired.is_empty() {
            debug!("sweep discarded {} incomplete windows", expired.len());
        }
    }
}

async fn drain_reports(mut receiver: UnboundedReceiver<EstimateReport>, path: Option<PathBuf>) {
    let mut file = match path {
        Some(path) => match open_report_file(&path).await {
            Ok(file) => Some(file),
            Err(err) => {
                warn!("report file disabled: {:#}", err);
                None
            }
        },
        None => None,
    };

    while let Some(report) = receiver.recv().await {
        debug!("estimate sink: {}", report.summary());
        if let Some(out) = file.as_mut() {
            let line = format!("{}\n", report.summary());
            let written = match out.write_all(line.as_bytes()).await {
                Ok(()) => out.flush().await,
                Err(err) => Err(err),
            };
            if let Err(err) = written {
                warn!("failed to append estimate report: {}", err);
            }
        }
    }
}

async fn open_report_file(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("opening report file {}", path.display()))
}

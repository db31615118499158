use anyhow::{ensure, Context};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tdoacore::correlation::{AggregatorConfig, CorrelationConfig, LateReportPolicy};
use tdoacore::prelude::SPEED_OF_SOUND_AIR;
use tdoacore::{Point2, SensorNode, SolverConfig};

fn load_yaml<T: DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading {} config {}", what, path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("parsing {} config {}", what, path.display()))
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_delivery_timeout_ms() -> u64 {
    2_000
}

fn default_speed_of_sound() -> f64 {
    SPEED_OF_SOUND_AIR
}

fn default_sweep_interval_ms() -> u64 {
    250
}

/// Settings of one sensor node process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub position: Point2,
    /// Where the relay server listens for peer traffic.
    pub listen: SocketAddr,
    pub collector_url: String,
    /// Relay endpoint of the designated peer.
    pub peer_url: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

impl NodeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config: NodeConfig = load_yaml(path.as_ref(), "node")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_args(
        id: String,
        position: Point2,
        listen: SocketAddr,
        collector_url: String,
        peer_url: String,
    ) -> Self {
        Self {
            id,
            position,
            listen,
            collector_url,
            peer_url,
            interval_ms: default_interval_ms(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.id.trim().is_empty(), "node id must not be empty");
        ensure!(self.interval_ms > 0, "interval_ms must be positive");
        ensure!(
            self.delivery_timeout_ms > 0,
            "delivery_timeout_ms must be positive"
        );
        ensure!(
            self.collector_url != self.peer_url,
            "peer_url must differ from collector_url"
        );
        Ok(())
    }

    pub fn sensor_node(&self) -> SensorNode {
        SensorNode::new(self.id.clone(), self.position).with_peer(self.peer_url.clone())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

/// Correlation settings as written in the collector config.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    pub timeout_ms: u64,
    pub max_skew_s: f64,
    pub tombstone_retention_ms: u64,
    pub late_reports: LateReportPolicy,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        let defaults = CorrelationConfig::default();
        Self {
            timeout_ms: defaults.timeout.as_millis() as u64,
            max_skew_s: defaults.max_skew,
            tombstone_retention_ms: defaults.tombstone_retention.as_millis() as u64,
            late_reports: defaults.late_reports,
        }
    }
}

impl CorrelationSettings {
    pub fn to_correlation_config(&self) -> CorrelationConfig {
        CorrelationConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            max_skew: self.max_skew_s,
            tombstone_retention: Duration::from_millis(self.tombstone_retention_ms),
            late_reports: self.late_reports,
        }
    }
}

/// Settings of the collector process that owns the aggregator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub listen: SocketAddr,
    #[serde(default = "default_speed_of_sound")]
    pub speed_of_sound: f64,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub correlation: CorrelationSettings,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Optional file that receives one line per closed window.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    /// The three sensors, in solver order.
    pub nodes: Vec<SensorNode>,
}

impl CollectorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config: CollectorConfig = load_yaml(path.as_ref(), "collector")?;
        config.validate()?;
        Ok(config)
    }

    /// Default settings around a given sensor layout.
    pub fn with_nodes(nodes: Vec<SensorNode>) -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 5000)),
            speed_of_sound: default_speed_of_sound(),
            solver: SolverConfig::default(),
            correlation: CorrelationSettings::default(),
            sweep_interval_ms: default_sweep_interval_ms(),
            report_path: None,
            nodes,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.nodes.len() == 3,
            "collector needs exactly 3 sensor nodes, found {}",
            self.nodes.len()
        );
        ensure!(
            self.speed_of_sound > 0.0,
            "speed_of_sound must be positive"
        );
        ensure!(
            self.correlation.timeout_ms > 0,
            "correlation.timeout_ms must be positive"
        );
        ensure!(
            self.correlation.max_skew_s >= 0.0,
            "correlation.max_skew_s must not be negative"
        );
        ensure!(self.sweep_interval_ms > 0, "sweep_interval_ms must be positive");
        ensure!(
            self.solver.tolerance > 0.0 && self.solver.max_iterations > 0,
            "solver tolerance and max_iterations must be positive"
        );
        Ok(())
    }

    pub fn to_aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            nodes: self.nodes.clone(),
            speed_of_sound: self.speed_of_sound,
            solver: self.solver,
            correlation: self.correlation.to_correlation_config(),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn node_config_load_reads_yaml_with_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"id: ESP32_1\nposition: [9.0, 9.0]\nlisten: 0.0.0.0:8080\n\
collector_url: http://192.168.188.186:5000/data\npeer_url: http://192.168.188.123:8080/data\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = NodeConfig::load(&path).unwrap();
        assert_eq!(cfg.id, "ESP32_1");
        assert_eq!(cfg.position, Point2::new(9.0, 9.0));
        assert_eq!(cfg.interval(), Duration::from_secs(5));
        assert_eq!(cfg.delivery_timeout(), Duration::from_secs(2));
        assert_eq!(
            cfg.sensor_node().peer_address.as_deref(),
            Some("http://192.168.188.123:8080/data")
        );
    }

    #[test]
    fn node_config_rejects_peer_equal_to_collector() {
        let cfg = NodeConfig::from_args(
            "n".into(),
            Point2::default(),
            "127.0.0.1:8080".parse().unwrap(),
            "http://a/data".into(),
            "http://a/data".into(),
        );
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn collector_config_builds_aggregator_config() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"listen: 127.0.0.1:5000\n\
correlation:\n  timeout_ms: 1500\n  late_reports: open_new\n\
nodes:\n  - {id: A, position: [9, 9]}\n  - {id: B, position: [2, 10]}\n  - {id: C, position: [5, 11]}\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = CollectorConfig::load(&path).unwrap();
        let agg = cfg.to_aggregator_config();
        assert_eq!(agg.speed_of_sound, 343.0);
        assert_eq!(agg.correlation.timeout, Duration::from_millis(1500));
        assert_eq!(agg.correlation.max_skew, 0.5);
        assert_eq!(agg.correlation.late_reports, LateReportPolicy::OpenNew);
        assert_eq!(agg.solver, SolverConfig::default());
        assert_eq!(agg.nodes[1].position, Point2::new(2.0, 10.0));
    }

    #[test]
    fn shipped_configs_load() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config");
        let collector = CollectorConfig::load(root.join("collector.yaml")).unwrap();
        assert_eq!(collector.nodes.len(), 3);
        for node in &collector.nodes {
            let file = format!("node_{}.yaml", node.id.to_lowercase());
            let cfg = NodeConfig::load(root.join(file)).unwrap();
            assert_eq!(cfg.position, node.position);
        }
    }

    #[test]
    fn collector_config_requires_three_nodes() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"listen: 127.0.0.1:5000\nnodes:\n  - {id: A, position: [0, 0]}\n")
            .unwrap();
        let path = temp.into_temp_path();
        assert!(CollectorConfig::load(&path).is_err());
    }
}

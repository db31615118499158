pub mod config;
pub mod runner;

pub use config::{CollectorConfig, CorrelationSettings, NodeConfig};
pub use runner::{Runner, SimulatedEstimate, SimulationResult};

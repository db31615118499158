//! Network side of the acoustic sensor network.
//!
//! Sensor nodes push detection timestamps to the collector and fall back to a
//! single peer relay when the collector cannot be reached. The collector feeds
//! every detection into the `tdoacore` aggregator.

pub mod collector;
pub mod delivery;
pub mod generator;
pub mod node;
pub mod relay;
pub mod reply;
pub mod workflow;

pub use delivery::{DeliveryClient, DeliveryError, DeliveryOutcome, HttpTransport, Transport};
pub use workflow::{CollectorConfig, NodeConfig};

pub mod client;
pub mod transport;

pub use client::{DeliveryClient, DeliveryOutcome};
pub use transport::{DeliveryError, HttpTransport, Transport};

pub mod scenario;

pub use scenario::{build_events, reference_layout, ScenarioConfig, SyntheticEvent};

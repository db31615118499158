pub mod server;

pub use server::{relay_routes, spawn_relay_server};

//! Live bus tracking core: the WebWatch client and the route sync engine.

pub mod client;
pub mod config;
pub mod sync;

// Re-export transit from the transit crate
pub use bus_watch_transit as transit;

pub use client::WebWatchClient;
pub use config::{EngineConfig, RetryPolicy, WebWatchConfig};
pub use sync::{EngineEvent, EngineStatus, LastError, RouteSyncEngine, Snapshot};

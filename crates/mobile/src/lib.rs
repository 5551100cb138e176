mod callbacks;
mod error;
mod logging;
mod records;
mod session;

pub use callbacks::{LocationCallback, RouteStoreCallback, TrackerListener};
pub use error::TrackerError;
pub use records::*;
pub use session::{TrackerSession, default_region};

uniffi::setup_scaffolding!();

/// Install logging and the panic hook.
/// Call this once at startup from Kotlin/Swift
#[uniffi::export]
pub fn init_panic_handler() {
    logging::setup_logging();
}

//! Structured logging and Prometheus metrics (§4.9) for the Lore memory
//! service.

mod init;
mod metrics;
mod path;

pub use init::init_tracing;
pub use metrics::Metrics;
pub use path::normalize as normalize_path;

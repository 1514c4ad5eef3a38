//! Server health reporting.
//!
//! - [`status`] - [`StatusBoard`], the synchronized cell holding the latest
//!   serving status per service name.
//! - [`monitor`] - [`HealthMonitor`], the background heartbeat that keeps the
//!   board and the `grpc.health.v1` service up to date.

pub mod monitor;
pub mod status;

pub use monitor::HealthMonitor;
pub use status::{ServingStatus, StatusBoard};

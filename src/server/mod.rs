//! Operational surface of the upgrade operator
//!
//! Probe and metrics endpoints for Kubernetes, plus shutdown signalling
//! shared by the health server and the upgrade loop.

mod health;
pub mod metrics;
pub mod shutdown;

pub use health::{run_health_server, ReadinessState};
pub use metrics::{create_metrics, SharedMetrics, UpgradeMetrics};
pub use shutdown::{
    shutdown_channel, shutdown_on_signal, wait_for_signal, ShutdownController, ShutdownSignal,
};

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;

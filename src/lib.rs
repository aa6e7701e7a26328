//! Schema upgrades for stored Jaeger resources
//!
//! Instances record the operator version that last wrote them. On startup,
//! and then periodically, the operator walks every instance it owns through
//! the migrations registered after that version.

pub mod config;
pub mod crd;
pub mod options;
pub mod server;
pub mod upgrade;

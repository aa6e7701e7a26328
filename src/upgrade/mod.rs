//! Schema upgrades of stored Jaeger instances
//!
//! - `registry`: ordered chain of known schema versions
//! - `migrations`: the transform registered for each version
//! - `flags`: rename/drop and default-fill primitives used by transforms
//! - `store`: listing and persisting instances
//! - `orchestrator`: the fleet pass tying these together

pub mod flags;
pub mod migrations;
pub mod orchestrator;
pub mod registry;
pub mod store;

pub use migrations::{default_registry, MigrationError, MIGRATIONS};
pub use orchestrator::{
    migrate_instance, InstanceOutcome, Migrated, UpgradeError, UpgradeSummary, Upgrader,
};
pub use registry::{InvalidVersionError, MigrateFn, NodeRef, Registry, VersionNode};
pub use store::{JaegerStore, KubeJaegerStore, StoreError};

//! Registered schema migrations
//!
//! Each entry moves a stored instance from the previous registered version
//! to its own. Add new versions to [`MIGRATIONS`]; order does not matter.

use super::flags::{
    fill_if_absent, migrate_all_options, port_to_host_port, FlagMigration, SUPPRESS_DEFAULT,
};
use super::registry::{InvalidVersionError, MigrateFn, Registry};
use crate::crd::Jaeger;
use thiserror::Error;

/// A single migration step failed for one instance
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("flag {flag} has value {value:?} that cannot be migrated: {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },

    /// Structural transforms that do not fail on a single flag report here.
    /// The orchestrator treats both variants alike: the instance stalls at
    /// its last good version.
    #[error("migration failed: {0}")]
    Failed(String),
}

/// Every operator release an instance may have recorded, with the
/// transform that reaches it
///
/// Releases without schema changes map to `baseline`. They still need an
/// entry, since a recorded version missing from this table is never
/// migrated.
pub const MIGRATIONS: &[(&str, MigrateFn)] = &[
    ("1.11.0", baseline),
    ("1.12.0", baseline),
    ("1.12.1", baseline),
    ("1.13.0", baseline),
    ("1.13.1", baseline),
    ("1.14.0", baseline),
    ("1.15.0", upgrade_1_15_0),
    ("1.15.1", baseline),
    ("1.16.0", baseline),
    ("1.17.0", upgrade_1_17_0),
    ("1.17.1", baseline),
    ("1.18.0", upgrade_1_18_0),
    ("1.18.1", baseline),
    ("1.19.0", baseline),
    ("1.20.0", upgrade_1_20_0),
    ("1.21.0", baseline),
    ("1.21.1", baseline),
    ("1.21.2", baseline),
    ("1.21.3", baseline),
    ("1.22.0", upgrade_1_22_0),
];

/// Registry over [`MIGRATIONS`], built once at startup
pub fn default_registry() -> Result<Registry, InvalidVersionError> {
    Registry::build(MIGRATIONS.iter().copied())
}

/// Release without schema changes
fn baseline(jaeger: Jaeger) -> Result<Jaeger, MigrationError> {
    Ok(jaeger)
}

// Agent reporter flags moved under reporter.tchannel
const FLAGS_1_15_0: &[FlagMigration] = &[
    FlagMigration::rename("collector.host-port", "reporter.tchannel.host-port"),
    FlagMigration::rename(
        "discovery.conn-check-timeout",
        "reporter.tchannel.discovery.conn-check-timeout",
    ),
    FlagMigration::rename(
        "discovery.min-peers",
        "reporter.tchannel.discovery.min-peers",
    ),
    FlagMigration::rename("health-check-http-port", "admin-http-port"),
];

fn upgrade_1_15_0(mut jaeger: Jaeger) -> Result<Jaeger, MigrationError> {
    migrate_all_options(&mut jaeger, FLAGS_1_15_0)?;
    Ok(jaeger)
}

// TLS switches became explicit `.enabled` flags
const FLAGS_1_17_0: &[FlagMigration] = &[
    FlagMigration::rename("collector.grpc.tls", "collector.grpc.tls.enabled"),
    FlagMigration::rename("reporter.grpc.tls", "reporter.grpc.tls.enabled"),
    FlagMigration::rename("es.tls", "es.tls.enabled"),
    FlagMigration::rename("es-archive.tls", "es-archive.tls.enabled"),
    FlagMigration::drop("cassandra.connections-per-host-archive"),
];

fn upgrade_1_17_0(mut jaeger: Jaeger) -> Result<Jaeger, MigrationError> {
    migrate_all_options(&mut jaeger, FLAGS_1_17_0)?;
    Ok(jaeger)
}

// Port flags were replaced by listen addresses
const FLAGS_1_18_0: &[FlagMigration] = &[
    FlagMigration::rename("collector.grpc-port", "collector.grpc-server.host-port")
        .with_transform(port_to_host_port),
    FlagMigration::rename("collector.http-port", "collector.http-server.host-port")
        .with_transform(port_to_host_port),
    FlagMigration::rename("collector.zipkin.http-port", "collector.zipkin.host-port")
        .with_transform(port_to_host_port),
    FlagMigration::rename("admin-http-port", "admin.http.host-port")
        .with_transform(port_to_host_port),
    FlagMigration::rename("query.port", "query.http-server.host-port")
        .with_transform(port_to_host_port),
    FlagMigration::drop("collector.health-check-http-port"),
];

fn upgrade_1_18_0(mut jaeger: Jaeger) -> Result<Jaeger, MigrationError> {
    migrate_all_options(&mut jaeger, FLAGS_1_18_0)?;
    Ok(jaeger)
}

/// Keep the OAuth proxy of older instances without an access review
///
/// From this version on the defaults pass injects a namespace-scoped SAR
/// when the field is absent, which would lock out users of existing
/// deployments.
fn upgrade_1_20_0(mut jaeger: Jaeger) -> Result<Jaeger, MigrationError> {
    fill_if_absent(&mut jaeger.spec.ingress.openshift.sar, SUPPRESS_DEFAULT);
    Ok(jaeger)
}

const FLAGS_1_22_0: &[FlagMigration] = &[
    FlagMigration::rename("es.max-num-spans", "es.max-doc-count"),
    FlagMigration::rename("es-archive.max-num-spans", "es-archive.max-doc-count"),
];

fn upgrade_1_22_0(mut jaeger: Jaeger) -> Result<Jaeger, MigrationError> {
    migrate_all_options(&mut jaeger, FLAGS_1_22_0)?;
    Ok(jaeger)
}

#[cfg(test)]
#[path = "migrations_test.rs"]
mod tests;

use super::migrations::MigrationError;
use super::registry::Registry;
use super::store::{JaegerStore, StoreError};
use crate::crd::Jaeger;
use crate::server::{SharedMetrics, ShutdownSignal};
use futures::StreamExt;
use kube::ResourceExt;
use semver::Version;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("failed to list Jaeger instances: {0}")]
    List(#[source] StoreError),
}

/// A migration step that did not complete
#[derive(Debug)]
pub struct StepFailure {
    /// Version the failed step would have reached
    pub target: Version,
    pub error: MigrationError,
}

/// Result of walking one instance through the chain
#[derive(Debug)]
pub struct Migrated {
    /// State after the last successful step
    pub jaeger: Jaeger,
    pub failure: Option<StepFailure>,
}

/// What happened to one instance during a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceOutcome {
    /// Managed by another operator deployment
    Skipped,
    /// Already at the latest version, or at an unknown one
    Unchanged,
    Upgraded,
    /// A step failed; earlier steps were kept
    Stalled,
    /// The write-back failed and is left to the next pass
    PersistFailed,
}

impl InstanceOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            InstanceOutcome::Skipped => "skipped",
            InstanceOutcome::Unchanged => "unchanged",
            InstanceOutcome::Upgraded => "upgraded",
            InstanceOutcome::Stalled => "stalled",
            InstanceOutcome::PersistFailed => "persist_failed",
        }
    }
}

/// Counts for one fleet pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpgradeSummary {
    pub listed: usize,
    pub skipped: usize,
    pub unchanged: usize,
    pub upgraded: usize,
    pub stalled: usize,
    pub persist_failed: usize,
}

impl UpgradeSummary {
    fn record(&mut self, outcome: InstanceOutcome) {
        match outcome {
            InstanceOutcome::Skipped => self.skipped += 1,
            InstanceOutcome::Unchanged => self.unchanged += 1,
            InstanceOutcome::Upgraded => self.upgraded += 1,
            InstanceOutcome::Stalled => self.stalled += 1,
            InstanceOutcome::PersistFailed => self.persist_failed += 1,
        }
    }
}

/// Walk an instance through every registered version after its own
///
/// The recorded version advances after each successful step. The walk stops
/// at the first failing step and keeps everything applied before it.
pub fn migrate_instance(registry: &Registry, jaeger: &Jaeger) -> Migrated {
    let start = registry.lookup(jaeger.recorded_version());
    let mut current = jaeger.clone();

    for node in registry.nodes_after(start) {
        match node.migrate(current.clone()) {
            Ok(mut next) => {
                next.set_recorded_version(node.version().to_string());
                current = next;
            }
            Err(error) => {
                return Migrated {
                    jaeger: current,
                    failure: Some(StepFailure {
                        target: node.version().clone(),
                        error,
                    }),
                }
            }
        }
    }

    Migrated {
        jaeger: current,
        failure: None,
    }
}

/// Upgrades every managed Jaeger instance to the latest schema version
pub struct Upgrader {
    registry: Arc<Registry>,
    identity: String,
    concurrency: usize,
    metrics: Option<SharedMetrics>,
}

impl Upgrader {
    pub fn new(registry: Arc<Registry>, identity: impl Into<String>) -> Self {
        Upgrader {
            registry,
            identity: identity.into(),
            concurrency: 1,
            metrics: None,
        }
    }

    /// Upgrade up to `concurrency` instances at once
    ///
    /// Steps of a single instance always run in version order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run one fleet pass
    ///
    /// Only a failed listing is returned as an error. Failures of single
    /// instances are logged and counted; the affected instances are picked
    /// up again by the next pass.
    pub async fn run(&self, store: &dyn JaegerStore) -> Result<UpgradeSummary, UpgradeError> {
        let start_time = Instant::now();

        let instances = match store.list().await {
            Ok(instances) => instances,
            Err(e) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.record_pass(false, start_time.elapsed().as_secs_f64());
                }
                return Err(UpgradeError::List(e));
            }
        };

        let mut summary = UpgradeSummary {
            listed: instances.len(),
            ..Default::default()
        };

        let outcomes: Vec<InstanceOutcome> = futures::stream::iter(instances)
            .map(|jaeger| self.upgrade_one(store, jaeger))
            .buffered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            summary.record(outcome);
            if let Some(ref metrics) = self.metrics {
                metrics.record_instance(outcome.as_label());
            }
        }

        if let Some(ref metrics) = self.metrics {
            metrics.record_pass(true, start_time.elapsed().as_secs_f64());
        }

        Ok(summary)
    }

    /// Run passes every `interval` until shutdown, or a single pass when `None`
    ///
    /// Shutdown is only observed between passes. A running pass always
    /// finishes, so no instance is left with a migrated spec but a stale
    /// recorded version.
    pub async fn run_until_shutdown(
        &self,
        store: &dyn JaegerStore,
        interval: Option<Duration>,
        mut shutdown: ShutdownSignal,
    ) {
        loop {
            if shutdown.is_shutdown() {
                info!("Shutdown requested, no further upgrade passes");
                break;
            }
            match self.run(store).await {
                Ok(summary) => info!(
                    listed = summary.listed,
                    upgraded = summary.upgraded,
                    unchanged = summary.unchanged,
                    skipped = summary.skipped,
                    stalled = summary.stalled,
                    persist_failed = summary.persist_failed,
                    "Upgrade pass finished"
                ),
                Err(e) => error!(error = %e, "Upgrade pass failed"),
            }

            let Some(interval) = interval else {
                break;
            };
            if shutdown.sleep_or_shutdown(interval).await {
                break;
            }
        }
    }

    async fn upgrade_one(&self, store: &dyn JaegerStore, jaeger: Jaeger) -> InstanceOutcome {
        let name = jaeger.name_any();
        let namespace = jaeger.namespace().unwrap_or_default();

        if let Some(owner) = jaeger.operated_by() {
            if owner != self.identity {
                debug!(
                    jaeger = %name,
                    namespace = %namespace,
                    owner = %owner,
                    "Skipping instance managed by another operator"
                );
                return InstanceOutcome::Skipped;
            }
        }

        let migrated = migrate_instance(&self.registry, &jaeger);

        if let Some(failure) = &migrated.failure {
            error!(
                jaeger = %name,
                namespace = %namespace,
                version = %failure.target,
                reached = %migrated.jaeger.recorded_version(),
                error = %failure.error,
                "Failed to upgrade Jaeger instance"
            );
        }

        if migrated.jaeger == jaeger {
            debug!(jaeger = %name, namespace = %namespace, "No upgrade needed");
            return match migrated.failure {
                Some(_) => InstanceOutcome::Stalled,
                None => InstanceOutcome::Unchanged,
            };
        }

        match store.update(&migrated.jaeger).await {
            Ok(()) => {
                info!(
                    jaeger = %name,
                    namespace = %namespace,
                    from = %jaeger.recorded_version(),
                    to = %migrated.jaeger.recorded_version(),
                    "Jaeger instance upgraded"
                );
                match migrated.failure {
                    Some(_) => InstanceOutcome::Stalled,
                    None => InstanceOutcome::Upgraded,
                }
            }
            Err(StoreError::Conflict(_)) => {
                warn!(
                    jaeger = %name,
                    namespace = %namespace,
                    "Jaeger instance changed while upgrading, retrying on next pass"
                );
                InstanceOutcome::PersistFailed
            }
            Err(StoreError::NotFound(_)) => {
                debug!(
                    jaeger = %name,
                    namespace = %namespace,
                    "Jaeger instance deleted while upgrading"
                );
                InstanceOutcome::PersistFailed
            }
            Err(e) => {
                error!(
                    jaeger = %name,
                    namespace = %namespace,
                    error = %e,
                    "Failed to store upgraded Jaeger instance"
                );
                InstanceOutcome::PersistFailed
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;

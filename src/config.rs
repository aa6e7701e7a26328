//! Operator configuration from environment variables
//!
//! - `WATCH_NAMESPACE`: empty for cluster-wide, else comma-separated namespaces
//! - `JAEGER_OPERATOR_IDENTITY`: explicit ownership identity
//! - `POD_NAMESPACE` / `OPERATOR_NAME`: identity fallback as `namespace.name`
//! - `JAEGER_UPGRADE_INTERVAL_SECONDS`: seconds between passes, `0` runs once (default: 300)
//! - `JAEGER_UPGRADE_CONCURRENCY`: instances upgraded at the same time (default: 1)
//! - `JAEGER_HEALTH_PORT`: health and metrics port (default: 8080)

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_UPGRADE_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("JAEGER_UPGRADE_CONCURRENCY must be at least 1")]
    ZeroConcurrency,
}

/// Namespaces whose Jaeger instances this operator manages
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchScope {
    Cluster,
    Namespaces(Vec<String>),
}

impl WatchScope {
    /// Parse a comma-separated namespace list; blank means cluster-wide
    pub fn parse(value: &str) -> Self {
        let namespaces: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|namespace| !namespace.is_empty())
            .map(str::to_string)
            .collect();

        if namespaces.is_empty() {
            WatchScope::Cluster
        } else {
            WatchScope::Namespaces(namespaces)
        }
    }
}

impl fmt::Display for WatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchScope::Cluster => write!(f, "cluster"),
            WatchScope::Namespaces(namespaces) => write!(f, "{}", namespaces.join(",")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Ownership identity compared against the operated-by label
    pub identity: String,
    pub scope: WatchScope,
    /// Time between upgrade passes, `None` to run a single pass
    pub upgrade_interval: Option<Duration>,
    pub concurrency: usize,
    pub health_port: u16,
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source
    ///
    /// Tests pass a map here instead of mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let identity = resolve_identity(
            lookup("JAEGER_OPERATOR_IDENTITY"),
            lookup("POD_NAMESPACE"),
            lookup("OPERATOR_NAME"),
        );

        let scope = WatchScope::parse(&lookup("WATCH_NAMESPACE").unwrap_or_default());

        let upgrade_interval = match lookup("JAEGER_UPGRADE_INTERVAL_SECONDS") {
            Some(value) => match parse_number::<u64>("JAEGER_UPGRADE_INTERVAL_SECONDS", &value)? {
                0 => None,
                seconds => Some(Duration::from_secs(seconds)),
            },
            None => Some(DEFAULT_UPGRADE_INTERVAL),
        };

        let concurrency = match lookup("JAEGER_UPGRADE_CONCURRENCY") {
            Some(value) => parse_number::<usize>("JAEGER_UPGRADE_CONCURRENCY", &value)?,
            None => DEFAULT_CONCURRENCY,
        };
        if concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        let health_port = match lookup("JAEGER_HEALTH_PORT") {
            Some(value) => parse_number::<u16>("JAEGER_HEALTH_PORT", &value)?,
            None => DEFAULT_HEALTH_PORT,
        };

        Ok(OperatorConfig {
            identity,
            scope,
            upgrade_interval,
            concurrency,
            health_port,
        })
    }
}

/// Pick the ownership identity
///
/// An explicit identity wins, then `namespace.name` of the operator
/// deployment, then a random one (which owns only unlabeled instances).
pub fn resolve_identity(
    explicit: Option<String>,
    pod_namespace: Option<String>,
    operator_name: Option<String>,
) -> String {
    if let Some(identity) = explicit.filter(|identity| !identity.trim().is_empty()) {
        return identity.trim().to_string();
    }
    match (pod_namespace, operator_name) {
        (Some(namespace), Some(name)) if !namespace.is_empty() && !name.is_empty() => {
            format!("{}.{}", namespace, name)
        }
        _ => uuid::Uuid::new_v4().to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        })
}

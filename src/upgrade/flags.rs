//! Building blocks for migration transforms
//!
//! Both primitives are idempotent: running them again on their own output
//! finds nothing left to do.

use super::migrations::MigrationError;
use crate::crd::Jaeger;
use crate::options::Options;

/// Rewrites a flag value while it is being moved, given `(flag, value)`
pub type ValueTransform = fn(&str, &str) -> Result<String, MigrationError>;

/// Sentinel for fields that must stay deliberately empty
///
/// A single space is not empty, so the defaults pass leaves it alone, while
/// every consumer treats it as blank after trimming.
pub const SUPPRESS_DEFAULT: &str = " ";

/// Rename or drop one deprecated flag
#[derive(Clone, Copy, Debug)]
pub struct FlagMigration {
    pub from: &'static str,
    /// Empty means drop the flag without replacement
    pub to: &'static str,
    pub transform: Option<ValueTransform>,
}

impl FlagMigration {
    pub const fn rename(from: &'static str, to: &'static str) -> Self {
        FlagMigration {
            from,
            to,
            transform: None,
        }
    }

    pub const fn drop(from: &'static str) -> Self {
        FlagMigration {
            from,
            to: "",
            transform: None,
        }
    }

    pub const fn with_transform(self, transform: ValueTransform) -> Self {
        FlagMigration {
            transform: Some(transform),
            ..self
        }
    }
}

/// Apply a flag table to one option set
///
/// For each present `from` flag the (possibly transformed) value is written
/// to `to`, then `from` is removed. A transform failure leaves the set as
/// it was before that flag.
pub fn migrate_options(
    options: &mut Options,
    flags: &[FlagMigration],
) -> Result<(), MigrationError> {
    for flag in flags {
        let Some(value) = options.get(flag.from).map(str::to_string) else {
            continue;
        };
        if !flag.to.is_empty() {
            let value = match flag.transform {
                Some(transform) => transform(flag.from, &value)?,
                None => value,
            };
            options.insert(flag.to, value);
        }
        options.remove(flag.from);
    }
    Ok(())
}

/// Apply a flag table to every option set of an instance
pub fn migrate_all_options(
    jaeger: &mut Jaeger,
    flags: &[FlagMigration],
) -> Result<(), MigrationError> {
    for options in jaeger.option_sets_mut() {
        migrate_options(options, flags)?;
    }
    Ok(())
}

/// Turn a bare port into a listen address (`14250` becomes `:14250`)
///
/// Values that already carry a host part are kept.
pub fn port_to_host_port(flag: &str, value: &str) -> Result<String, MigrationError> {
    let trimmed = value.trim();
    if trimmed.parse::<u16>().is_ok() {
        return Ok(format!(":{}", trimmed));
    }
    match trimmed.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => Ok(trimmed.to_string()),
        _ => Err(MigrationError::InvalidValue {
            flag: flag.to_string(),
            value: value.to_string(),
            reason: "expected a port number or host:port".to_string(),
        }),
    }
}

/// Fill an absent field with `sentinel` so defaulting does not replace it
pub fn fill_if_absent(field: &mut Option<String>, sentinel: &str) {
    if field.is_none() {
        *field = Some(sentinel.to_string());
    }
}

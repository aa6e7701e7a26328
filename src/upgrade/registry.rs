//! Ordered catalogue of schema versions
//!
//! Every version that changed the shape of a stored `Jaeger` resource is
//! registered together with the transform that brings an instance from the
//! previous version to it. The registry sorts them by semantic version
//! precedence once, at startup, and is read-only afterwards.

use super::migrations::MigrationError;
use crate::crd::Jaeger;
use semver::Version;
use std::collections::HashMap;
use thiserror::Error;

/// Transform from the previous registered version to this one
pub type MigrateFn = fn(Jaeger) -> Result<Jaeger, MigrationError>;

/// A registered version string is not usable
///
/// This is a broken migration table, not a runtime condition.
#[derive(Debug, Error)]
pub enum InvalidVersionError {
    #[error("cannot parse {version:?} as a semantic version: {source}")]
    Parse {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("version {version} is registered more than once")]
    Duplicate { version: String },
}

/// One step in the migration chain
#[derive(Clone, Debug)]
pub struct VersionNode {
    version: Version,
    migrate: MigrateFn,
}

impl VersionNode {
    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn migrate(&self, jaeger: Jaeger) -> Result<Jaeger, MigrationError> {
        (self.migrate)(jaeger)
    }
}

/// Position of a recorded version within the chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRef {
    Known(usize),
    /// Empty or unregistered version
    Unknown,
}

/// Ascending chain of versions with an index for lookups
#[derive(Debug, Default)]
pub struct Registry {
    nodes: Vec<VersionNode>,
    index: HashMap<Version, usize>,
}

impl Registry {
    /// Build the chain from an unordered set of `(version, transform)` pairs
    pub fn build<'a>(
        entries: impl IntoIterator<Item = (&'a str, MigrateFn)>,
    ) -> Result<Self, InvalidVersionError> {
        let mut nodes = Vec::new();
        for (version, migrate) in entries {
            let parsed = Version::parse(version).map_err(|source| InvalidVersionError::Parse {
                version: version.to_string(),
                source,
            })?;
            nodes.push(VersionNode {
                version: parsed,
                migrate,
            });
        }

        // semver precedence, so 1.2.0 sorts before 1.10.0
        nodes.sort_by(|a, b| a.version.cmp(&b.version));

        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if index.insert(node.version.clone(), position).is_some() {
                return Err(InvalidVersionError::Duplicate {
                    version: node.version.to_string(),
                });
            }
        }

        Ok(Registry { nodes, index })
    }

    /// Find the node for a recorded version
    ///
    /// Empty, unparsable and unregistered versions are all `Unknown`.
    pub fn lookup(&self, version: &str) -> NodeRef {
        if version.is_empty() {
            return NodeRef::Unknown;
        }
        Version::parse(version)
            .ok()
            .and_then(|parsed| self.index.get(&parsed).copied())
            .map_or(NodeRef::Unknown, NodeRef::Known)
    }

    /// Nodes strictly after `node`, through the latest one
    ///
    /// Nothing is returned for `Unknown`: an instance whose version the
    /// registry has never heard of is left alone rather than guessed at.
    pub fn nodes_after(&self, node: NodeRef) -> &[VersionNode] {
        match node {
            NodeRef::Known(position) => self.nodes.get(position + 1..).unwrap_or(&[]),
            NodeRef::Unknown => &[],
        }
    }

    pub fn latest(&self) -> Option<&VersionNode> {
        self.nodes.last()
    }

    pub fn get(&self, node: NodeRef) -> Option<&VersionNode> {
        match node {
            NodeRef::Known(position) => self.nodes.get(position),
            NodeRef::Unknown => None,
        }
    }

    /// Registered versions in ascending order
    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.nodes.iter().map(VersionNode::version)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

//! Access to stored Jaeger instances
//!
//! The orchestrator only needs to list instances and write changed ones
//! back. `KubeJaegerStore` does this against the API server; tests use
//! `MockJaegerStore`.

use crate::config::WatchScope;
use crate::crd::Jaeger;
use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Jaeger {0} was modified since it was read")]
    Conflict(String),

    #[error("Jaeger {0} no longer exists")]
    NotFound(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Jaeger instance is missing {0} in its metadata")]
    MissingMetadata(&'static str),
}

impl StoreError {
    /// Classify an API error for the named instance
    fn from_kube(name: &str, error: kube::Error) -> Self {
        match error {
            kube::Error::Api(ref response) if response.code == 409 => {
                StoreError::Conflict(name.to_string())
            }
            kube::Error::Api(ref response) if response.code == 404 => {
                StoreError::NotFound(name.to_string())
            }
            other => StoreError::Kube(other),
        }
    }
}

/// Listing and persistence of managed instances
#[async_trait]
pub trait JaegerStore: Send + Sync {
    /// All instances within the operator's watch scope
    async fn list(&self) -> Result<Vec<Jaeger>, StoreError>;

    /// Persist one instance, failing with `Conflict` on a stale read
    async fn update(&self, jaeger: &Jaeger) -> Result<(), StoreError>;
}

pub struct KubeJaegerStore {
    client: kube::Client,
    scope: WatchScope,
}

impl KubeJaegerStore {
    pub fn new(client: kube::Client, scope: WatchScope) -> Self {
        KubeJaegerStore { client, scope }
    }
}

#[async_trait]
impl JaegerStore for KubeJaegerStore {
    async fn list(&self) -> Result<Vec<Jaeger>, StoreError> {
        let params = ListParams::default();
        match &self.scope {
            WatchScope::Cluster => {
                let api: Api<Jaeger> = Api::all(self.client.clone());
                Ok(api.list(&params).await?.items)
            }
            WatchScope::Namespaces(namespaces) => {
                let mut instances = Vec::new();
                for namespace in namespaces {
                    let api: Api<Jaeger> = Api::namespaced(self.client.clone(), namespace);
                    instances.extend(api.list(&params).await?.items);
                }
                Ok(instances)
            }
        }
    }

    async fn update(&self, jaeger: &Jaeger) -> Result<(), StoreError> {
        let name = jaeger
            .metadata
            .name
            .as_deref()
            .ok_or(StoreError::MissingMetadata("name"))?;
        let namespace = jaeger
            .metadata
            .namespace
            .as_deref()
            .ok_or(StoreError::MissingMetadata("namespace"))?;
        let api: Api<Jaeger> = Api::namespaced(self.client.clone(), namespace);

        // resourceVersion from the read makes this fail on concurrent changes
        api.replace(name, &PostParams::default(), jaeger)
            .await
            .map_err(|e| StoreError::from_kube(name, e))?;

        // status is a subresource and ignored by replace
        if let Some(status) = &jaeger.status {
            let patch = serde_json::json!({ "status": status });
            api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
                .map_err(|e| StoreError::from_kube(name, e))?;
        }
        Ok(())
    }
}

/// How a mock update should fail
#[cfg(test)]
#[derive(Clone, Copy, Debug)]
pub enum MockFailure {
    Conflict,
    NotFound,
}

/// In-memory store for tests
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub struct MockJaegerStore {
    instances: std::sync::Mutex<Vec<Jaeger>>,
    updates: std::sync::Mutex<Vec<Jaeger>>,
    failures: std::sync::Mutex<std::collections::HashMap<String, MockFailure>>,
    fail_list: bool,
    update_delay: Option<std::time::Duration>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl MockJaegerStore {
    pub fn new(instances: Vec<Jaeger>) -> Self {
        MockJaegerStore {
            instances: std::sync::Mutex::new(instances),
            updates: std::sync::Mutex::new(Vec::new()),
            failures: std::sync::Mutex::new(std::collections::HashMap::new()),
            fail_list: false,
            update_delay: None,
        }
    }

    /// Make every update take `delay` before it lands
    pub fn with_update_delay(mut self, delay: std::time::Duration) -> Self {
        self.update_delay = Some(delay);
        self
    }

    /// A store whose listing always fails
    pub fn unavailable() -> Self {
        MockJaegerStore {
            fail_list: true,
            ..Self::new(Vec::new())
        }
    }

    /// Make updates of the named instance fail
    pub fn fail_update(&self, name: &str, failure: MockFailure) {
        self.failures
            .lock()
            .unwrap()
            .insert(name.to_string(), failure);
    }

    /// Instances passed to successful `update` calls, in call order
    pub fn updates(&self) -> Vec<Jaeger> {
        self.updates.lock().unwrap().clone()
    }

    /// Current stored state of the named instance
    pub fn stored(&self, name: &str) -> Option<Jaeger> {
        self.instances
            .lock()
            .unwrap()
            .iter()
            .find(|jaeger| jaeger.metadata.name.as_deref() == Some(name))
            .cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[async_trait]
impl JaegerStore for MockJaegerStore {
    async fn list(&self) -> Result<Vec<Jaeger>, StoreError> {
        if self.fail_list {
            return Err(StoreError::Kube(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "the server is currently unable to handle the request".to_string(),
                reason: "ServiceUnavailable".to_string(),
                code: 503,
            })));
        }
        Ok(self.instances.lock().unwrap().clone())
    }

    async fn update(&self, jaeger: &Jaeger) -> Result<(), StoreError> {
        let name = jaeger
            .metadata
            .name
            .clone()
            .ok_or(StoreError::MissingMetadata("name"))?;

        if let Some(delay) = self.update_delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures.lock().unwrap().get(&name) {
            Some(MockFailure::Conflict) => return Err(StoreError::Conflict(name)),
            Some(MockFailure::NotFound) => return Err(StoreError::NotFound(name)),
            None => {}
        }

        let mut instances = self.instances.lock().unwrap();
        if let Some(stored) = instances
            .iter_mut()
            .find(|stored| stored.metadata.name.as_deref() == Some(name.as_str()))
        {
            *stored = jaeger.clone();
        }
        self.updates.lock().unwrap().push(jaeger.clone());
        Ok(())
    }
}

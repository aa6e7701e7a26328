use crate::options::{FreeForm, Options};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Label naming the operator deployment that manages an instance
///
/// Several operators can share a cluster; each one only upgrades the
/// instances carrying its own identity (or no identity at all).
pub const LABEL_OPERATED_BY: &str = "jaegertracing.io/operated-by";

/// Jaeger is a Custom Resource describing one Jaeger tracing deployment
///
/// The operator records the schema version an instance was last upgraded to
/// in `status.version`.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "jaegertracing.io",
    version = "v1",
    kind = "Jaeger",
    namespaced,
    status = "JaegerStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".status.version"}"#,
    printcolumn = r#"{"name":"Strategy", "type":"string", "jsonPath":".spec.strategy"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct JaegerSpec {
    /// Deployment strategy (allInOne, production, streaming)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<DeploymentStrategy>,

    #[serde(rename = "allInOne", default)]
    pub all_in_one: AllInOneSpec,

    #[serde(default)]
    pub query: QuerySpec,

    #[serde(default)]
    pub collector: CollectorSpec,

    #[serde(default)]
    pub ingester: IngesterSpec,

    #[serde(default)]
    pub agent: AgentSpec,

    #[serde(default)]
    pub storage: StorageSpec,

    #[serde(default)]
    pub ingress: IngressSpec,

    #[serde(default)]
    pub ui: UiSpec,

    #[serde(default)]
    pub sampling: SamplingSpec,

    /// Fields this operator does not interpret, written back unchanged
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum DeploymentStrategy {
    #[serde(rename = "allInOne", alias = "allinone")]
    AllInOne,
    #[serde(rename = "production")]
    Production,
    #[serde(rename = "streaming")]
    Streaming,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct AllInOneSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Flags passed to the all-in-one binary
    #[serde(default, skip_serializing_if = "Options::is_unset")]
    pub options: Options,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct QuerySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Options::is_unset")]
    pub options: Options,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct CollectorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Options::is_unset")]
    pub options: Options,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct IngesterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Options::is_unset")]
    pub options: Options,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct AgentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// How the agent is deployed: "DaemonSet" or "Sidecar" (default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Options::is_unset")]
    pub options: Options,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct StorageSpec {
    /// Span storage backend (memory, elasticsearch, cassandra, kafka, badger, grpc-plugin)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,

    /// Secret holding storage credentials, exposed to components as env vars
    #[serde(rename = "secretName", default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    /// Storage flags shared by every component that talks to the backend
    #[serde(default, skip_serializing_if = "Options::is_unset")]
    pub options: Options,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct IngressSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Access control in front of the query UI: "none", "oauth-proxy"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,

    #[serde(default)]
    pub openshift: IngressOpenShiftSpec,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct IngressOpenShiftSpec {
    /// Subject access review the OAuth proxy performs before admitting a user
    ///
    /// When absent the operator fills in a namespace-scoped default. A
    /// blank value disables the check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sar: Option<String>,

    #[serde(rename = "skipLogout", default, skip_serializing_if = "Option::is_none")]
    pub skip_logout: Option<bool>,

    #[serde(rename = "delegateUrls", default, skip_serializing_if = "Option::is_none")]
    pub delegate_urls: Option<String>,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct UiSpec {
    /// UI configuration file, mounted as-is
    #[serde(default, skip_serializing_if = "FreeForm::is_empty")]
    pub options: FreeForm,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct SamplingSpec {
    /// Sampling strategies file, mounted as-is
    #[serde(default, skip_serializing_if = "FreeForm::is_empty")]
    pub options: FreeForm,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct JaegerStatus {
    /// Schema version the instance was last upgraded to
    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phase: String,
}

impl Jaeger {
    /// Recorded schema version, empty when the instance has never been upgraded
    pub fn recorded_version(&self) -> &str {
        self.status
            .as_ref()
            .map(|status| status.version.as_str())
            .unwrap_or("")
    }

    pub fn set_recorded_version(&mut self, version: impl Into<String>) {
        self.status.get_or_insert_with(JaegerStatus::default).version = version.into();
    }

    /// Identity of the operator deployment managing this instance, if labeled
    pub fn operated_by(&self) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()?
            .get(LABEL_OPERATED_BY)
            .map(String::as_str)
    }

    /// Every component-scoped option set, in a fixed order
    pub fn option_sets(&self) -> [&Options; 6] {
        [
            &self.spec.all_in_one.options,
            &self.spec.query.options,
            &self.spec.collector.options,
            &self.spec.ingester.options,
            &self.spec.agent.options,
            &self.spec.storage.options,
        ]
    }

    pub fn option_sets_mut(&mut self) -> [&mut Options; 6] {
        let spec = &mut self.spec;
        [
            &mut spec.all_in_one.options,
            &mut spec.query.options,
            &mut spec.collector.options,
            &mut spec.ingester.options,
            &mut spec.agent.options,
            &mut spec.storage.options,
        ]
    }
}

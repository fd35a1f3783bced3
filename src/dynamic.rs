use std::borrow::Cow;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;
use kube::{
    Resource,
    api::{ObjectMeta, TypeMeta},
    core::DynamicResourceScope,
};

/// A resource of any kind, addressed through discovery.
///
/// Note about own `DynamicObject` instead of `kube::api::DynamicObject`.
/// The upstream `kube::api::DynamicObject` is keyed on `kube::api::ApiResource`,
/// while discovery hands out `k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource`.
/// Keying on the latter lets a discovered descriptor be used for requests as is,
/// once its `group` and `version` are filled in from the owning group/version.
///
/// See https://github.com/kube-rs/kube/issues/1002
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct DynamicObject {
    /// The type fields, not always present
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// All other keys
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl DynamicObject {
    /// Create a named object of the given `apiVersion` and `kind`.
    pub fn new(api_version: &str, kind: &str, name: &str) -> Self {
        Self {
            types: Some(TypeMeta {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
            }),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            data: serde_json::Value::Object(Default::default()),
        }
    }

    /// Attach a namespace.
    #[must_use]
    pub fn within(mut self, namespace: &str) -> Self {
        self.metadata.namespace = Some(namespace.to_string());
        self
    }

    /// Replace the kind-specific payload.
    #[must_use]
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// The declared `apiVersion`, e.g. `apps/v1` or `v1`.
    pub fn api_version(&self) -> Option<&str> {
        self.types.as_ref().map(|t| t.api_version.as_str())
    }

    /// The declared `kind`.
    pub fn kind(&self) -> Option<&str> {
        self.types.as_ref().map(|t| t.kind.as_str())
    }
}

impl Resource for DynamicObject {
    type DynamicType = APIResource;
    type Scope = DynamicResourceScope;

    fn group(dt: &APIResource) -> Cow<'_, str> {
        // NOTE: If the group is "core", return empty string.
        match dt.group.as_deref() {
            Some("core") | None => "".into(),
            Some(group) => group.into(),
        }
    }

    fn version(dt: &APIResource) -> Cow<'_, str> {
        dt.version.as_deref().unwrap_or_default().into()
    }

    fn kind(dt: &APIResource) -> Cow<'_, str> {
        dt.kind.as_str().into()
    }

    fn plural(dt: &APIResource) -> Cow<'_, str> {
        dt.name.as_str().into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

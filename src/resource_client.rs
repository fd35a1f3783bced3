use std::fmt;

use either::Either;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;
use kube::{
    Api,
    api::{DeleteParams, PostParams},
    core::Status,
};
use tracing::debug;

use crate::{
    dynamic::DynamicObject,
    error::{Error, Result},
};

/// CRUD access to a single discovered kind.
///
/// Bound to one [`APIResource`] (with its group and version filled in) and,
/// for namespaced kinds, to one namespace.
#[derive(Clone)]
pub struct ResourceClient {
    api: Api<DynamicObject>,
    api_resource: APIResource,
    namespace: Option<String>,
}

impl ResourceClient {
    /// Bind a client to `api_resource`.
    ///
    /// The namespace is ignored for cluster scoped kinds. A namespaced kind without
    /// a namespace falls back to the default namespace of the transport.
    pub fn new(transport: kube::Client, api_resource: APIResource, namespace: Option<String>) -> Self {
        let (api, namespace) = match namespace {
            _ if !api_resource.namespaced => (Api::all_with(transport, &api_resource), None),
            Some(ns) => (Api::namespaced_with(transport, &ns, &api_resource), Some(ns)),
            None => (Api::default_namespaced_with(transport, &api_resource), None),
        };
        Self {
            api,
            api_resource,
            namespace,
        }
    }

    /// The descriptor this client was built from.
    pub fn api_resource(&self) -> &APIResource {
        &self.api_resource
    }

    /// The explicitly bound namespace, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Whether the kind lives in namespaces.
    pub fn is_namespaced(&self) -> bool {
        self.api_resource.namespaced
    }

    /// The collection url requests are made against.
    pub fn url(&self) -> &str {
        self.api.resource_url()
    }

    /// Create `resource` in the bound collection.
    pub async fn create(&self, resource: &DynamicObject) -> Result<DynamicObject> {
        debug!(url = self.url(), "create");
        Ok(self.api.create(&PostParams::default(), resource).await?)
    }

    /// Fetch the object named like `resource`.
    pub async fn get(&self, resource: &DynamicObject) -> Result<DynamicObject> {
        let name = self.name_of(resource)?;
        debug!(url = self.url(), name, "get");
        Ok(self.api.get(name).await?)
    }

    /// Replace the stored object with `resource`.
    pub async fn update(&self, resource: &DynamicObject) -> Result<DynamicObject> {
        let name = self.name_of(resource)?;
        debug!(url = self.url(), name, "update");
        Ok(self.api.replace(name, &PostParams::default(), resource).await?)
    }

    /// Delete the object.
    ///
    /// Returns the object while its deletion is still pending (finalizers),
    /// or the server's [`Status`] once it is gone.
    pub async fn delete(&self, resource: &DynamicObject) -> Result<Either<DynamicObject, Status>> {
        let name = self.name_of(resource)?;
        debug!(url = self.url(), name, "delete");
        Ok(self.api.delete(name, &DeleteParams::default()).await?)
    }

    fn name_of<'a>(&self, resource: &'a DynamicObject) -> Result<&'a str> {
        resource
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::MissingName {
                kind: self.api_resource.kind.clone(),
            })
    }
}

impl fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClient")
            .field("url", &self.url())
            .field("kind", &self.api_resource.kind)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

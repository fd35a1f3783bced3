use std::{fmt, sync::Arc};

use either::Either;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};
use kube::core::Status;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::{
    determine_namespace,
    dynamic::DynamicObject,
    error::{Error, Result},
    resource_client::ResourceClient,
};

/// Client for a single API group/version, e.g. `apps/v1` or `v1`.
///
/// Knows which kinds the group/version serves once its resource table is loaded.
/// The table is loaded either by [`ApiClient::set_api_resources`] or on first lookup,
/// and stays loaded afterwards.
pub struct ApiClient {
    transport: kube::Client,
    group_version: String,
    default_namespace: Option<String>,
    api_resources: RwLock<Option<Arc<Vec<APIResource>>>>,
    // held while discovering, so concurrent lookups share one fetch
    discovery: tokio::sync::Mutex<()>,
}

impl ApiClient {
    /// Construct a client without talking to the server.
    ///
    /// An unserved `group_version` is only noticed on first use.
    pub fn new(transport: kube::Client, group_version: &str, default_namespace: Option<String>) -> Self {
        Self {
            transport,
            group_version: group_version.to_string(),
            default_namespace,
            api_resources: RwLock::new(None),
            discovery: tokio::sync::Mutex::new(()),
        }
    }

    /// The `apiVersion` this client serves, e.g. `apps/v1`.
    pub fn group_version(&self) -> &str {
        &self.group_version
    }

    /// The group name, empty for the core group.
    pub fn group(&self) -> &str {
        self.group_version
            .split_once('/')
            .map_or("", |(group, _)| group)
    }

    /// The version part, e.g. `v1`.
    pub fn version(&self) -> &str {
        self.group_version
            .split_once('/')
            .map_or(self.group_version.as_str(), |(_, version)| version)
    }

    /// Discovery path of this group/version.
    pub fn path(&self) -> String {
        path_for(&self.group_version)
    }

    /// Whether the resource table is loaded, even if it is empty.
    pub fn has_api_resources(&self) -> bool {
        self.api_resources.read().is_some()
    }

    /// Load the resource table, replacing any previous one.
    pub fn set_api_resources(&self, resources: Vec<APIResource>) {
        self.store(resources);
    }

    /// The resource table, running discovery for this group/version if it is not loaded yet.
    pub async fn api_resources(&self) -> Result<Arc<Vec<APIResource>>> {
        if let Some(resources) = self.loaded() {
            return Ok(resources);
        }

        let _discovery = self.discovery.lock().await;
        if let Some(resources) = self.loaded() {
            trace!(group_version = %self.group_version, "resources loaded while waiting");
            return Ok(resources);
        }
        let list = fetch_api_resources(&self.transport, &self.group_version).await?;
        Ok(self.store(list.resources))
    }

    /// The descriptor serving `kind`.
    ///
    /// Subresources such as `pods/status` are never returned.
    pub async fn api_resource(&self, kind: &str) -> Result<APIResource> {
        self.api_resources()
            .await?
            .iter()
            .find(|ar| ar.kind == kind && !ar.name.contains('/'))
            .cloned()
            .ok_or_else(|| Error::UnknownResource {
                group_version: self.group_version.clone(),
                kind: kind.to_string(),
            })
    }

    /// Build a [`ResourceClient`] for the kind of `resource`.
    ///
    /// May run discovery for this group/version. The namespace is the first of
    /// `namespace`, the default namespace of the owning client, and the namespace of `resource`.
    pub async fn client_for_resource(
        &self,
        resource: &DynamicObject,
        namespace: Option<&str>,
    ) -> Result<ResourceClient> {
        let kind = resource.kind().ok_or(Error::MissingTypeMeta)?;
        let api_resource = self.api_resource(kind).await?;
        let namespace = determine_namespace(
            namespace,
            self.default_namespace.as_deref(),
            resource.metadata.namespace.as_deref(),
        );
        Ok(ResourceClient::new(
            self.transport.clone(),
            api_resource,
            namespace.map(str::to_string),
        ))
    }

    /// Create `resource`, via `client_for_resource` with no explicit namespace.
    pub async fn create_resource(&self, resource: &DynamicObject) -> Result<DynamicObject> {
        self.client_for_resource(resource, None)
            .await?
            .create(resource)
            .await
    }

    /// Fetch the stored version of `resource`, via `client_for_resource` with no explicit namespace.
    pub async fn get_resource(&self, resource: &DynamicObject) -> Result<DynamicObject> {
        self.client_for_resource(resource, None).await?.get(resource).await
    }

    /// Replace the stored object with `resource`, via `client_for_resource` with no explicit namespace.
    pub async fn update_resource(&self, resource: &DynamicObject) -> Result<DynamicObject> {
        self.client_for_resource(resource, None)
            .await?
            .update(resource)
            .await
    }

    /// Delete `resource`, via `client_for_resource` with no explicit namespace.
    pub async fn delete_resource(
        &self,
        resource: &DynamicObject,
    ) -> Result<Either<DynamicObject, Status>> {
        self.client_for_resource(resource, None)
            .await?
            .delete(resource)
            .await
    }

    fn loaded(&self) -> Option<Arc<Vec<APIResource>>> {
        self.api_resources.read().clone()
    }

    fn store(&self, mut resources: Vec<APIResource>) -> Arc<Vec<APIResource>> {
        // discovery leaves group and version unset unless they differ from the list's
        for ar in &mut resources {
            if ar.group.is_none() {
                ar.group = Some(self.group().to_string());
            }
            if ar.version.is_none() {
                ar.version = Some(self.version().to_string());
            }
        }
        debug!(group_version = %self.group_version, count = resources.len(), "loaded api resources");
        let resources = Arc::new(resources);
        *self.api_resources.write() = Some(Arc::clone(&resources));
        resources
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("group_version", &self.group_version)
            .field("default_namespace", &self.default_namespace)
            .field("api_resources", &self.api_resources.read().as_ref().map(|r| r.len()))
            .finish_non_exhaustive()
    }
}

/// `/api/<version>` for the core group, `/apis/<group>/<version>` otherwise.
pub(crate) fn path_for(group_version: &str) -> String {
    if group_version.contains('/') {
        format!("/apis/{group_version}")
    } else {
        format!("/api/{group_version}")
    }
}

/// Fetch the resource list of one group/version.
pub(crate) async fn fetch_api_resources(
    transport: &kube::Client,
    group_version: &str,
) -> Result<APIResourceList> {
    debug!(path = %path_for(group_version), "discovering api resources");
    let list = match group_version.split_once('/') {
        Some(_) => transport.list_api_group_resources(group_version).await?,
        None => transport.list_core_api_resources(group_version).await?,
    };
    Ok(list)
}

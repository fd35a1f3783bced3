use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use either::Either;
use futures::future::try_join_all;
use k8s_openapi::apimachinery::pkg::{
    apis::meta::v1::{APIGroup, APIGroupList},
    version::Info,
};
use kube::core::Status;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::{
    api_client::{ApiClient, fetch_api_resources},
    dynamic::DynamicObject,
    error::{Error, Result},
    resource_client::ResourceClient,
};

/// `apiVersion` of the core group.
pub const CORE_API_VERSION: &str = "v1";

/// Entry point for generic access to every group/version a cluster serves.
///
/// Resolves `apiVersion` strings to long-lived [`ApiClient`]s and dispatches
/// create/get/update/delete of a [`DynamicObject`] to the right [`ResourceClient`].
/// All caches are safe to populate from concurrent callers.
pub struct Client {
    transport: kube::Client,
    namespace: Option<String>,
    api_clients: Mutex<HashMap<String, Arc<ApiClient>>>,
    api_group_list: OnceCell<APIGroupList>,
}

impl Client {
    /// Wrap a transport, without a default namespace.
    pub fn new(transport: kube::Client) -> Self {
        Self {
            transport,
            namespace: None,
            api_clients: Mutex::new(HashMap::new()),
            api_group_list: OnceCell::new(),
        }
    }

    /// Set the default namespace used when none is given explicitly.
    #[must_use]
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        // api clients capture the default namespace
        self.api_clients.get_mut().clear();
        self
    }

    /// Create a client from the inferred kube config (kubeconfig or in-cluster).
    ///
    /// See [`Client::try_from`] for how the config's namespace is used.
    pub async fn try_default() -> Result<Self> {
        let config = kube::Config::infer().await.map_err(kube::Error::InferConfig)?;
        Self::try_from(config)
    }

    /// The underlying transport.
    pub fn transport(&self) -> &kube::Client {
        &self.transport
    }

    /// The namespace set with [`Client::with_namespace`], if any.
    pub fn default_namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Version and build information of the apiserver.
    pub async fn version(&self) -> Result<Info> {
        Ok(self.transport.apiserver_version().await?)
    }

    /// The [`ApiClient`] for `api_version` ("group/version", or "version" for the core group).
    ///
    /// Always returns the same instance for the same `api_version`. Performs no requests.
    pub fn api(&self, api_version: &str) -> Arc<ApiClient> {
        let mut api_clients = self.api_clients.lock();
        if let Some(api_client) = api_clients.get(api_version) {
            trace!(api_version, "api client cache hit");
            return Arc::clone(api_client);
        }
        debug!(api_version, "new api client");
        let api_client = Arc::new(ApiClient::new(
            self.transport.clone(),
            api_version,
            self.namespace.clone(),
        ));
        api_clients.insert(api_version.to_string(), Arc::clone(&api_client));
        api_client
    }

    /// The [`ApiClient`] of the core group, `v1`.
    pub fn core_api(&self) -> Arc<ApiClient> {
        self.api(CORE_API_VERSION)
    }

    /// One [`ApiClient`] per API group, at its preferred version, in discovery order.
    ///
    /// The group list is fetched once per client. With `prefetch_resources`, every
    /// returned client that has no resource table yet gets one, fetched concurrently
    /// in a single batch. A failure in that batch fails the whole call.
    pub async fn apis(&self, prefetch_resources: bool) -> Result<Vec<Arc<ApiClient>>> {
        let api_group_list = self
            .api_group_list
            .get_or_try_init(|| async {
                debug!("fetching api group list");
                self.transport.list_api_groups().await
            })
            .await?;

        let api_clients: Vec<Arc<ApiClient>> = api_group_list
            .groups
            .iter()
            .filter_map(preferred_group_version)
            .map(|group_version| self.api(group_version))
            .collect();

        if prefetch_resources {
            self.prefetch_api_resources(&api_clients).await?;
        }
        Ok(api_clients)
    }

    /// Build a [`ResourceClient`] for `resource`.
    ///
    /// May run discovery for the group/version of `resource`.
    pub async fn client_for_resource(
        &self,
        resource: &DynamicObject,
        namespace: Option<&str>,
    ) -> Result<ResourceClient> {
        let api_version = resource.api_version().ok_or(Error::MissingTypeMeta)?;
        self.api(api_version)
            .client_for_resource(resource, namespace)
            .await
    }

    /// Create `resource`, in the namespace resolved by `client_for_resource` with no explicit namespace.
    pub async fn create_resource(&self, resource: &DynamicObject) -> Result<DynamicObject> {
        self.client_for_resource(resource, None)
            .await?
            .create(resource)
            .await
    }

    /// Fetch the stored version of `resource`, in the namespace resolved by `client_for_resource` with no explicit namespace.
    pub async fn get_resource(&self, resource: &DynamicObject) -> Result<DynamicObject> {
        self.client_for_resource(resource, None).await?.get(resource).await
    }

    /// Replace the stored object with `resource`, in the namespace resolved by `client_for_resource` with no explicit namespace.
    pub async fn update_resource(&self, resource: &DynamicObject) -> Result<DynamicObject> {
        self.client_for_resource(resource, None)
            .await?
            .update(resource)
            .await
    }

    /// Delete `resource`, in the namespace resolved by `client_for_resource` with no explicit namespace.
    pub async fn delete_resource(
        &self,
        resource: &DynamicObject,
    ) -> Result<Either<DynamicObject, Status>> {
        self.client_for_resource(resource, None)
            .await?
            .delete(resource)
            .await
    }

    async fn prefetch_api_resources(&self, api_clients: &[Arc<ApiClient>]) -> Result<()> {
        let mut seen = HashSet::new();
        let missing: Vec<&Arc<ApiClient>> = api_clients
            .iter()
            .filter(|api_client| !api_client.has_api_resources())
            .filter(|api_client| seen.insert(api_client.group_version().to_string()))
            .collect();
        if missing.is_empty() {
            trace!("all api resources already loaded");
            return Ok(());
        }

        debug!(count = missing.len(), "prefetching api resources");
        let lists = try_join_all(
            missing
                .iter()
                .map(|api_client| fetch_api_resources(&self.transport, api_client.group_version())),
        )
        .await?;
        for (api_client, list) in missing.into_iter().zip(lists) {
            api_client.set_api_resources(list.resources);
        }
        Ok(())
    }
}

impl TryFrom<kube::Config> for Client {
    type Error = Error;

    /// Build a client without a default namespace.
    ///
    /// The namespace of `config` stays on the transport, and is only used for
    /// namespaced objects that name no namespace themselves.
    fn try_from(config: kube::Config) -> Result<Self> {
        Ok(Self::new(kube::Client::try_from(config)?))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("namespace", &self.namespace)
            .field("api_clients", &self.api_clients.lock().len())
            .field("api_group_list", &self.api_group_list.initialized())
            .finish_non_exhaustive()
    }
}

/// The preferred group/version of `group`, else its first listed one.
fn preferred_group_version(group: &APIGroup) -> Option<&str> {
    group
        .preferred_version
        .as_ref()
        .or_else(|| group.versions.first())
        .map(|version| version.group_version.as_str())
}

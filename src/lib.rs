#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use either;
pub use k8s_openapi;
pub use kube;

pub mod api_client;
pub use api_client::ApiClient;
pub mod client;
pub use client::{CORE_API_VERSION, Client};
pub mod dynamic;
pub use dynamic::DynamicObject;
pub mod error;
pub use error::{Error, Result};
pub mod resource_client;
pub use resource_client::ResourceClient;

#[cfg(test)]
mod fake;

/// Determines the namespace a resource is addressed in.
///
/// Namespace determination follows this priority:
/// 1. Uses the namespace if explicitly specified.
/// 2. Uses the default namespace of the client.
/// 3. Uses the namespace of the resource itself.
///
/// Returns `None` when none of them is set.
pub fn determine_namespace<'a>(
    explicit: Option<&'a str>,
    client_default: Option<&'a str>,
    resource: Option<&'a str>,
) -> Option<&'a str> {
    explicit.or(client_default).or(resource)
}

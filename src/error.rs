//! Error handling for [`kubeapis`][crate].
use thiserror::Error;

/// Possible errors when resolving or operating on API resources.
#[derive(Error, Debug)]
pub enum Error {
    /// Failure reported by the underlying [`kube::Client`].
    ///
    /// Covers connectivity problems, non-success HTTP statuses and decode failures.
    /// It is never translated into another variant.
    #[error("transport error: {0}")]
    Transport(#[from] kube::Error),

    /// The group/version was discovered, but it does not serve the requested kind.
    #[error("unknown resource {kind} for {group_version}")]
    UnknownResource {
        /// The group/version that was searched.
        group_version: String,
        /// The kind that could not be found.
        kind: String,
    },

    /// The resource does not carry `apiVersion` and `kind`.
    #[error("resource is missing apiVersion or kind")]
    MissingTypeMeta,

    /// The operation addresses a single object, but `metadata.name` is unset.
    #[error("{kind} resource is missing metadata.name")]
    MissingName {
        /// Kind of the nameless resource.
        kind: String,
    },
}

impl Error {
    /// Returns true for [`Error::UnknownResource`].
    pub fn is_unknown_resource(&self) -> bool {
        matches!(self, Error::UnknownResource { .. })
    }

    /// HTTP status code of a failed API call, if the transport received one.
    pub fn transport_status_code(&self) -> Option<u16> {
        match self {
            Error::Transport(kube::Error::Api(status)) => Some(status.code),
            _ => None,
        }
    }
}

/// Convenient alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

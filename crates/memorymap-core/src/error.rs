//! Error taxonomy for feature coordination.

use crate::geometry::codec::NativeKind;
use crate::model::FeatureId;
use crate::remote::RemoteError;
use thiserror::Error;

/// Errors surfaced by the coordinator to its callers.
///
/// Geometry and validation failures are raised before any remote call is
/// issued. Remote failures are reported after the collaborator answered (or
/// failed to), and never leave the local collection ahead of the remote.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The drawing surface produced a shape kind with no canonical mapping.
    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(NativeKind),
    /// The remote collaborator answered with a non-success status.
    #[error("{message}")]
    RemoteRejected { status: u16, message: String },
    /// The remote collaborator could not be reached.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),
    /// Input rejected before reaching the remote collaborator.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    /// The operation addressed a feature that is not in the local collection.
    #[error("Unknown feature: {0}")]
    UnknownFeature(FeatureId),
    /// The remote collaborator answered with a record we cannot accept.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl Error {
    /// Shorthand for a [`Error::ValidationFailed`].
    pub fn validation(message: impl Into<String>) -> Self {
        Error::ValidationFailed(message.into())
    }

    /// Whether this failure should push the session into offline mode.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::RemoteUnavailable(_))
    }
}

impl From<RemoteError> for Error {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Rejected { status, message } => Error::RemoteRejected { status, message },
            RemoteError::Unavailable(reason) => Error::RemoteUnavailable(reason),
            RemoteError::Malformed(reason) => Error::MalformedResponse(reason),
        }
    }
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, Error>;

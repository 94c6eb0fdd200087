//! Remote Map/Feature/Story/Photo API abstraction.

mod http;
mod memory;
pub mod wire;

pub use http::HttpRemote;
pub use memory::{Hold, MemoryRemote, Operation};

use crate::model::{
    Feature, FeatureDraft, FeatureId, FeaturePatch, LocalImage, Map, MapDraft, MapId, MapPatch,
    Photo, PhotoId, Story, StoryDraft, StoryId,
};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Failures reported by a remote collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    /// Non-success status, with the server's message.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// No response: connection failure, timeout.
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
    /// The response could not be decoded.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        RemoteError::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        RemoteError::rejected(404, format!("{what} not found"))
    }
}

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// The remote store of maps, features, stories and photos.
///
/// Implementations talk to the REST API over HTTP or keep everything in
/// memory. Every mutation answers with the server-confirmed record.
///
/// Note: On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait RemoteApi: Send + Sync {
    /// List the maps visible to the session.
    fn list_maps(&self) -> BoxFuture<'_, RemoteResult<Vec<Map>>>;

    /// Fetch a single map.
    fn get_map(&self, id: MapId) -> BoxFuture<'_, RemoteResult<Map>>;

    /// Create a map.
    fn create_map(&self, draft: &MapDraft) -> BoxFuture<'_, RemoteResult<Map>>;

    /// Update a map.
    fn update_map(&self, id: MapId, patch: &MapPatch) -> BoxFuture<'_, RemoteResult<Map>>;

    /// Delete a map and everything on it.
    fn delete_map(&self, id: MapId) -> BoxFuture<'_, RemoteResult<()>>;

    /// List all features of a map.
    fn list_features(&self, map: MapId) -> BoxFuture<'_, RemoteResult<Vec<Feature>>>;

    /// Fetch a single feature with its stories and photos.
    fn get_feature(&self, id: FeatureId) -> BoxFuture<'_, RemoteResult<Feature>>;

    /// Create a feature; the server assigns its identity.
    fn create_feature(&self, map: MapId, draft: &FeatureDraft) -> BoxFuture<'_, RemoteResult<Feature>>;

    /// Apply a partial update to a feature.
    fn update_feature(&self, id: FeatureId, patch: &FeaturePatch) -> BoxFuture<'_, RemoteResult<Feature>>;

    /// Delete a feature together with its stories and photos.
    fn delete_feature(&self, id: FeatureId) -> BoxFuture<'_, RemoteResult<()>>;

    /// Attach a new story to a feature.
    fn create_story(&self, feature: FeatureId, draft: &StoryDraft) -> BoxFuture<'_, RemoteResult<Story>>;

    /// Delete a story.
    fn delete_story(&self, id: StoryId) -> BoxFuture<'_, RemoteResult<()>>;

    /// Upload an image file as a new photo of a feature.
    fn upload_photo(
        &self,
        feature: FeatureId,
        image: &LocalImage,
        caption: &str,
    ) -> BoxFuture<'_, RemoteResult<Photo>>;

    /// Delete a photo.
    fn delete_photo(&self, id: PhotoId) -> BoxFuture<'_, RemoteResult<()>>;
}

/// The remote store (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait RemoteApi {
    /// List the maps visible to the session.
    fn list_maps(&self) -> BoxFuture<'_, RemoteResult<Vec<Map>>>;

    /// Fetch a single map.
    fn get_map(&self, id: MapId) -> BoxFuture<'_, RemoteResult<Map>>;

    /// Create a map.
    fn create_map(&self, draft: &MapDraft) -> BoxFuture<'_, RemoteResult<Map>>;

    /// Update a map.
    fn update_map(&self, id: MapId, patch: &MapPatch) -> BoxFuture<'_, RemoteResult<Map>>;

    /// Delete a map and everything on it.
    fn delete_map(&self, id: MapId) -> BoxFuture<'_, RemoteResult<()>>;

    /// List all features of a map.
    fn list_features(&self, map: MapId) -> BoxFuture<'_, RemoteResult<Vec<Feature>>>;

    /// Fetch a single feature with its stories and photos.
    fn get_feature(&self, id: FeatureId) -> BoxFuture<'_, RemoteResult<Feature>>;

    /// Create a feature; the server assigns its identity.
    fn create_feature(&self, map: MapId, draft: &FeatureDraft) -> BoxFuture<'_, RemoteResult<Feature>>;

    /// Apply a partial update to a feature.
    fn update_feature(&self, id: FeatureId, patch: &FeaturePatch) -> BoxFuture<'_, RemoteResult<Feature>>;

    /// Delete a feature together with its stories and photos.
    fn delete_feature(&self, id: FeatureId) -> BoxFuture<'_, RemoteResult<()>>;

    /// Attach a new story to a feature.
    fn create_story(&self, feature: FeatureId, draft: &StoryDraft) -> BoxFuture<'_, RemoteResult<Story>>;

    /// Delete a story.
    fn delete_story(&self, id: StoryId) -> BoxFuture<'_, RemoteResult<()>>;

    /// Upload an image file as a new photo of a feature.
    fn upload_photo(
        &self,
        feature: FeatureId,
        image: &LocalImage,
        caption: &str,
    ) -> BoxFuture<'_, RemoteResult<Photo>>;

    /// Delete a photo.
    fn delete_photo(&self, id: PhotoId) -> BoxFuture<'_, RemoteResult<()>>;
}

//! Maps, features and the content attached to them.

use crate::error::{Error, Result};
use crate::geometry::codec::LatLng;
use crate::geometry::{FeatureKind, Geometry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

remote_id!(
    /// Server-issued map identity.
    MapId
);
remote_id!(
    /// Server-issued feature identity.
    FeatureId
);
remote_id!(
    /// Server-issued story identity.
    StoryId
);
remote_id!(
    /// Server-issued photo identity.
    PhotoId
);

/// Maximum feature title length accepted by the remote API.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum category length accepted by the remote API.
pub const MAX_CATEGORY_LEN: usize = 100;

/// The initial view of a map, in map-display order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: LatLng,
    pub zoom: u8,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: LatLng::new(37.7749, -122.4194),
            zoom: 10,
        }
    }
}

impl MapView {
    /// Check latitude, longitude and zoom ranges.
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.center.lat) {
            return Err(Error::validation("Latitude must be between -90 and 90 degrees."));
        }
        if !(-180.0..=180.0).contains(&self.center.lng) {
            return Err(Error::validation("Longitude must be between -180 and 180 degrees."));
        }
        if !(1..=20).contains(&self.zoom) {
            return Err(Error::validation("Zoom level must be between 1 and 20."));
        }
        Ok(())
    }
}

/// A memory map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    pub id: MapId,
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub view: MapView,
    /// Derived by the server; informational only.
    pub feature_count: usize,
}

/// Fields for creating a map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapDraft {
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub view: MapView,
}

impl MapDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            is_public: false,
            view: MapView::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("Map title is required"));
        }
        self.view.validate()
    }
}

/// Partial update of a map. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub view: Option<MapView>,
}

impl MapPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.is_public.is_none()
            && self.view.is_none()
    }

    pub fn apply_to(&self, map: &mut Map) {
        if let Some(title) = &self.title {
            map.title = title.clone();
        }
        if let Some(description) = &self.description {
            map.description = description.clone();
        }
        if let Some(is_public) = self.is_public {
            map.is_public = is_public;
        }
        if let Some(view) = self.view {
            map.view = view;
        }
    }
}

/// A story attached to a feature. Stories are created or removed, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    /// `None` until the remote API has accepted the story.
    pub id: Option<StoryId>,
    pub title: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Story {
    /// A story that has not been submitted yet.
    pub fn pending(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            created_at: Some(Utc::now()),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Fields for creating a story.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryDraft {
    pub title: String,
    pub content: String,
}

/// Where a photo's image currently lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhotoSource {
    /// A local file picked by the user, not uploaded yet.
    Local(PathBuf),
    /// The URL the remote API serves the uploaded image from.
    Remote(String),
}

/// A photo attached to a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    /// `None` until uploaded.
    pub id: Option<PhotoId>,
    pub source: PhotoSource,
    pub caption: String,
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl Photo {
    /// A photo referencing a local file, awaiting upload.
    pub fn pending(path: impl Into<PathBuf>) -> Self {
        Self {
            id: None,
            source: PhotoSource::Local(path.into()),
            caption: String::new(),
            uploaded_at: None,
        }
    }

    /// A photo with a local file and no identity.
    pub fn is_pending_upload(&self) -> bool {
        self.id.is_none() && matches!(self.source, PhotoSource::Local(_))
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// The local file, if the photo has not been uploaded.
    pub fn local_path(&self) -> Option<&Path> {
        match &self.source {
            PhotoSource::Local(path) => Some(path),
            PhotoSource::Remote(_) => None,
        }
    }
}

/// A local image file handed to the remote API for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalImage {
    pub path: PathBuf,
}

impl LocalImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File name sent along with the upload.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string())
    }
}

/// A geographic feature on a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub map: MapId,
    pub kind: FeatureKind,
    pub geometry: Geometry,
    pub title: String,
    pub description: String,
    pub category: String,
    pub stories: Vec<Story>,
    pub photos: Vec<Photo>,
}

impl Feature {
    /// Check that the geometry matches the kind and satisfies its invariants.
    pub fn check_consistency(&self) -> Result<()> {
        if self.geometry.kind() != self.kind {
            return Err(Error::validation(format!(
                "Feature {} is a {} but carries a {} geometry",
                self.id,
                self.kind,
                self.geometry.type_name()
            )));
        }
        self.geometry.validate()
    }
}

/// A feature that has not been persisted yet. It has no identity: the
/// remote API assigns one on creation.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDraft {
    pub geometry: Geometry,
    pub title: String,
    pub description: String,
    pub category: String,
}

impl FeatureDraft {
    pub fn new(geometry: Geometry, title: impl Into<String>) -> Self {
        Self {
            geometry,
            title: title.into(),
            description: String::new(),
            category: String::new(),
        }
    }

    /// A draft with the placeholder title for its kind.
    pub fn with_default_title(geometry: Geometry) -> Self {
        let title = geometry.kind().default_title();
        Self::new(geometry, title)
    }

    /// The kind is always derived from the geometry.
    pub fn kind(&self) -> FeatureKind {
        self.geometry.kind()
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("Feature title is required"));
        }
        self.geometry.validate()
    }
}

/// Partial update of a feature. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeaturePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

impl FeaturePatch {
    /// A geometry-only patch.
    pub fn geometry(geometry: Geometry) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.geometry.is_none()
    }

    /// Validate the patch against the feature it targets.
    pub fn validate_for(&self, feature: &Feature) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(Error::validation("Feature title is required"));
            }
        }
        if let Some(geometry) = &self.geometry {
            if geometry.kind() != feature.kind {
                return Err(Error::validation(format!(
                    "Cannot replace the geometry of a {} with a {}",
                    feature.kind,
                    geometry.type_name()
                )));
            }
            geometry.validate()?;
        }
        Ok(())
    }

    pub fn apply_to(&self, feature: &mut Feature) {
        if let Some(title) = &self.title {
            feature.title = title.clone();
        }
        if let Some(description) = &self.description {
            feature.description = description.clone();
        }
        if let Some(category) = &self.category {
            feature.category = category.clone();
        }
        if let Some(geometry) = &self.geometry {
            feature.geometry = geometry.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_feature() -> Feature {
        Feature {
            id: FeatureId(1),
            map: MapId(1),
            kind: FeatureKind::Point,
            geometry: Geometry::Point([1.0, 2.0]),
            title: "Home".to_string(),
            description: String::new(),
            category: String::new(),
            stories: Vec::new(),
            photos: Vec::new(),
        }
    }

    #[test]
    fn test_draft_default_title() {
        let draft = FeatureDraft::with_default_title(Geometry::LineString(vec![[0.0, 0.0], [1.0, 1.0]]));
        assert_eq!(draft.title, "New Line");
        assert_eq!(draft.kind(), FeatureKind::Line);
    }

    #[test]
    fn test_inconsistent_feature() {
        let mut feature = point_feature();
        feature.kind = FeatureKind::Polygon;
        assert!(feature.check_consistency().is_err());
    }

    #[test]
    fn test_patch_cannot_change_kind() {
        let feature = point_feature();
        let patch = FeaturePatch::geometry(Geometry::LineString(vec![[0.0, 0.0], [1.0, 1.0]]));
        assert!(matches!(patch.validate_for(&feature), Err(Error::ValidationFailed(_))));
    }

    #[test]
    fn test_patch_apply() {
        let mut feature = point_feature();
        let patch = FeaturePatch {
            category: Some("Garden".to_string()),
            ..FeaturePatch::default()
        };
        patch.apply_to(&mut feature);
        assert_eq!(feature.category, "Garden");
        assert_eq!(feature.title, "Home");
    }

    #[test]
    fn test_patch_serializes_present_fields_only() {
        let patch = FeaturePatch {
            title: Some("Renamed".to_string()),
            ..FeaturePatch::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"title": "Renamed"})
        );
    }

    #[test]
    fn test_photo_states() {
        let photo = Photo::pending("/tmp/beach.jpg");
        assert!(photo.is_pending_upload());
        assert!(!photo.is_persisted());

        let uploaded = Photo {
            id: Some(PhotoId(4)),
            source: PhotoSource::Remote("https://example.test/beach.jpg".to_string()),
            caption: String::new(),
            uploaded_at: None,
        };
        assert!(uploaded.is_persisted());
        assert!(!uploaded.is_pending_upload());
    }

    #[test]
    fn test_map_view_ranges() {
        let mut draft = MapDraft::new("Trip");
        assert!(draft.validate().is_ok());
        draft.view.zoom = 0;
        assert!(draft.validate().is_err());
        draft.view.zoom = 10;
        draft.view.center.lat = 91.0;
        assert!(draft.validate().is_err());
    }
}

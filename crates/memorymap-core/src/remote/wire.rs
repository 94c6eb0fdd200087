//! JSON records exchanged with the REST API.
//!
//! The API keeps map centers as flat `center_lat`/`center_lng` fields and
//! names a feature's kind `feature_type`. Records are converted to the model
//! here so nothing else has to know the wire layout.

use super::{RemoteError, RemoteResult};
use crate::geometry::codec::LatLng;
use crate::geometry::{FeatureKind, Geometry};
use crate::model::{
    Feature, FeatureDraft, FeatureId, Map, MapDraft, MapId, MapPatch, MapView, Photo, PhotoId,
    PhotoSource, Story, StoryDraft, StoryId,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct MapRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom_level: u8,
    #[serde(default)]
    pub feature_count: usize,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<MapRecord> for Map {
    fn from(record: MapRecord) -> Self {
        Map {
            id: MapId(record.id),
            title: record.title,
            description: record.description.unwrap_or_default(),
            is_public: record.is_public,
            view: MapView {
                center: LatLng::new(record.center_lat, record.center_lng),
                zoom: record.zoom_level,
            },
            feature_count: record.feature_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MapPayload<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub is_public: bool,
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom_level: u8,
}

impl<'a> From<&'a MapDraft> for MapPayload<'a> {
    fn from(draft: &'a MapDraft) -> Self {
        MapPayload {
            title: &draft.title,
            description: &draft.description,
            is_public: draft.is_public,
            center_lat: draft.view.center.lat,
            center_lng: draft.view.center.lng,
            zoom_level: draft.view.zoom,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MapPatchPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom_level: Option<u8>,
}

impl<'a> From<&'a MapPatch> for MapPatchPayload<'a> {
    fn from(patch: &'a MapPatch) -> Self {
        MapPatchPayload {
            title: patch.title.as_deref(),
            description: patch.description.as_deref(),
            is_public: patch.is_public,
            center_lat: patch.view.map(|v| v.center.lat),
            center_lng: patch.view.map(|v| v.center.lng),
            zoom_level: patch.view.map(|v| v.zoom),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoryRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<StoryRecord> for Story {
    fn from(record: StoryRecord) -> Self {
        Story {
            id: Some(StoryId(record.id)),
            title: record.title,
            content: record.content,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoryPayload<'a> {
    pub feature: u64,
    pub title: &'a str,
    pub content: &'a str,
}

impl<'a> StoryPayload<'a> {
    pub fn new(feature: FeatureId, draft: &'a StoryDraft) -> Self {
        StoryPayload {
            feature: feature.0,
            title: &draft.title,
            content: &draft.content,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoRecord {
    pub id: u64,
    /// URL the image is served from.
    pub image: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl From<PhotoRecord> for Photo {
    fn from(record: PhotoRecord) -> Self {
        Photo {
            id: Some(PhotoId(record.id)),
            source: PhotoSource::Remote(record.image),
            caption: record.caption.unwrap_or_default(),
            uploaded_at: record.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureRecord {
    pub id: u64,
    pub map: u64,
    pub feature_type: FeatureKind,
    pub geometry: Geometry,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub stories: Vec<StoryRecord>,
    #[serde(default)]
    pub photos: Vec<PhotoRecord>,
}

impl TryFrom<FeatureRecord> for Feature {
    type Error = RemoteError;

    fn try_from(record: FeatureRecord) -> RemoteResult<Self> {
        let feature = Feature {
            id: FeatureId(record.id),
            map: MapId(record.map),
            kind: record.feature_type,
            geometry: record.geometry,
            title: record.title,
            description: record.description.unwrap_or_default(),
            category: record.category.unwrap_or_default(),
            stories: record.stories.into_iter().map(Story::from).collect(),
            photos: record.photos.into_iter().map(Photo::from).collect(),
        };
        feature
            .check_consistency()
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        Ok(feature)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeaturePayload<'a> {
    pub map: u64,
    pub feature_type: FeatureKind,
    pub geometry: &'a Geometry,
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
}

impl<'a> FeaturePayload<'a> {
    pub fn new(map: MapId, draft: &'a FeatureDraft) -> Self {
        FeaturePayload {
            map: map.0,
            feature_type: draft.kind(),
            geometry: &draft.geometry,
            title: &draft.title,
            description: &draft.description,
            category: &draft.category,
        }
    }
}

/// Decode a single record.
pub fn decode<T: DeserializeOwned>(value: Value) -> RemoteResult<T> {
    serde_json::from_value(value).map_err(|e| RemoteError::Malformed(e.to_string()))
}

/// Decode a feature record, checking kind and geometry agree.
pub fn decode_feature(value: Value) -> RemoteResult<Feature> {
    Feature::try_from(decode::<FeatureRecord>(value)?)
}

/// Items of a list response, whether bare or paginated (`{"results": [...]}`).
pub fn list_items(value: Value) -> RemoteResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => match object.remove("results") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(RemoteError::Malformed(
                "expected a list or a paginated object".to_string(),
            )),
        },
        _ => Err(RemoteError::Malformed("expected a list".to_string())),
    }
}

/// The message of an error body: `detail`, then `error`, then a fallback.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["detail", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| "Request failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_record_flattens_center() {
        let value = json!({
            "id": 3,
            "title": "Trip",
            "description": null,
            "is_public": true,
            "center_lat": 48.85,
            "center_lng": 2.35,
            "zoom_level": 12,
            "feature_count": 4,
            "created_at": "2024-05-01T10:00:00Z"
        });
        let map: Map = decode::<MapRecord>(value).unwrap().into();
        assert_eq!(map.id, MapId(3));
        assert_eq!(map.view.center, LatLng::new(48.85, 2.35));
        assert_eq!(map.view.zoom, 12);
        assert_eq!(map.description, "");
        assert_eq!(map.feature_count, 4);
    }

    #[test]
    fn test_feature_record() {
        let value = json!({
            "id": 7,
            "map": 3,
            "feature_type": "point",
            "geometry": {"type": "Point", "coordinates": [-122.4194, 37.7749]},
            "title": "Ferry Building",
            "description": "",
            "category": "landmark",
            "stories": [{"id": 1, "feature": 7, "title": "Lunch", "content": "Oysters"}],
            "photos": [{"id": 2, "feature": 7, "image": "/media/photos/a.jpg", "caption": null}]
        });
        let feature = decode_feature(value).unwrap();
        assert_eq!(feature.id, FeatureId(7));
        assert_eq!(feature.geometry, Geometry::Point([-122.4194, 37.7749]));
        assert_eq!(feature.stories[0].id, Some(StoryId(1)));
        assert_eq!(
            feature.photos[0].source,
            PhotoSource::Remote("/media/photos/a.jpg".to_string())
        );
    }

    #[test]
    fn test_feature_kind_mismatch_is_malformed() {
        let value = json!({
            "id": 7,
            "map": 3,
            "feature_type": "polygon",
            "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
            "title": "Odd"
        });
        assert!(matches!(decode_feature(value), Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn test_feature_payload() {
        let draft = FeatureDraft::with_default_title(Geometry::Point([1.0, 2.0]));
        let payload = serde_json::to_value(FeaturePayload::new(MapId(3), &draft)).unwrap();
        assert_eq!(payload["map"], json!(3));
        assert_eq!(payload["feature_type"], json!("point"));
        assert_eq!(payload["geometry"]["coordinates"], json!([1.0, 2.0]));
        assert_eq!(payload["title"], json!("New Point"));
    }

    #[test]
    fn test_map_patch_payload_skips_absent() {
        let patch = MapPatch {
            is_public: Some(true),
            ..MapPatch::default()
        };
        let payload = serde_json::to_value(MapPatchPayload::from(&patch)).unwrap();
        assert_eq!(payload, json!({"is_public": true}));
    }

    #[test]
    fn test_list_items() {
        assert_eq!(list_items(json!([1, 2])).unwrap().len(), 2);
        assert_eq!(list_items(json!({"count": 1, "results": [1]})).unwrap().len(), 1);
        assert!(list_items(json!({"count": 1})).is_err());
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(r#"{"detail": "Not found."}"#), "Not found.");
        assert_eq!(error_message(r#"{"error": "Bad file"}"#), "Bad file");
        assert_eq!(error_message(r#"{"title": ["required"]}"#), "Request failed");
        assert_eq!(error_message("<html>"), "Request failed");
    }
}

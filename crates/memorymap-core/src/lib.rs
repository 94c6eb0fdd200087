//! Memory Maps Core Library
//!
//! Feature geometry lifecycle coordination for Memory Maps: the canonical
//! geometry codec, the feature store, the drawing surface adapter, content
//! editing, and file import.

pub mod config;
pub mod content;
pub mod error;
pub mod geometry;
pub mod import;
pub mod maps;
pub mod model;
pub mod remote;
pub mod store;
pub mod surface;

#[cfg(test)]
mod test_util;

pub use config::{ClientConfig, ConfigError};
pub use content::{ContentEditor, ContentItem, SaveReport};
pub use error::{Error, Result};
pub use geometry::codec::{LatLng, NativeKind, NativeShape};
pub use geometry::{FeatureKind, Geometry};
pub use import::{ImportBatch, ImportEngine, ImportRecord, ImportResult};
pub use maps::MapCatalog;
pub use model::{Feature, FeatureDraft, FeatureId, FeaturePatch, Map, MapDraft, MapId, MapPatch, MapView};
pub use remote::{HttpRemote, MemoryRemote, RemoteApi, RemoteError};
pub use store::{FeatureStore, LoadStatus, StoreEvent};
pub use surface::{DrawingSurfaceAdapter, ShapeHandle};

//! Import of decoded records into a map.
//!
//! Records are created one by one through the [`FeatureStore`]. A failing
//! record is reported and skipped; earlier creates are never rolled back.

pub mod sources;

use crate::error::Error;
use crate::geometry::Geometry;
use crate::model::{Feature, FeatureDraft, MAX_CATEGORY_LEN, MAX_TITLE_LEN};
use crate::remote::RemoteApi;
use crate::store::FeatureStore;
use serde_json::{Map, Value};
use std::path::Path;

pub use sources::{CsvColumns, SourceError, SourceFormat};

/// A record read from an import source.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    /// Title chosen by the reader, if the source has an obvious one.
    pub title: Option<String>,
    pub geometry: Geometry,
    /// Source attributes; `name`, `title`, `description` and `category` are used.
    pub attributes: Map<String, Value>,
}

impl ImportRecord {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            title: None,
            geometry,
            attributes: Map::new(),
        }
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Title for the `n`th record (1-based).
    fn resolve_title(&self, n: usize) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or_else(|| self.attribute("name"))
            .or_else(|| self.attribute("title"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Feature {}", n))
    }
}

/// Records read from one source, with the reader's warnings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportBatch {
    pub records: Vec<ImportRecord>,
    pub warnings: Vec<String>,
}

/// A record the store did not accept.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRecord {
    /// Position in the batch (0-based).
    pub index: usize,
    pub title: String,
    pub error: Error,
}

/// Outcome of an import.
#[derive(Debug, Default)]
pub struct ImportResult {
    pub imported_count: usize,
    pub imported: Vec<Feature>,
    pub warnings: Vec<String>,
    pub failed_records: Vec<FailedRecord>,
}

fn truncate(value: &str, max: usize) -> Option<String> {
    (value.chars().count() > max).then(|| value.chars().take(max).collect())
}

/// Creates features from import batches.
pub struct ImportEngine;

impl ImportEngine {
    /// Create one feature per record.
    pub async fn run<R: RemoteApi>(store: &FeatureStore<R>, batch: ImportBatch) -> ImportResult {
        let mut result = ImportResult {
            warnings: batch.warnings,
            ..ImportResult::default()
        };
        if batch.records.is_empty() {
            result.warnings.push("No features found".to_string());
        }

        for (index, record) in batch.records.into_iter().enumerate() {
            let n = index + 1;
            let mut title = record.resolve_title(n);
            if let Some(short) = truncate(&title, MAX_TITLE_LEN) {
                result
                    .warnings
                    .push(format!("Feature {}: title truncated to {} characters", n, MAX_TITLE_LEN));
                title = short;
            }
            let mut category = record.attribute("category").unwrap_or_default().to_string();
            if let Some(short) = truncate(&category, MAX_CATEGORY_LEN) {
                result.warnings.push(format!(
                    "Feature {}: category truncated to {} characters",
                    n, MAX_CATEGORY_LEN
                ));
                category = short;
            }
            let description = record.attribute("description").unwrap_or_default().to_string();

            let draft = FeatureDraft {
                geometry: record.geometry,
                title: title.clone(),
                description,
                category,
            };
            match store.create(draft).await {
                Ok(feature) => result.imported.push(feature),
                Err(error) => {
                    log::warn!("Import of '{}' failed: {}", title, error);
                    result.failed_records.push(FailedRecord { index, title, error });
                }
            }
        }

        result.imported_count = result.imported.len();
        log::info!(
            "Imported {} feature(s) into map {}, {} failed",
            result.imported_count,
            store.map_id(),
            result.failed_records.len()
        );
        store.record_import(result.imported_count);
        result
    }

    /// Read a file and import its records.
    pub async fn run_file<R: RemoteApi>(store: &FeatureStore<R>, path: &Path) -> Result<ImportResult, SourceError> {
        let batch = sources::parse_file(path)?;
        Ok(Self::run(store, batch).await)
    }
}

//! Drawing surface adapter.
//!
//! Turns create, edit and delete gestures on the drawing surface into
//! feature store calls, and owns the table binding drawn shapes to the
//! features they represent.

use crate::error::{Error, Result};
use crate::geometry::codec::{self, NativeShape};
use crate::model::{Feature, FeatureDraft, FeatureId, FeaturePatch};
use crate::remote::RemoteApi;
use crate::store::FeatureStore;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a shape on the drawing surface.
pub type ShapeHandle = Uuid;

/// A freshly created feature the caller should open for editing.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenEditor {
    pub handle: ShapeHandle,
    pub feature: Feature,
}

/// Outcome of a batch edit.
#[derive(Debug, Default)]
pub struct EditReport {
    pub updated: Vec<FeatureId>,
    /// Shapes with no bound feature; nothing was sent for them.
    pub orphaned: Vec<ShapeHandle>,
    pub failed: Vec<(ShapeHandle, Error)>,
}

/// Outcome of a batch delete.
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: Vec<FeatureId>,
    pub orphaned: Vec<ShapeHandle>,
    pub failed: Vec<(FeatureId, Error)>,
}

/// Asks the user whether a feature should really be deleted.
pub trait ConfirmDelete {
    fn confirm(&self, feature: &Feature) -> bool;
}

impl<F: Fn(&Feature) -> bool> ConfirmDelete for F {
    fn confirm(&self, feature: &Feature) -> bool {
        self(feature)
    }
}

/// Outcome of a direct (single feature) delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectDelete {
    Deleted,
    Declined,
}

/// Adapter between the drawing surface and a [`FeatureStore`].
pub struct DrawingSurfaceAdapter<R: RemoteApi> {
    store: Arc<FeatureStore<R>>,
    bindings: HashMap<ShapeHandle, FeatureId>,
}

impl<R: RemoteApi> DrawingSurfaceAdapter<R> {
    pub fn new(store: Arc<FeatureStore<R>>) -> Self {
        Self {
            store,
            bindings: HashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<FeatureStore<R>> {
        &self.store
    }

    /// A shape was drawn. Creates the feature and asks the caller to open it.
    pub async fn on_created(&mut self, handle: ShapeHandle, shape: NativeShape) -> Result<OpenEditor> {
        let kind = shape.kind();
        if !kind.is_supported() {
            log::warn!("Rejecting {} shape {}: no canonical geometry", kind, handle);
            return Err(Error::UnsupportedGeometry(kind));
        }
        let geometry = codec::to_canonical(&shape)?;
        let feature = self.store.create(FeatureDraft::with_default_title(geometry)).await?;
        self.bindings.insert(handle, feature.id);
        Ok(OpenEditor { handle, feature })
    }

    /// Shapes were reshaped. Sends one geometry-only update per bound shape.
    pub async fn on_edited(&mut self, edits: Vec<(ShapeHandle, NativeShape)>) -> EditReport {
        let mut report = EditReport::default();
        for (handle, shape) in edits {
            let Some(id) = self.binding(handle) else {
                log::debug!("Ignoring edit of unbound shape {}", handle);
                report.orphaned.push(handle);
                continue;
            };
            let geometry = match codec::to_canonical(&shape) {
                Ok(geometry) => geometry,
                Err(e) => {
                    report.failed.push((handle, e));
                    continue;
                }
            };
            match self.store.update(id, FeaturePatch::geometry(geometry)).await {
                Ok(_) => report.updated.push(id),
                Err(e) => {
                    log::warn!("Geometry update of feature {} failed: {}", id, e);
                    report.failed.push((handle, e));
                }
            }
        }
        report
    }

    /// Shapes were removed with the drawing tool. The tool's own commit
    /// counts as confirmation, so features are deleted right away.
    pub async fn on_deleted(&mut self, handles: Vec<ShapeHandle>) -> DeleteReport {
        let mut report = DeleteReport::default();
        for handle in handles {
            // Released whatever the remote says: the shape is already gone.
            let Some(id) = self.bindings.remove(&handle) else {
                log::debug!("Ignoring delete of unbound shape {}", handle);
                report.orphaned.push(handle);
                continue;
            };
            match self.store.delete(id).await {
                Ok(()) => report.deleted.push(id),
                Err(e) => {
                    log::warn!("Delete of feature {} failed: {}", id, e);
                    report.failed.push((id, e));
                }
            }
        }
        report
    }

    /// Delete a feature from a list or popup. Asks for confirmation first.
    pub async fn delete_feature(&mut self, id: FeatureId, confirm: &impl ConfirmDelete) -> Result<DirectDelete> {
        let feature = self.store.get(id).ok_or(Error::UnknownFeature(id))?;
        if !confirm.confirm(&feature) {
            return Ok(DirectDelete::Declined);
        }
        self.store.delete(id).await?;
        self.bindings.retain(|_, bound| *bound != id);
        Ok(DirectDelete::Deleted)
    }

    /// Shapes to draw for every feature in the store.
    ///
    /// Features keep their existing handle; new ones get a fresh handle.
    /// Bindings to features no longer in the store are dropped.
    pub fn render(&mut self) -> Vec<(ShapeHandle, NativeShape)> {
        let mut handles: HashMap<FeatureId, ShapeHandle> =
            self.bindings.drain().map(|(handle, id)| (id, handle)).collect();

        let mut shapes = Vec::new();
        for feature in self.store.snapshot() {
            let handle = handles.remove(&feature.id).unwrap_or_else(Uuid::new_v4);
            self.bindings.insert(handle, feature.id);
            shapes.push((handle, codec::from_canonical(&feature.geometry)));
        }
        shapes
    }

    pub fn bind(&mut self, handle: ShapeHandle, id: FeatureId) {
        self.bindings.insert(handle, id);
    }

    pub fn unbind(&mut self, handle: ShapeHandle) -> Option<FeatureId> {
        self.bindings.remove(&handle)
    }

    pub fn binding(&self, handle: ShapeHandle) -> Option<FeatureId> {
        self.bindings.get(&handle).copied()
    }

    /// The handle currently bound to a feature.
    pub fn handle_for(&self, id: FeatureId) -> Option<ShapeHandle> {
        self.bindings
            .iter()
            .find_map(|(handle, bound)| (*bound == id).then_some(*handle))
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// The surface went away; forget every binding.
    pub fn teardown(&mut self) {
        self.bindings.clear();
    }
}

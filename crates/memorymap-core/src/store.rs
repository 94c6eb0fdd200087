//! Feature store: the local collection of a map's features.
//!
//! Every mutation is confirmed by the remote API before it touches local
//! state, so the collection is never ahead of the remote. The state lock is
//! never held across an `.await`: operations on different features can be
//! in flight at once. Two operations on the same feature are not
//! coordinated; whichever the remote confirms last wins.

use crate::error::{Error, Result};
use crate::model::{
    Feature, FeatureDraft, FeatureId, FeaturePatch, LocalImage, MapId, Photo, PhotoId, Story,
    StoryDraft, StoryId,
};
use crate::remote::{RemoteApi, RemoteError, RemoteResult};
use kurbo::Rect;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Notifications raised by the store, drained by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Created(FeatureId),
    Updated(FeatureId),
    Deleted(FeatureId),
    /// The collection was replaced by a fresh listing.
    Reloaded { count: usize },
    /// An import batch finished.
    Imported { count: usize },
    /// The remote could not be reached; data shown may be stale.
    OfflineMode { reason: String },
    /// A remote call succeeded after offline mode.
    Online,
}

/// Outcome of [`FeatureStore::load`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    /// The collection now mirrors the remote.
    Fresh { count: usize },
    /// The listing failed; the previous collection was kept.
    Stale { reason: String, retained: usize },
}

#[derive(Default)]
struct StoreState {
    features: BTreeMap<FeatureId, Feature>,
    offline: Option<String>,
    events: Vec<StoreEvent>,
}

/// The features of one map, kept in step with the remote API.
pub struct FeatureStore<R: RemoteApi> {
    remote: Arc<R>,
    map: MapId,
    state: RwLock<StoreState>,
}

impl<R: RemoteApi> FeatureStore<R> {
    /// Create an empty store bound to `map`. Call [`load`](Self::load) to fill it.
    pub fn new(remote: Arc<R>, map: MapId) -> Self {
        Self {
            remote,
            map,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn map_id(&self) -> MapId {
        self.map
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome of a remote call, moving in or out of offline mode.
    fn settle<T>(&self, result: RemoteResult<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.leave_offline();
                Ok(value)
            }
            Err(RemoteError::Unavailable(reason)) => {
                self.enter_offline(&reason);
                Err(Error::RemoteUnavailable(reason))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn leave_offline(&self) {
        let mut state = self.write();
        if state.offline.take().is_some() {
            log::info!("Remote reachable again, leaving offline mode");
            state.events.push(StoreEvent::Online);
        }
    }

    fn enter_offline(&self, reason: &str) {
        let mut state = self.write();
        if state.offline.replace(reason.to_string()).is_none() {
            log::warn!("Entering offline mode: {}", reason);
            state.events.push(StoreEvent::OfflineMode {
                reason: reason.to_string(),
            });
        }
    }

    /// Reject records that break the kind/geometry invariants or belong elsewhere.
    fn accept(&self, feature: Feature) -> Result<Feature> {
        feature
            .check_consistency()
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        if feature.map != self.map {
            return Err(Error::MalformedResponse(format!(
                "Feature {} belongs to map {}, expected {}",
                feature.id, feature.map, self.map
            )));
        }
        Ok(feature)
    }

    /// Write a confirmed record back, unless the feature left the
    /// collection while the call was in flight.
    fn replace(&self, feature: Feature) {
        let id = feature.id;
        let mut guard = self.write();
        let state = &mut *guard;
        match state.features.get_mut(&id) {
            Some(slot) => {
                *slot = feature;
                state.events.push(StoreEvent::Updated(id));
            }
            None => log::debug!("Feature {} left the collection, not caching the answer", id),
        }
    }

    fn require(&self, id: FeatureId) -> Result<Feature> {
        self.get(id).ok_or(Error::UnknownFeature(id))
    }

    /// Create a feature. It appears locally only once the remote confirmed it.
    pub async fn create(&self, draft: FeatureDraft) -> Result<Feature> {
        draft.validate()?;
        let result = self.remote.create_feature(self.map, &draft).await;
        let feature = self.accept(self.settle(result)?)?;

        let mut state = self.write();
        state.features.insert(feature.id, feature.clone());
        state.events.push(StoreEvent::Created(feature.id));
        log::debug!("Created {} feature {}", feature.kind, feature.id);
        Ok(feature)
    }

    /// Apply a partial update. On failure the local feature is untouched.
    /// A feature deleted while the update was in flight stays deleted.
    pub async fn update(&self, id: FeatureId, patch: FeaturePatch) -> Result<Feature> {
        let current = self.require(id)?;
        if patch.is_empty() {
            return Ok(current);
        }
        patch.validate_for(&current)?;

        let result = self.remote.update_feature(id, &patch).await;
        let feature = self.accept(self.settle(result)?)?;
        self.replace(feature.clone());
        Ok(feature)
    }

    /// Delete a feature. It leaves the collection only once the remote confirmed it.
    pub async fn delete(&self, id: FeatureId) -> Result<()> {
        self.require(id)?;
        let result = self.remote.delete_feature(id).await;
        self.settle(result)?;

        let mut state = self.write();
        state.features.remove(&id);
        state.events.push(StoreEvent::Deleted(id));
        log::debug!("Deleted feature {}", id);
        Ok(())
    }

    /// Replace the collection with the remote listing.
    ///
    /// Never fails: when the listing cannot be fetched the previous
    /// collection is retained and the store enters offline mode.
    pub async fn load(&self) -> LoadStatus {
        let result = self.remote.list_features(self.map).await;
        let listed = match result {
            Ok(listed) => listed,
            Err(err) => {
                let reason = err.to_string();
                self.enter_offline(&reason);
                return LoadStatus::Stale {
                    reason,
                    retained: self.len(),
                };
            }
        };
        self.leave_offline();

        let mut features = BTreeMap::new();
        for feature in listed {
            let id = feature.id;
            match self.accept(feature) {
                Ok(feature) => {
                    features.insert(id, feature);
                }
                Err(e) => log::warn!("Skipping feature {}: {}", id, e),
            }
        }

        let count = features.len();
        let mut state = self.write();
        state.features = features;
        state.events.push(StoreEvent::Reloaded { count });
        LoadStatus::Fresh { count }
    }

    /// Fetch the authoritative copy of a feature, with its stories and photos.
    ///
    /// The answer is cached only if the feature is still in the collection.
    pub async fn refetch(&self, id: FeatureId) -> Result<Feature> {
        let result = self.remote.get_feature(id).await;
        let feature = self.accept(self.settle(result)?)?;
        self.replace(feature.clone());
        Ok(feature)
    }

    /// Attach a story. The local feature picks it up on the next refetch.
    pub async fn create_story(&self, feature: FeatureId, draft: StoryDraft) -> Result<Story> {
        let result = self.remote.create_story(feature, &draft).await;
        self.settle(result)
    }

    pub async fn delete_story(&self, id: StoryId) -> Result<()> {
        let result = self.remote.delete_story(id).await;
        self.settle(result)
    }

    /// Upload a local image as a photo. The local feature picks it up on the next refetch.
    pub async fn upload_photo(&self, feature: FeatureId, image: &LocalImage, caption: &str) -> Result<Photo> {
        let result = self.remote.upload_photo(feature, image, caption).await;
        self.settle(result)
    }

    pub async fn delete_photo(&self, id: PhotoId) -> Result<()> {
        let result = self.remote.delete_photo(id).await;
        self.settle(result)
    }

    pub fn get(&self, id: FeatureId) -> Option<Feature> {
        self.read().features.get(&id).cloned()
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        self.read().features.contains_key(&id)
    }

    /// All features, ordered by identity.
    pub fn snapshot(&self) -> Vec<Feature> {
        self.read().features.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().features.is_empty()
    }

    pub fn is_offline(&self) -> bool {
        self.read().offline.is_some()
    }

    pub fn offline_reason(&self) -> Option<String> {
        self.read().offline.clone()
    }

    /// Bounding box of every feature (x = longitude, y = latitude).
    pub fn bounds(&self) -> Option<Rect> {
        self.read()
            .features
            .values()
            .map(|f| f.geometry.bounds())
            .reduce(|a, b| a.union(b))
    }

    /// Take the queued notifications.
    pub fn drain_events(&self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.write().events)
    }

    pub(crate) fn record_import(&self, count: usize) {
        self.write().events.push(StoreEvent::Imported { count });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{FeatureKind, Geometry};
    use crate::remote::{Hold, MemoryRemote, Operation};
    use crate::test_util::{block_on, point_draft, store_with_map};
    use futures_util::future::join;

    #[test]
    fn test_create_appears_after_confirmation() {
        let (_remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(-122.4194, 37.7749))).unwrap();

        assert_eq!(feature.title, "New Point");
        assert_eq!(store.get(feature.id), Some(feature.clone()));
        assert_eq!(store.drain_events(), vec![StoreEvent::Created(feature.id)]);
    }

    #[test]
    fn test_create_failure_leaves_collection_unchanged() {
        let (remote, store) = store_with_map();
        block_on(store.create(point_draft(1.0, 1.0))).unwrap();
        let before = store.snapshot();

        remote.fail_next(Operation::CreateFeature, RemoteError::rejected(400, "Title is required"));
        let err = block_on(store.create(point_draft(2.0, 2.0))).unwrap_err();

        assert_eq!(err.to_string(), "Title is required");
        assert_eq!(store.snapshot(), before);
        assert!(!store.is_offline());
    }

    #[test]
    fn test_create_validates_before_remote() {
        let (remote, store) = store_with_map();
        let draft = FeatureDraft::new(Geometry::LineString(vec![[0.0, 0.0]]), "Path");
        assert!(matches!(
            block_on(store.create(draft)),
            Err(Error::ValidationFailed(_))
        ));
        assert_eq!(remote.call_count(Operation::CreateFeature), 0);
    }

    #[test]
    fn test_update_failure_leaves_fields_identical() {
        let (remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(1.0, 1.0))).unwrap();

        remote.fail_next(Operation::UpdateFeature, RemoteError::rejected(500, "Server error"));
        let patch = FeaturePatch {
            title: Some("Renamed".to_string()),
            category: Some("Food".to_string()),
            ..FeaturePatch::default()
        };
        assert!(block_on(store.update(feature.id, patch)).is_err());
        assert_eq!(store.get(feature.id), Some(feature));
    }

    #[test]
    fn test_update_replaces_with_confirmed_record() {
        let (remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(1.0, 1.0))).unwrap();

        let moved = Geometry::Point([3.0, 4.0]);
        let updated = block_on(store.update(feature.id, FeaturePatch::geometry(moved.clone()))).unwrap();

        assert_eq!(updated.geometry, moved);
        assert_eq!(store.get(feature.id).unwrap().geometry, moved);
        assert_eq!(remote.stored_feature(feature.id).unwrap().geometry, moved);
    }

    #[test]
    fn test_empty_patch_makes_no_remote_call() {
        let (remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(1.0, 1.0))).unwrap();
        let unchanged = block_on(store.update(feature.id, FeaturePatch::default())).unwrap();
        assert_eq!(unchanged, feature);
        assert_eq!(remote.call_count(Operation::UpdateFeature), 0);
    }

    #[test]
    fn test_kind_change_is_rejected() {
        let (remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(1.0, 1.0))).unwrap();
        let patch = FeaturePatch::geometry(Geometry::LineString(vec![[0.0, 0.0], [1.0, 1.0]]));
        assert!(matches!(
            block_on(store.update(feature.id, patch)),
            Err(Error::ValidationFailed(_))
        ));
        assert_eq!(remote.call_count(Operation::UpdateFeature), 0);
    }

    #[test]
    fn test_unknown_feature() {
        let (_remote, store) = store_with_map();
        assert_eq!(
            block_on(store.delete(FeatureId(404))),
            Err(Error::UnknownFeature(FeatureId(404)))
        );
    }

    #[test]
    fn test_delete_failure_keeps_feature() {
        let (remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(1.0, 1.0))).unwrap();

        remote.fail_next(Operation::DeleteFeature, RemoteError::rejected(403, "Forbidden"));
        assert!(block_on(store.delete(feature.id)).is_err());
        assert!(store.contains(feature.id));

        block_on(store.delete(feature.id)).unwrap();
        assert!(!store.contains(feature.id));
    }

    #[test]
    fn test_load_replaces_collection() {
        let (remote, store) = store_with_map();
        let map = store.map_id();
        block_on(remote.create_feature(map, &point_draft(1.0, 1.0))).unwrap();
        block_on(remote.create_feature(map, &point_draft(2.0, 2.0))).unwrap();

        assert_eq!(block_on(store.load()), LoadStatus::Fresh { count: 2 });
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_unreachable_load_keeps_state_and_goes_offline() {
        let (remote, store) = store_with_map();
        block_on(store.create(point_draft(1.0, 1.0))).unwrap();
        let before = store.snapshot();
        store.drain_events();

        remote.set_unavailable(true);
        let status = block_on(store.load());

        assert!(matches!(status, LoadStatus::Stale { retained: 1, .. }));
        assert_eq!(store.snapshot(), before);
        assert!(store.is_offline());
        assert!(matches!(
            store.drain_events().as_slice(),
            [StoreEvent::OfflineMode { .. }]
        ));
    }

    #[test]
    fn test_rejected_load_is_stale_too() {
        let (remote, store) = store_with_map();
        remote.fail_next(Operation::ListFeatures, RemoteError::rejected(500, "boom"));
        assert!(matches!(block_on(store.load()), LoadStatus::Stale { .. }));
        assert!(store.is_offline());
    }

    #[test]
    fn test_offline_does_not_preempt_mutations() {
        let (remote, store) = store_with_map();
        remote.set_unavailable(true);
        block_on(store.load());

        // Still attempted while offline, and fails naturally.
        let err = block_on(store.create(point_draft(1.0, 1.0))).unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(remote.call_count(Operation::CreateFeature), 1);

        remote.set_unavailable(false);
        block_on(store.create(point_draft(1.0, 1.0))).unwrap();
        assert!(!store.is_offline());
        assert!(store.drain_events().contains(&StoreEvent::Online));
    }

    #[test]
    fn test_refetch_picks_up_content() {
        let (_remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(1.0, 1.0))).unwrap();
        block_on(store.create_story(
            feature.id,
            StoryDraft {
                title: "Arrival".to_string(),
                content: "Rain".to_string(),
            },
        ))
        .unwrap();

        assert!(store.get(feature.id).unwrap().stories.is_empty());
        let fresh = block_on(store.refetch(feature.id)).unwrap();
        assert_eq!(fresh.stories.len(), 1);
        assert_eq!(store.get(feature.id).unwrap().stories.len(), 1);
    }

    #[test]
    fn test_concurrent_updates_last_writer_wins() {
        let (remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(1.0, 1.0))).unwrap();
        // Both requests are in flight before the remote applies either.
        remote.hold_next(Operation::UpdateFeature, Hold::Request);
        remote.hold_next(Operation::UpdateFeature, Hold::Request);

        let first = FeaturePatch {
            title: Some("First".to_string()),
            ..FeaturePatch::default()
        };
        let second = FeaturePatch {
            title: Some("Second".to_string()),
            ..FeaturePatch::default()
        };
        let (a, b) = block_on(join(store.update(feature.id, first), store.update(feature.id, second)));
        assert_eq!(a.unwrap().title, "First");
        assert_eq!(b.unwrap().title, "Second");

        let local = store.get(feature.id).unwrap();
        let stored = remote.stored_feature(feature.id).unwrap();
        assert_eq!(local.title, stored.title);
        assert_eq!(local.title, "Second");
    }

    #[test]
    fn test_late_update_does_not_bring_back_deleted_feature() {
        let (remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(1.0, 1.0))).unwrap();
        store.drain_events();
        remote.hold_next(Operation::UpdateFeature, Hold::Reply);

        let patch = FeaturePatch {
            title: Some("Renamed".to_string()),
            ..FeaturePatch::default()
        };
        let (updated, deleted) = block_on(join(store.update(feature.id, patch), store.delete(feature.id)));

        assert_eq!(updated.unwrap().title, "Renamed");
        assert_eq!(deleted, Ok(()));
        assert!(remote.stored_feature(feature.id).is_none());
        assert!(!store.contains(feature.id));
        assert_eq!(store.drain_events(), vec![StoreEvent::Deleted(feature.id)]);
    }

    #[test]
    fn test_late_refetch_does_not_bring_back_deleted_feature() {
        let (remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(1.0, 1.0))).unwrap();
        remote.hold_next(Operation::GetFeature, Hold::Reply);

        let (fetched, deleted) = block_on(join(store.refetch(feature.id), store.delete(feature.id)));

        assert_eq!(fetched.unwrap().id, feature.id);
        assert_eq!(deleted, Ok(()));
        assert!(remote.stored_feature(feature.id).is_none());
        assert!(!store.contains(feature.id));
        assert!(store.is_empty());
    }

    fn mismatched(feature: &Feature) -> Feature {
        Feature {
            kind: FeatureKind::Polygon,
            ..feature.clone()
        }
    }

    #[test]
    fn test_inconsistent_records_are_malformed() {
        let (remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(1.0, 1.0))).unwrap();
        let before = store.snapshot();

        remote.reply_next(Operation::CreateFeature, mismatched(&feature));
        assert!(matches!(
            block_on(store.create(point_draft(2.0, 2.0))),
            Err(Error::MalformedResponse(_))
        ));
        assert_eq!(store.snapshot(), before);

        remote.reply_next(Operation::UpdateFeature, mismatched(&feature));
        let patch = FeaturePatch {
            title: Some("Renamed".to_string()),
            ..FeaturePatch::default()
        };
        assert!(matches!(
            block_on(store.update(feature.id, patch)),
            Err(Error::MalformedResponse(_))
        ));
        assert_eq!(store.get(feature.id), Some(feature.clone()));

        remote.reply_next(Operation::GetFeature, mismatched(&feature));
        assert!(matches!(
            block_on(store.refetch(feature.id)),
            Err(Error::MalformedResponse(_))
        ));
        assert_eq!(store.get(feature.id), Some(feature));
    }

    #[test]
    fn test_records_of_other_maps_are_malformed() {
        let (remote, store) = store_with_map();
        let feature = block_on(store.create(point_draft(1.0, 1.0))).unwrap();

        let elsewhere = Feature {
            map: MapId(store.map_id().0 + 100),
            ..feature.clone()
        };
        remote.reply_next(Operation::GetFeature, elsewhere);
        let err = block_on(store.refetch(feature.id)).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(ref m) if m.contains("belongs to map")));
        assert_eq!(store.get(feature.id), Some(feature));
    }

    #[test]
    fn test_load_skips_inconsistent_records() {
        let (remote, store) = store_with_map();
        let good = block_on(remote.create_feature(store.map_id(), &point_draft(1.0, 1.0))).unwrap();
        let bad = block_on(remote.create_feature(store.map_id(), &point_draft(2.0, 2.0))).unwrap();
        remote.store_raw(mismatched(&bad));

        assert_eq!(block_on(store.load()), LoadStatus::Fresh { count: 1 });
        assert!(store.contains(good.id));
        assert!(!store.contains(bad.id));
    }

    #[test]
    fn test_unreachable_first_load_stays_empty() {
        let (remote, store) = store_with_map();
        remote.set_unavailable(true);

        let status = block_on(store.load());

        assert!(matches!(status, LoadStatus::Stale { retained: 0, .. }));
        assert!(store.is_empty());
        assert!(store.is_offline());
    }

    #[test]
    fn test_concurrent_creates_on_different_features() {
        let (_remote, store) = store_with_map();
        let (a, b) = block_on(join(
            store.create(point_draft(1.0, 1.0)),
            store.create(point_draft(2.0, 2.0)),
        ));
        assert_ne!(a.unwrap().id, b.unwrap().id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_bounds() {
        let (_remote, store) = store_with_map();
        assert!(store.bounds().is_none());
        block_on(store.create(point_draft(-10.0, 5.0))).unwrap();
        block_on(store.create(point_draft(20.0, -3.0))).unwrap();
        let bounds = store.bounds().unwrap();
        assert_eq!((bounds.x0, bounds.y0, bounds.x1, bounds.y1), (-10.0, -3.0, 20.0, 5.0));
    }

    #[test]
    fn test_store_over_fresh_remote_is_empty() {
        let store = FeatureStore::new(Arc::new(MemoryRemote::new()), MapId(1));
        assert!(store.is_empty());
        assert!(!store.is_offline());
    }
}

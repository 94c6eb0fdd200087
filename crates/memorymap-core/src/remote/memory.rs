//! In-memory remote implementation.

use super::{BoxFuture, RemoteApi, RemoteError, RemoteResult};
use crate::model::{
    Feature, FeatureDraft, FeatureId, FeaturePatch, LocalImage, Map, MapDraft, MapId, MapPatch,
    Photo, PhotoId, PhotoSource, Story, StoryDraft, StoryId,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{RwLock, RwLockWriteGuard};
use std::task::{Context, Poll};

/// Remote operations, for failure injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListMaps,
    GetMap,
    CreateMap,
    UpdateMap,
    DeleteMap,
    ListFeatures,
    GetFeature,
    CreateFeature,
    UpdateFeature,
    DeleteFeature,
    CreateStory,
    DeleteStory,
    UploadPhoto,
    DeletePhoto,
}

/// Where a held call pauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hold {
    /// Before the remote acts on the call.
    Request,
    /// After the remote acted, before the answer reaches the caller.
    Reply,
}

/// Pending once, then ready.
#[derive(Default)]
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            return Poll::Ready(());
        }
        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    maps: BTreeMap<MapId, Map>,
    features: BTreeMap<FeatureId, Feature>,
    unavailable: bool,
    failures: HashMap<Operation, VecDeque<RemoteError>>,
    holds: Vec<(Operation, Hold)>,
    replies: HashMap<Operation, VecDeque<Feature>>,
    calls: HashMap<Operation, usize>,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Account for a call and decide whether it fails.
    fn begin(&mut self, op: Operation) -> RemoteResult<()> {
        *self.calls.entry(op).or_default() += 1;
        if self.unavailable {
            return Err(RemoteError::Unavailable("connection refused".to_string()));
        }
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn feature_mut(&mut self, id: FeatureId) -> RemoteResult<&mut Feature> {
        self.features
            .get_mut(&id)
            .ok_or_else(|| RemoteError::not_found(format_args!("Feature {id}")))
    }

    /// The queued replacement answer for `op`, if any.
    fn reply(&mut self, op: Operation, feature: Feature) -> Feature {
        self.replies
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
            .unwrap_or(feature)
    }

    fn with_count(&self, map: &Map) -> Map {
        let mut map = map.clone();
        map.feature_count = self.features.values().filter(|f| f.map == map.id).count();
        map
    }
}

/// In-memory remote for testing and offline demos.
///
/// Identities are issued from a single counter, like database primary keys.
/// Tests can make the remote unreachable or queue failures for specific
/// operations.
#[derive(Default)]
pub struct MemoryRemote {
    state: RwLock<MemoryState>,
}

impl MemoryRemote {
    /// Create a new empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RemoteResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|e| RemoteError::Unavailable(format!("Lock error: {}", e)))
    }

    /// Make every subsequent call fail as unreachable (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.lock() {
            state.unavailable = unavailable;
        }
    }

    /// Fail the next call of `op` with `err`. Queued failures are consumed in order.
    pub fn fail_next(&self, op: Operation, err: RemoteError) {
        if let Ok(mut state) = self.lock() {
            state.failures.entry(op).or_default().push_back(err);
        }
    }

    /// Pause the next call of `op` once, at the given point.
    pub fn hold_next(&self, op: Operation, at: Hold) {
        if let Ok(mut state) = self.lock() {
            state.holds.push((op, at));
        }
    }

    /// Answer the next call of `op` with `feature` instead of the stored
    /// record. Applies to `GetFeature`, `CreateFeature` and `UpdateFeature`.
    pub fn reply_next(&self, op: Operation, feature: Feature) {
        if let Ok(mut state) = self.lock() {
            state.replies.entry(op).or_default().push_back(feature);
        }
    }

    /// Store a feature record verbatim, without any checks.
    pub fn store_raw(&self, feature: Feature) {
        if let Ok(mut state) = self.lock() {
            state.features.insert(feature.id, feature);
        }
    }

    fn take_hold(&self, op: Operation, at: Hold) -> bool {
        let Ok(mut state) = self.lock() else {
            return false;
        };
        match state.holds.iter().position(|held| *held == (op, at)) {
            Some(pos) => {
                state.holds.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Run `work` as the answer to `op`, pausing where a hold asks for it.
    fn answer<'a, T: 'a>(
        &'a self,
        op: Operation,
        work: impl Future<Output = RemoteResult<T>> + 'a,
    ) -> BoxFuture<'a, RemoteResult<T>> {
        Box::pin(async move {
            if self.take_hold(op, Hold::Request) {
                YieldOnce::default().await;
            }
            let result = work.await;
            if self.take_hold(op, Hold::Reply) {
                YieldOnce::default().await;
            }
            result
        })
    }

    /// Number of calls made to `op`, including failed ones.
    pub fn call_count(&self, op: Operation) -> usize {
        self.lock()
            .map(|state| state.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total number of calls made to any operation.
    pub fn total_calls(&self) -> usize {
        self.lock()
            .map(|state| state.calls.values().sum())
            .unwrap_or(0)
    }

    /// Seed a map directly, bypassing call accounting.
    pub fn seed_map(&self, title: &str) -> MapId {
        let Ok(mut state) = self.lock() else {
            return MapId(0);
        };
        let id = MapId(state.next_id());
        let map = Map {
            id,
            title: title.to_string(),
            description: String::new(),
            is_public: false,
            view: Default::default(),
            feature_count: 0,
        };
        state.maps.insert(id, map);
        id
    }

    /// Peek at the stored copy of a feature.
    pub fn stored_feature(&self, id: FeatureId) -> Option<Feature> {
        self.lock().ok()?.features.get(&id).cloned()
    }

    /// Number of stored features on a map.
    pub fn stored_feature_count(&self, map: MapId) -> usize {
        self.lock()
            .map(|state| state.features.values().filter(|f| f.map == map).count())
            .unwrap_or(0)
    }
}

impl RemoteApi for MemoryRemote {
    fn list_maps(&self) -> BoxFuture<'_, RemoteResult<Vec<Map>>> {
        self.answer(Operation::ListMaps, async move {
            let mut state = self.lock()?;
            state.begin(Operation::ListMaps)?;
            Ok(state.maps.values().map(|m| state.with_count(m)).collect())
        })
    }

    fn get_map(&self, id: MapId) -> BoxFuture<'_, RemoteResult<Map>> {
        self.answer(Operation::GetMap, async move {
            let mut state = self.lock()?;
            state.begin(Operation::GetMap)?;
            let map = state
                .maps
                .get(&id)
                .ok_or_else(|| RemoteError::not_found(format_args!("Map {id}")))?;
            Ok(state.with_count(map))
        })
    }

    fn create_map(&self, draft: &MapDraft) -> BoxFuture<'_, RemoteResult<Map>> {
        let draft = draft.clone();
        self.answer(Operation::CreateMap, async move {
            let mut state = self.lock()?;
            state.begin(Operation::CreateMap)?;
            let map = Map {
                id: MapId(state.next_id()),
                title: draft.title,
                description: draft.description,
                is_public: draft.is_public,
                view: draft.view,
                feature_count: 0,
            };
            state.maps.insert(map.id, map.clone());
            Ok(map)
        })
    }

    fn update_map(&self, id: MapId, patch: &MapPatch) -> BoxFuture<'_, RemoteResult<Map>> {
        let patch = patch.clone();
        self.answer(Operation::UpdateMap, async move {
            let mut state = self.lock()?;
            state.begin(Operation::UpdateMap)?;
            let map = state
                .maps
                .get_mut(&id)
                .ok_or_else(|| RemoteError::not_found(format_args!("Map {id}")))?;
            patch.apply_to(map);
            let map = map.clone();
            Ok(state.with_count(&map))
        })
    }

    fn delete_map(&self, id: MapId) -> BoxFuture<'_, RemoteResult<()>> {
        self.answer(Operation::DeleteMap, async move {
            let mut state = self.lock()?;
            state.begin(Operation::DeleteMap)?;
            state
                .maps
                .remove(&id)
                .ok_or_else(|| RemoteError::not_found(format_args!("Map {id}")))?;
            state.features.retain(|_, f| f.map != id);
            Ok(())
        })
    }

    fn list_features(&self, map: MapId) -> BoxFuture<'_, RemoteResult<Vec<Feature>>> {
        self.answer(Operation::ListFeatures, async move {
            let mut state = self.lock()?;
            state.begin(Operation::ListFeatures)?;
            Ok(state
                .features
                .values()
                .filter(|f| f.map == map)
                .cloned()
                .collect())
        })
    }

    fn get_feature(&self, id: FeatureId) -> BoxFuture<'_, RemoteResult<Feature>> {
        self.answer(Operation::GetFeature, async move {
            let mut state = self.lock()?;
            state.begin(Operation::GetFeature)?;
            let feature = state.feature_mut(id)?.clone();
            Ok(state.reply(Operation::GetFeature, feature))
        })
    }

    fn create_feature(&self, map: MapId, draft: &FeatureDraft) -> BoxFuture<'_, RemoteResult<Feature>> {
        let draft = draft.clone();
        self.answer(Operation::CreateFeature, async move {
            let mut state = self.lock()?;
            state.begin(Operation::CreateFeature)?;
            if !state.maps.contains_key(&map) {
                return Err(RemoteError::rejected(400, format!("Invalid map {map}")));
            }
            let feature = Feature {
                id: FeatureId(state.next_id()),
                map,
                kind: draft.kind(),
                geometry: draft.geometry,
                title: draft.title,
                description: draft.description,
                category: draft.category,
                stories: Vec::new(),
                photos: Vec::new(),
            };
            state.features.insert(feature.id, feature.clone());
            Ok(state.reply(Operation::CreateFeature, feature))
        })
    }

    fn update_feature(&self, id: FeatureId, patch: &FeaturePatch) -> BoxFuture<'_, RemoteResult<Feature>> {
        let patch = patch.clone();
        self.answer(Operation::UpdateFeature, async move {
            let mut state = self.lock()?;
            state.begin(Operation::UpdateFeature)?;
            let feature = state.feature_mut(id)?;
            patch.apply_to(feature);
            let feature = feature.clone();
            Ok(state.reply(Operation::UpdateFeature, feature))
        })
    }

    fn delete_feature(&self, id: FeatureId) -> BoxFuture<'_, RemoteResult<()>> {
        self.answer(Operation::DeleteFeature, async move {
            let mut state = self.lock()?;
            state.begin(Operation::DeleteFeature)?;
            state
                .features
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| RemoteError::not_found(format_args!("Feature {id}")))
        })
    }

    fn create_story(&self, feature: FeatureId, draft: &StoryDraft) -> BoxFuture<'_, RemoteResult<Story>> {
        let draft = draft.clone();
        self.answer(Operation::CreateStory, async move {
            let mut state = self.lock()?;
            state.begin(Operation::CreateStory)?;
            let id = StoryId(state.next_id());
            let story = Story {
                id: Some(id),
                title: draft.title,
                content: draft.content,
                created_at: Some(Utc::now()),
            };
            state.feature_mut(feature)?.stories.push(story.clone());
            Ok(story)
        })
    }

    fn delete_story(&self, id: StoryId) -> BoxFuture<'_, RemoteResult<()>> {
        self.answer(Operation::DeleteStory, async move {
            let mut state = self.lock()?;
            state.begin(Operation::DeleteStory)?;
            for feature in state.features.values_mut() {
                if let Some(pos) = feature.stories.iter().position(|s| s.id == Some(id)) {
                    feature.stories.remove(pos);
                    return Ok(());
                }
            }
            Err(RemoteError::not_found(format_args!("Story {id}")))
        })
    }

    fn upload_photo(
        &self,
        feature: FeatureId,
        image: &LocalImage,
        caption: &str,
    ) -> BoxFuture<'_, RemoteResult<Photo>> {
        let file_name = image.file_name();
        let caption = caption.to_string();
        self.answer(Operation::UploadPhoto, async move {
            let mut state = self.lock()?;
            state.begin(Operation::UploadPhoto)?;
            let id = PhotoId(state.next_id());
            let photo = Photo {
                id: Some(id),
                source: PhotoSource::Remote(format!("memory://photos/{id}/{file_name}")),
                caption,
                uploaded_at: Some(Utc::now()),
            };
            state.feature_mut(feature)?.photos.push(photo.clone());
            Ok(photo)
        })
    }

    fn delete_photo(&self, id: PhotoId) -> BoxFuture<'_, RemoteResult<()>> {
        self.answer(Operation::DeletePhoto, async move {
            let mut state = self.lock()?;
            state.begin(Operation::DeletePhoto)?;
            for feature in state.features.values_mut() {
                if let Some(pos) = feature.photos.iter().position(|p| p.id == Some(id)) {
                    feature.photos.remove(pos);
                    return Ok(());
                }
            }
            Err(RemoteError::not_found(format_args!("Photo {id}")))
        })
    }
}

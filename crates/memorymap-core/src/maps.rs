//! Map catalog with a cached listing.

use crate::error::{Error, Result};
use crate::model::{Map, MapDraft, MapId, MapPatch};
use crate::remote::RemoteApi;
use std::sync::{Arc, PoisonError, RwLock};

/// Remote CRUD for maps. The listing is cached until the next successful
/// mutation or [`invalidate`](Self::invalidate).
pub struct MapCatalog<R: RemoteApi> {
    remote: Arc<R>,
    cache: RwLock<Option<Vec<Map>>>,
}

impl<R: RemoteApi> MapCatalog<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self {
            remote,
            cache: RwLock::new(None),
        }
    }

    fn cached(&self) -> Option<Vec<Map>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn store(&self, maps: Option<Vec<Map>>) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = maps;
    }

    /// Drop the cached listing.
    pub fn invalidate(&self) {
        self.store(None);
    }

    /// All maps visible to the caller.
    pub async fn list(&self) -> Result<Vec<Map>> {
        if let Some(maps) = self.cached() {
            return Ok(maps);
        }
        let maps = self.remote.list_maps().await?;
        log::debug!("Listed {} map(s)", maps.len());
        self.store(Some(maps.clone()));
        Ok(maps)
    }

    pub async fn get(&self, id: MapId) -> Result<Map> {
        Ok(self.remote.get_map(id).await?)
    }

    pub async fn create(&self, draft: MapDraft) -> Result<Map> {
        draft.validate()?;
        let map = self.remote.create_map(&draft).await?;
        log::info!("Created map {} '{}'", map.id, map.title);
        self.invalidate();
        Ok(map)
    }

    /// Apply a partial update. An empty patch fetches the current map.
    pub async fn update(&self, id: MapId, patch: MapPatch) -> Result<Map> {
        if patch.is_empty() {
            return self.get(id).await;
        }
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Error::validation("Map title is required"));
        }
        if let Some(view) = &patch.view {
            view.validate()?;
        }
        let map = self.remote.update_map(id, &patch).await?;
        self.invalidate();
        Ok(map)
    }

    /// Delete a map. The remote removes its features with it.
    pub async fn delete(&self, id: MapId) -> Result<()> {
        self.remote.delete_map(id).await?;
        log::info!("Deleted map {}", id);
        self.invalidate();
        Ok(())
    }
}

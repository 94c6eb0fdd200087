//! Content editor: buffered edits of a feature's details, stories and photos.
//!
//! Edits accumulate locally and are committed by [`ContentEditor::save`].
//! A failing story or photo does not stop the others; the report says
//! which items did not make it, and those stay in the buffer.

use crate::error::{Error, Result};
use crate::model::{
    Feature, FeatureId, FeaturePatch, LocalImage, Photo, PhotoId, Story, StoryDraft, StoryId,
};
use crate::remote::RemoteApi;
use crate::store::FeatureStore;
use std::path::PathBuf;

/// An item committed by a save.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    /// Title, description and category.
    Fields,
    Story { title: String },
    Photo { path: PathBuf },
    RemovedStory(StoryId),
    RemovedPhoto(PhotoId),
    /// Reloading the saved feature.
    Refetch,
}

/// What a save achieved.
#[derive(Debug, Default)]
pub struct SaveReport {
    pub fields_updated: bool,
    pub stories_created: Vec<StoryId>,
    pub photos_uploaded: Vec<PhotoId>,
    pub stories_deleted: Vec<StoryId>,
    pub photos_deleted: Vec<PhotoId>,
    pub failures: Vec<(ContentItem, Error)>,
    /// The authoritative feature after the save, if it could be fetched.
    pub refreshed: Option<Feature>,
}

impl SaveReport {
    /// Whether every item was committed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Fields {
    title: String,
    description: String,
    category: String,
}

impl Fields {
    fn of(feature: &Feature) -> Self {
        Self {
            title: feature.title.clone(),
            description: feature.description.clone(),
            category: feature.category.clone(),
        }
    }

    /// Patch with the fields that differ from `saved`.
    fn diff(&self, saved: &Fields) -> FeaturePatch {
        let changed = |a: &String, b: &String| (a != b).then(|| a.clone());
        FeaturePatch {
            title: changed(&self.title, &saved.title),
            description: changed(&self.description, &saved.description),
            category: changed(&self.category, &saved.category),
            geometry: None,
        }
    }
}

/// Edit buffer for one feature.
#[derive(Debug, Clone)]
pub struct ContentEditor {
    feature: FeatureId,
    saved: Fields,
    fields: Fields,
    stories: Vec<Story>,
    photos: Vec<Photo>,
    removed_stories: Vec<StoryId>,
    removed_photos: Vec<PhotoId>,
}

fn out_of_range(what: &str, index: usize, len: usize) -> Error {
    Error::validation(format!("No {} at index {} ({} in buffer)", what, index, len))
}

impl ContentEditor {
    /// Seed a buffer from the feature's persisted state.
    pub fn open(feature: &Feature) -> Self {
        let fields = Fields::of(feature);
        Self {
            feature: feature.id,
            saved: fields.clone(),
            fields,
            stories: feature.stories.clone(),
            photos: feature.photos.clone(),
            removed_stories: Vec::new(),
            removed_photos: Vec::new(),
        }
    }

    pub fn feature_id(&self) -> FeatureId {
        self.feature
    }

    pub fn title(&self) -> &str {
        &self.fields.title
    }

    pub fn description(&self) -> &str {
        &self.fields.description
    }

    pub fn category(&self) -> &str {
        &self.fields.category
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.fields.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.fields.description = description.into();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.fields.category = category.into();
    }

    /// Buffer a new story. Title and content are trimmed and must not be empty.
    pub fn add_story(&mut self, title: &str, content: &str) -> Result<()> {
        let (title, content) = (title.trim(), content.trim());
        if title.is_empty() || content.is_empty() {
            return Err(Error::validation("Story title and content are required"));
        }
        self.stories.push(Story::pending(title, content));
        Ok(())
    }

    /// Remove a story. A persisted story is deleted on save.
    pub fn remove_story(&mut self, index: usize) -> Result<Story> {
        if index >= self.stories.len() {
            return Err(out_of_range("story", index, self.stories.len()));
        }
        let story = self.stories.remove(index);
        if let Some(id) = story.id {
            self.removed_stories.push(id);
        }
        Ok(story)
    }

    /// Buffer a local image. Nothing is uploaded until save.
    pub fn add_photo(&mut self, path: impl Into<PathBuf>) {
        self.photos.push(Photo::pending(path));
    }

    /// Caption a photo that has not been uploaded yet.
    pub fn set_photo_caption(&mut self, index: usize, caption: impl Into<String>) -> Result<()> {
        let len = self.photos.len();
        let photo = self
            .photos
            .get_mut(index)
            .ok_or_else(|| out_of_range("photo", index, len))?;
        if photo.is_persisted() {
            return Err(Error::validation("Only photos awaiting upload can be captioned"));
        }
        photo.caption = caption.into();
        Ok(())
    }

    /// Remove a photo. A persisted photo is deleted on save.
    pub fn remove_photo(&mut self, index: usize) -> Result<Photo> {
        if index >= self.photos.len() {
            return Err(out_of_range("photo", index, self.photos.len()));
        }
        let photo = self.photos.remove(index);
        if let Some(id) = photo.id {
            self.removed_photos.push(id);
        }
        Ok(photo)
    }

    /// Whether anything in the buffer differs from the persisted feature.
    pub fn is_dirty(&self) -> bool {
        self.fields != self.saved
            || self.stories.iter().any(|s| !s.is_persisted())
            || self.photos.iter().any(Photo::is_pending_upload)
            || !self.removed_stories.is_empty()
            || !self.removed_photos.is_empty()
    }

    /// Commit the buffer.
    ///
    /// Order: basic fields, new stories, new photos, removals, then a
    /// refetch of the feature. Only a blank title fails the whole save, and
    /// it does so before anything is sent.
    pub async fn save<R: RemoteApi>(&mut self, store: &FeatureStore<R>) -> Result<SaveReport> {
        if self.fields.title.trim().is_empty() {
            return Err(Error::validation("Feature title is required"));
        }
        let mut report = SaveReport::default();

        let patch = self.fields.diff(&self.saved);
        if !patch.is_empty() {
            match store.update(self.feature, patch).await {
                Ok(feature) => {
                    self.saved = Fields::of(&feature);
                    report.fields_updated = true;
                }
                Err(e) => {
                    log::warn!("Saving fields of feature {} failed: {}", self.feature, e);
                    report.failures.push((ContentItem::Fields, e));
                }
            }
        }

        for story in self.stories.iter_mut().filter(|s| !s.is_persisted()) {
            let draft = StoryDraft {
                title: story.title.clone(),
                content: story.content.clone(),
            };
            match store.create_story(self.feature, draft).await {
                Ok(created) => {
                    report.stories_created.extend(created.id);
                    *story = created;
                }
                Err(e) => {
                    log::warn!("Saving story '{}' failed: {}", story.title, e);
                    report.failures.push((ContentItem::Story { title: story.title.clone() }, e));
                }
            }
        }

        for photo in self.photos.iter_mut().filter(|p| p.is_pending_upload()) {
            let Some(path) = photo.local_path().map(|p| p.to_path_buf()) else {
                continue;
            };
            match store.upload_photo(self.feature, &LocalImage::new(&path), &photo.caption).await {
                Ok(uploaded) => {
                    report.photos_uploaded.extend(uploaded.id);
                    *photo = uploaded;
                }
                Err(e) => {
                    log::warn!("Uploading {} failed: {}", path.display(), e);
                    report.failures.push((ContentItem::Photo { path }, e));
                }
            }
        }

        let mut kept = Vec::new();
        for id in std::mem::take(&mut self.removed_stories) {
            match store.delete_story(id).await {
                Ok(()) => report.stories_deleted.push(id),
                Err(e) => {
                    report.failures.push((ContentItem::RemovedStory(id), e));
                    kept.push(id);
                }
            }
        }
        self.removed_stories = kept;

        let mut kept = Vec::new();
        for id in std::mem::take(&mut self.removed_photos) {
            match store.delete_photo(id).await {
                Ok(()) => report.photos_deleted.push(id),
                Err(e) => {
                    report.failures.push((ContentItem::RemovedPhoto(id), e));
                    kept.push(id);
                }
            }
        }
        self.removed_photos = kept;

        match store.refetch(self.feature).await {
            Ok(feature) => {
                self.reseed(&feature);
                report.refreshed = Some(feature);
            }
            Err(e) => report.failures.push((ContentItem::Refetch, e)),
        }
        Ok(report)
    }

    /// Replace the buffer with the authoritative feature, keeping items
    /// that are still waiting to be committed.
    fn reseed(&mut self, feature: &Feature) {
        let pending_stories: Vec<Story> =
            self.stories.drain(..).filter(|s| !s.is_persisted()).collect();
        let pending_photos: Vec<Photo> =
            self.photos.drain(..).filter(Photo::is_pending_upload).collect();

        let fields = Fields::of(feature);
        if self.fields == self.saved {
            self.fields = fields.clone();
        }
        self.saved = fields;

        self.stories = feature
            .stories
            .iter()
            .filter(|s| s.id.is_none_or(|id| !self.removed_stories.contains(&id)))
            .cloned()
            .chain(pending_stories)
            .collect();
        self.photos = feature
            .photos
            .iter()
            .filter(|p| p.id.is_none_or(|id| !self.removed_photos.contains(&id)))
            .cloned()
            .chain(pending_photos)
            .collect();
    }

    /// Discard the buffer. Nothing is sent.
    pub fn cancel(self) {
        log::debug!("Discarded edits of feature {}", self.feature);
    }
}

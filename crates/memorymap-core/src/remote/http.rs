//! REST API remote over HTTP.

use super::wire::{
    self, FeaturePayload, MapPatchPayload, MapPayload, MapRecord, PhotoRecord, StoryPayload,
    StoryRecord,
};
use super::{BoxFuture, RemoteApi, RemoteError, RemoteResult};
use crate::config::ClientConfig;
use crate::model::{
    Feature, FeatureDraft, FeatureId, FeaturePatch, LocalImage, Map, MapDraft, MapId, MapPatch,
    Photo, PhotoId, Story, StoryDraft, StoryId,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Remote talking to the memory maps REST API.
pub struct HttpRemote {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpRemote {
    /// Build a remote from client configuration.
    pub fn new(config: &ClientConfig) -> RemoteResult<Self> {
        // Joining relative paths onto the base needs a trailing slash.
        let mut base = config.api_base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base = Url::parse(&base)
            .map_err(|e| RemoteError::rejected(0, format!("Invalid API URL {}: {}", config.api_base_url, e)))?;

        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(std::time::Duration::from_secs(config.request_timeout_secs));
        let client = builder
            .build()
            .map_err(|e| RemoteError::Unavailable(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            client,
            base,
            token: config.auth_token.clone(),
        })
    }

    /// The API base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> RemoteResult<Url> {
        self.base
            .join(path)
            .map_err(|e| RemoteError::rejected(0, format!("Invalid endpoint {}: {}", path, e)))
    }

    fn request(&self, method: Method, path: &str) -> RemoteResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        log::debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Send a request and return the decoded JSON body (`Null` for empty bodies).
    async fn send(builder: RequestBuilder) -> RemoteResult<Value> {
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            let message = wire::error_message(&body);
            log::warn!("Request failed with {}: {}", status, message);
            return Err(RemoteError::rejected(status.as_u16(), message));
        }
        if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    async fn get(&self, path: &str) -> RemoteResult<Value> {
        Self::send(self.request(Method::GET, path)?).await
    }

    async fn send_json<B: Serialize>(&self, method: Method, path: &str, body: &B) -> RemoteResult<Value> {
        Self::send(self.request(method, path)?.json(body)).await
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        Self::send(self.request(Method::DELETE, path)?).await.map(|_| ())
    }
}

impl RemoteApi for HttpRemote {
    fn list_maps(&self) -> BoxFuture<'_, RemoteResult<Vec<Map>>> {
        Box::pin(async move {
            let items = wire::list_items(self.get("maps/").await?)?;
            items
                .into_iter()
                .map(|item| wire::decode::<MapRecord>(item).map(Map::from))
                .collect()
        })
    }

    fn get_map(&self, id: MapId) -> BoxFuture<'_, RemoteResult<Map>> {
        Box::pin(async move {
            let value = self.get(&format!("maps/{}/", id)).await?;
            wire::decode::<MapRecord>(value).map(Map::from)
        })
    }

    fn create_map(&self, draft: &MapDraft) -> BoxFuture<'_, RemoteResult<Map>> {
        let draft = draft.clone();
        Box::pin(async move {
            let value = self
                .send_json(Method::POST, "maps/", &MapPayload::from(&draft))
                .await?;
            wire::decode::<MapRecord>(value).map(Map::from)
        })
    }

    fn update_map(&self, id: MapId, patch: &MapPatch) -> BoxFuture<'_, RemoteResult<Map>> {
        let patch = patch.clone();
        Box::pin(async move {
            let value = self
                .send_json(Method::PATCH, &format!("maps/{}/", id), &MapPatchPayload::from(&patch))
                .await?;
            wire::decode::<MapRecord>(value).map(Map::from)
        })
    }

    fn delete_map(&self, id: MapId) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(async move { self.delete(&format!("maps/{}/", id)).await })
    }

    fn list_features(&self, map: MapId) -> BoxFuture<'_, RemoteResult<Vec<Feature>>> {
        Box::pin(async move {
            let items = wire::list_items(self.get(&format!("maps/{}/features/", map)).await?)?;
            let mut features = Vec::with_capacity(items.len());
            for item in items {
                match wire::decode_feature(item) {
                    Ok(feature) => features.push(feature),
                    Err(e) => log::warn!("Skipping feature record on map {}: {}", map, e),
                }
            }
            Ok(features)
        })
    }

    fn get_feature(&self, id: FeatureId) -> BoxFuture<'_, RemoteResult<Feature>> {
        Box::pin(async move {
            let value = self.get(&format!("features/{}/", id)).await?;
            wire::decode_feature(value)
        })
    }

    fn create_feature(&self, map: MapId, draft: &FeatureDraft) -> BoxFuture<'_, RemoteResult<Feature>> {
        let draft = draft.clone();
        Box::pin(async move {
            let value = self
                .send_json(Method::POST, "features/", &FeaturePayload::new(map, &draft))
                .await?;
            wire::decode_feature(value)
        })
    }

    fn update_feature(&self, id: FeatureId, patch: &FeaturePatch) -> BoxFuture<'_, RemoteResult<Feature>> {
        let patch = patch.clone();
        Box::pin(async move {
            let value = self
                .send_json(Method::PATCH, &format!("features/{}/", id), &patch)
                .await?;
            wire::decode_feature(value)
        })
    }

    fn delete_feature(&self, id: FeatureId) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(async move { self.delete(&format!("features/{}/", id)).await })
    }

    fn create_story(&self, feature: FeatureId, draft: &StoryDraft) -> BoxFuture<'_, RemoteResult<Story>> {
        let draft = draft.clone();
        Box::pin(async move {
            let value = self
                .send_json(Method::POST, "stories/", &StoryPayload::new(feature, &draft))
                .await?;
            wire::decode::<StoryRecord>(value).map(Story::from)
        })
    }

    fn delete_story(&self, id: StoryId) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(async move { self.delete(&format!("stories/{}/", id)).await })
    }

    fn upload_photo(
        &self,
        feature: FeatureId,
        image: &LocalImage,
        caption: &str,
    ) -> BoxFuture<'_, RemoteResult<Photo>> {
        let image = image.clone();
        let caption = caption.to_string();
        Box::pin(async move {
            #[cfg(not(target_arch = "wasm32"))]
            let read = tokio::fs::read(&image.path).await;
            #[cfg(target_arch = "wasm32")]
            let read = std::fs::read(&image.path);
            // Status 0: the request never left the client.
            let bytes = read.map_err(|e| {
                RemoteError::rejected(0, format!("Cannot read {}: {}", image.path.display(), e))
            })?;
            let mut form = Form::new()
                .text("feature", feature.to_string())
                .part("image", Part::bytes(bytes).file_name(image.file_name()));
            if !caption.is_empty() {
                form = form.text("caption", caption);
            }
            let value = Self::send(self.request(Method::POST, "photos/")?.multipart(form)).await?;
            wire::decode::<PhotoRecord>(value).map(Photo::from)
        })
    }

    fn delete_photo(&self, id: PhotoId) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(async move { self.delete(&format!("photos/{}/", id)).await })
    }
}

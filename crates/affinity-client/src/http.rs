//! REST tag store backed by the user-results service.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, trace};

use affinity_core::defaults;
use affinity_core::{
    Error, Result, SendNoteRequest, Tag, TagSet, TagStore, TaggedUser, TaggedUsersResponse,
    ToggleTagRequest, UserId, UserTagsResponse,
};

use crate::config::ClientConfig;
use crate::error::{to_affinity_error, StoreErrorCode};

const USER_TAGS: &str = "user_tags/";
const TOGGLE_TAG: &str = "toggle_tag/";
const SEND_NOTE: &str = "send_note/";
const BY_TAG: &str = "by_tag/";

/// [`TagStore`] speaking the user-results REST API.
pub struct HttpTagStore {
    client: Client,
    config: ClientConfig,
}

impl HttpTagStore {
    /// Create a new store client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(defaults::USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing tag store client: url={}, auth={}",
            config.base_url,
            config.api_token.is_some()
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.config.api_token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(self.config.endpoint(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(self.config.endpoint(path)))
    }

    /// Turn a non-success status into an error, keeping the body for context.
    async fn check(path: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(endpoint = path, status = status.as_u16(), "Tag store request failed");
        Err(to_affinity_error(
            StoreErrorCode::from_status(status.as_u16()),
            path,
            &body,
        ))
    }

    async fn read_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
        let response = Self::check(path, response).await?;
        let body = response.text().await?;
        trace!(endpoint = path, body_len = body.len(), "Tag store response");
        serde_json::from_str(&body)
            .map_err(|e| Error::Serialization(format!("{}: {}", path, e)))
    }

    /// Mutation endpoints answer 2xx, optionally with `{"success": false}`.
    async fn expect_success(path: &str, response: Response) -> Result<()> {
        let response = Self::check(path, response).await?;
        let body = response.text().await.unwrap_or_default();
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(&body) {
            if map.get("success") == Some(&serde_json::Value::Bool(false)) {
                let message = map
                    .get("error")
                    .or_else(|| map.get("message"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("request rejected");
                return Err(Error::Store(format!("{}: {}", path, message)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TagStore for HttpTagStore {
    #[instrument(skip_all, fields(viewer_id = %viewer, target_id = %target))]
    async fn get_tags(&self, viewer: UserId, target: UserId) -> Result<TagSet> {
        let start = Instant::now();
        let response = self
            .get(USER_TAGS)
            .query(&[("user_id", viewer.0), ("result_user_id", target.0)])
            .send()
            .await?;
        let body: UserTagsResponse = Self::read_json(USER_TAGS, response).await?;
        let tags = TagSet::from_wire(&body.tags);
        debug!(
            tags = ?tags,
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched tags"
        );
        Ok(tags)
    }

    #[instrument(skip_all, fields(viewer_id = %viewer, target_id = %target, tag = %tag))]
    async fn toggle_tag(&self, viewer: UserId, target: UserId, tag: Tag) -> Result<()> {
        let start = Instant::now();
        let request = ToggleTagRequest {
            user_id: viewer,
            result_user_id: target,
            tag,
        };
        let response = self.post(TOGGLE_TAG).json(&request).send().await?;
        Self::expect_success(TOGGLE_TAG, response).await?;
        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Toggled tag"
        );
        Ok(())
    }

    #[instrument(skip_all, fields(viewer_id = %sender, target_id = %recipient))]
    async fn send_note(&self, sender: UserId, recipient: UserId, note: &str) -> Result<()> {
        let request = SendNoteRequest {
            sender_id: sender,
            recipient_id: recipient,
            note: note.to_string(),
        };
        let response = self.post(SEND_NOTE).json(&request).send().await?;
        Self::expect_success(SEND_NOTE, response).await
    }

    #[instrument(skip_all, fields(viewer_id = %viewer, tag = %tag))]
    async fn list_by_tag(&self, viewer: UserId, tag: Tag) -> Result<Vec<TaggedUser>> {
        let user_id = viewer.0.to_string();
        let response = self
            .get(BY_TAG)
            .query(&[("tag", tag.key()), ("user_id", user_id.as_str())])
            .send()
            .await?;
        let body: TaggedUsersResponse = Self::read_json(BY_TAG, response).await?;
        let users = body.into_users();
        debug!(count = users.len(), "Listed users by tag");
        Ok(users)
    }
}

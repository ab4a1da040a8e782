//! Remote API over HTTP
//!
//! - `POST {base}/conversations/{id}/messages` sends one message
//! - `GET {base}/conversations/{id}/messages?after={cursor}&limit={n}` pulls
//!
//! Requests carry a bearer token and a per-request timeout. Status codes are
//! folded into [`SyncError`]: 4xx becomes `Validation`, 5xx `Remote`,
//! timeouts and refused connections `Network`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::RemoteConfig;
use crate::error::{Result, SyncError};
use crate::sync::ports::RemoteApi;
use crate::types::{Message, OutgoingMessage};

pub struct HttpRemoteApi {
    client: reqwest::Client,
    base_url: Url,
    auth_token: String,
}

impl HttpRemoteApi {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| SyncError::Config("remote.base_url is not set".to_string()))?;
        let auth_token = config
            .auth_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SyncError::Config("remote.auth_token is not set".to_string()))?;

        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "remote.base_url cannot be a base: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    fn messages_url(&self, conversation_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Config(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["conversations", conversation_id, "messages"]);
        Ok(url)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message> {
        let url = self.messages_url(&message.conversation_id)?;
        debug!("POST {} (client id {})", url, message.client_message_id);

        let sent = self
            .client
            .post(url)
            .bearer_auth(&self.auth_token)
            .json(message)
            .send()
            .await?
            .error_for_status()?
            .json::<Message>()
            .await?;

        Ok(sent)
    }

    async fn fetch_messages(
        &self,
        conversation_id: &str,
        after_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let mut url = self.messages_url(conversation_id)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(after_id) = after_id {
                query.append_pair("after", after_id);
            }
            query.append_pair("limit", &limit.to_string());
        }
        debug!("GET {}", url);

        let messages = self
            .client
            .get(url)
            .bearer_auth(&self.auth_token)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Message>>()
            .await?;

        Ok(messages)
    }
}

//! Fakes shared by unit tests

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

use crate::cache::AssetStore;
use crate::error::{Result, SyncError};
use crate::sync::ports::{Prefetcher, RemoteApi};
use crate::types::{Message, MessageType, OutgoingMessage};

pub(crate) fn message(id: &str, conversation_id: &str, offset_secs: i64) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: Some("remote-user".to_string()),
        content: format!("content of {id}"),
        message_type: MessageType::Text,
        media_url: None,
        created_at: Utc::now() - Duration::hours(1) + Duration::seconds(offset_secs),
    }
}

/// In-memory server: an ordered message list per conversation.
#[derive(Default)]
pub(crate) struct FakeRemote {
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub fetches: Mutex<Vec<(String, Option<String>, u32)>>,
    server: Mutex<HashMap<String, Vec<Message>>>,
    failing_sends: Mutex<HashMap<String, SyncError>>,
    failing_fetches: Mutex<HashSet<String>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    pub entered: Arc<Notify>,
    next_id: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_remote(&self, message: Message) {
        let mut server = self.server.lock().unwrap();
        server
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message);
    }

    /// Sends whose content equals `content` fail with `error` until cleared.
    pub fn fail_send(&self, content: &str, error: SyncError) {
        self.failing_sends
            .lock()
            .unwrap()
            .insert(content.to_string(), error);
    }

    pub fn clear_send_failures(&self) {
        self.failing_sends.lock().unwrap().clear();
    }

    pub fn fail_fetch(&self, conversation_id: &str) {
        self.failing_fetches
            .lock()
            .unwrap()
            .insert(conversation_id.to_string());
    }

    /// Block every fetch until permits are added to the returned semaphore.
    pub fn hold_fetches(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn sent_contents(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.content.clone())
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message> {
        self.sent.lock().unwrap().push(message.clone());

        if let Some(error) = self.failing_sends.lock().unwrap().get(&message.content) {
            return Err(error.clone());
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let sent = Message {
            id: format!("srv-{n}"),
            conversation_id: message.conversation_id.clone(),
            sender_id: Some("me".to_string()),
            content: message.content.clone(),
            message_type: message.message_type,
            media_url: message.media_refs.first().cloned(),
            created_at: Utc::now(),
        };
        self.push_remote(sent.clone());
        Ok(sent)
    }

    async fn fetch_messages(
        &self,
        conversation_id: &str,
        after_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        self.fetches.lock().unwrap().push((
            conversation_id.to_string(),
            after_id.map(str::to_string),
            limit,
        ));
        self.entered.notify_one();

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| SyncError::Other(e.to_string()))?;
            permit.forget();
        }

        if self.failing_fetches.lock().unwrap().contains(conversation_id) {
            return Err(SyncError::Network(format!(
                "timed out fetching {conversation_id}"
            )));
        }

        let server = self.server.lock().unwrap();
        let all = server.get(conversation_id).cloned().unwrap_or_default();
        let start = match after_id {
            Some(after) => all
                .iter()
                .position(|m| m.id == after)
                .map(|i| i + 1)
                .unwrap_or(0),
            None => 0,
        };

        Ok(all.into_iter().skip(start).take(limit as usize).collect())
    }
}

/// Records removals; keys listed in `failing` cannot be removed.
#[derive(Default)]
pub(crate) struct FakeAssets {
    pub removed: Mutex<Vec<String>>,
    pub failing: Mutex<HashSet<String>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    pub entered: Arc<Notify>,
}

impl FakeAssets {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    /// Block every removal until permits are added to the returned semaphore.
    pub fn hold_removals(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn release_removals(&self) {
        self.gate.lock().unwrap().take();
    }
}

#[async_trait]
impl AssetStore for FakeAssets {
    async fn remove(&self, cache_key: &str) -> Result<()> {
        self.entered.notify_one();
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| SyncError::Other(e.to_string()))?;
            permit.forget();
        }

        if self.failing.lock().unwrap().contains(cache_key) {
            return Err(SyncError::Asset(format!("{cache_key} is locked")));
        }
        self.removed.lock().unwrap().push(cache_key.to_string());
        Ok(())
    }
}

pub(crate) struct FailingPrefetcher {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Prefetcher for FailingPrefetcher {
    async fn prefetch(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SyncError::Network("prefetch endpoint unreachable".to_string()))
    }
}

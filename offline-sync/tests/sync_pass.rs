use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

use offline_sync::adapters::sqlite::pool;
use offline_sync::{
    AssetStore, ConnectivityMedium, ContextParts, Message, MessageType, OutgoingMessage,
    PassOutcome, RemoteApi, Result, SyncConfig, SyncContext, SyncError, SyncTrigger,
    SystemClock, TriggerOutcome,
};

#[derive(Default)]
struct Server {
    conversations: Mutex<HashMap<String, Vec<Message>>>,
    sent: Mutex<Vec<String>>,
    rejected: Mutex<HashSet<String>>,
    fetches: Mutex<usize>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    fetching: Notify,
}

#[async_trait]
impl RemoteApi for Server {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message> {
        self.sent.lock().unwrap().push(message.content.clone());
        if self.rejected.lock().unwrap().contains(&message.content) {
            return Err(SyncError::Network("connection reset".to_string()));
        }

        let mut conversations = self.conversations.lock().unwrap();
        let messages = conversations
            .entry(message.conversation_id.clone())
            .or_default();
        let stored = Message {
            id: format!("{}-{}", message.conversation_id, messages.len()),
            conversation_id: message.conversation_id.clone(),
            sender_id: Some("me".to_string()),
            content: message.content.clone(),
            message_type: message.message_type,
            media_url: None,
            created_at: Utc::now(),
        };
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn fetch_messages(
        &self,
        conversation_id: &str,
        after_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        *self.fetches.lock().unwrap() += 1;
        self.fetching.notify_one();

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| SyncError::Other(e.to_string()))?
                .forget();
        }

        let conversations = self.conversations.lock().unwrap();
        let all = conversations.get(conversation_id).cloned().unwrap_or_default();
        let start = after_id
            .and_then(|after| all.iter().position(|m| m.id == after))
            .map_or(0, |i| i + 1);
        Ok(all.into_iter().skip(start).take(limit as usize).collect())
    }
}

struct NoAssets;

#[async_trait]
impl AssetStore for NoAssets {
    async fn remove(&self, _cache_key: &str) -> Result<()> {
        Ok(())
    }
}

fn context(server: Arc<Server>, online: bool) -> SyncContext {
    let mut config = SyncConfig::default();
    config.remote.base_url = Some("https://chat.example.com/api".to_string());
    config.remote.auth_token = Some("token".to_string());
    config.sync.sync_on_start = false;
    config.sync.conversation_delay_ms = 0;
    config.sync.outbox_item_delay_ms = 0;

    SyncContext::new(
        config,
        ContextParts {
            pool: pool::in_memory().unwrap(),
            remote: server,
            assets: Arc::new(NoAssets),
            clock: Arc::new(SystemClock),
            prefetcher: None,
            initially_online: online,
        },
    )
}

async fn wait_until_idle(context: &SyncContext) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while context.status().await.unwrap().in_progress {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[test_log::test(tokio::test)]
async fn offline_compose_then_reconnect_delivers_in_order() {
    let server = Arc::new(Server::default());
    server.rejected.lock().unwrap().insert("m2".to_string());
    let context = context(server.clone(), false);

    let m1 = context
        .enqueue_message("c1", "m1", MessageType::Text, None)
        .await
        .unwrap();
    let m2 = context
        .enqueue_message("c1", "m2", MessageType::Text, None)
        .await
        .unwrap();
    assert_eq!(
        context.trigger_sync(SyncTrigger::Manual).unwrap(),
        TriggerOutcome::Offline
    );
    assert!(server.sent.lock().unwrap().is_empty());

    context.start().unwrap();
    assert!(context.report_connectivity(&[ConnectivityMedium::Mobile]));
    tokio::time::timeout(Duration::from_secs(5), server.fetching.notified())
        .await
        .unwrap();
    wait_until_idle(&context).await;

    assert_eq!(*server.sent.lock().unwrap(), vec!["m1", "m2"]);
    assert!(context.store().outbox_item(&m1.temp_id).unwrap().is_none());
    let retried = context.store().outbox_item(&m2.temp_id).unwrap().unwrap();
    assert_eq!(retried.retry_count, 1);
    assert!(retried.last_error.unwrap().contains("connection reset"));

    let status = context.status().await.unwrap();
    assert!(status.online);
    assert_eq!(status.outbox_pending, 1);
    assert_eq!(status.outbox_failed, 1);
    assert!(status.last_sync_at.is_some());

    server.rejected.lock().unwrap().clear();
    let PassOutcome::Completed(report) = context.run_pass(SyncTrigger::Manual).await.unwrap()
    else {
        panic!("expected a completed pass");
    };
    assert_eq!(report.outbox.sent, 1);
    assert_eq!(context.status().await.unwrap().outbox_pending, 0);

    let contents: Vec<_> = context
        .messages("c1")
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["m1", "m2"]);

    context.dispose();
}

#[test_log::test(tokio::test)]
async fn only_one_pass_runs_at_a_time() {
    let server = Arc::new(Server::default());
    let gate = Arc::new(Semaphore::new(0));
    *server.gate.lock().unwrap() = Some(gate.clone());
    let context = context(server.clone(), false);
    context.store().ensure_conversation("c1").unwrap();
    context.start().unwrap();

    context.report_connectivity(&[ConnectivityMedium::Wifi]);
    tokio::time::timeout(Duration::from_secs(5), server.fetching.notified())
        .await
        .unwrap();

    assert_eq!(
        context.trigger_sync(SyncTrigger::Periodic).unwrap(),
        TriggerOutcome::Busy
    );
    assert_eq!(
        context.run_pass(SyncTrigger::Manual).await.unwrap(),
        PassOutcome::Busy
    );

    gate.add_permits(8);
    wait_until_idle(&context).await;

    assert_eq!(*server.fetches.lock().unwrap(), 1);
    let last = context.status().await.unwrap().last_pass.unwrap();
    assert_eq!(last.trigger, SyncTrigger::ConnectivityRestored);

    context.dispose();
}

#[test_log::test(tokio::test)]
async fn losing_connectivity_suspends_sync() {
    let server = Arc::new(Server::default());
    let context = context(server.clone(), true);
    context.start().unwrap();

    assert!(context.report_connectivity(&[ConnectivityMedium::None]));
    tokio::time::timeout(Duration::from_secs(5), async {
        while context.status().await.unwrap().online {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(
        context.trigger_sync(SyncTrigger::Manual).unwrap(),
        TriggerOutcome::Offline
    );
    assert_eq!(context.sync_conversation("c1").await.unwrap(), 0);
    assert_eq!(*server.fetches.lock().unwrap(), 0);

    context.dispose();
}

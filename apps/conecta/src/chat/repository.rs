use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::BackendClient;
use crate::errors::AppError;
use crate::models::{Message, NewMessage};

const MESSAGES_TABLE: &str = "mensajes";
const HISTORY_FUNCTION: &str = "get_conversation_messages";
/// Every subscriber listens on its own socket, so one shared name is enough.
const FEED_CHANNEL: &str = "public:mensajes:chat_global";

/// Live feed of every message inserted on the backend. The unsubscribe
/// action handed over at subscribe time runs on [`MessageFeed::unsubscribe`]
/// or on drop, whichever comes first.
pub struct MessageFeed {
    rx: mpsc::Receiver<Message>,
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl MessageFeed {
    pub fn new(rx: mpsc::Receiver<Message>, unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            rx,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Next inserted message, or `None` once the feed has ended.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for MessageFeed {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Messages exchanged between `a` and `b`, oldest first.
    async fn history(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>, AppError>;

    async fn send(&self, message: &NewMessage) -> Result<Message, AppError>;

    async fn subscribe(&self) -> Result<MessageFeed, AppError>;
}

#[derive(Debug, Serialize)]
struct HistoryArgs {
    user_id_a: Uuid,
    user_id_b: Uuid,
}

pub struct BackendChatRepository {
    backend: BackendClient,
}

impl BackendChatRepository {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ChatRepository for BackendChatRepository {
    async fn history(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>, AppError> {
        self.backend
            .rpc(
                HISTORY_FUNCTION,
                &HistoryArgs {
                    user_id_a: a,
                    user_id_b: b,
                },
            )
            .await
    }

    async fn send(&self, message: &NewMessage) -> Result<Message, AppError> {
        let rows: Vec<Message> = self.backend.table(MESSAGES_TABLE).insert(message).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Forbidden("El mensaje no fue enviado".to_string()))
    }

    async fn subscribe(&self) -> Result<MessageFeed, AppError> {
        let (rx, handle) = self
            .backend
            .subscribe_inserts::<Message>(FEED_CHANNEL, "public", MESSAGES_TABLE)
            .await?;
        Ok(MessageFeed::new(rx, move || handle.unsubscribe()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_unsubscribe_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = mpsc::channel(1);
        let counter = calls.clone();
        let feed = MessageFeed::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        feed.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = mpsc::channel(1);
        let counter = calls.clone();
        {
            let _feed = MessageFeed::new(rx, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recv_ends_when_sender_closes() {
        let (tx, rx) = mpsc::channel(1);
        let mut feed = MessageFeed::new(rx, || {});
        drop(tx);
        assert!(feed.recv().await.is_none());
    }

    #[test]
    fn test_history_args_use_function_parameter_names() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let args = serde_json::to_value(HistoryArgs {
            user_id_a: a,
            user_id_b: b,
        })
        .unwrap();
        assert_eq!(args, serde_json::json!({ "user_id_a": a, "user_id_b": b }));
    }
}

//! Realtime change feed over the backend's Phoenix-channel WebSocket.
//!
//! One socket per subscription. The spawned task joins the channel, keeps it
//! alive with heartbeats, pushes the new access token whenever the session is
//! refreshed and forwards every inserted row to the subscriber.
//! Dropping or unsubscribing the [`ChannelHandle`] leaves the channel and
//! closes the socket.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::BackendClient;
use crate::errors::AppError;
use crate::session::{AuthEvent, SessionStore};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CHANNEL_BUFFER: usize = 64;

/// Wire frame of the Phoenix protocol (vsn 1.0.0).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// What a received frame means for one subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Joined,
    JoinFailed(String),
    Insert(Value),
    Closed(String),
    Ignored,
}

pub fn join_message(topic: &str, schema: &str, table: &str, access_token: &str, reference: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic.to_string(),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "INSERT", "schema": schema, "table": table }
                ]
            },
            "access_token": access_token
        }),
        reference: Some(reference.to_string()),
    }
}

pub fn heartbeat_message(reference: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: "phoenix".to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

/// Hands the channel a fresh JWT so row-level security keeps matching
/// after the previous token expires.
pub fn access_token_message(topic: &str, access_token: &str, reference: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic.to_string(),
        event: "access_token".to_string(),
        payload: json!({ "access_token": access_token }),
        reference: Some(reference.to_string()),
    }
}

pub fn leave_message(topic: &str, reference: u64) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic.to_string(),
        event: "phx_leave".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

/// Interprets a frame received on `topic`. `join_ref` identifies the reply
/// to our own join request.
pub fn classify(message: &PhoenixMessage, topic: &str, join_ref: &str) -> ChannelEvent {
    if message.topic != topic {
        return ChannelEvent::Ignored;
    }
    match message.event.as_str() {
        "phx_reply" if message.reference.as_deref() == Some(join_ref) => {
            match message.payload.get("status").and_then(Value::as_str) {
                Some("ok") => ChannelEvent::Joined,
                _ => ChannelEvent::JoinFailed(
                    message
                        .payload
                        .pointer("/response/reason")
                        .and_then(Value::as_str)
                        .unwrap_or("join rejected")
                        .to_string(),
                ),
            }
        }
        "postgres_changes" => {
            let data = &message.payload["data"];
            match (data.get("type").and_then(Value::as_str), data.get("record")) {
                (Some("INSERT"), Some(record)) => ChannelEvent::Insert(record.clone()),
                _ => ChannelEvent::Ignored,
            }
        }
        // Legacy servers push the row change as its own event.
        "INSERT" => match message.payload.get("record") {
            Some(record) => ChannelEvent::Insert(record.clone()),
            None => ChannelEvent::Ignored,
        },
        "phx_close" => ChannelEvent::Closed("channel closed by server".to_string()),
        "phx_error" => ChannelEvent::Closed("channel error".to_string()),
        "system" if message.payload.get("status").and_then(Value::as_str) == Some("error") => {
            ChannelEvent::Closed(
                message
                    .payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("system error")
                    .to_string(),
            )
        }
        _ => ChannelEvent::Ignored,
    }
}

/// Keeps a subscription alive. Unsubscribe explicitly or drop it.
pub struct ChannelHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    /// Leaves the channel and closes the socket.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The task may already have exited on its own.
            let _ = stop.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl BackendClient {
    /// Subscribes to `INSERT` events on `schema.table`. Rows that do not
    /// deserialize as `T` are logged and skipped.
    pub async fn subscribe_inserts<T>(
        &self,
        channel: &str,
        schema: &str,
        table: &str,
    ) -> Result<(mpsc::Receiver<T>, ChannelHandle), AppError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        // Subscribed before the join so no refresh can slip in between.
        let auth_events = self.session.subscribe();
        let token = self.bearer().await?;
        let (socket, _) = tokio_tungstenite::connect_async(self.realtime_url.as_str())
            .await
            .map_err(|e| AppError::Realtime(format!("connect failed: {e}")))?;
        info!("Realtime socket connected for {schema}.{table}");

        let topic = format!("realtime:{channel}");
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = join_message(&topic, schema, table, &token, 1);
        let task = tokio::spawn(run_channel(
            socket,
            topic,
            join,
            tx,
            stop_rx,
            self.session.clone(),
            auth_events,
        ));

        Ok((
            rx,
            ChannelHandle {
                stop: Some(stop_tx),
                task,
            },
        ))
    }
}

/// Waits for the session to change tokens and returns the new access token.
async fn refreshed_token(
    events: &mut broadcast::Receiver<AuthEvent>,
    session: &SessionStore,
) -> String {
    loop {
        match events.recv().await {
            Ok(AuthEvent::TokenRefreshed(_)) | Ok(AuthEvent::SignedIn(_)) => {}
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Missed {skipped} auth events, resending the current token");
            }
            Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
        }
        if let Some(current) = session.get().await {
            return current.access_token;
        }
    }
}

async fn run_channel<S, T>(
    socket: S,
    topic: String,
    join: PhoenixMessage,
    tx: mpsc::Sender<T>,
    mut stop: oneshot::Receiver<()>,
    session: Arc<SessionStore>,
    mut auth_events: broadcast::Receiver<AuthEvent>,
) where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
    T: DeserializeOwned,
{
    let (mut write, mut read) = socket.split();
    let join_ref = join.reference.clone().unwrap_or_default();
    let mut next_ref: u64 = 2;

    if let Err(e) = send_frame(&mut write, &join).await {
        warn!("Realtime join for {topic} failed to send: {e}");
        return;
    }

    let start = tokio::time::Instant::now() + HEARTBEAT_INTERVAL;
    let mut heartbeat = tokio::time::interval_at(start, HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut stop => {
                let _ = send_frame(&mut write, &leave_message(&topic, next_ref)).await;
                let _ = write.close().await;
                info!("Unsubscribed from {topic}");
                break;
            }
            token = refreshed_token(&mut auth_events, &session) => {
                let frame = access_token_message(&topic, &token, next_ref);
                next_ref += 1;
                if let Err(e) = send_frame(&mut write, &frame).await {
                    warn!("Realtime token update failed on {topic}: {e}");
                    break;
                }
                debug!("Sent refreshed access token to {topic}");
            }
            _ = heartbeat.tick() => {
                let frame = heartbeat_message(next_ref);
                next_ref += 1;
                if let Err(e) = send_frame(&mut write, &frame).await {
                    warn!("Realtime heartbeat failed on {topic}: {e}");
                    break;
                }
            }
            incoming = read.next() => {
                let text = match incoming {
                    Some(Ok(WsMessage::Text(text))) => text.to_string(),
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("Realtime socket closed for {topic}");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("Realtime socket error on {topic}: {e}");
                        break;
                    }
                    Some(Ok(_)) => continue,
                };
                let message: PhoenixMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("Unreadable realtime frame: {e}");
                        continue;
                    }
                };
                match classify(&message, &topic, &join_ref) {
                    ChannelEvent::Joined => debug!("Joined {topic}"),
                    ChannelEvent::JoinFailed(reason) => {
                        warn!("Join rejected for {topic}: {reason}");
                        break;
                    }
                    ChannelEvent::Closed(reason) => {
                        warn!("{topic} closed: {reason}");
                        break;
                    }
                    ChannelEvent::Insert(record) => match serde_json::from_value::<T>(record) {
                        Ok(row) => {
                            if tx.send(row).await.is_err() {
                                // Subscriber went away.
                                let _ = send_frame(&mut write, &leave_message(&topic, next_ref)).await;
                                break;
                            }
                        }
                        Err(e) => warn!("Skipping realtime row that does not match the model: {e}"),
                    },
                    ChannelEvent::Ignored => {}
                }
            }
        }
    }
}

async fn send_frame<W>(write: &mut W, frame: &PhoenixMessage) -> Result<(), AppError>
where
    W: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(frame)?;
    write
        .send(WsMessage::text(text))
        .await
        .map_err(|e| AppError::Realtime(e.to_string()))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of the `mensajes` table. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// True when the message was exchanged between `a` and `b`, in either direction.
    pub fn involves_pair(&self, a: Uuid, b: Uuid) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
}

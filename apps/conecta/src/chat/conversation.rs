use std::collections::HashSet;

use uuid::Uuid;

use crate::models::Message;

/// Visible message list of one two-party conversation.
///
/// A message the user sends is recorded from the insert response and then
/// arrives a second time through the realtime feed; ids already present are
/// dropped so it shows once.
#[derive(Debug, Clone)]
pub struct Conversation {
    me: Uuid,
    other: Uuid,
    messages: Vec<Message>,
    seen: HashSet<i64>,
}

impl Conversation {
    pub fn new(me: Uuid, other: Uuid) -> Self {
        Self {
            me,
            other,
            messages: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn with_history(me: Uuid, other: Uuid, history: Vec<Message>) -> Self {
        let mut conversation = Self::new(me, other);
        for message in history {
            conversation.push(message);
        }
        conversation
    }

    pub fn me(&self) -> Uuid {
        self.me
    }

    pub fn other(&self) -> Uuid {
        self.other
    }

    /// Appends in delivery order. Returns `false` when the message belongs
    /// to another conversation or is already shown.
    pub fn push(&mut self, message: Message) -> bool {
        if !message.involves_pair(self.me, self.other) {
            return false;
        }
        if !self.seen.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

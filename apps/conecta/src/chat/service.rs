use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::auth::ProfileRepository;
use crate::chat::conversation::Conversation;
use crate::chat::repository::{ChatRepository, MessageFeed};
use crate::contracts::{ContractFilter, ContractRepository};
use crate::errors::AppError;
use crate::models::{Message, NewMessage, Profile, Role};
use crate::validation::validate_message;

/// Realtime feed narrowed to one conversation.
pub struct ConversationFeed {
    feed: MessageFeed,
    me: Uuid,
    other: Uuid,
}

impl ConversationFeed {
    /// Next message exchanged between the pair. Messages of other
    /// conversations are skipped. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Message> {
        while let Some(message) = self.feed.recv().await {
            if message.involves_pair(self.me, self.other) {
                return Some(message);
            }
            debug!("Ignoring message {} from another conversation", message.id);
        }
        None
    }

    pub fn unsubscribe(self) {
        self.feed.unsubscribe();
    }
}

pub struct ChatService {
    chat: Arc<dyn ChatRepository>,
    profiles: Arc<dyn ProfileRepository>,
    contracts: Arc<dyn ContractRepository>,
}

impl ChatService {
    pub fn new(
        chat: Arc<dyn ChatRepository>,
        profiles: Arc<dyn ProfileRepository>,
        contracts: Arc<dyn ContractRepository>,
    ) -> Self {
        Self {
            chat,
            profiles,
            contracts,
        }
    }

    /// People `actor` can chat with. A customer sees every advisor; an
    /// advisor sees the customers who have sent a contract request, each
    /// once, most recent request first.
    pub async fn contacts(&self, actor: &Profile) -> Result<Vec<Profile>, AppError> {
        match actor.role {
            Role::Customer => self.profiles.list_by_role(Role::Advisor).await,
            Role::Advisor => {
                let requests = self.contracts.list(&ContractFilter::default()).await?;
                let mut seen = HashSet::new();
                Ok(requests
                    .into_iter()
                    .filter_map(|request| request.requester)
                    .filter(|requester| seen.insert(requester.id))
                    .map(|requester| Profile {
                        id: requester.id,
                        email: None,
                        full_name: requester.full_name,
                        phone: requester.phone,
                        role: Role::Customer,
                    })
                    .collect())
            }
        }
    }

    pub async fn history(&self, actor: &Profile, other: Uuid) -> Result<Vec<Message>, AppError> {
        self.chat.history(actor.id, other).await
    }

    /// History loaded into a conversation buffer, ready to take live messages.
    pub async fn open(&self, actor: &Profile, other: Uuid) -> Result<Conversation, AppError> {
        let history = self.history(actor, other).await?;
        Ok(Conversation::with_history(actor.id, other, history))
    }

    pub async fn send(
        &self,
        sender_id: Option<Uuid>,
        receiver_id: Option<Uuid>,
        content: &str,
    ) -> Result<Message, AppError> {
        let (sender_id, receiver_id) = validate_message(sender_id, receiver_id, content)?;
        self.chat
            .send(&NewMessage {
                sender_id,
                receiver_id,
                content: content.trim().to_string(),
            })
            .await
    }

    /// Sends and records the message in `conversation`, so the realtime copy
    /// that follows is recognized as already shown.
    pub async fn send_in(
        &self,
        conversation: &mut Conversation,
        content: &str,
    ) -> Result<Message, AppError> {
        let message = self
            .send(Some(conversation.me()), Some(conversation.other()), content)
            .await?;
        conversation.push(message.clone());
        Ok(message)
    }

    pub async fn subscribe(&self, actor: &Profile, other: Uuid) -> Result<ConversationFeed, AppError> {
        let feed = self.chat.subscribe().await?;
        Ok(ConversationFeed {
            feed,
            me: actor.id,
            other,
        })
    }
}

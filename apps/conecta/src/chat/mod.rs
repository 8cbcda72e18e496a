pub mod conversation;
pub mod repository;
pub mod service;

pub use conversation::Conversation;
pub use repository::{BackendChatRepository, ChatRepository, MessageFeed};
pub use service::{ChatService, ConversationFeed};

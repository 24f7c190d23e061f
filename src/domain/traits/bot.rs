use async_trait::async_trait;
use crate::domain::entities::{ChatId, Reply};
use crate::application::errors::BotError;

/// Bot trait - abstraction for messaging platform adapters
#[async_trait]
pub trait Bot: Send + Sync {
    /// Start the bot and begin listening for messages
    async fn start(&self) -> Result<(), BotError>;

    /// Send plain text to a chat. Each call succeeds or fails on its own.
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<String, BotError>;

    /// Send a reply, rendering its keyboard if it has one
    async fn send_reply(&self, chat_id: ChatId, reply: &Reply) -> Result<String, BotError>;

    /// Answer a callback query
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<(), BotError>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}

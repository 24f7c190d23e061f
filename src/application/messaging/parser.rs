//! Message parser - Parses raw messages into structured messages

use crate::domain::entities::{ChatId, Content, Message, User};

/// Parses incoming messages into structured Message objects
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    /// Parse a text message
    pub fn parse(&self, chat_id: ChatId, text: impl Into<String>, sender: Option<User>) -> Message {
        let text = text.into();

        if text.is_empty() {
            return Message::new(chat_id, Content::Empty).with_sender_opt(sender);
        }

        // Check if it's a command
        if text.starts_with('/') || (!self.command_prefix.is_empty() && text.starts_with(&self.command_prefix)) {
            return self.parse_command(chat_id, &text, sender);
        }

        // Regular text message, kept verbatim
        Message::from_text(chat_id, text).with_sender_opt(sender)
    }

    /// Parse a command message
    fn parse_command(&self, chat_id: ChatId, text: &str, sender: Option<User>) -> Message {
        // Remove the command prefix (either / or custom prefix)
        let cmd_text = match text.strip_prefix('/') {
            Some(rest) => rest,
            None => text.strip_prefix(self.command_prefix.as_str()).unwrap_or(text),
        };

        // Split command and arguments
        let mut parts = cmd_text.split_whitespace();
        let name = parts.next().unwrap_or("");
        // group chats address commands as /name@botname
        let name = name.split('@').next().unwrap_or(name).to_string();
        let args = parts.map(|s| s.to_string()).collect();

        Message::from_command(chat_id, name, args).with_sender_opt(sender)
    }

    /// Parse a callback query (inline button press)
    pub fn parse_callback(&self, chat_id: ChatId, callback_id: impl Into<String>, data: impl Into<String>, user: User) -> Message {
        Message::from_callback(chat_id, data)
            .with_id(callback_id)
            .with_sender(user)
    }
}

impl Message {
    /// Helper to set sender as Option
    pub fn with_sender_opt(mut self, user: Option<User>) -> Self {
        if let Some(u) = user {
            self.sender = Some(u);
        }
        self
    }
}

//! Console adapter for development/testing

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::application::errors::BotError;
use crate::domain::entities::{ChatId, Markup, Reply};
use crate::domain::traits::{Bot, BotInfo};

/// Chat id used for the local operator
pub const CONSOLE_CHAT: ChatId = 0;

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
    input: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleAdapter {
    pub fn new() -> Self {
        Self {
            info: BotInfo {
                id: "console".to_string(),
                name: "phrase-bot".to_string(),
                username: "console".to_string(),
            },
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Next line from stdin, `None` at end of input
    pub async fn read_line(&self) -> Option<String> {
        match self.input.lock().await.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                None
            }
        }
    }

    fn render(reply: &Reply) -> String {
        let mut out = reply.text.clone();
        match &reply.markup {
            Some(Markup::Menu(rows)) => {
                for row in rows {
                    out.push_str(&format!("\n  [Buttons] {}", row.join(" | ")));
                }
            }
            Some(Markup::Inline(rows)) => {
                for row in rows {
                    let row_text: Vec<&str> = row.iter().map(|b| b.text.as_str()).collect();
                    out.push_str(&format!("\n  [Inline] {}", row_text.join(" | ")));
                }
            }
            None => {}
        }
        out
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode)");
        Ok(())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<String, BotError> {
        if chat_id == CONSOLE_CHAT {
            println!("[BOT] {}", text);
        } else {
            println!("[BOT -> {}] {}", chat_id, text);
        }
        Ok("console_msg".to_string())
    }

    async fn send_reply(&self, chat_id: ChatId, reply: &Reply) -> Result<String, BotError> {
        self.send_message(chat_id, &Self::render(reply)).await
    }

    async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>) -> Result<(), BotError> {
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

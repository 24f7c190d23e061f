//! Telegram adapter

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::errors::BotError;
use crate::application::messaging::MessageParser;
use crate::domain::entities::{self, ChatId, CommandRegistry, KeyboardButton, Markup, Reply};
use crate::domain::traits::{Bot, BotInfo};

/// Telegram API base URL
const API_BASE: &str = "https://api.telegram.org";

/// Upper bound for a single API call; long polls get their poll time on top
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Telegram update type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Envelope every Bot API method answers with
#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct MessageResult {
    message_id: i64,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ReplyMarkup {
    Keyboard {
        keyboard: Vec<Vec<ReplyKeyboardButton>>,
        resize_keyboard: bool,
        is_persistent: bool,
    },
    Inline {
        inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
    },
}

#[derive(Serialize)]
struct ReplyKeyboardButton {
    text: String,
}

#[derive(Serialize)]
struct InlineKeyboardButton {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

impl From<&Markup> for ReplyMarkup {
    fn from(markup: &Markup) -> Self {
        match markup {
            Markup::Menu(rows) => ReplyMarkup::Keyboard {
                keyboard: rows.iter()
                    .map(|row| row.iter().map(|text| ReplyKeyboardButton { text: text.clone() }).collect())
                    .collect(),
                resize_keyboard: true,
                is_persistent: true,
            },
            Markup::Inline(rows) => ReplyMarkup::Inline {
                inline_keyboard: rows.iter()
                    .map(|row| row.iter().map(InlineKeyboardButton::from).collect())
                    .collect(),
            },
        }
    }
}

impl From<&KeyboardButton> for InlineKeyboardButton {
    fn from(btn: &KeyboardButton) -> Self {
        Self {
            text: btn.text.clone(),
            callback_data: btn.callback_data.clone(),
            url: btn.url.clone(),
        }
    }
}

impl From<&User> for entities::User {
    fn from(user: &User) -> Self {
        entities::User {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Telegram bot adapter
pub struct TelegramAdapter {
    token: String,
    api_base: String,
    client: Client,
    request_timeout: Duration,
    info: BotInfo,
}

impl TelegramAdapter {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: API_BASE.to_string(),
            client: Client::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            info: BotInfo {
                id: "unknown".to_string(),
                name: "phrase-bot".to_string(),
                username: "phrase_bot".to_string(),
            },
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Point the client at another Bot API server
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<Req, Res>(&self, method: &str, request: &Req) -> Result<Res, BotError>
    where
        Req: Serialize + ?Sized + Sync,
        Res: for<'de> Deserialize<'de>,
    {
        self.call_within(method, request, self.request_timeout).await
    }

    /// POST a method call and unwrap the API envelope
    async fn call_within<Req, Res>(&self, method: &str, request: &Req, timeout: Duration) -> Result<Res, BotError>
    where
        Req: Serialize + ?Sized + Sync,
        Res: for<'de> Deserialize<'de>,
    {
        let response = self.client
            .post(self.api_url(method))
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        let status = response.status();
        let data: ApiResponse<Res> = response
            .json()
            .await
            .map_err(|e| BotError::Parse(format!("{} ({}): {}", method, status, e)))?;

        match data {
            ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
            ApiResponse { description, .. } => Err(BotError::Network(format!(
                "Telegram API error on {} ({}): {}",
                method,
                status,
                description.unwrap_or_default()
            ))),
        }
    }

    /// Fetch bot info from Telegram API
    pub async fn fetch_bot_info(&mut self) -> Result<(), BotError> {
        #[derive(Deserialize)]
        struct BotInfoResponse {
            id: i64,
            first_name: String,
            username: String,
        }

        let data: BotInfoResponse = self.call("getMe", &serde_json::json!({})).await?;

        self.info = BotInfo {
            id: data.id.to_string(),
            name: data.first_name,
            username: data.username,
        };

        Ok(())
    }

    /// Get updates from Telegram using getUpdates API
    pub async fn get_updates(&self, offset: i64, timeout: i64) -> Result<Vec<Update>, BotError> {
        #[derive(Serialize)]
        struct GetUpdatesRequest {
            offset: i64,
            timeout: i64,
            allowed_updates: Vec<String>,
        }

        let request = GetUpdatesRequest {
            offset,
            timeout,
            allowed_updates: vec!["message".to_string(), "callback_query".to_string()],
        };

        let poll = Duration::from_secs(timeout.max(0) as u64);
        self.call_within("getUpdates", &request, poll + self.request_timeout).await
    }

    /// Get the next update offset
    pub fn get_next_offset(updates: &[Update], current: i64) -> i64 {
        updates.iter()
            .map(|u| u.update_id + 1)
            .max()
            .unwrap_or(current)
    }

    /// Convert a raw update into an inbound event
    pub fn to_inbound(update: &Update, parser: &MessageParser) -> Option<entities::Message> {
        if let Some(msg) = &update.message {
            let text = msg.text.as_deref()?;
            let sender = msg.from.as_ref().map(entities::User::from);
            return Some(parser
                .parse(msg.chat.id, text, sender)
                .with_platform("telegram"));
        }

        let cb = update.callback_query.as_ref()?;
        let chat_id = cb.message.as_ref().map_or(cb.from.id, |m| m.chat.id);
        Some(parser
            .parse_callback(chat_id, cb.id.clone(), cb.data.clone().unwrap_or_default(), entities::User::from(&cb.from))
            .with_platform("telegram"))
    }

    /// Send a message, optionally with a keyboard
    async fn send(&self, chat_id: ChatId, text: &str, markup: Option<&Markup>) -> Result<String, BotError> {
        #[derive(Serialize)]
        struct SendMessageRequest<'a> {
            chat_id: ChatId,
            text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            reply_markup: Option<ReplyMarkup>,
        }

        let request = SendMessageRequest {
            chat_id,
            text,
            reply_markup: markup.map(ReplyMarkup::from),
        };

        let result: MessageResult = self.call("sendMessage", &request).await?;
        Ok(result.message_id.to_string())
    }

    /// Register bot commands with Telegram
    pub async fn register_commands(&self, registry: &CommandRegistry) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct Command {
            command: String,
            description: String,
        }

        #[derive(Serialize)]
        struct SetMyCommandsRequest {
            commands: Vec<Command>,
        }

        let commands = registry.all()
            .map(|c| Command {
                command: c.name.clone(),
                description: c.description.clone().unwrap_or_else(|| c.name.clone()),
            })
            .collect();

        let _: bool = self.call("setMyCommands", &SetMyCommandsRequest { commands }).await?;

        tracing::info!("Registered bot commands with Telegram");
        Ok(())
    }
}

#[async_trait]
impl Bot for TelegramAdapter {
    async fn start(&self) -> Result<(), BotError> {
        let shown: String = self.token.chars().take(8).collect();
        tracing::info!("Starting Telegram bot (token: {}..., request timeout {:?})", shown, self.request_timeout);
        Ok(())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<String, BotError> {
        tracing::debug!("Sending to {}: {}", chat_id, text);
        self.send(chat_id, text, None).await
    }

    async fn send_reply(&self, chat_id: ChatId, reply: &Reply) -> Result<String, BotError> {
        tracing::debug!("Replying to {}: {}", chat_id, reply.text);
        self.send(chat_id, &reply.text, reply.markup.as_ref()).await
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct AnswerRequest<'a> {
            callback_query_id: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            text: Option<&'a str>,
        }

        let _: bool = self.call("answerCallbackQuery", &AnswerRequest { callback_query_id: callback_id, text }).await?;
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

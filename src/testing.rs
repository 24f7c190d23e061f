//! Hand-written fakes shared by unit tests

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::errors::{BotError, StorageError};
use crate::domain::entities::{ChatId, Phrase, Reply, TopSubmitter, User};
use crate::domain::traits::{Bot, BotInfo, Clock, PhraseStore};

/// Records every delivery; selected chats fail or never answer
#[derive(Default)]
pub struct RecordingBot {
    failing: HashSet<ChatId>,
    hanging: HashSet<ChatId>,
    attempts: Mutex<Vec<ChatId>>,
    delivered: Mutex<Vec<(ChatId, String)>>,
}

impl RecordingBot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, chat_id: ChatId) -> Self {
        self.failing.insert(chat_id);
        self
    }

    pub fn hanging(mut self, chat_id: ChatId) -> Self {
        self.hanging.insert(chat_id);
        self
    }

    /// Chats a delivery was attempted to, in attempt order
    pub fn attempted(&self) -> Vec<ChatId> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: ChatId) -> Vec<String> {
        self.delivered.lock().unwrap()
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Bot for RecordingBot {
    async fn start(&self) -> Result<(), BotError> {
        Ok(())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<String, BotError> {
        self.attempts.lock().unwrap().push(chat_id);

        if self.hanging.contains(&chat_id) {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if self.failing.contains(&chat_id) {
            return Err(BotError::Network(format!("chat {} unreachable", chat_id)));
        }

        self.delivered.lock().unwrap().push((chat_id, text.to_string()));
        Ok("1".to_string())
    }

    async fn send_reply(&self, chat_id: ChatId, reply: &Reply) -> Result<String, BotError> {
        self.send_message(chat_id, &reply.text).await
    }

    async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>) -> Result<(), BotError> {
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        BotInfo {
            id: "test".to_string(),
            name: "phrase-bot".to_string(),
            username: "test_bot".to_string(),
        }
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Store whose writes always fail and whose reads are empty
pub struct FailingStore;

#[async_trait]
impl PhraseStore for FailingStore {
    async fn insert(&self, _submitter: &User, _text: &str) -> Result<Phrase, StorageError> {
        Err(StorageError::Unavailable("store is down".to_string()))
    }

    async fn list_all(&self) -> Vec<String> {
        Vec::new()
    }

    async fn count(&self) -> u64 {
        0
    }

    async fn top_submitters(&self, _limit: usize) -> Vec<TopSubmitter> {
        Vec::new()
    }
}

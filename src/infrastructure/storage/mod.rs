//! In-memory phrase store, for console mode and tests

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::application::errors::StorageError;
use crate::domain::entities::phrase::CREATED_AT_FORMAT;
use crate::domain::entities::{Phrase, TopSubmitter, User, UserId};
use crate::domain::traits::PhraseStore;

/// Process-lifetime phrase store
#[derive(Default)]
pub struct MemoryPhraseStore {
    phrases: RwLock<Vec<Phrase>>,
}

impl MemoryPhraseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PhraseStore for MemoryPhraseStore {
    async fn insert(&self, submitter: &User, text: &str) -> Result<Phrase, StorageError> {
        let mut phrases = self.phrases.write().await;
        let id = phrases.last().map_or(1, |p| p.id + 1);

        let phrase = Phrase {
            id,
            submitter_id: submitter.id,
            display_name: submitter.display_name(),
            text: text.to_string(),
            created_at: chrono::Local::now().format(CREATED_AT_FORMAT).to_string(),
        };
        phrases.push(phrase.clone());
        Ok(phrase)
    }

    async fn list_all(&self) -> Vec<String> {
        let phrases = self.phrases.read().await;
        phrases.iter().map(|p| p.text.clone()).collect()
    }

    async fn count(&self) -> u64 {
        self.phrases.read().await.len() as u64
    }

    async fn top_submitters(&self, limit: usize) -> Vec<TopSubmitter> {
        let phrases = self.phrases.read().await;

        // later rows overwrite the name, so each submitter keeps the latest one
        let mut grouped: HashMap<UserId, (String, u64)> = HashMap::new();
        for phrase in phrases.iter() {
            let entry = grouped.entry(phrase.submitter_id).or_insert_with(|| (String::new(), 0));
            entry.0 = phrase.display_name.clone();
            entry.1 += 1;
        }

        let mut top: Vec<TopSubmitter> = grouped.into_iter()
            .map(|(id, (name, count))| TopSubmitter::new(id, name, count))
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then(a.submitter_id.cmp(&b.submitter_id)));
        top.truncate(limit);
        top
    }
}

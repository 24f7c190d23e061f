use async_trait::async_trait;
use crate::application::errors::StorageError;
use crate::domain::entities::{Phrase, TopSubmitter, User};

/// Phrase store - append-only persistence for submitted phrases.
///
/// Writes report failure to the caller. Reads never fail: an unreachable
/// store reads as an empty one.
#[async_trait]
pub trait PhraseStore: Send + Sync {
    /// Append a phrase, assigning its id and timestamp
    async fn insert(&self, submitter: &User, text: &str) -> Result<Phrase, StorageError>;

    /// Text of every stored phrase
    async fn list_all(&self) -> Vec<String>;

    /// Total number of stored phrases
    async fn count(&self) -> u64;

    /// Submitters ranked by phrase count, ties by lower submitter id
    async fn top_submitters(&self, limit: usize) -> Vec<TopSubmitter>;
}

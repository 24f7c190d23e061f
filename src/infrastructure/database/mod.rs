//! SQLite-backed phrase store

use async_trait::async_trait;
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::application::errors::StorageError;
use crate::domain::entities::phrase::CREATED_AT_FORMAT;
use crate::domain::entities::{Phrase, TopSubmitter, User};
use crate::domain::traits::PhraseStore;

/// Durable phrase store. The connection sits behind a mutex, so writes are
/// serialized and row ids are assigned one at a time.
pub struct SqlitePhraseStore {
    conn: Mutex<Connection>,
}

impl SqlitePhraseStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        init_tables(&conn)?;
        tracing::info!("SQLite phrase store ready");
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock()
            .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))
    }

    fn insert_row(&self, submitter: &User, text: &str) -> Result<Phrase, StorageError> {
        let display_name = submitter.display_name();
        let created_at = chrono::Local::now().format(CREATED_AT_FORMAT).to_string();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO phrases (user_id, username, phrase, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![submitter.id, display_name, text, created_at],
        )?;

        Ok(Phrase {
            id: conn.last_insert_rowid(),
            submitter_id: submitter.id,
            display_name,
            text: text.to_string(),
            created_at,
        })
    }

    fn select_all(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT phrase FROM phrases ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut phrases = Vec::new();
        for phrase in rows {
            phrases.push(phrase?);
        }
        Ok(phrases)
    }

    fn select_count(&self) -> Result<u64, StorageError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM phrases", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn select_top(&self, limit: usize) -> Result<Vec<TopSubmitter>, StorageError> {
        let conn = self.lock()?;
        // The most recent name a submitter used labels their row.
        let mut stmt = conn.prepare(
            "SELECT p.user_id,
                    (SELECT username FROM phrases latest
                     WHERE latest.user_id = p.user_id
                     ORDER BY latest.id DESC LIMIT 1),
                    COUNT(*) AS total
             FROM phrases p
             GROUP BY p.user_id
             ORDER BY total DESC, p.user_id ASC
             LIMIT ?1"
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], |row| {
            let count: i64 = row.get(2)?;
            Ok(TopSubmitter {
                submitter_id: row.get(0)?,
                display_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                count: count.max(0) as u64,
            })
        })?;

        let mut top = Vec::new();
        for entry in rows {
            top.push(entry?);
        }
        Ok(top)
    }
}

/// Idempotent schema setup
fn init_tables(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS phrases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            username TEXT,
            phrase TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_phrases_user ON phrases(user_id)",
        [],
    )?;

    Ok(())
}

#[async_trait]
impl PhraseStore for SqlitePhraseStore {
    async fn insert(&self, submitter: &User, text: &str) -> Result<Phrase, StorageError> {
        match self.insert_row(submitter, text) {
            Ok(phrase) => {
                tracing::info!("Phrase {} added by {}", phrase.id, phrase.display_name);
                Ok(phrase)
            }
            Err(e) => {
                tracing::error!("Failed to insert phrase: {}", e);
                Err(e)
            }
        }
    }

    async fn list_all(&self) -> Vec<String> {
        self.select_all().unwrap_or_else(|e| {
            tracing::warn!("Failed to list phrases: {}", e);
            Vec::new()
        })
    }

    async fn count(&self) -> u64 {
        self.select_count().unwrap_or_else(|e| {
            tracing::warn!("Failed to count phrases: {}", e);
            0
        })
    }

    async fn top_submitters(&self, limit: usize) -> Vec<TopSubmitter> {
        self.select_top(limit).unwrap_or_else(|e| {
            tracing::warn!("Failed to rank submitters: {}", e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqlitePhraseStore {
        SqlitePhraseStore::open_in_memory().expect("in-memory store")
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids_and_timestamp() {
        let store = store();
        let alice = User::new(42).with_username("alice");

        let first = store.insert(&alice, "Carpe diem").await.unwrap();
        let second = store.insert(&alice, "Memento mori").await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.submitter_id, 42);
        assert_eq!(first.display_name, "alice");
        assert!(chrono::NaiveDateTime::parse_from_str(&first.created_at, CREATED_AT_FORMAT).is_ok());
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn list_all_returns_text_verbatim() {
        let store = store();
        let alice = User::new(42).with_username("alice");
        store.insert(&alice, "Carpe diem").await.unwrap();
        store.insert(&alice, "  spaced  \n").await.unwrap();

        assert_eq!(store.list_all().await, vec!["Carpe diem".to_string(), "  spaced  \n".to_string()]);
    }

    #[tokio::test]
    async fn empty_store_reads_empty() {
        let store = store();
        assert!(store.list_all().await.is_empty());
        assert_eq!(store.count().await, 0);
        assert!(store.top_submitters(3).await.is_empty());
    }

    #[tokio::test]
    async fn top_submitters_orders_by_count_then_id() {
        let store = store();
        let a = User::new(1).with_username("A");
        let b = User::new(2).with_username("B");
        let c = User::new(3).with_username("C");

        // interleave so insertion order does not decide the tie
        for i in 0..5 {
            store.insert(&b, &format!("b{}", i)).await.unwrap();
            store.insert(&a, &format!("a{}", i)).await.unwrap();
        }
        store.insert(&c, "c").await.unwrap();

        let top = store.top_submitters(3).await;
        assert_eq!(top, vec![
            TopSubmitter::new(1, "A", 5),
            TopSubmitter::new(2, "B", 5),
            TopSubmitter::new(3, "C", 1),
        ]);

        assert_eq!(store.top_submitters(1).await.len(), 1);
    }

    #[tokio::test]
    async fn top_submitters_uses_latest_name() {
        let store = store();
        store.insert(&User::new(7).with_username("old"), "one").await.unwrap();
        store.insert(&User::new(7).with_username("new"), "two").await.unwrap();

        let top = store.top_submitters(3).await;
        assert_eq!(top, vec![TopSubmitter::new(7, "new", 2)]);
    }

    #[test]
    fn schema_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_tables(&conn).unwrap();
        init_tables(&conn).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_are_serialized() {
        let store: std::sync::Arc<dyn PhraseStore> = std::sync::Arc::new(store());
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.insert(&User::new(i % 5), &format!("phrase {}", i)).await.unwrap()
                })
            })
            .collect();

        let mut inserted = Vec::new();
        for handle in handles {
            inserted.push(handle.await.unwrap());
        }
        inserted.sort_by_key(|p| p.id);

        assert_eq!(store.count().await, 50);
        let ids: Vec<i64> = inserted.iter().map(|p| p.id).collect();
        assert_eq!(ids, (1..=50).collect::<Vec<i64>>());
        // listing order follows id order
        let texts: Vec<String> = inserted.into_iter().map(|p| p.text).collect();
        assert_eq!(store.list_all().await, texts);
    }
}

//! SQLite-backed store.
//!
//! The `news.id` primary key is the uniqueness constraint behind
//! [`NewsStore::insert_if_absent`]: the insert uses `ON CONFLICT(id) DO NOTHING`,
//! so overlapping ingestion runs cannot produce duplicate rows.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;

use crate::error::StoreError;
use crate::ingest::types::NewsRecord;
use crate::votes::{Party, VoteTally};

use super::{InsertOutcome, NewsStore, UserStore, VoteStore};

pub async fn connect(url: &str, timeout: Duration) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| "parsing DATABASE_URL")?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(timeout);

    let in_memory = url.contains(":memory:") || url.contains("mode=memory");

    if !in_memory {
        // Ensure parent directory exists
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
    }

    // Every connection to `:memory:` opens its own database, so keep exactly one.
    let max_connections = if in_memory { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(timeout)
        .connect_with(options)
        .await
        .with_context(|| "connecting to sqlite")?;

    Ok(pool)
}

/// Creates tables and indexes if they are missing. Safe to run on every start.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS news (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL,
            author TEXT NOT NULL DEFAULT '',
            image TEXT,
            language TEXT NOT NULL DEFAULT '',
            category_json TEXT NOT NULL DEFAULT '[]',
            published_ns INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS state_votes (
            state TEXT PRIMARY KEY,
            party_a INTEGER NOT NULL DEFAULT 0,
            party_b INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            email TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_news_published ON news(published_ns DESC, id ASC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn count_news(&self) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

fn news_from_row(row: &SqliteRow) -> Result<NewsRecord, StoreError> {
    let id: String = row.try_get("id")?;
    let category_json: String = row.try_get("category_json")?;
    let category: Vec<String> = serde_json::from_str(&category_json)
        .map_err(|e| StoreError::Corrupt(format!("news `{id}` category: {e}")))?;
    let published_ns: i64 = row.try_get("published_ns")?;
    let published = DateTime::from_timestamp_nanos(published_ns);

    Ok(NewsRecord {
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        url: row.try_get("url")?,
        author: row.try_get("author")?,
        image: row.try_get("image")?,
        language: row.try_get("language")?,
        category,
        published,
        id,
    })
}

fn tally_from_row(row: &SqliteRow) -> Result<VoteTally, StoreError> {
    let party_a: i64 = row.try_get("party_a")?;
    let party_b: i64 = row.try_get("party_b")?;
    Ok(VoteTally {
        state: row.try_get("state")?,
        party_a: party_a.max(0) as u64,
        party_b: party_b.max(0) as u64,
    })
}

#[async_trait]
impl NewsStore for SqliteStore {
    async fn insert_if_absent(&self, record: &NewsRecord) -> Result<InsertOutcome, StoreError> {
        let category_json = serde_json::to_string(&record.category)
            .map_err(|e| StoreError::Corrupt(format!("news `{}` category: {e}", record.id)))?;
        // Nanoseconds keep the full precision the feed sent.
        let published_ns = record.published.timestamp_nanos_opt().ok_or_else(|| {
            StoreError::Corrupt(format!("news `{}` published out of range", record.id))
        })?;

        let res = sqlx::query(
            r#"
            INSERT INTO news
                (id, title, description, url, author, image, language, category_json, published_ns)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.url)
        .bind(&record.author)
        .bind(&record.image)
        .bind(&record.language)
        .bind(&category_json)
        .bind(published_ns)
        .execute(&self.pool)
        .await;

        match res {
            Ok(done) if done.rows_affected() == 0 => Ok(InsertOutcome::AlreadyPresent),
            Ok(_) => Ok(InsertOutcome::Inserted),
            // A concurrent writer won the race on the same key.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(InsertOutcome::AlreadyPresent)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_latest(&self) -> Result<Vec<NewsRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, description, url, author, image, language, category_json, published_ns
            FROM news
            ORDER BY published_ns DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(news_from_row).collect()
    }
}

#[async_trait]
impl VoteStore for SqliteStore {
    async fn all_tallies(&self) -> Result<Vec<VoteTally>, StoreError> {
        let rows = sqlx::query("SELECT state, party_a, party_b FROM state_votes ORDER BY state")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(tally_from_row).collect()
    }

    async fn tally_for(&self, state: &str) -> Result<Option<VoteTally>, StoreError> {
        let row = sqlx::query("SELECT state, party_a, party_b FROM state_votes WHERE state = ?")
            .bind(state)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(tally_from_row).transpose()
    }

    async fn cast(&self, state: &str, party: Party) -> Result<VoteTally, StoreError> {
        let (a, b): (i64, i64) = match party {
            Party::PartyA => (1, 0),
            Party::PartyB => (0, 1),
        };

        // Single statement: concurrent votes for the same state never lose an increment.
        let row = sqlx::query(
            r#"
            INSERT INTO state_votes (state, party_a, party_b)
            VALUES (?, ?, ?)
            ON CONFLICT(state) DO UPDATE SET
                party_a = state_votes.party_a + excluded.party_a,
                party_b = state_votes.party_b + excluded.party_b
            RETURNING state, party_a, party_b
            "#,
        )
        .bind(state)
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await?;

        tally_from_row(&row)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<InsertOutcome, StoreError> {
        let res = sqlx::query(
            "INSERT INTO users (email, password_hash) VALUES (?, ?) ON CONFLICT(email) DO NOTHING",
        )
        .bind(email)
        .bind(password_hash)
        .execute(&self.pool)
        .await;

        match res {
            Ok(done) if done.rows_affected() == 0 => Ok(InsertOutcome::AlreadyPresent),
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(InsertOutcome::AlreadyPresent)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn password_hash(&self, email: &str) -> Result<Option<String>, StoreError> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
    }
}

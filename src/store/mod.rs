//! Storage abstraction for news records, state vote tallies and accounts.
//!
//! Two backends implement the traits: [`sqlite::SqliteStore`] for the running
//! service and [`memory::MemoryStore`] for tests and local experiments.
//!
//! News records follow an insert-only discipline: the natural key `id` is
//! unique, a second insert with the same key leaves the first row untouched,
//! and there is no update or delete path.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::ingest::types::NewsRecord;
use crate::votes::{Party, VoteTally};

/// Result of a conditional write keyed by the record's natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Insert `record` unless a record with the same `id` exists.
    ///
    /// Safe to call repeatedly and concurrently; the stored row always keeps the
    /// field values of the first successful insert.
    async fn insert_if_absent(&self, record: &NewsRecord) -> Result<InsertOutcome, StoreError>;

    /// Full snapshot ordered by `published` descending, ties broken by `id` ascending.
    async fn list_latest(&self) -> Result<Vec<NewsRecord>, StoreError>;
}

#[async_trait]
pub trait VoteStore: Send + Sync {
    /// All tallies ordered by state.
    async fn all_tallies(&self) -> Result<Vec<VoteTally>, StoreError>;

    async fn tally_for(&self, state: &str) -> Result<Option<VoteTally>, StoreError>;

    /// Atomically add one vote for `party` in `state` and return the new tally.
    async fn cast(&self, state: &str, party: Party) -> Result<VoteTally, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create an account unless the email is taken. Keyed on the exact email.
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<InsertOutcome, StoreError>;

    async fn password_hash(&self, email: &str) -> Result<Option<String>, StoreError>;
}

/// Orders records the way the reader API promises.
pub(crate) fn sort_latest_first(records: &mut [NewsRecord]) {
    records.sort_by(|a, b| b.published.cmp(&a.published).then_with(|| a.id.cmp(&b.id)));
}

//! In-memory [`NewsStore`] / [`VoteStore`] / [`UserStore`] implementation.
//!
//! Uses `HashMap` / `BTreeMap` behind `std::sync::RwLock`. The insert-if-absent
//! check and the write happen under one write lock, which gives the same
//! single-winner guarantee as the database uniqueness constraint.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::ingest::types::NewsRecord;
use crate::votes::{Party, VoteTally};

use super::{sort_latest_first, InsertOutcome, NewsStore, UserStore, VoteStore};

#[derive(Default)]
pub struct MemoryStore {
    news: RwLock<HashMap<String, NewsRecord>>,
    votes: RwLock<BTreeMap<String, VoteTally>>,
    users: RwLock<HashMap<String, String>>,
    failing_ids: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that reports a storage fault whenever one of `ids` is written.
    pub fn failing_on<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing_ids: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn news_len(&self) -> usize {
        self.news.read().expect("news lock poisoned").len()
    }

    pub fn get(&self, id: &str) -> Option<NewsRecord> {
        self.news.read().expect("news lock poisoned").get(id).cloned()
    }
}

#[async_trait]
impl NewsStore for MemoryStore {
    async fn insert_if_absent(&self, record: &NewsRecord) -> Result<InsertOutcome, StoreError> {
        if self.failing_ids.contains(&record.id) {
            return Err(StoreError::Corrupt(format!(
                "injected failure for `{}`",
                record.id
            )));
        }

        let mut news = self.news.write().expect("news lock poisoned");
        if news.contains_key(&record.id) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        news.insert(record.id.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn list_latest(&self) -> Result<Vec<NewsRecord>, StoreError> {
        let mut out: Vec<NewsRecord> = self
            .news
            .read()
            .expect("news lock poisoned")
            .values()
            .cloned()
            .collect();
        sort_latest_first(&mut out);
        Ok(out)
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn all_tallies(&self) -> Result<Vec<VoteTally>, StoreError> {
        let votes = self.votes.read().expect("votes lock poisoned");
        Ok(votes.values().cloned().collect())
    }

    async fn tally_for(&self, state: &str) -> Result<Option<VoteTally>, StoreError> {
        let votes = self.votes.read().expect("votes lock poisoned");
        Ok(votes.get(state).cloned())
    }

    async fn cast(&self, state: &str, party: Party) -> Result<VoteTally, StoreError> {
        let mut votes = self.votes.write().expect("votes lock poisoned");
        let tally = votes
            .entry(state.to_string())
            .or_insert_with(|| VoteTally::empty(state));
        tally.record(party);
        Ok(tally.clone())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<InsertOutcome, StoreError> {
        let mut users = self.users.write().expect("users lock poisoned");
        if users.contains_key(email) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        users.insert(email.to_string(), password_hash.to_string());
        Ok(InsertOutcome::Inserted)
    }

    async fn password_hash(&self, email: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .users
            .read()
            .expect("users lock poisoned")
            .get(email)
            .cloned())
    }
}

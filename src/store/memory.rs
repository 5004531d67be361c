// src/store/memory.rs
//! In-process tables. Used by tests and by `STORAGE_BACKEND=memory`;
//! contents are lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PollStore, StoreError};
use crate::models::{NewPoll, NewVote, OptionRow, PollRow, VoteRow};

#[derive(Default)]
struct Tables {
    polls: Vec<PollRow>,
    options: Vec<OptionRow>,
    votes: Vec<VoteRow>,
}

/// Row counts per table: polls, options, votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCounts {
    pub polls: usize,
    pub options: usize,
    pub votes: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    #[cfg(test)]
    pub faults: faults::Faults,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn counts(&self) -> TableCounts {
        let tables = self.tables.read().await;
        TableCounts {
            polls: tables.polls.len(),
            options: tables.options.len(),
            votes: tables.votes.len(),
        }
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert_poll(&self, poll: NewPoll) -> Result<PollRow, StoreError> {
        let row = PollRow {
            id: Uuid::new_v4(),
            question: poll.question,
            created_by: poll.created_by,
            created_at: Utc::now(),
            expires_at: poll.expires_at,
            is_active: true,
        };
        self.tables.write().await.polls.push(row.clone());
        Ok(row)
    }

    async fn insert_options(
        &self,
        poll_id: Uuid,
        texts: &[String],
    ) -> Result<Vec<OptionRow>, StoreError> {
        #[cfg(test)]
        self.faults.check(&self.faults.insert_options)?;

        let mut tables = self.tables.write().await;
        if !tables.polls.iter().any(|p| p.id == poll_id) {
            return Err(StoreError::Unavailable(format!(
                "poll {poll_id} does not exist"
            )));
        }

        let now = Utc::now();
        let rows: Vec<OptionRow> = texts
            .iter()
            .map(|text| OptionRow {
                id: Uuid::new_v4(),
                poll_id,
                option_text: text.clone(),
                created_at: now,
            })
            .collect();
        tables.options.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn delete_poll(&self, poll_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.polls.retain(|p| p.id != poll_id);
        tables.options.retain(|o| o.poll_id != poll_id);
        tables.votes.retain(|v| v.poll_id != poll_id);
        Ok(())
    }

    async fn active_polls(&self) -> Result<Vec<PollRow>, StoreError> {
        let tables = self.tables.read().await;
        // Reversed first so that equal timestamps still come out newest first.
        let mut polls: Vec<PollRow> = tables
            .polls
            .iter()
            .rev()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(polls)
    }

    async fn find_poll(&self, poll_id: Uuid) -> Result<Option<PollRow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.polls.iter().find(|p| p.id == poll_id).cloned())
    }

    async fn options_for_polls(&self, poll_ids: &[Uuid]) -> Result<Vec<OptionRow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .options
            .iter()
            .filter(|o| poll_ids.contains(&o.poll_id))
            .cloned()
            .collect())
    }

    async fn votes_for_options(&self, option_ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        #[cfg(test)]
        self.faults.check(&self.faults.votes_for_options)?;

        let tables = self.tables.read().await;
        Ok(tables
            .votes
            .iter()
            .filter(|v| option_ids.contains(&v.option_id))
            .map(|v| v.option_id)
            .collect())
    }

    async fn votes_for_poll(&self, poll_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        #[cfg(test)]
        self.faults.check(&self.faults.votes_for_poll)?;

        let tables = self.tables.read().await;
        Ok(tables
            .votes
            .iter()
            .filter(|v| v.poll_id == poll_id)
            .map(|v| v.option_id)
            .collect())
    }

    async fn find_vote(
        &self,
        poll_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<VoteRow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .votes
            .iter()
            .find(|v| v.poll_id == poll_id && v.user_id == user_id)
            .cloned())
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<VoteRow, StoreError> {
        let row = VoteRow {
            id: Uuid::new_v4(),
            poll_id: vote.poll_id,
            option_id: vote.option_id,
            user_id: vote.user_id,
            created_at: Utc::now(),
        };
        self.tables.write().await.votes.push(row.clone());
        Ok(row)
    }
}

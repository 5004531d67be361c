// src/store/mod.rs
//! Datastore access.
//!
//! The service layer only talks to [`PollStore`]. Each method maps to one
//! call against the backing tables; aggregation happens in the caller.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewPoll, NewVote, OptionRow, PollRow, VoteRow};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PollStore: Send + Sync {
    async fn insert_poll(&self, poll: NewPoll) -> Result<PollRow, StoreError>;

    /// Inserts one option per text, in order, all referencing `poll_id`.
    async fn insert_options(
        &self,
        poll_id: Uuid,
        texts: &[String],
    ) -> Result<Vec<OptionRow>, StoreError>;

    async fn delete_poll(&self, poll_id: Uuid) -> Result<(), StoreError>;

    /// Active polls, newest first.
    async fn active_polls(&self) -> Result<Vec<PollRow>, StoreError>;

    async fn find_poll(&self, poll_id: Uuid) -> Result<Option<PollRow>, StoreError>;

    /// Options of the given polls, oldest first.
    async fn options_for_polls(&self, poll_ids: &[Uuid]) -> Result<Vec<OptionRow>, StoreError>;

    /// The `option_id` of every vote referencing one of `option_ids`.
    async fn votes_for_options(&self, option_ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError>;

    /// The `option_id` of every vote cast on `poll_id`.
    async fn votes_for_poll(&self, poll_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    async fn find_vote(&self, poll_id: Uuid, user_id: Uuid)
        -> Result<Option<VoteRow>, StoreError>;

    async fn insert_vote(&self, vote: NewVote) -> Result<VoteRow, StoreError>;
}

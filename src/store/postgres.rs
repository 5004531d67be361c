// src/store/postgres.rs
//! Postgres-backed store. Schema lives in `db::run_migrations`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{PollStore, StoreError};
use crate::models::{NewPoll, NewVote, OptionRow, PollRow, VoteRow};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PollStore for PgStore {
    async fn insert_poll(&self, poll: NewPoll) -> Result<PollRow, StoreError> {
        let row = sqlx::query_as::<_, PollRow>(
            r#"
            INSERT INTO polls (id, question, created_by, created_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING id, question, created_by, created_at, expires_at, is_active
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&poll.question)
        .bind(poll.created_by)
        .bind(Utc::now())
        .bind(poll.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn insert_options(
        &self,
        poll_id: Uuid,
        texts: &[String],
    ) -> Result<Vec<OptionRow>, StoreError> {
        let ids: Vec<Uuid> = texts.iter().map(|_| Uuid::new_v4()).collect();

        let rows = sqlx::query_as::<_, OptionRow>(
            r#"
            INSERT INTO poll_options (id, poll_id, option_text, created_at, position)
            SELECT t.id, $3, t.option_text, $4, t.position
            FROM UNNEST($1::uuid[], $2::text[]) WITH ORDINALITY AS t(id, option_text, position)
            RETURNING id, poll_id, option_text, created_at
            "#,
        )
        .bind(&ids)
        .bind(texts)
        .bind(poll_id)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn delete_poll(&self, poll_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(poll_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn active_polls(&self) -> Result<Vec<PollRow>, StoreError> {
        let rows = sqlx::query_as::<_, PollRow>(
            r#"
            SELECT id, question, created_by, created_at, expires_at, is_active
            FROM polls
            WHERE is_active = TRUE
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_poll(&self, poll_id: Uuid) -> Result<Option<PollRow>, StoreError> {
        let row = sqlx::query_as::<_, PollRow>(
            r#"
            SELECT id, question, created_by, created_at, expires_at, is_active
            FROM polls
            WHERE id = $1
            "#,
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn options_for_polls(&self, poll_ids: &[Uuid]) -> Result<Vec<OptionRow>, StoreError> {
        let rows = sqlx::query_as::<_, OptionRow>(
            r#"
            SELECT id, poll_id, option_text, created_at
            FROM poll_options
            WHERE poll_id = ANY($1)
            ORDER BY created_at ASC, position ASC
            "#,
        )
        .bind(poll_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn votes_for_options(&self, option_ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT option_id FROM votes WHERE option_id = ANY($1)",
        )
        .bind(option_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn votes_for_poll(&self, poll_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT option_id FROM votes WHERE poll_id = $1")
            .bind(poll_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    async fn find_vote(
        &self,
        poll_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<VoteRow>, StoreError> {
        let row = sqlx::query_as::<_, VoteRow>(
            r#"
            SELECT id, poll_id, option_id, user_id, created_at
            FROM votes
            WHERE poll_id = $1 AND user_id = $2
            LIMIT 1
            "#,
        )
        .bind(poll_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<VoteRow, StoreError> {
        let row = sqlx::query_as::<_, VoteRow>(
            r#"
            INSERT INTO votes (id, poll_id, option_id, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, poll_id, option_id, user_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(vote.poll_id)
        .bind(vote.option_id)
        .bind(vote.user_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}

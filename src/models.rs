// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of the `polls` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PollRow {
    pub id: Uuid,
    pub question: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl PollRow {
    /// True when the poll is inactive or its expiry has passed.
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        !self.is_active || self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Row of the `poll_options` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OptionRow {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub option_text: String,
    pub created_at: DateTime<Utc>,
}

/// Row of the `votes` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct VoteRow {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPoll {
    pub question: String,
    pub created_by: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewVote {
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub user_id: Uuid,
}

/// A poll as returned to clients, with vote counts folded in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<PollOption>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub total_votes: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: Uuid,
    pub text: String,
    pub votes: u64,
    pub percentage: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollData {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollResponse {
    pub success: bool,
    pub poll_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PollListResponse {
    pub success: bool,
    pub polls: Vec<Poll>,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub success: bool,
    pub poll: Poll,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub success: bool,
}

// models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of votes a single IP address may cast across all ideas.
pub const VOTE_CAP: i64 = 10;

/// An idea together with its derived vote count. This is the shape every endpoint returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub votes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub idea_id: Uuid,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
}

/// Administrative input for creating an idea.
#[derive(Debug, Clone, Deserialize)]
pub struct NewIdea {
    pub title: String,
    pub description: Option<String>,
}

impl NewIdea {
    pub fn new(title: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            title: title.into(),
            description: description.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaPage {
    pub ideas: Vec<Idea>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    pub total_votes: i64,
    pub voted_idea_ids: Vec<Uuid>,
    pub can_vote: bool,
    pub remaining_votes: i64,
}

impl VoteStatus {
    pub fn from_voted(voted_idea_ids: Vec<Uuid>) -> Self {
        let total_votes = voted_idea_ids.len() as i64;
        Self {
            total_votes,
            voted_idea_ids,
            can_vote: total_votes < VOTE_CAP,
            remaining_votes: (VOTE_CAP - total_votes).max(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub message: String,
    pub idea: Idea,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetReceipt {
    pub message: String,
    pub deleted: u64,
}

/// Machine-readable error category carried in every error body, so clients never have to
/// inspect the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    VoteLimitExceeded,
    AlreadyVoted,
    RateLimited,
    Internal,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub kind: ErrorKind,
}

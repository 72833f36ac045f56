//! Storage abstraction for ideas and votes.
//!
//! Two backends implement [Store]: [PgStore](crate::postgres::PgStore) over a PostgreSQL pool,
//! and [MemoryStore](crate::memory::MemoryStore), which keeps everything behind one lock and is
//! used when no database is configured (and by the tests).

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Idea, NewIdea};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("gave up casting vote after {0} serialization conflicts")]
    Contention(u32),
}

/// Result of an attempt to record a vote. Every variant other than `Recorded` means nothing was
/// written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastOutcome {
    /// The vote was stored; carries the idea as it was read before the insert.
    Recorded(Idea),
    IdeaMissing,
    LimitReached,
    AlreadyVoted,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// One page of ideas with their vote counts, ordered by votes descending, then creation time,
    /// then id. The ordering is applied before `limit`/`offset`.
    async fn list_ideas(&self, limit: i64, offset: i64) -> Result<Vec<Idea>, StoreError>;
    async fn count_ideas(&self) -> Result<i64, StoreError>;
    async fn get_idea(&self, id: Uuid) -> Result<Option<Idea>, StoreError>;
    async fn insert_idea(&self, idea: NewIdea) -> Result<Idea, StoreError>;
    /// Ids of every idea `ip` has voted for, oldest vote first.
    async fn voted_idea_ids(&self, ip: &str) -> Result<Vec<Uuid>, StoreError>;
    /// Check existence, check the per-IP cap and insert, as one atomic unit.
    async fn cast_vote(&self, idea_id: Uuid, ip: &str, cap: i64)
        -> Result<CastOutcome, StoreError>;
    /// Delete every vote cast by `ip`; returns how many were removed.
    async fn reset_votes(&self, ip: &str) -> Result<u64, StoreError>;
}

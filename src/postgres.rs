// src/postgres.rs
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Idea, NewIdea};
use crate::store::{CastOutcome, Store, StoreError};

const MAX_CAST_ATTEMPTS: u32 = 5;

const IDEA_COLUMNS: &str = r#"
    SELECT i.id, i.title, i.description, i.created_at, i.updated_at, COUNT(v.id) AS votes
    FROM ideas i
    LEFT JOIN votes v ON v.idea_id = i.id
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn try_cast_vote(
        &self,
        idea_id: Uuid,
        ip: &str,
        cap: i64,
    ) -> Result<CastOutcome, sqlx::Error> {
        let mut tx: Transaction<'_, Postgres> = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let idea = sqlx::query_as::<_, Idea>(&format!("{IDEA_COLUMNS} WHERE i.id = $1 GROUP BY i.id"))
            .bind(idea_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(idea) = idea else {
            return Ok(CastOutcome::IdeaMissing);
        };

        let cast: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE ip_address = $1")
            .bind(ip)
            .fetch_one(&mut *tx)
            .await?;
        if cast >= cap {
            return Ok(CastOutcome::LimitReached);
        }

        let inserted = sqlx::query("INSERT INTO votes (id, idea_id, ip_address) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(idea_id)
            .bind(ip)
            .execute(&mut *tx)
            .await;
        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Ok(CastOutcome::AlreadyVoted);
            }
            Err(e) => return Err(e),
        }

        tx.commit().await?;
        Ok(CastOutcome::Recorded(idea))
    }
}

fn is_serialization_failure(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(e) => e.code().as_deref() == Some("40001"),
        _ => false,
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_ideas(&self, limit: i64, offset: i64) -> Result<Vec<Idea>, StoreError> {
        let ideas = sqlx::query_as::<_, Idea>(&format!(
            "{IDEA_COLUMNS} GROUP BY i.id ORDER BY votes DESC, i.created_at ASC, i.id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        debug!("Fetched {} ideas from database", ideas.len());
        Ok(ideas)
    }

    async fn count_ideas(&self) -> Result<i64, StoreError> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM ideas")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn get_idea(&self, id: Uuid) -> Result<Option<Idea>, StoreError> {
        let idea = sqlx::query_as::<_, Idea>(&format!("{IDEA_COLUMNS} WHERE i.id = $1 GROUP BY i.id"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(idea)
    }

    async fn insert_idea(&self, idea: NewIdea) -> Result<Idea, StoreError> {
        let created = sqlx::query_as::<_, Idea>(
            r#"
            INSERT INTO ideas (id, title, description)
            VALUES ($1, $2, $3)
            RETURNING id, title, description, created_at, updated_at, 0::BIGINT AS votes
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&idea.title)
        .bind(&idea.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn voted_idea_ids(&self, ip: &str) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar(
            "SELECT idea_id FROM votes WHERE ip_address = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(ip)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn cast_vote(
        &self,
        idea_id: Uuid,
        ip: &str,
        cap: i64,
    ) -> Result<CastOutcome, StoreError> {
        for attempt in 1..=MAX_CAST_ATTEMPTS {
            match self.try_cast_vote(idea_id, ip, cap).await {
                Err(e) if is_serialization_failure(&e) => {
                    debug!("Serialization conflict casting vote for {ip} (attempt {attempt})");
                }
                other => return other.map_err(StoreError::from),
            }
        }

        warn!("Vote for idea {idea_id} from {ip} kept conflicting, giving up");
        Err(StoreError::Contention(MAX_CAST_ATTEMPTS))
    }

    async fn reset_votes(&self, ip: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM votes WHERE ip_address = $1")
            .bind(ip)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

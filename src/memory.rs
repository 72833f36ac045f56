// src/memory.rs
use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Idea, NewIdea, Vote};
use crate::store::{CastOutcome, Store, StoreError};

#[derive(Default)]
struct Tables {
    ideas: Vec<Idea>,
    votes: Vec<Vote>,
}

impl Tables {
    fn tally(&self) -> HashMap<Uuid, i64> {
        let mut counts = HashMap::new();
        for vote in &self.votes {
            *counts.entry(vote.idea_id).or_insert(0) += 1;
        }
        counts
    }

    fn with_votes(&self, idea: &Idea, counts: &HashMap<Uuid, i64>) -> Idea {
        Idea {
            votes: counts.get(&idea.id).copied().unwrap_or(0),
            ..idea.clone()
        }
    }
}

/// In-process [Store]. Every operation takes the single table lock, so `cast_vote` is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_ideas(&self, limit: i64, offset: i64) -> Result<Vec<Idea>, StoreError> {
        let tables = self.tables.read().await;
        let counts = tables.tally();
        let mut ideas: Vec<Idea> = tables
            .ideas
            .iter()
            .map(|idea| tables.with_votes(idea, &counts))
            .collect();
        ideas.sort_by_key(|idea| (Reverse(idea.votes), idea.created_at, idea.id));

        Ok(ideas
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_ideas(&self) -> Result<i64, StoreError> {
        Ok(self.tables.read().await.ideas.len() as i64)
    }

    async fn get_idea(&self, id: Uuid) -> Result<Option<Idea>, StoreError> {
        let tables = self.tables.read().await;
        let counts = tables.tally();
        Ok(tables
            .ideas
            .iter()
            .find(|idea| idea.id == id)
            .map(|idea| tables.with_votes(idea, &counts)))
    }

    async fn insert_idea(&self, idea: NewIdea) -> Result<Idea, StoreError> {
        let now = Utc::now();
        let created = Idea {
            id: Uuid::new_v4(),
            title: idea.title,
            description: idea.description,
            votes: 0,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.ideas.push(created.clone());
        Ok(created)
    }

    async fn voted_idea_ids(&self, ip: &str) -> Result<Vec<Uuid>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .votes
            .iter()
            .filter(|vote| vote.ip_address == ip)
            .map(|vote| vote.idea_id)
            .collect())
    }

    async fn cast_vote(
        &self,
        idea_id: Uuid,
        ip: &str,
        cap: i64,
    ) -> Result<CastOutcome, StoreError> {
        let mut tables = self.tables.write().await;
        let counts = tables.tally();
        let Some(idea) = tables
            .ideas
            .iter()
            .find(|idea| idea.id == idea_id)
            .map(|idea| tables.with_votes(idea, &counts))
        else {
            return Ok(CastOutcome::IdeaMissing);
        };

        let cast = tables.votes.iter().filter(|v| v.ip_address == ip).count() as i64;
        if cast >= cap {
            return Ok(CastOutcome::LimitReached);
        }
        if tables
            .votes
            .iter()
            .any(|v| v.idea_id == idea_id && v.ip_address == ip)
        {
            return Ok(CastOutcome::AlreadyVoted);
        }

        tables.votes.push(Vote {
            id: Uuid::new_v4(),
            idea_id,
            ip_address: ip.to_string(),
            created_at: Utc::now(),
        });
        Ok(CastOutcome::Recorded(idea))
    }

    async fn reset_votes(&self, ip: &str) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.votes.len();
        tables.votes.retain(|vote| vote.ip_address != ip);
        Ok((before - tables.votes.len()) as u64)
    }
}

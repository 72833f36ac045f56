// services.rs
//! The voting workflow: pagination defaults, vote status, capped voting and resets.
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{IdeaPage, Idea, ResetReceipt, VOTE_CAP, VoteReceipt, VoteStatus};
use crate::store::{CastOutcome, Store};

pub const DEFAULT_LIMIT: i64 = 100;

// Numeric query values follow loose number coercion: "5.0" and "1e1" are integers, fractions are
// truncated and out-of-range values saturate.
fn numeric(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .map(|n| n.trunc() as i64)
}

/// Page size from a raw query value: absent, non-numeric or non-positive input means 100.
pub fn page_limit(raw: Option<&str>) -> i64 {
    match numeric(raw) {
        Some(limit) if limit > 0 => limit,
        _ => DEFAULT_LIMIT,
    }
}

/// Page offset from a raw query value: absent, non-numeric or negative input means 0.
pub fn page_offset(raw: Option<&str>) -> i64 {
    match numeric(raw) {
        Some(offset) if offset >= 0 => offset,
        _ => 0,
    }
}

#[derive(Clone)]
pub struct VoteService {
    store: Arc<dyn Store>,
}

impl VoteService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list_ideas(
        &self,
        limit: Option<&str>,
        offset: Option<&str>,
    ) -> Result<IdeaPage, AppError> {
        let (limit, offset) = (page_limit(limit), page_offset(offset));
        let ideas = self.store.list_ideas(limit, offset).await?;
        let total = self.store.count_ideas().await?;
        debug!("Listed {} of {total} ideas (limit {limit}, offset {offset})", ideas.len());
        Ok(IdeaPage { ideas, total })
    }

    /// `id` is the raw path segment; anything that is not a known UUID is simply not found.
    pub async fn get_idea(&self, id: &str) -> Result<Idea, AppError> {
        let Ok(id) = Uuid::parse_str(id) else {
            warn!("Idea with ID {id} not found");
            return Err(AppError::NotFound);
        };
        self.store.get_idea(id).await?.ok_or_else(|| {
            warn!("Idea with ID {id} not found");
            AppError::NotFound
        })
    }

    pub async fn vote_status(&self, ip: &str) -> Result<VoteStatus, AppError> {
        let voted = self.store.voted_idea_ids(ip).await?;
        debug!("IP {ip} has {} votes", voted.len());
        Ok(VoteStatus::from_voted(voted))
    }

    pub async fn vote_idea(&self, id: &str, ip: &str) -> Result<VoteReceipt, AppError> {
        let Ok(idea_id) = Uuid::parse_str(id) else {
            warn!("Idea with ID {id} not found");
            return Err(AppError::NotFound);
        };

        match self.store.cast_vote(idea_id, ip, VOTE_CAP).await? {
            CastOutcome::Recorded(idea) => {
                info!("Vote recorded for idea ID {idea_id} from IP {ip}");
                Ok(VoteReceipt {
                    message: "Vote recorded".to_string(),
                    idea,
                })
            }
            CastOutcome::IdeaMissing => {
                warn!("Idea with ID {idea_id} not found");
                Err(AppError::NotFound)
            }
            CastOutcome::LimitReached => {
                warn!("Vote limit exceeded for IP address {ip}");
                Err(AppError::VoteLimitExceeded)
            }
            CastOutcome::AlreadyVoted => {
                warn!("IP {ip} already voted for idea ID {idea_id}");
                Err(AppError::AlreadyVoted)
            }
        }
    }

    pub async fn reset_votes(&self, ip: &str) -> Result<ResetReceipt, AppError> {
        let deleted = self
            .store
            .reset_votes(ip)
            .await
            .map_err(AppError::ResetFailed)?;
        info!("Deleted {deleted} votes for IP {ip}");
        Ok(ResetReceipt {
            message: format!("Deleted {deleted} votes"),
            deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::NewIdea;

    async fn seeded(n: usize) -> (VoteService, Vec<Idea>) {
        let store = Arc::new(MemoryStore::new());
        let mut ideas = Vec::new();
        for i in 0..n {
            ideas.push(
                store
                    .insert_idea(NewIdea::new(format!("Idea {i}"), Some("details")))
                    .await
                    .unwrap(),
            );
        }
        (VoteService::new(store), ideas)
    }

    #[test]
    fn pagination_defaults() {
        assert_eq!(page_limit(None), 100);
        assert_eq!(page_limit(Some("abc")), 100);
        assert_eq!(page_limit(Some("0")), 100);
        assert_eq!(page_limit(Some("-4")), 100);
        assert_eq!(page_limit(Some("25")), 25);
        assert_eq!(page_offset(None), 0);
        assert_eq!(page_offset(Some("x")), 0);
        assert_eq!(page_offset(Some("-1")), 0);
        assert_eq!(page_offset(Some("10")), 10);
    }

    #[test]
    fn pagination_accepts_loose_numbers() {
        assert_eq!(page_limit(Some("5.0")), 5);
        assert_eq!(page_limit(Some("1e1")), 10);
        assert_eq!(page_limit(Some("0.5")), 100);
        assert_eq!(page_limit(Some("inf")), 100);
        assert_eq!(page_offset(Some(" 2.9 ")), 2);
        assert_eq!(page_offset(Some("1e30")), i64::MAX);
        assert_eq!(page_offset(Some("NaN")), 0);
    }

    #[tokio::test]
    async fn huge_offset_is_an_empty_page() {
        let (service, _) = seeded(3).await;
        let page = service.list_ideas(None, Some("1e30")).await.unwrap();
        assert!(page.ideas.is_empty());
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn distinct_votes_are_counted() {
        let (service, ideas) = seeded(12).await;
        for idea in ideas.iter().take(7) {
            service.vote_idea(&idea.id.to_string(), "10.0.0.1").await.unwrap();
        }
        let status = service.vote_status("10.0.0.1").await.unwrap();
        assert_eq!(status.total_votes, 7);
        assert_eq!(status.voted_idea_ids.len(), 7);
        assert!(status.can_vote);
        assert_eq!(status.remaining_votes, 3);
    }

    #[tokio::test]
    async fn eleventh_vote_hits_the_cap() {
        let (service, ideas) = seeded(11).await;
        for idea in ideas.iter().take(10) {
            service.vote_idea(&idea.id.to_string(), "10.0.0.2").await.unwrap();
        }
        let err = service
            .vote_idea(&ideas[10].id.to_string(), "10.0.0.2")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::VoteLimitExceeded));

        let status = service.vote_status("10.0.0.2").await.unwrap();
        assert_eq!(status.total_votes, 10);
        assert!(!status.can_vote);
        assert_eq!(status.remaining_votes, 0);
    }

    #[tokio::test]
    async fn duplicate_vote_conflicts() {
        let (service, ideas) = seeded(1).await;
        let id = ideas[0].id.to_string();
        service.vote_idea(&id, "10.0.0.3").await.unwrap();
        let err = service.vote_idea(&id, "10.0.0.3").await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyVoted));
        assert_eq!(service.vote_status("10.0.0.3").await.unwrap().total_votes, 1);
    }

    #[tokio::test]
    async fn unknown_idea_is_not_found_and_writes_nothing() {
        let (service, _) = seeded(1).await;
        let missing = Uuid::new_v4().to_string();
        assert!(matches!(
            service.vote_idea(&missing, "10.0.0.4").await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            service.vote_idea("not-a-uuid", "10.0.0.4").await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(service.get_idea(&missing).await, Err(AppError::NotFound)));
        assert_eq!(service.vote_status("10.0.0.4").await.unwrap().total_votes, 0);
    }

    #[tokio::test]
    async fn reset_removes_exactly_the_callers_votes() {
        let (service, ideas) = seeded(4).await;
        for idea in &ideas[..3] {
            service.vote_idea(&idea.id.to_string(), "10.0.0.5").await.unwrap();
        }
        service.vote_idea(&ideas[0].id.to_string(), "10.0.0.6").await.unwrap();

        let receipt = service.reset_votes("10.0.0.5").await.unwrap();
        assert_eq!(receipt.deleted, 3);
        assert_eq!(receipt.message, "Deleted 3 votes");

        let status = service.vote_status("10.0.0.5").await.unwrap();
        assert_eq!(status.total_votes, 0);
        assert!(status.voted_idea_ids.is_empty());
        assert_eq!(service.vote_status("10.0.0.6").await.unwrap().total_votes, 1);

        assert_eq!(service.reset_votes("10.0.0.5").await.unwrap().deleted, 0);
    }

    #[tokio::test]
    async fn pages_cover_every_idea_once() {
        let (service, ideas) = seeded(12).await;
        service.vote_idea(&ideas[7].id.to_string(), "10.0.0.7").await.unwrap();

        let mut seen = HashSet::new();
        let mut offset = 0;
        loop {
            let page = service
                .list_ideas(Some("5"), Some(&offset.to_string()))
                .await
                .unwrap();
            assert_eq!(page.total, 12);
            if page.ideas.is_empty() {
                break;
            }
            for idea in page.ideas {
                assert!(seen.insert(idea.id), "idea listed twice");
            }
            offset += 5;
        }
        assert_eq!(seen.len(), 12);
    }

    #[tokio::test]
    async fn three_idea_scenario() {
        let (service, ideas) = seeded(3).await;
        let (a, b, c) = (ideas[0].id, ideas[1].id, ideas[2].id);
        let ip = "192.168.1.20";

        service.vote_idea(&a.to_string(), ip).await.unwrap();
        let status = service.vote_status(ip).await.unwrap();
        assert_eq!(status.total_votes, 1);
        assert_eq!(status.voted_idea_ids, vec![a]);

        assert!(matches!(
            service.vote_idea(&a.to_string(), ip).await,
            Err(AppError::AlreadyVoted)
        ));
        assert_eq!(service.vote_status(ip).await.unwrap().total_votes, 1);

        service.vote_idea(&b.to_string(), ip).await.unwrap();
        assert_eq!(service.vote_status(ip).await.unwrap().total_votes, 2);

        let page = service.list_ideas(None, None).await.unwrap();
        let order: Vec<(Uuid, i64)> = page.ideas.iter().map(|i| (i.id, i.votes)).collect();
        assert_eq!(order.len(), 3);
        assert_eq!(order[2], (c, 0));
        assert!(order[..2].contains(&(a, 1)));
        assert!(order[..2].contains(&(b, 1)));
    }

    #[tokio::test]
    async fn receipt_carries_idea_as_read_before_the_vote() {
        let (service, ideas) = seeded(1).await;
        let receipt = service
            .vote_idea(&ideas[0].id.to_string(), "10.0.0.8")
            .await
            .unwrap();
        assert_eq!(receipt.message, "Vote recorded");
        assert_eq!(receipt.idea.id, ideas[0].id);
        assert_eq!(receipt.idea.votes, 0);
        assert_eq!(service.get_idea(&ideas[0].id.to_string()).await.unwrap().votes, 1);
    }

    #[tokio::test]
    async fn concurrent_votes_never_exceed_the_cap() {
        let (service, ideas) = seeded(20).await;
        let handles: Vec<_> = ideas
            .iter()
            .map(|idea| {
                let service = service.clone();
                let id = idea.id.to_string();
                tokio::spawn(async move { service.vote_idea(&id, "10.0.0.9").await.is_ok() })
            })
            .collect();

        let mut recorded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                recorded += 1;
            }
        }
        assert_eq!(recorded, VOTE_CAP);
        assert_eq!(service.vote_status("10.0.0.9").await.unwrap().total_votes, VOTE_CAP);
    }
}

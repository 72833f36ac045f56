//! Runs against a real database: `DATABASE_URL=postgres://... cargo test -- --ignored`.
use std::sync::Arc;

use uuid::Uuid;

use idea_poll::{
    db::create_pool,
    models::{NewIdea, VOTE_CAP},
    postgres::PgStore,
    services::VoteService,
    store::{CastOutcome, Store},
};

async fn store() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for ignored tests");
    PgStore::new(create_pool(&url, 5).await.unwrap())
}

fn caller() -> String {
    // Unique per run so leftovers from earlier runs don't count against the cap.
    format!("test-{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore]
async fn cast_vote_enforces_duplicate_and_cap() {
    let store = store().await;
    let ip = caller();

    let mut ideas = Vec::new();
    for i in 0..=VOTE_CAP {
        ideas.push(
            store
                .insert_idea(NewIdea::new(format!("pg idea {i}"), Some("integration")))
                .await
                .unwrap(),
        );
    }

    let first = store.cast_vote(ideas[0].id, &ip, VOTE_CAP).await.unwrap();
    assert!(matches!(first, CastOutcome::Recorded(idea) if idea.id == ideas[0].id));
    assert!(matches!(
        store.cast_vote(ideas[0].id, &ip, VOTE_CAP).await.unwrap(),
        CastOutcome::AlreadyVoted
    ));

    for idea in &ideas[1..VOTE_CAP as usize] {
        store.cast_vote(idea.id, &ip, VOTE_CAP).await.unwrap();
    }
    assert!(matches!(
        store.cast_vote(ideas[VOTE_CAP as usize].id, &ip, VOTE_CAP).await.unwrap(),
        CastOutcome::LimitReached
    ));
    assert!(matches!(
        store.cast_vote(Uuid::new_v4(), &ip, VOTE_CAP).await.unwrap(),
        CastOutcome::IdeaMissing
    ));

    assert_eq!(store.voted_idea_ids(&ip).await.unwrap().len(), VOTE_CAP as usize);
    let fetched = store.get_idea(ideas[0].id).await.unwrap().unwrap();
    assert_eq!(fetched.votes, 1);

    assert_eq!(store.reset_votes(&ip).await.unwrap(), VOTE_CAP as u64);
    assert!(store.voted_idea_ids(&ip).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn concurrent_votes_never_pass_the_cap() {
    let store: Arc<dyn Store> = Arc::new(store().await);
    let service = VoteService::new(store.clone());
    let ip = caller();

    let mut ids = Vec::new();
    for i in 0..20 {
        ids.push(
            store
                .insert_idea(NewIdea::new(format!("race {i}"), None))
                .await
                .unwrap()
                .id,
        );
    }

    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let service = service.clone();
            let (id, ip) = (id.to_string(), ip.clone());
            tokio::spawn(async move { service.vote_idea(&id, &ip).await })
        })
        .collect();
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    let status = service.vote_status(&ip).await.unwrap();
    assert!(status.total_votes <= VOTE_CAP);
    service.reset_votes(&ip).await.unwrap();
}

//! # store
//!
//! Client-side state for the idea poll.
//!
//! [IdeaStore] owns a single [StoreState] and is the only thing that changes it. Each action
//! takes the state lock only between its await points, so no two actions interleave their
//! visible effects, and network calls always happen with the lock released. Readers (the view)
//! work from [IdeaStore::snapshot] copies.
//!
//! Voting is optimistic in two phases. Before the request, the local copy of the caller's vote
//! status decides whether to even try. After the response, a success is committed locally
//! (count bumped by one, page re-sorted, idea marked voted) and a rejection is reconciled from
//! its [ErrorKind]: the server saying the cap is reached or the idea was already voted for
//! overrides what we believed locally.
use std::{
    collections::HashSet,
    future::Future,
    sync::Arc,
    time::Duration,
};

use futures::future::join_all;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinSet,
    time::sleep,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::api::{ApiError, IdeaApi};
use crate::models::{ErrorKind, Idea, VOTE_CAP};

pub const DEFAULT_PAGE_SIZE: u32 = 5;
pub const PAGE_SIZES: [u32; 4] = [5, 10, 20, 50];

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// How long a successful vote stays in its "voting" state before local counts change.
    pub vote_delay: Duration,
    /// How much longer the animation flag is held once the vote is committed.
    pub animation_hold: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            vote_delay: Duration::from_millis(300),
            animation_hold: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct StoreState {
    /// The current page, as last fetched and locally adjusted.
    pub ideas: Vec<Idea>,
    pub loading: bool,
    pub error: Option<String>,
    pub voted_ideas: HashSet<Uuid>,
    /// Full records for every voted idea, whatever page it lives on, in voting order.
    pub voted_details: Vec<Idea>,
    pub total_votes: i64,
    pub current_page: u32,
    pub items_per_page: u32,
    pub total_ideas: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub animating: HashSet<Uuid>,
    notifications: Vec<Notification>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            ideas: Vec::new(),
            loading: false,
            error: None,
            voted_ideas: HashSet::new(),
            voted_details: Vec::new(),
            total_votes: 0,
            current_page: 1,
            items_per_page: DEFAULT_PAGE_SIZE,
            total_ideas: 0,
            has_next_page: false,
            has_prev_page: false,
            animating: HashSet::new(),
            notifications: Vec::new(),
        }
    }
}

impl StoreState {
    pub fn can_vote(&self) -> bool {
        self.total_votes < VOTE_CAP
    }

    pub fn remaining_votes(&self) -> i64 {
        (VOTE_CAP - self.total_votes).max(0)
    }

    pub fn has_voted(&self, id: Uuid) -> bool {
        self.voted_ideas.contains(&id)
    }

    pub fn is_animating(&self, id: Uuid) -> bool {
        self.animating.contains(&id)
    }

    /// Ideas on this page the caller has voted for.
    pub fn voted_column(&self) -> Vec<&Idea> {
        self.ideas.iter().filter(|i| self.has_voted(i.id)).collect()
    }

    /// Ideas on this page still open to the caller.
    pub fn unvoted_column(&self) -> Vec<&Idea> {
        self.ideas.iter().filter(|i| !self.has_voted(i.id)).collect()
    }

    pub fn has_data(&self) -> bool {
        !self.ideas.is_empty() || !self.voted_details.is_empty()
    }

    pub fn total_pages(&self) -> u32 {
        let per_page = i64::from(self.items_per_page.max(1));
        ((self.total_ideas + per_page - 1) / per_page).max(1) as u32
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    fn commit_vote(&mut self, id: Uuid, receipt_idea: &Idea) {
        let mut bumped = None;
        for idea in self.ideas.iter_mut().filter(|i| i.id == id) {
            idea.votes += 1;
            bumped = Some(idea.clone());
        }
        // Stable, so ties keep their server order.
        self.ideas.sort_by(|a, b| b.votes.cmp(&a.votes));

        match self.voted_details.iter_mut().find(|i| i.id == id) {
            Some(known) => known.votes += 1,
            None => self.voted_details.push(bumped.unwrap_or_else(|| Idea {
                votes: receipt_idea.votes + 1,
                ..receipt_idea.clone()
            })),
        }

        self.voted_ideas.insert(id);
        self.total_votes += 1;
        self.loading = false;
    }

    /// Fold a rejected vote into local state and tell the user why.
    fn reconcile_rejection(&mut self, id: Uuid, err: &ApiError) {
        self.animating.remove(&id);
        self.loading = false;

        let message = match err.kind() {
            Some(ErrorKind::VoteLimitExceeded) => {
                self.total_votes = VOTE_CAP;
                "You have reached the maximum number of votes"
            }
            Some(ErrorKind::AlreadyVoted) => {
                self.voted_ideas.insert(id);
                "You have already voted for this idea"
            }
            Some(ErrorKind::NotFound) => "Idea not found",
            _ => "Failed to vote for idea",
        };
        self.error = Some(message.to_string());
        self.notify(Notification::Error(message.to_string()));
    }
}

struct Inner {
    api: Arc<dyn IdeaApi>,
    options: StoreOptions,
    state: RwLock<StoreState>,
    tasks: Mutex<JoinSet<()>>,
}

/// Handle to the client state. Clones share the same state.
#[derive(Clone)]
pub struct IdeaStore {
    inner: Arc<Inner>,
}

impl IdeaStore {
    pub fn new(api: Arc<dyn IdeaApi>) -> Self {
        Self::with_options(api, StoreOptions::default())
    }

    pub fn with_options(api: Arc<dyn IdeaApi>, options: StoreOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                options,
                state: RwLock::new(StoreState::default()),
                tasks: Mutex::new(JoinSet::new()),
            }),
        }
    }

    pub async fn snapshot(&self) -> StoreState {
        self.inner.state.read().await.clone()
    }

    /// Pending notifications, oldest first. Each is returned once.
    pub async fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut self.inner.state.write().await.notifications)
    }

    /// Wait for background work (animation timers, status refreshes) to finish.
    pub async fn settle(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.inner.tasks.lock().await);
            if tasks.is_empty() {
                return;
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    warn!("Background task failed: {e}");
                }
            }
        }
    }

    async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.inner.tasks.lock().await;
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                warn!("Background task failed: {e}");
            }
        }
        tasks.spawn(task);
    }

    pub async fn initialize(&self) {
        self.fetch_vote_status().await;
        let per_page = self.inner.state.read().await.items_per_page;
        self.fetch_ideas(1, per_page).await;
    }

    pub async fn fetch_vote_status(&self) {
        let status = match self.inner.api.vote_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to fetch vote status: {e}");
                return;
            }
        };

        {
            let mut state = self.inner.state.write().await;
            state.total_votes = status.total_votes;
            state.voted_ideas = status.voted_idea_ids.iter().copied().collect();
        }
        self.fetch_voted_details(status.voted_idea_ids).await;
    }

    /// Fetch each voted idea in parallel. Lookups that fail are left out.
    pub async fn fetch_voted_details(&self, ids: Vec<Uuid>) {
        let api = &self.inner.api;
        let results = join_all(ids.iter().map(|id| api.get_idea(*id))).await;

        let mut details = Vec::with_capacity(ids.len());
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(idea) => details.push(idea),
                Err(e) => warn!("Failed to fetch details for idea {id}: {e}"),
            }
        }
        self.inner.state.write().await.voted_details = details;
    }

    pub async fn fetch_ideas(&self, page: u32, limit: u32) {
        let (page, limit) = (page.max(1), limit.max(1));
        {
            let mut state = self.inner.state.write().await;
            state.loading = true;
            state.error = None;
        }

        let offset = u64::from(page - 1) * u64::from(limit);
        let result = self.inner.api.list_ideas(limit, offset).await;

        let mut state = self.inner.state.write().await;
        state.loading = false;
        match result {
            Ok(fetched) => {
                debug!("Fetched {} ideas for page {page}", fetched.ideas.len());
                state.ideas = fetched.ideas;
                state.current_page = page;
                state.items_per_page = limit;
                state.total_ideas = fetched.total;
                state.has_next_page = i64::from(page) * i64::from(limit) < fetched.total;
                state.has_prev_page = page > 1;
            }
            Err(e) => {
                warn!("Failed to fetch ideas: {e}");
                state.error = Some("Failed to fetch ideas".to_string());
                state.notify(Notification::Error("Failed to load ideas".to_string()));
            }
        }
    }

    /// Fetch the current page again.
    pub async fn refresh(&self) {
        let (page, per_page) = {
            let state = self.inner.state.read().await;
            (state.current_page, state.items_per_page)
        };
        self.fetch_ideas(page, per_page).await;
    }

    pub async fn go_to_page(&self, page: u32) {
        let (current, per_page) = {
            let state = self.inner.state.read().await;
            (state.current_page, state.items_per_page)
        };
        if page != current {
            self.fetch_ideas(page, per_page).await;
        }
    }

    pub async fn next_page(&self) {
        let (has_next, current) = {
            let state = self.inner.state.read().await;
            (state.has_next_page, state.current_page)
        };
        if has_next {
            self.go_to_page(current + 1).await;
        }
    }

    pub async fn prev_page(&self) {
        let (has_prev, current) = {
            let state = self.inner.state.read().await;
            (state.has_prev_page, state.current_page)
        };
        if has_prev {
            self.go_to_page(current - 1).await;
        }
    }

    pub async fn change_items_per_page(&self, limit: u32) {
        self.inner.state.write().await.items_per_page = limit;
        self.fetch_ideas(1, limit).await;
    }

    /// Vote for `id`. Returns whether the server recorded the vote.
    pub async fn vote(&self, id: Uuid) -> bool {
        {
            let mut state = self.inner.state.write().await;
            if !state.can_vote() {
                state.notify(Notification::Error(format!(
                    "You have reached the maximum number of votes ({VOTE_CAP})"
                )));
                return false;
            }
            if state.has_voted(id) {
                state.notify(Notification::Error(
                    "You have already voted for this idea".to_string(),
                ));
                return false;
            }
            state.animating.insert(id);
            state.loading = true;
            state.error = None;
        }

        match self.inner.api.vote(id).await {
            Ok(receipt) => {
                sleep(self.inner.options.vote_delay).await;
                {
                    let mut state = self.inner.state.write().await;
                    state.commit_vote(id, &receipt.idea);
                    state.notify(Notification::Success("Vote recorded successfully!".to_string()));
                }

                let store = self.clone();
                let hold = self.inner.options.animation_hold;
                self.spawn(async move {
                    sleep(hold).await;
                    store.inner.state.write().await.animating.remove(&id);
                })
                .await;
                self.refresh_status_in_background().await;
                true
            }
            Err(e) => {
                warn!("Failed to vote for idea {id}: {e}");
                let conflict = matches!(
                    e.kind(),
                    Some(ErrorKind::VoteLimitExceeded | ErrorKind::AlreadyVoted)
                );
                self.inner.state.write().await.reconcile_rejection(id, &e);
                if conflict {
                    self.refresh_status_in_background().await;
                }
                false
            }
        }
    }

    async fn refresh_status_in_background(&self) {
        let store = self.clone();
        self.spawn(async move { store.fetch_vote_status().await }).await;
    }

    /// Withdraw every vote on the server; local vote state is cleared only if that worked.
    pub async fn reset_vote_state(&self) -> bool {
        match self.inner.api.reset_votes().await {
            Ok(receipt) => {
                debug!("{}", receipt.message);
                let mut state = self.inner.state.write().await;
                state.voted_ideas.clear();
                state.voted_details.clear();
                state.total_votes = 0;
                state.error = None;
                state.notify(Notification::Success("Vote state reset".to_string()));
                true
            }
            Err(e) => {
                warn!("Failed to reset votes on server: {e}");
                self.inner
                    .state
                    .write()
                    .await
                    .notify(Notification::Error("Failed to reset votes on server".to_string()));
                false
            }
        }
    }
}

//! Short-lived cache for successful read responses.
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use axum::{
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::{error::AppError, ip};

struct Entry {
    stored_at: Instant,
    ttl: Duration,
    content_type: Option<HeaderValue>,
    body: Bytes,
}

#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Entry>>,
    // Bumped by every invalidation, under the entries lock.
    generation: AtomicU64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Option<(Option<HeaderValue>, Bytes)> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < entry.ttl => {
                Some((entry.content_type.clone(), entry.body.clone()))
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store a response computed while the cache was at `generation`. Responses that raced an
    /// invalidation are dropped.
    fn put(
        &self,
        key: String,
        generation: u64,
        ttl: Duration,
        content_type: Option<HeaderValue>,
        body: Bytes,
    ) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        entries.retain(|_, entry| entry.stored_at.elapsed() < entry.ttl);
        entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                ttl,
                content_type,
                body,
            },
        );
        true
    }

    /// Drop every cached response. Called whenever votes change.
    pub fn invalidate(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Middleware state: which cache, how long entries live, and whether the key must include the
/// caller (responses that differ per IP).
#[derive(Clone)]
pub struct CachePolicy {
    pub cache: Arc<ResponseCache>,
    pub ttl: Duration,
    pub per_caller: bool,
}

pub async fn cache_response(
    State(policy): State<CachePolicy>,
    request: Request,
    next: Next,
) -> Response {
    let mut key = format!("{} {}", request.method(), request.uri());
    if policy.per_caller {
        match ip::resolve(request.headers(), request.extensions()) {
            Some(ip) => key = format!("{key} @{ip}"),
            None => return AppError::NoClientIp.into_response(),
        }
    }

    if let Some((content_type, body)) = policy.cache.get(&key) {
        debug!("Cache hit for {key}");
        let mut response = Body::from(body).into_response();
        if let Some(content_type) = content_type {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        return response;
    }

    let generation = policy.cache.generation();
    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    match to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            let stored = policy.cache.put(
                key,
                generation,
                policy.ttl,
                parts.headers.get(CONTENT_TYPE).cloned(),
                bytes.clone(),
            );
            if !stored {
                debug!("Dropped a response that raced an invalidation");
            }
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            warn!("Failed to buffer response for {key}: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

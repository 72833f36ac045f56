// src/client/api.rs
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ErrorBody, ErrorKind, Idea, IdeaPage, ResetReceipt, VoteReceipt, VoteStatus};
use crate::services::VoteService;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/v1";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message} (HTTP {status})")]
    Rejected {
        status: u16,
        kind: ErrorKind,
        message: String,
    },
}

impl ApiError {
    /// The server's error category, when the server answered at all.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ApiError::Rejected { kind, .. } => Some(*kind),
            ApiError::Transport(_) => None,
        }
    }
}

/// Everything the client store needs from the server.
#[async_trait]
pub trait IdeaApi: Send + Sync {
    async fn list_ideas(&self, limit: u32, offset: u64) -> Result<IdeaPage, ApiError>;
    async fn get_idea(&self, id: Uuid) -> Result<Idea, ApiError>;
    async fn vote_status(&self) -> Result<VoteStatus, ApiError>;
    async fn vote(&self, id: Uuid) -> Result<VoteReceipt, ApiError>;
    async fn reset_votes(&self) -> Result<ResetReceipt, ApiError>;
}

/// [IdeaApi] over HTTP.
pub struct HttpApi {
    http: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let (kind, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.kind, body.message),
        Err(_) if text.is_empty() => (ErrorKind::Unknown, status.to_string()),
        Err(_) => (ErrorKind::Unknown, text),
    };
    Err(ApiError::Rejected {
        status: status.as_u16(),
        kind,
        message,
    })
}

#[async_trait]
impl IdeaApi for HttpApi {
    async fn list_ideas(&self, limit: u32, offset: u64) -> Result<IdeaPage, ApiError> {
        let response = self
            .http
            .get(self.url("/ideas"))
            .query(&[("limit", limit as u64), ("offset", offset)])
            .send()
            .await?;
        decode(response).await
    }

    async fn get_idea(&self, id: Uuid) -> Result<Idea, ApiError> {
        let response = self.http.get(self.url(&format!("/ideas/{id}"))).send().await?;
        decode(response).await
    }

    async fn vote_status(&self) -> Result<VoteStatus, ApiError> {
        let response = self.http.get(self.url("/votes/status")).send().await?;
        decode(response).await
    }

    async fn vote(&self, id: Uuid) -> Result<VoteReceipt, ApiError> {
        let response = self
            .http
            .post(self.url(&format!("/ideas/{id}/vote")))
            .send()
            .await?;
        decode(response).await
    }

    async fn reset_votes(&self) -> Result<ResetReceipt, ApiError> {
        let response = self.http.delete(self.url("/votes/reset")).send().await?;
        decode(response).await
    }
}

/// [IdeaApi] calling a [VoteService] in the same process, as a fixed caller.
#[derive(Clone)]
pub struct LocalApi {
    service: VoteService,
    ip: String,
}

impl LocalApi {
    pub fn new(service: VoteService, ip: impl Into<String>) -> Self {
        Self {
            service,
            ip: ip.into(),
        }
    }
}

fn rejected(err: crate::error::AppError) -> ApiError {
    let body = err.body();
    ApiError::Rejected {
        status: body.status_code,
        kind: body.kind,
        message: body.message,
    }
}

#[async_trait]
impl IdeaApi for LocalApi {
    async fn list_ideas(&self, limit: u32, offset: u64) -> Result<IdeaPage, ApiError> {
        let (limit, offset) = (limit.to_string(), offset.to_string());
        self.service
            .list_ideas(Some(&limit), Some(&offset))
            .await
            .map_err(rejected)
    }

    async fn get_idea(&self, id: Uuid) -> Result<Idea, ApiError> {
        self.service.get_idea(&id.to_string()).await.map_err(rejected)
    }

    async fn vote_status(&self) -> Result<VoteStatus, ApiError> {
        self.service.vote_status(&self.ip).await.map_err(rejected)
    }

    async fn vote(&self, id: Uuid) -> Result<VoteReceipt, ApiError> {
        self.service
            .vote_idea(&id.to_string(), &self.ip)
            .await
            .map_err(rejected)
    }

    async fn reset_votes(&self) -> Result<ResetReceipt, ApiError> {
        self.service.reset_votes(&self.ip).await.map_err(rejected)
    }
}

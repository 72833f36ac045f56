//! Caller identification.
//!
//! A caller is whoever the first `X-Forwarded-For` entry names; without that header we fall back
//! to the peer address of the TCP connection.
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{Extensions, HeaderMap, request::Parts},
};

use crate::error::AppError;

pub const FORWARDED_FOR: &str = "x-forwarded-for";

pub fn resolve(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
}

/// Extractor yielding the caller's IP address, or [AppError::NoClientIp].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        resolve(&parts.headers, &parts.extensions)
            .map(ClientIp)
            .ok_or(AppError::NoClientIp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(forwarded: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_str(forwarded).unwrap());
        headers
    }

    fn peer() -> Extensions {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 50123))));
        extensions
    }

    #[test]
    fn first_forwarded_entry_wins() {
        let ip = resolve(&headers(" 203.0.113.7 , 10.0.0.1, 10.0.0.2"), &peer());
        assert_eq!(ip.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn falls_back_to_peer_address() {
        assert_eq!(resolve(&HeaderMap::new(), &peer()).as_deref(), Some("127.0.0.1"));
        assert_eq!(resolve(&headers("  "), &peer()).as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn nothing_to_go_on() {
        assert_eq!(resolve(&HeaderMap::new(), &Extensions::new()), None);
    }
}

//! HTTP liveness checks for outbound links

use crate::results::LinkError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Result of probing a single link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The link answered 200
    Ok,
    /// The link answered with another status
    HttpError(u16),
    /// No response was obtained
    TransportFailure(String),
}

impl Outcome {
    /// The failure detail to record, or `None` for a live link
    pub fn failure(&self) -> Option<LinkError> {
        match self {
            Outcome::Ok => None,
            Outcome::HttpError(status) => Some(LinkError::Status(*status)),
            Outcome::TransportFailure(reason) => Some(LinkError::Transport(reason.clone())),
        }
    }
}

/// Checks whether a URL is alive
///
/// Implementations never fail: every failure mode is an [`Outcome`] variant.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Outcome;
}

/// Probe backed by a reqwest client with a fixed per-request timeout
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LinkProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Outcome {
        if let Err(e) = url::Url::parse(url) {
            return Outcome::TransportFailure(format!("malformed URL: {}", e));
        }

        match self.client.get(url).send().await {
            Ok(response) if response.status() == StatusCode::OK => Outcome::Ok,
            Ok(response) => Outcome::HttpError(response.status().as_u16()),
            Err(e) => Outcome::TransportFailure(classify_transport_error(&e)),
        }
    }
}

/// Short human-readable reason for a failed request
fn classify_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else if e.is_redirect() {
        "too many redirects".to_string()
    } else if e.is_builder() {
        format!("malformed URL: {}", e)
    } else {
        format!("request failed: {}", e)
    }
}

/// Memoises outcomes so each distinct target is requested once
pub struct CachingProbe<'a, P: LinkProbe + ?Sized> {
    inner: &'a P,
    seen: Mutex<HashMap<String, Outcome>>,
}

impl<'a, P: LinkProbe + ?Sized> CachingProbe<'a, P> {
    pub fn new(inner: &'a P) -> Self {
        Self {
            inner,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct URLs probed so far
    pub fn distinct(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or(0)
    }

    fn cached(&self, url: &str) -> Option<Outcome> {
        self.seen.lock().ok()?.get(url).cloned()
    }
}

#[async_trait]
impl<P: LinkProbe + ?Sized> LinkProbe for CachingProbe<'_, P> {
    async fn probe(&self, url: &str) -> Outcome {
        if let Some(outcome) = self.cached(url) {
            ::log::trace!("Probe cache hit: {}", url);
            return outcome;
        }

        let outcome = self.inner.probe(url).await;
        if let Ok(mut seen) = self.seen.lock() {
            seen.insert(url.to_string(), outcome.clone());
        }
        outcome
    }
}

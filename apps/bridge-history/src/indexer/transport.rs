use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{HistoryError, Result};

use super::subgraph::GraphQlRequest;

/// Which indexer a query goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerKind {
    /// L1 deposit subgraph.
    Deposits,
    /// L2 withdrawal subgraph.
    Withdrawals,
}

#[async_trait]
pub trait IndexerTransport: Send + Sync {
    /// Sends one GraphQL request and returns its `data` object.
    async fn query(&self, kind: IndexerKind, request: &GraphQlRequest) -> Result<Value>;
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

pub struct HttpIndexerTransport {
    http: reqwest::Client,
    deposits_url: String,
    withdrawals_url: String,
    limiter: DefaultDirectRateLimiter,
}

impl HttpIndexerTransport {
    pub fn new(deposits_url: String, withdrawals_url: String, requests_per_second: NonZeroU32) -> Self {
        Self {
            http: reqwest::Client::new(),
            deposits_url,
            withdrawals_url,
            limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
        }
    }
}

#[async_trait]
impl IndexerTransport for HttpIndexerTransport {
    async fn query(&self, kind: IndexerKind, request: &GraphQlRequest) -> Result<Value> {
        let url = match kind {
            IndexerKind::Deposits => &self.deposits_url,
            IndexerKind::Withdrawals => &self.withdrawals_url,
        };

        self.limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let response: GraphQlResponse = self
            .http
            .post(url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.errors.is_empty() {
            let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
            return Err(HistoryError::Indexer(messages.join("; ")));
        }

        response
            .data
            .ok_or_else(|| HistoryError::Indexer("response carried no data".into()))
    }
}

//! Paginated, filtered queries against the deposit and withdrawal indexers.

use std::sync::Arc;

use alloy::primitives::Address;

use crate::error::{HistoryError, Result};
use crate::model::{RawDepositEvent, RawWithdrawalEvent};

pub mod retry;
pub mod subgraph;
pub mod transport;

pub use retry::RetryPolicy;
pub use transport::{HttpIndexerTransport, IndexerKind, IndexerTransport};

use subgraph::{DepositsData, WithdrawalsData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerQuery {
    pub address: Address,
    /// Inclusive.
    pub from_block: u64,
    /// Inclusive.
    pub to_block: u64,
    pub page_size: u32,
    pub page_number: u32,
    /// Substring matched against the source transaction hash.
    pub search: Option<String>,
}

impl IndexerQuery {
    pub fn skip(&self) -> u64 {
        u64::from(self.page_number) * u64::from(self.page_size)
    }

    /// No block range established yet.
    pub fn is_empty_range(&self) -> bool {
        self.from_block == 0 && self.to_block == 0
    }
}

pub struct IndexerQueryClient {
    transport: Arc<dyn IndexerTransport>,
    retry: RetryPolicy,
}

impl IndexerQueryClient {
    pub fn new(transport: Arc<dyn IndexerTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Deposits sent by `query.address`, newest first.
    pub async fn deposits(&self, query: &IndexerQuery) -> Result<Vec<RawDepositEvent>> {
        if query.is_empty_range() {
            tracing::debug!(address = %query.address, "Empty block range, skipping deposit query");
            return Ok(Vec::new());
        }

        let request = subgraph::deposits_request(query);
        let data = retry::with_retry(self.retry, "deposits", || {
            self.transport.query(IndexerKind::Deposits, &request)
        })
        .await?;

        let data: DepositsData = serde_json::from_value(data)
            .map_err(|e| HistoryError::Decode(format!("deposits response: {e}")))?;

        tracing::debug!(
            address = %query.address,
            page = query.page_number,
            count = data.deposits.len(),
            "Fetched deposits"
        );

        data.deposits.into_iter().map(RawDepositEvent::try_from).collect()
    }

    /// Withdrawals sent by `query.address`, newest first.
    pub async fn withdrawals(&self, query: &IndexerQuery) -> Result<Vec<RawWithdrawalEvent>> {
        if query.is_empty_range() {
            tracing::debug!(address = %query.address, "Empty block range, skipping withdrawal query");
            return Ok(Vec::new());
        }

        let request = subgraph::withdrawals_request(query);
        let data = retry::with_retry(self.retry, "withdrawals", || {
            self.transport.query(IndexerKind::Withdrawals, &request)
        })
        .await?;

        let data: WithdrawalsData = serde_json::from_value(data)
            .map_err(|e| HistoryError::Decode(format!("withdrawals response: {e}")))?;

        tracing::debug!(
            address = %query.address,
            page = query.page_number,
            count = data.withdrawals.len(),
            "Fetched withdrawals"
        );

        data.withdrawals
            .into_iter()
            .map(RawWithdrawalEvent::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{deposit_json, FakeTransport};
    use std::time::Duration;

    fn client(transport: Arc<FakeTransport>) -> IndexerQueryClient {
        IndexerQueryClient::new(
            transport,
            RetryPolicy {
                retries: 2,
                interval: Duration::from_millis(1),
            },
        )
    }

    fn query(page_number: u32, search: Option<String>) -> IndexerQuery {
        IndexerQuery {
            address: Address::repeat_byte(0xaa),
            from_block: 0,
            to_block: 1_000,
            page_size: 2,
            page_number,
            search,
        }
    }

    #[tokio::test]
    async fn test_empty_range_issues_no_query() {
        let transport = Arc::new(FakeTransport::new((1..=3).map(|i| deposit_json(i, None)).collect()));
        let client = client(transport.clone());

        let mut q = query(0, None);
        q.to_block = 0;
        assert!(client.deposits(&q).await.unwrap().is_empty());
        assert!(client.withdrawals(&q).await.unwrap().is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_pages_and_search() {
        let transport = Arc::new(FakeTransport::new((1..=5).map(|i| deposit_json(i, None)).collect()));
        let client = client(transport.clone());

        let page = client.deposits(&query(0, None)).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].block_number, 1);

        let last = client.deposits(&query(2, None)).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].block_number, 5);

        let hash = page[1].tx_hash.to_string();
        let found = client.deposits(&query(0, Some(hash))).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tx_hash, page[1].tx_hash);
    }

    #[tokio::test]
    async fn test_retries_then_surfaces_indexer_error() {
        let transport = Arc::new(FakeTransport::new(vec![deposit_json(1, None)]).failing_first(2));
        let page = client(transport.clone()).deposits(&query(0, None)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(transport.calls(), 3);

        let transport = Arc::new(FakeTransport::new(vec![deposit_json(1, None)]).failing_first(3));
        let err = client(transport.clone()).deposits(&query(0, None)).await.unwrap_err();
        assert!(matches!(err, HistoryError::Indexer(_)));
        assert_eq!(transport.calls(), 3);
    }
}

use std::num::NonZeroU32;
use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, Filter, Log, TransactionRequest};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};

use crate::error::{HistoryError, Result};

use super::{ChainRpc, ContractRpc, ReceiptSummary};

/// HTTP JSON-RPC provider for one chain, throttled by a direct rate limiter.
pub struct EvmRpc {
    name: &'static str,
    provider: RootProvider<Http<Client>>,
    limiter: DefaultDirectRateLimiter,
}

impl EvmRpc {
    pub fn new(name: &'static str, rpc_url: &str, requests_per_second: NonZeroU32) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .map_err(|e| HistoryError::Config(format!("Invalid {name} RPC URL: {e}")))?,
        );

        Ok(Self {
            name,
            provider,
            limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
        })
    }

    async fn throttle(&self) {
        self.limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;
    }
}

#[async_trait]
impl ChainRpc for EvmRpc {
    async fn chain_id(&self) -> Result<u64> {
        self.throttle().await;
        Ok(self.provider.get_chain_id().await?)
    }

    async fn block_number(&self) -> Result<u64> {
        self.throttle().await;
        Ok(self.provider.get_block_number().await?)
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        self.throttle().await;
        let block = self
            .provider
            .get_block_by_number(
                BlockNumberOrTag::Number(block_number),
                BlockTransactionsKind::Hashes,
            )
            .await?
            .ok_or(HistoryError::BlockNotFound(block_number))?;
        Ok(block.header.timestamp)
    }

    async fn transaction_block_number(&self, tx_hash: B256) -> Result<Option<u64>> {
        self.throttle().await;
        let tx = self.provider.get_transaction_by_hash(tx_hash).await?;
        Ok(tx.and_then(|tx| tx.block_number))
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<ReceiptSummary>> {
        self.throttle().await;
        let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? else {
            tracing::debug!(chain = self.name, %tx_hash, "No receipt yet");
            return Ok(None);
        };

        Ok(Some(ReceiptSummary {
            tx_hash,
            success: receipt.status(),
            block_number: receipt.block_number,
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        }))
    }
}

#[async_trait]
impl ContractRpc for EvmRpc {
    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.throttle().await;
        Ok(self.provider.get_logs(filter).await?)
    }

    async fn call(&self, request: &TransactionRequest) -> Result<Bytes> {
        self.throttle().await;
        Ok(self.provider.call(request).await?)
    }
}

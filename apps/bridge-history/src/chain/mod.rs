//! Chain RPC contract used by the resolver.
//!
//! [`ChainRpc`] covers the plain `eth_*` reads, one instance per chain, and
//! [`ContractRpc`] adds the log queries and calls the message reader makes on L2.
//! [`MessageReader`] covers the cross-chain message lookups that need both the
//! L1 receipt and L2 state.

use alloy::primitives::{Bytes, Log, B256};
use alloy::rpc::types::{Filter, TransactionRequest};
use async_trait::async_trait;

use crate::error::Result;
use crate::model::MessageState;

pub mod arbitrum;
pub mod events;
pub mod evm;

pub use arbitrum::ArbitrumMessageReader;
pub use evm::EvmRpc;

/// The parts of a transaction receipt the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: B256,
    pub success: bool,
    pub block_number: Option<u64>,
    pub logs: Vec<Log>,
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn block_number(&self) -> Result<u64>;

    /// Block timestamp in seconds.
    async fn block_timestamp(&self, block_number: u64) -> Result<u64>;

    /// `None` while the transaction is unknown or not yet mined.
    async fn transaction_block_number(&self, tx_hash: B256) -> Result<Option<u64>>;

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<ReceiptSummary>>;
}

/// Log queries and calls on top of the plain reads.
#[async_trait]
pub trait ContractRpc: ChainRpc {
    async fn logs(&self, filter: &Filter) -> Result<Vec<alloy::rpc::types::Log>>;

    async fn call(&self, request: &TransactionRequest) -> Result<Bytes>;
}

#[async_trait]
pub trait MessageReader: Send + Sync {
    /// Native-asset deposit message carried by an L1 receipt, status included.
    async fn eth_deposit(&self, receipt: &ReceiptSummary) -> Result<Option<MessageState>>;

    /// Retryable ticket carried by an L1 receipt. Reads the status once.
    async fn retryable_ticket(&self, receipt: &ReceiptSummary) -> Result<Option<MessageState>>;
}

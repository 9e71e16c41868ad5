//! In-memory fakes for the indexer and chain seams.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, Log, B256};
use alloy::rpc::types::{Filter, TransactionRequest};
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::chain::{ChainRpc, ContractRpc, MessageReader, ReceiptSummary};
use crate::error::{HistoryError, Result};
use crate::indexer::subgraph::GraphQlRequest;
use crate::indexer::{IndexerKind, IndexerTransport};
use crate::model::{MessageKind, MessageState};

pub const SENDER: Address = Address::repeat_byte(0xaa);

/// Base block time of the fixtures, seconds.
pub const BASE_TIME: u64 = 1_659_366_245;

pub fn tx_hash(i: u64) -> B256 {
    B256::left_padding_from(&i.to_be_bytes())
}

/// Subgraph deposit record `i`: block `i`, native unless a token is given.
pub fn deposit_json(i: u64, token: Option<(&str, &str, u8)>) -> Value {
    let l1_token = token.map(|(id, symbol, decimals)| {
        json!({ "id": id, "symbol": symbol, "decimals": decimals })
    });
    json!({
        "id": format!("deposit-{i}"),
        "sender": format!("{SENDER:#x}"),
        "ethValue": "1000000000000000000",
        "l1Token": l1_token,
        "tokenAmount": "5000000",
        "timestamp": (BASE_TIME + i).to_string(),
        "transactionHash": tx_hash(i).to_string(),
        "blockCreatedAt": i.to_string(),
    })
}

pub fn withdrawal_json(i: u64, state: &str, deadline: Option<&str>) -> Value {
    json!({
        "id": format!("withdrawal-{i}"),
        "sender": format!("{SENDER:#x}"),
        "ethValue": "2000000000000000000",
        "l1Token": null,
        "tokenAmount": null,
        "l2BlockTimestamp": (BASE_TIME + i).to_string(),
        "l2TxHash": tx_hash(1_000 + i).to_string(),
        "l2BlockNum": (100 + i).to_string(),
        "l1BlockNum": i.to_string(),
        "position": i.to_string(),
        "outgoingMessageState": state,
        "nodeBlockDeadline": deadline,
    })
}

/// Subgraph stand-in that honours `first`, `skip` and the hash filter.
#[derive(Default)]
pub struct FakeTransport {
    deposits: Vec<Value>,
    withdrawals: Vec<Value>,
    fail_first: u32,
    page_delays: HashMap<u64, Duration>,
    calls: AtomicU32,
}

impl FakeTransport {
    pub fn new(deposits: Vec<Value>) -> Self {
        Self {
            deposits,
            ..Default::default()
        }
    }

    pub fn with_withdrawals(mut self, withdrawals: Vec<Value>) -> Self {
        self.withdrawals = withdrawals;
        self
    }

    pub fn failing_first(mut self, count: u32) -> Self {
        self.fail_first = count;
        self
    }

    /// Delays responses for the page starting at `skip`.
    pub fn delayed_page(mut self, skip: u64, delay: Duration) -> Self {
        self.page_delays.insert(skip, delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexerTransport for FakeTransport {
    async fn query(&self, kind: IndexerKind, request: &GraphQlRequest) -> Result<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let vars = &request.variables;
        let skip = vars["skip"].as_u64().unwrap_or(0);

        if let Some(delay) = self.page_delays.get(&skip) {
            tokio::time::sleep(*delay).await;
        }
        if call < self.fail_first {
            return Err(HistoryError::Indexer("503 Service Unavailable".into()));
        }

        let (key, hash_field, search_field, records) = match kind {
            IndexerKind::Deposits => (
                "deposits",
                "transactionHash",
                "transactionHash_contains",
                &self.deposits,
            ),
            IndexerKind::Withdrawals => (
                "withdrawals",
                "l2TxHash",
                "l2TxHash_contains",
                &self.withdrawals,
            ),
        };
        let search = vars["where"][search_field].as_str();
        let first = vars["first"].as_u64().unwrap_or(u64::MAX) as usize;

        let items: Vec<Value> = records
            .iter()
            .filter(|r| {
                search.map_or(true, |s| {
                    r[hash_field].as_str().is_some_and(|h| h.contains(s))
                })
            })
            .skip(skip as usize)
            .take(first)
            .cloned()
            .collect();

        let mut data = Map::new();
        data.insert(key.to_string(), Value::Array(items));
        Ok(Value::Object(data))
    }
}

fn rpc_failure() -> HistoryError {
    HistoryError::Rpc(TransportErrorKind::custom_str("connection reset"))
}

/// One chain's RPC with canned receipts, blocks and per-hash delays.
#[derive(Default)]
pub struct FakeChain {
    chain_id: u64,
    head: u64,
    receipts: HashMap<B256, ReceiptSummary>,
    tx_blocks: HashMap<B256, u64>,
    block_times: HashMap<u64, u64>,
    delays: HashMap<B256, Duration>,
    failing: HashSet<B256>,
    logs: Vec<alloy::rpc::types::Log>,
    call_error: Option<(i64, String)>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeChain {
    pub fn new(chain_id: u64, head: u64) -> Self {
        Self {
            chain_id,
            head,
            ..Default::default()
        }
    }

    pub fn with_receipt(mut self, tx: B256, success: bool, block: u64) -> Self {
        self.receipts.insert(
            tx,
            ReceiptSummary {
                tx_hash: tx,
                success,
                block_number: Some(block),
                logs: Vec::new(),
            },
        );
        self.tx_blocks.insert(tx, block);
        self
    }

    /// Log returned by every log query.
    pub fn with_log(mut self, log: Log) -> Self {
        self.logs.push(alloy::rpc::types::Log {
            inner: log,
            ..Default::default()
        });
        self
    }

    /// Makes every call fail with a JSON-RPC error response.
    pub fn with_call_error(mut self, code: i64, message: &str) -> Self {
        self.call_error = Some((code, message.to_string()));
        self
    }

    pub fn with_block_time(mut self, block: u64, timestamp: u64) -> Self {
        self.block_times.insert(block, timestamp);
        self
    }

    pub fn with_delay(mut self, tx: B256, delay: Duration) -> Self {
        self.delays.insert(tx, delay);
        self
    }

    pub fn failing(mut self, tx: B256) -> Self {
        self.failing.insert(tx);
        self
    }

    /// Most receipt lookups seen running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.head)
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        self.block_times
            .get(&block_number)
            .copied()
            .ok_or(HistoryError::BlockNotFound(block_number))
    }

    async fn transaction_block_number(&self, tx_hash: B256) -> Result<Option<u64>> {
        Ok(self.tx_blocks.get(&tx_hash).copied())
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<ReceiptSummary>> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&tx_hash) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&tx_hash) {
            return Err(rpc_failure());
        }
        Ok(self.receipts.get(&tx_hash).cloned())
    }
}

#[async_trait]
impl ContractRpc for FakeChain {
    async fn logs(&self, _filter: &Filter) -> Result<Vec<alloy::rpc::types::Log>> {
        Ok(self.logs.clone())
    }

    async fn call(&self, _request: &TransactionRequest) -> Result<Bytes> {
        match &self.call_error {
            Some((code, message)) => {
                let payload = json!({ "code": code, "message": message }).to_string();
                Err(HistoryError::Rpc(RpcError::ErrorResp(
                    serde_json::from_str(&payload).unwrap(),
                )))
            }
            None => Ok(Bytes::from(vec![0u8; 32])),
        }
    }
}

/// Message states keyed by the L1 transaction that carried them.
#[derive(Default)]
pub struct FakeMessages {
    messages: HashMap<B256, MessageState>,
    failing: HashSet<B256>,
}

impl FakeMessages {
    pub fn with_message(mut self, l1_tx: B256, message: MessageState) -> Self {
        self.messages.insert(l1_tx, message);
        self
    }

    pub fn failing(mut self, l1_tx: B256) -> Self {
        self.failing.insert(l1_tx);
        self
    }

    fn lookup(&self, receipt: &ReceiptSummary, kind: MessageKind) -> Result<Option<MessageState>> {
        if self.failing.contains(&receipt.tx_hash) {
            return Err(rpc_failure());
        }
        Ok(self
            .messages
            .get(&receipt.tx_hash)
            .filter(|m| m.kind == kind)
            .cloned())
    }
}

#[async_trait]
impl MessageReader for FakeMessages {
    async fn eth_deposit(&self, receipt: &ReceiptSummary) -> Result<Option<MessageState>> {
        self.lookup(receipt, MessageKind::EthDeposit)
    }

    async fn retryable_ticket(&self, receipt: &ReceiptSummary) -> Result<Option<MessageState>> {
        self.lookup(receipt, MessageKind::RetryableTicket)
    }
}

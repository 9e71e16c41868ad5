//! Typed records shared by every stage of the history pipeline.
//!
//! Raw events come from the indexers, [`MessageState`] from the chain RPCs and
//! [`CanonicalTransaction`] is what callers receive.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Sort bias added to withdrawal timestamps so that an outbound leg sorts ahead
/// of the continuation sharing its block time. Not a real clock value.
pub const WITHDRAWAL_SORT_BIAS_MS: i64 = 1000;

/// Placeholder txId for withdrawals the indexer reported without an L2 hash.
pub const MISSING_L2_TX_HASH: &str = "l2-tx-hash-not-found";

/// Decimal scale of the native asset on both chains.
pub const NATIVE_DECIMALS: u8 = 18;

pub const NATIVE_SYMBOL: &str = "eth";

/// Largest decimal scale a U256 amount can be formatted with.
pub const MAX_TOKEN_DECIMALS: u8 = 77;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "deposit")]
    Deposit,
    #[serde(rename = "deposit-l1")]
    DepositL1,
    #[serde(rename = "outbox")]
    Outbox,
}

impl Direction {
    pub fn is_deposit(self) -> bool {
        matches!(self, Direction::Deposit | Direction::DepositL1)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Deposit => "deposit",
            Direction::DepositL1 => "deposit-l1",
            Direction::Outbox => "outbox",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the source-chain transaction itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L1Status {
    /// Not mined yet (no receipt).
    Pending,
    Success,
    /// Reverted on the source chain.
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Native-asset deposit message.
    EthDeposit,
    /// Retryable ticket created for a token deposit.
    RetryableTicket,
}

/// Status of the cross-chain message tied to a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    NotYetCreated,
    CreationFailed,
    FundsDepositedOnL2,
    Redeemed,
    Expired,
}

/// Cross-chain message read from the destination chain. Queried on demand,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageState {
    pub kind: MessageKind,
    pub status: MessageStatus,
    /// L2 deposit tx (native) or retryable creation id (token).
    pub creation_tx: Option<B256>,
    /// L2 transaction that delivered the funds, once there is one.
    pub l2_tx: Option<B256>,
}

/// Deposit lifecycle. Terminal states: `L1Failure`, `CreationFailed`,
/// `Expired`, `L2Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    L1Pending,
    L1Failure,
    L2Pending,
    L2Success,
    /// Token funds are on L2 but the ticket still needs a manual redeem.
    L2Failure,
    CreationFailed,
    Expired,
    /// RPC enrichment failed; best-known data only.
    #[serde(rename = "warning")]
    Warning,
}

impl DepositStatus {
    pub fn is_terminal(self) -> bool {
        match self {
            DepositStatus::L1Failure
            | DepositStatus::CreationFailed
            | DepositStatus::Expired
            | DepositStatus::L2Success => true,
            DepositStatus::L1Pending
            | DepositStatus::L2Pending
            | DepositStatus::L2Failure
            | DepositStatus::Warning => false,
        }
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepositStatus::L1Pending => "L1_PENDING",
            DepositStatus::L1Failure => "L1_FAILURE",
            DepositStatus::L2Pending => "L2_PENDING",
            DepositStatus::L2Success => "L2_SUCCESS",
            DepositStatus::L2Failure => "L2_FAILURE",
            DepositStatus::CreationFailed => "CREATION_FAILED",
            DepositStatus::Expired => "EXPIRED",
            DepositStatus::Warning => "warning",
        };
        f.write_str(s)
    }
}

/// Outbox stage of an L2 to L1 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutgoingMessageState {
    Unconfirmed,
    Confirmed,
    Executed,
}

/// Chain-reported deadline for a withdrawal's node confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodeBlockDeadline {
    Block(u64),
    NodeNotCreated,
    /// Execution of the outbox call reverted.
    ExecuteCallException,
}

impl FromStr for NodeBlockDeadline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXECUTE_CALL_EXCEPTION" => Ok(NodeBlockDeadline::ExecuteCallException),
            "NODE_NOT_CREATED" => Ok(NodeBlockDeadline::NodeNotCreated),
            other => other
                .parse::<u64>()
                .map(NodeBlockDeadline::Block)
                .map_err(|e| format!("invalid node block deadline {other:?}: {e}")),
        }
    }
}

impl TryFrom<String> for NodeBlockDeadline {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeBlockDeadline> for String {
    fn from(value: NodeBlockDeadline) -> Self {
        value.to_string()
    }
}

impl fmt::Display for NodeBlockDeadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeBlockDeadline::Block(n) => write!(f, "{n}"),
            NodeBlockDeadline::NodeNotCreated => f.write_str("NODE_NOT_CREATED"),
            NodeBlockDeadline::ExecuteCallException => f.write_str("EXECUTE_CALL_EXCEPTION"),
        }
    }
}

/// Display status of a withdrawal. `Executed` and `Failure` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    Unconfirmed,
    Confirmed,
    Executed,
    Failure,
}

impl WithdrawalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WithdrawalStatus::Executed | WithdrawalStatus::Failure)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WithdrawalStatus::Unconfirmed => "Unconfirmed",
            WithdrawalStatus::Confirmed => "Confirmed",
            WithdrawalStatus::Executed => "Executed",
            WithdrawalStatus::Failure => "Failure",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactionStatus {
    Deposit(DepositStatus),
    Withdrawal(WithdrawalStatus),
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        match self {
            TransactionStatus::Deposit(s) => s.is_terminal(),
            TransactionStatus::Withdrawal(s) => s.is_terminal(),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Deposit(s) => s.fmt(f),
            TransactionStatus::Withdrawal(s) => s.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

/// Deposit as reported by the L1 indexer. `token == None` means a native
/// transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDepositEvent {
    pub sender: Address,
    pub token: Option<TokenInfo>,
    pub amount: U256,
    pub tx_hash: B256,
    pub block_number: u64,
    /// Seconds since epoch, when the indexer has it.
    pub timestamp: Option<u64>,
}

impl RawDepositEvent {
    pub fn is_native(&self) -> bool {
        self.token.is_none()
    }
}

/// Withdrawal as reported by the L2 indexer, outbox state included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawWithdrawalEvent {
    pub sender: Address,
    pub token: Option<TokenInfo>,
    pub amount: U256,
    pub l2_tx_hash: Option<B256>,
    pub l2_block_number: u64,
    /// L1 block number reported for the outbox entry.
    pub l1_block_number: Option<u64>,
    /// Seconds since epoch.
    pub timestamp: u64,
    /// Outbox position.
    pub unique_id: Option<String>,
    pub outgoing_state: OutgoingMessageState,
    pub node_block_deadline: Option<NodeBlockDeadline>,
}

/// Direction-specific detail kept alongside the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageSubStatus {
    Deposit {
        message_status: Option<MessageStatus>,
        retryable_creation_tx: Option<B256>,
        l2_tx: Option<B256>,
    },
    Outbox {
        outgoing_state: OutgoingMessageState,
        node_block_deadline: Option<NodeBlockDeadline>,
        unique_id: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiveKey {
    pub tx_id: String,
    pub direction: Direction,
}

impl LiveKey {
    pub fn new(tx_id: impl Into<String>, direction: Direction) -> Self {
        Self {
            tx_id: tx_id.into(),
            direction,
        }
    }
}

/// The configured L1/L2 pair, read from the providers once per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainIds {
    pub l1: u64,
    pub l2: u64,
}

/// Unified, direction-agnostic transaction record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalTransaction {
    pub direction: Direction,
    pub status: TransactionStatus,
    /// Milliseconds since epoch used for ordering (withdrawals carry the bias).
    pub created_at_ms: Option<i64>,
    pub resolved_at_ms: Option<i64>,
    pub tx_id: String,
    pub asset: String,
    pub value: String,
    pub block_num: Option<u64>,
    pub token_address: Option<Address>,
    pub sender: Option<Address>,
    pub l1_chain_id: Option<u64>,
    pub l2_chain_id: Option<u64>,
    pub message: MessageSubStatus,
}

impl CanonicalTransaction {
    pub fn key(&self) -> LiveKey {
        LiveKey::new(self.tx_id.clone(), self.direction)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    pub fn is_deposit(&self) -> bool {
        self.direction.is_deposit()
    }

    pub fn created_display(&self) -> Option<DisplayTime> {
        self.created_at_ms.and_then(DisplayTime::from_millis)
    }

    pub fn resolved_display(&self) -> Option<DisplayTime> {
        self.resolved_at_ms.and_then(DisplayTime::from_millis)
    }
}

/// Seconds to milliseconds, saturating far outside any real block time.
pub fn secs_to_millis(secs: u64) -> i64 {
    i64::try_from(secs).map_or(i64::MAX, |s| s.saturating_mul(1000))
}

/// Human-readable date and time pair (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayTime {
    pub date: String,
    pub time: String,
}

impl DisplayTime {
    pub fn from_millis(ms: i64) -> Option<Self> {
        let dt = DateTime::from_timestamp_millis(ms)?;
        Some(Self {
            date: dt.format("%b %d, %Y").to_string(),
            time: dt.format("%I:%M %p").to_string(),
        })
    }
}

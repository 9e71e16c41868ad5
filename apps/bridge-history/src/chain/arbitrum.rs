//! Cross-chain message lookups for an Arbitrum-style L1/L2 pair.
//!
//! An L1 deposit receipt carries a bridge `MessageDelivered` log and an inbox
//! `InboxMessageDelivered` log sharing the same message number. From those the
//! L2 transaction id is derived (typed-transaction RLP hashed with keccak256)
//! and its state is read from L2 in a single pass.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{address, keccak256, Address, Bytes, Log, B256, U256};
use alloy::rlp::{Encodable, Header};
use alloy::rpc::types::{Filter, TransactionInput, TransactionRequest};
use alloy::sol_types::{SolCall, SolEvent};
use alloy::transports::RpcError;
use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::error::{HistoryError, Result};
use crate::model::{MessageKind, MessageState, MessageStatus};

use super::events::{
    getTimeoutCall, InboxMessageDelivered, MessageDelivered, RedeemScheduled,
    KIND_ETH_DEPOSIT, KIND_SUBMIT_RETRYABLE,
};
use super::{ChainRpc, ContractRpc, MessageReader, ReceiptSummary};

/// JSON-RPC error code for a reverted call.
const REVERT_CODE: i64 = 3;

/// ArbRetryableTx precompile.
pub const ARB_RETRYABLE_TX: Address = address!("000000000000000000000000000000000000006e");

const DEPOSIT_TX_TYPE: u8 = 0x64;
const SUBMIT_RETRYABLE_TX_TYPE: u8 = 0x69;

/// A bridge message joined with its inbox payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub message_number: U256,
    pub kind: u8,
    /// Sender as seen by the bridge (aliased for contracts).
    pub sender: Address,
    pub base_fee_l1: U256,
    pub data: Bytes,
}

/// Decoded payload of a retryable ticket submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryableFields {
    pub dest: Address,
    pub l2_call_value: U256,
    pub l1_value: U256,
    pub max_submission_fee: U256,
    pub excess_fee_refund_address: Address,
    pub call_value_refund_address: Address,
    pub gas_limit: U256,
    pub max_fee_per_gas: U256,
    pub data: Bytes,
}

pub struct ArbitrumMessageReader {
    l2: Arc<dyn ContractRpc>,
    l2_chain_id: OnceCell<u64>,
}

impl ArbitrumMessageReader {
    pub fn new(l2: Arc<dyn ContractRpc>) -> Self {
        Self {
            l2,
            l2_chain_id: OnceCell::new(),
        }
    }

    async fn l2_chain_id(&self) -> Result<u64> {
        self.l2_chain_id
            .get_or_try_init(|| self.l2.chain_id())
            .await
            .copied()
    }

    async fn retryable_status(&self, ticket_id: B256) -> Result<(MessageStatus, Option<B256>)> {
        let Some(creation) = self.l2.transaction_receipt(ticket_id).await? else {
            return Ok((MessageStatus::NotYetCreated, None));
        };
        if !creation.success {
            return Ok((MessageStatus::CreationFailed, None));
        }

        let from_block = creation.block_number.unwrap_or_default();
        if let Some(redeem_tx) = self.successful_redeem(ticket_id, from_block).await? {
            return Ok((MessageStatus::Redeemed, Some(redeem_tx)));
        }

        let call = getTimeoutCall { ticketId: ticket_id };
        let request = TransactionRequest::default()
            .to(ARB_RETRYABLE_TX)
            .input(TransactionInput::new(call.abi_encode().into()));

        match self.l2.call(&request).await {
            Ok(_) => Ok((MessageStatus::FundsDepositedOnL2, None)),
            // The precompile reverts once the ticket no longer exists.
            Err(HistoryError::Rpc(RpcError::ErrorResp(payload)))
                if is_revert(payload.code, &payload.message) =>
            {
                tracing::debug!(%ticket_id, error = %payload, "Ticket lookup reverted");
                Ok((MessageStatus::Expired, None))
            }
            Err(e) => Err(e),
        }
    }

    async fn successful_redeem(&self, ticket_id: B256, from_block: u64) -> Result<Option<B256>> {
        let filter = Filter::new()
            .address(ARB_RETRYABLE_TX)
            .event_signature(RedeemScheduled::SIGNATURE_HASH)
            .topic1(ticket_id)
            .from_block(from_block);

        for log in self.l2.logs(&filter).await? {
            let Ok(event) = RedeemScheduled::decode_log(&log.inner, true) else {
                continue;
            };
            let retry_tx = event.data.retryTxHash;
            if let Some(receipt) = self.l2.transaction_receipt(retry_tx).await? {
                if receipt.success {
                    return Ok(Some(retry_tx));
                }
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl MessageReader for ArbitrumMessageReader {
    async fn eth_deposit(&self, receipt: &ReceiptSummary) -> Result<Option<MessageState>> {
        let Some(message) = find_message(&receipt.logs, KIND_ETH_DEPOSIT) else {
            return Ok(None);
        };
        let (to, value) = parse_eth_deposit_data(&message.data).ok_or_else(|| {
            HistoryError::Decode(format!("malformed deposit payload in {}", receipt.tx_hash))
        })?;

        let chain_id = self.l2_chain_id().await?;
        let tx_id = eth_deposit_tx_id(chain_id, message.message_number, message.sender, to, value);

        let status = match self.l2.transaction_receipt(tx_id).await? {
            Some(l2_receipt) if l2_receipt.success => MessageStatus::FundsDepositedOnL2,
            _ => MessageStatus::NotYetCreated,
        };

        Ok(Some(MessageState {
            kind: MessageKind::EthDeposit,
            status,
            creation_tx: Some(tx_id),
            l2_tx: (status == MessageStatus::FundsDepositedOnL2).then_some(tx_id),
        }))
    }

    async fn retryable_ticket(&self, receipt: &ReceiptSummary) -> Result<Option<MessageState>> {
        let Some(message) = find_message(&receipt.logs, KIND_SUBMIT_RETRYABLE) else {
            return Ok(None);
        };
        let fields = parse_retryable_data(&message.data).ok_or_else(|| {
            HistoryError::Decode(format!("malformed retryable payload in {}", receipt.tx_hash))
        })?;

        let chain_id = self.l2_chain_id().await?;
        let ticket_id = retryable_creation_id(chain_id, &message, &fields);
        let (status, l2_tx) = self.retryable_status(ticket_id).await?;

        Ok(Some(MessageState {
            kind: MessageKind::RetryableTicket,
            status,
            creation_tx: Some(ticket_id),
            l2_tx,
        }))
    }
}

fn is_revert(code: i64, message: &str) -> bool {
    code == REVERT_CODE || message.contains("execution reverted")
}

fn find_message(logs: &[Log], kind: u8) -> Option<DeliveredMessage> {
    delivered_messages(logs).into_iter().find(|m| m.kind == kind)
}

/// Pairs bridge headers with inbox payloads by message number, in log order.
pub fn delivered_messages(logs: &[Log]) -> Vec<DeliveredMessage> {
    let mut headers = Vec::new();
    let mut payloads = HashMap::new();

    for log in logs {
        if let Ok(event) = MessageDelivered::decode_log(log, true) {
            headers.push(event.data);
        } else if let Ok(event) = InboxMessageDelivered::decode_log(log, true) {
            payloads.insert(event.data.messageNum, event.data.data);
        }
    }

    headers
        .into_iter()
        .filter_map(|header| {
            let data = payloads.remove(&header.messageIndex)?;
            Some(DeliveredMessage {
                message_number: header.messageIndex,
                kind: header.kind,
                sender: header.sender,
                base_fee_l1: header.baseFeeL1,
                data,
            })
        })
        .collect()
}

/// Native deposit payload: packed `(address to, uint256 value)`.
pub fn parse_eth_deposit_data(data: &[u8]) -> Option<(Address, U256)> {
    if data.len() < 52 {
        return None;
    }
    Some((
        Address::from_slice(&data[..20]),
        U256::from_be_slice(&data[20..52]),
    ))
}

/// Retryable payload: nine 32-byte words followed by the call data.
pub fn parse_retryable_data(data: &[u8]) -> Option<RetryableFields> {
    let word = |i: usize| data.get(i * 32..(i + 1) * 32);
    let number = |i: usize| word(i).map(U256::from_be_slice);
    let addr = |i: usize| word(i).map(|w| Address::from_slice(&w[12..]));

    let data_length: usize = number(8)?.try_into().ok()?;
    let call_data = data.get(9 * 32..(9 * 32usize).checked_add(data_length)?)?;

    Some(RetryableFields {
        dest: addr(0)?,
        l2_call_value: number(1)?,
        l1_value: number(2)?,
        max_submission_fee: number(3)?,
        excess_fee_refund_address: addr(4)?,
        call_value_refund_address: addr(5)?,
        gas_limit: number(6)?,
        max_fee_per_gas: number(7)?,
        data: Bytes::copy_from_slice(call_data),
    })
}

pub fn eth_deposit_tx_id(
    chain_id: u64,
    message_number: U256,
    from: Address,
    to: Address,
    value: U256,
) -> B256 {
    let request_id = B256::from(message_number.to_be_bytes::<32>());
    typed_tx_hash(DEPOSIT_TX_TYPE, &[&chain_id, &request_id, &from, &to, &value])
}

pub fn retryable_creation_id(
    chain_id: u64,
    message: &DeliveredMessage,
    fields: &RetryableFields,
) -> B256 {
    let request_id = B256::from(message.message_number.to_be_bytes::<32>());
    // A zero destination is encoded as nil.
    let dest = if fields.dest == Address::ZERO {
        Bytes::new()
    } else {
        Bytes::copy_from_slice(fields.dest.as_slice())
    };

    typed_tx_hash(
        SUBMIT_RETRYABLE_TX_TYPE,
        &[
            &chain_id,
            &request_id,
            &message.sender,
            &message.base_fee_l1,
            &fields.l1_value,
            &fields.max_fee_per_gas,
            &fields.gas_limit,
            &dest,
            &fields.l2_call_value,
            &fields.call_value_refund_address,
            &fields.max_submission_fee,
            &fields.excess_fee_refund_address,
            &fields.data,
        ],
    )
}

/// keccak256 of `tx_type || rlp([fields...])`.
fn typed_tx_hash(tx_type: u8, fields: &[&dyn Encodable]) -> B256 {
    let header = Header {
        list: true,
        payload_length: fields.iter().map(|field| field.length()).sum(),
    };

    let mut out = vec![tx_type];
    header.encode(&mut out);
    for field in fields {
        field.encode(&mut out);
    }
    keccak256(out)
}

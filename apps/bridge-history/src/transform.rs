//! Raw events plus resolution results into [`CanonicalTransaction`] records.

use std::cmp::Reverse;

use alloy::primitives::utils::format_units;
use alloy::primitives::U256;

use crate::model::{
    CanonicalTransaction, ChainIds, DepositStatus, Direction, MessageSubStatus, RawDepositEvent,
    RawWithdrawalEvent, TokenInfo, TransactionStatus, MAX_TOKEN_DECIMALS, MISSING_L2_TX_HASH,
    NATIVE_DECIMALS, NATIVE_SYMBOL, WITHDRAWAL_SORT_BIAS_MS, secs_to_millis,
};
use crate::resolver::DepositResolution;
use crate::status::withdrawal_status;

pub fn transform_deposit(
    event: &RawDepositEvent,
    resolution: &DepositResolution,
    chains: ChainIds,
) -> CanonicalTransaction {
    let (asset, decimals) = asset_and_decimals(event.token.as_ref());

    let (status, created_at_ms, resolved_at_ms, message) = match resolution {
        DepositResolution::Resolved(resolved) => {
            let resolved_at_ms = resolved
                .status
                .is_terminal()
                .then(|| resolved.resolved_at_ms.unwrap_or(resolved.created_at_ms));
            let message = MessageSubStatus::Deposit {
                message_status: resolved.message.as_ref().map(|m| m.status),
                retryable_creation_tx: resolved.message.as_ref().and_then(|m| m.creation_tx),
                l2_tx: resolved.message.as_ref().and_then(|m| m.l2_tx),
            };
            (resolved.status, Some(resolved.created_at_ms), resolved_at_ms, message)
        }
        DepositResolution::Warning { .. } => (
            DepositStatus::Warning,
            event.timestamp.map(secs_to_millis),
            None,
            MessageSubStatus::Deposit {
                message_status: None,
                retryable_creation_tx: None,
                l2_tx: None,
            },
        ),
    };

    CanonicalTransaction {
        direction: Direction::DepositL1,
        status: TransactionStatus::Deposit(status),
        created_at_ms,
        resolved_at_ms,
        tx_id: event.tx_hash.to_string(),
        asset,
        value: format_amount(event.amount, decimals),
        block_num: Some(event.block_number),
        token_address: event.token.as_ref().map(|t| t.address),
        sender: Some(event.sender),
        l1_chain_id: Some(chains.l1),
        l2_chain_id: Some(chains.l2),
        message,
    }
}

pub fn transform_withdrawal(event: &RawWithdrawalEvent, chains: ChainIds) -> CanonicalTransaction {
    let status = withdrawal_status(event.outgoing_state, event.node_block_deadline);
    let block_time_ms = secs_to_millis(event.timestamp);
    let (asset, decimals) = asset_and_decimals(event.token.as_ref());

    CanonicalTransaction {
        direction: Direction::Outbox,
        status: TransactionStatus::Withdrawal(status),
        created_at_ms: Some(block_time_ms.saturating_add(WITHDRAWAL_SORT_BIAS_MS)),
        resolved_at_ms: status.is_terminal().then_some(block_time_ms),
        tx_id: event
            .l2_tx_hash
            .map(|hash| hash.to_string())
            .unwrap_or_else(|| MISSING_L2_TX_HASH.to_string()),
        asset,
        value: format_amount(event.amount, decimals),
        block_num: event.l1_block_number,
        token_address: event.token.as_ref().map(|t| t.address),
        sender: Some(event.sender),
        l1_chain_id: Some(chains.l1),
        l2_chain_id: Some(chains.l2),
        message: MessageSubStatus::Outbox {
            outgoing_state: event.outgoing_state,
            node_block_deadline: event.node_block_deadline,
            unique_id: event.unique_id.clone(),
        },
    }
}

/// Most recent first; records without a timestamp go last. Stable for ties.
pub fn sort_by_recency(records: &mut [CanonicalTransaction]) {
    records.sort_by_key(|record| Reverse(record.created_at_ms));
}

fn asset_and_decimals(token: Option<&TokenInfo>) -> (String, u8) {
    match token {
        None => (NATIVE_SYMBOL.to_string(), NATIVE_DECIMALS),
        Some(token) => {
            let asset = token
                .symbol
                .as_deref()
                .map(str::to_lowercase)
                .unwrap_or_else(|| token.address.to_string().to_lowercase());
            (asset, token.decimals.unwrap_or(NATIVE_DECIMALS))
        }
    }
}

/// Decimal string with trailing fractional zeros removed, keeping one digit
/// after the point (`1.0`, `0.25`). Token decoding rejects scales above
/// [`MAX_TOKEN_DECIMALS`], so `decimals` is always formattable here.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    let formatted = format_units(amount, decimals.min(MAX_TOKEN_DECIMALS)).unwrap_or_default();

    match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{whole}.0")
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => format!("{formatted}.0"),
    }
}

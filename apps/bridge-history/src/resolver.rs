//! Per-deposit enrichment from the chain RPCs.
//!
//! Each deposit runs through an explicit pipeline:
//! receipt -> creation time -> message state -> status -> resolution time.
//! Any RPC failure along the way degrades that one record to
//! [`DepositResolution::Warning`]; it never fails the page.

use std::sync::Arc;

use chrono::Utc;

use crate::chain::{ChainRpc, MessageReader, ReceiptSummary};
use crate::error::{HistoryError, Result};
use crate::model::{secs_to_millis, DepositStatus, L1Status, MessageState, RawDepositEvent};
use crate::status::deposit_status;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDeposit {
    pub l1_status: L1Status,
    pub message: Option<MessageState>,
    pub status: DepositStatus,
    pub created_at_ms: i64,
    /// Block time of the L2 transaction that completed the deposit.
    pub resolved_at_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositResolution {
    Resolved(ResolvedDeposit),
    /// Enrichment failed; only indexer data is known.
    Warning { reason: String },
}

pub struct ReceiptResolver {
    l1: Arc<dyn ChainRpc>,
    l2: Arc<dyn ChainRpc>,
    messages: Arc<dyn MessageReader>,
}

impl ReceiptResolver {
    pub fn new(
        l1: Arc<dyn ChainRpc>,
        l2: Arc<dyn ChainRpc>,
        messages: Arc<dyn MessageReader>,
    ) -> Self {
        Self { l1, l2, messages }
    }

    pub async fn resolve_deposit(&self, event: &RawDepositEvent) -> DepositResolution {
        match self.run_pipeline(event).await {
            Ok(resolved) => DepositResolution::Resolved(resolved),
            Err(e) => {
                tracing::warn!(tx_hash = %event.tx_hash, error = %e, "Deposit resolution failed");
                DepositResolution::Warning {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run_pipeline(&self, event: &RawDepositEvent) -> Result<ResolvedDeposit> {
        let receipt = self.l1.transaction_receipt(event.tx_hash).await?;
        let l1_status = match &receipt {
            None => L1Status::Pending,
            Some(r) if r.success => L1Status::Success,
            Some(_) => L1Status::Failure,
        };

        let created_at_ms = self.created_at(event).await?;

        let message = match (&receipt, l1_status) {
            (Some(receipt), L1Status::Success) => self.message_state(event, receipt).await?,
            _ => None,
        };

        let status = deposit_status(l1_status, message.as_ref(), event.is_native());

        let resolved_at_ms = match &message {
            Some(message) if status.is_terminal() => self.resolved_at(message).await?,
            _ => None,
        };

        tracing::debug!(
            tx_hash = %event.tx_hash,
            %status,
            "Deposit resolved"
        );

        Ok(ResolvedDeposit {
            l1_status,
            message,
            status,
            created_at_ms,
            resolved_at_ms,
        })
    }

    /// Indexer timestamp, else the L1 block time, else now.
    async fn created_at(&self, event: &RawDepositEvent) -> Result<i64> {
        if let Some(ts) = event.timestamp {
            return Ok(secs_to_millis(ts));
        }
        if event.block_number > 0 {
            let ts = self.l1.block_timestamp(event.block_number).await?;
            return Ok(secs_to_millis(ts));
        }
        Ok(Utc::now().timestamp_millis())
    }

    async fn message_state(
        &self,
        event: &RawDepositEvent,
        receipt: &ReceiptSummary,
    ) -> Result<Option<MessageState>> {
        if event.is_native() {
            self.messages.eth_deposit(receipt).await
        } else {
            self.messages.retryable_ticket(receipt).await
        }
    }

    async fn resolved_at(&self, message: &MessageState) -> Result<Option<i64>> {
        let Some(l2_tx) = message.l2_tx else {
            return Ok(None);
        };
        let block = self
            .l2
            .transaction_block_number(l2_tx)
            .await?
            .ok_or(HistoryError::TxNotFound(l2_tx))?;
        let ts = self.l2.block_timestamp(block).await?;
        Ok(Some(secs_to_millis(ts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MessageKind, MessageStatus, TokenInfo};
    use crate::testing::{tx_hash, FakeChain, FakeMessages, SENDER};
    use alloy::primitives::{Address, U256};

    fn event(i: u64, native: bool) -> RawDepositEvent {
        RawDepositEvent {
            sender: SENDER,
            token: (!native).then(|| TokenInfo {
                address: Address::repeat_byte(0xdd),
                symbol: Some("DAI".into()),
                decimals: Some(18),
            }),
            amount: U256::from(1u64),
            tx_hash: tx_hash(i),
            block_number: 10 + i,
            timestamp: Some(1_000 + i),
        }
    }

    fn resolver(l1: FakeChain, l2: FakeChain, messages: FakeMessages) -> ReceiptResolver {
        ReceiptResolver::new(Arc::new(l1), Arc::new(l2), Arc::new(messages))
    }

    fn resolved(resolution: DepositResolution) -> ResolvedDeposit {
        match resolution {
            DepositResolution::Resolved(r) => r,
            DepositResolution::Warning { reason } => panic!("unexpected warning: {reason}"),
        }
    }

    #[tokio::test]
    async fn test_pending_without_receipt() {
        let r = resolver(FakeChain::new(1, 100), FakeChain::new(2, 100), FakeMessages::default());
        let out = resolved(r.resolve_deposit(&event(1, true)).await);

        assert_eq!(out.l1_status, L1Status::Pending);
        assert_eq!(out.status, DepositStatus::L1Pending);
        assert_eq!(out.created_at_ms, 1_001_000);
    }

    #[tokio::test]
    async fn test_failed_l1_skips_message_lookup() {
        let l1 = FakeChain::new(1, 100).with_receipt(tx_hash(1), false, 11);
        // A failing reader proves it is never consulted.
        let messages = FakeMessages::default().failing(tx_hash(1));
        let out = resolved(resolver(l1, FakeChain::new(2, 100), messages).resolve_deposit(&event(1, true)).await);

        assert_eq!(out.status, DepositStatus::L1Failure);
        assert!(out.message.is_none());
        assert!(out.resolved_at_ms.is_none());
    }

    #[tokio::test]
    async fn test_native_deposit_resolved_on_l2() {
        let l2_tx = tx_hash(500);
        let l1 = FakeChain::new(1, 100).with_receipt(tx_hash(1), true, 11);
        let l2 = FakeChain::new(2, 100)
            .with_receipt(l2_tx, true, 77)
            .with_block_time(77, 2_000);
        let messages = FakeMessages::default().with_message(
            tx_hash(1),
            MessageState {
                kind: MessageKind::EthDeposit,
                status: MessageStatus::FundsDepositedOnL2,
                creation_tx: Some(l2_tx),
                l2_tx: Some(l2_tx),
            },
        );

        let out = resolved(resolver(l1, l2, messages).resolve_deposit(&event(1, true)).await);
        assert_eq!(out.status, DepositStatus::L2Success);
        assert_eq!(out.resolved_at_ms, Some(2_000_000));
    }

    #[tokio::test]
    async fn test_token_ticket_waiting_for_redeem() {
        let ticket = tx_hash(600);
        let l1 = FakeChain::new(1, 100).with_receipt(tx_hash(2), true, 12);
        let messages = FakeMessages::default().with_message(
            tx_hash(2),
            MessageState {
                kind: MessageKind::RetryableTicket,
                status: MessageStatus::FundsDepositedOnL2,
                creation_tx: Some(ticket),
                l2_tx: None,
            },
        );

        let out = resolved(resolver(l1, FakeChain::new(2, 100), messages).resolve_deposit(&event(2, false)).await);
        assert_eq!(out.status, DepositStatus::L2Failure);
        assert!(out.resolved_at_ms.is_none());
    }

    #[tokio::test]
    async fn test_created_at_falls_back_to_l1_block() {
        let mut e = event(3, true);
        e.timestamp = None;
        let l1 = FakeChain::new(1, 100)
            .with_receipt(tx_hash(3), true, 13)
            .with_block_time(13, 1_500);

        let out = resolved(resolver(l1, FakeChain::new(2, 100), FakeMessages::default()).resolve_deposit(&e).await);
        assert_eq!(out.created_at_ms, 1_500_000);
        assert_eq!(out.status, DepositStatus::L2Pending);
    }

    #[tokio::test]
    async fn test_rpc_failure_degrades_to_warning() {
        let l1 = FakeChain::new(1, 100).failing(tx_hash(4));
        let out = resolver(l1, FakeChain::new(2, 100), FakeMessages::default())
            .resolve_deposit(&event(4, true))
            .await;
        assert!(matches!(out, DepositResolution::Warning { .. }));

        let l1 = FakeChain::new(1, 100).with_receipt(tx_hash(5), true, 15);
        let messages = FakeMessages::default().failing(tx_hash(5));
        let out = resolver(l1, FakeChain::new(2, 100), messages)
            .resolve_deposit(&event(5, false))
            .await;
        assert!(matches!(out, DepositResolution::Warning { .. }));
    }
}

//! Deposit and withdrawal status state machines.

use crate::model::{
    DepositStatus, L1Status, MessageState, MessageStatus, NodeBlockDeadline,
    OutgoingMessageState, WithdrawalStatus,
};

/// Derives the deposit status. A failed source transaction overrides anything
/// the message reports.
pub fn deposit_status(
    l1_status: L1Status,
    message: Option<&MessageState>,
    asset_is_native: bool,
) -> DepositStatus {
    match l1_status {
        L1Status::Failure => return DepositStatus::L1Failure,
        L1Status::Pending => return DepositStatus::L1Pending,
        L1Status::Success => {}
    }

    let Some(message) = message else {
        return DepositStatus::L2Pending;
    };

    match message.status {
        MessageStatus::NotYetCreated => DepositStatus::L2Pending,
        MessageStatus::CreationFailed => DepositStatus::CreationFailed,
        MessageStatus::Expired if asset_is_native => DepositStatus::L2Success,
        MessageStatus::Expired => DepositStatus::Expired,
        MessageStatus::FundsDepositedOnL2 if asset_is_native => DepositStatus::L2Success,
        // Funds landed but the ticket was not auto-redeemed.
        MessageStatus::FundsDepositedOnL2 => DepositStatus::L2Failure,
        MessageStatus::Redeemed => DepositStatus::L2Success,
    }
}

/// Maps the outbox state to a display status; an execution exception wins.
pub fn withdrawal_status(
    outgoing_state: OutgoingMessageState,
    node_block_deadline: Option<NodeBlockDeadline>,
) -> WithdrawalStatus {
    if node_block_deadline == Some(NodeBlockDeadline::ExecuteCallException) {
        return WithdrawalStatus::Failure;
    }

    match outgoing_state {
        OutgoingMessageState::Unconfirmed => WithdrawalStatus::Unconfirmed,
        OutgoingMessageState::Confirmed => WithdrawalStatus::Confirmed,
        OutgoingMessageState::Executed => WithdrawalStatus::Executed,
    }
}

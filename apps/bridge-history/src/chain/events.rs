use alloy::sol;

sol! {
    /// Emitted by the L1 bridge for every message enqueued to L2.
    event MessageDelivered(
        uint256 indexed messageIndex,
        bytes32 indexed beforeInboxAcc,
        address inbox,
        uint8 kind,
        address sender,
        bytes32 messageDataHash,
        uint256 baseFeeL1,
        uint64 timestamp
    );

    /// Emitted by the L1 inbox with the raw message payload.
    event InboxMessageDelivered(
        uint256 indexed messageNum,
        bytes data
    );

    /// Emitted by the ArbRetryableTx precompile when a redeem is queued.
    event RedeemScheduled(
        bytes32 indexed ticketId,
        bytes32 indexed retryTxHash,
        uint64 indexed sequenceNum,
        uint64 donatedGas,
        address gasDonor,
        uint256 maxRefund,
        uint256 submissionFeeRefund
    );

    function getTimeout(bytes32 ticketId) external view returns (uint256);
}

/// Inbox message kind for a retryable ticket submission.
pub const KIND_SUBMIT_RETRYABLE: u8 = 9;

/// Inbox message kind for a native-asset deposit.
pub const KIND_ETH_DEPOSIT: u8 = 12;

//! Error types for the escrow ledger
//!
//! Every rejected ledger operation maps to exactly one variant. Variants are
//! grouped by [`ErrorKind`] so callers can tell bad input apart from a wrong
//! caller, a settled record or a failing token collaborator.

use crate::models::{Address, Amount, MessageId};
use thiserror::Error;

/// Broad classification of an [`EscrowError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; the caller must correct it before retrying
    Validation,
    /// Wrong caller for the operation
    Authorization,
    /// Record missing, already settled or not yet refundable
    State,
    /// Token transfer failed
    Dependency,
    /// Deployment configuration or snapshot problems
    Configuration,
    /// Custody balance disagrees with the pending records
    Solvency,
    /// Encoding or decoding failures
    Serialization,
}

/// Main error type for escrow operations
#[derive(Error, Debug)]
pub enum EscrowError {
    /// A record already exists under this id
    #[error("duplicate message: {0}")]
    DuplicateMessage(MessageId),

    /// Deposits must carry a positive amount
    #[error("amount must be greater than 0")]
    ZeroAmount,

    /// A party address was the zero address
    #[error("{0} must not be the zero address")]
    ZeroAddress(&'static str),

    /// The custody account cannot be a party to its own escrow
    #[error("{0} must not be the custody account")]
    CustodyParty(&'static str),

    /// Deposits must carry a positive expiry duration
    #[error("expiry duration must be greater than 0")]
    ZeroDuration,

    /// `now + duration` does not fit in a timestamp
    #[error("expiry overflows: now {now} + duration {duration}")]
    ExpiryOverflow { now: u64, duration: u64 },

    /// Only the owner may release funds
    #[error("not authorized: {0} is not the owner")]
    NotAuthorized(Address),

    /// Only the original sender may claim a refund
    #[error("not sender: {caller} did not send message {id}")]
    NotSender { id: MessageId, caller: Address },

    /// No record exists under this id
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// The record already reached a terminal state
    #[error("already settled: message {id} is {state}")]
    AlreadySettled { id: MessageId, state: String },

    /// Refund attempted before the expiry timestamp
    #[error("not yet expired: message {id} expires at {expiry}, now {now}")]
    NotYetExpired { id: MessageId, expiry: u64, now: u64 },

    /// The token collaborator returned `false`
    #[error("token transfer rejected: {0}")]
    TransferRejected(String),

    /// The token collaborator failed outright
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Invalid deployment configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Restored snapshot does not belong to this ledger
    #[error("snapshot mismatch: {0}")]
    SnapshotMismatch(String),

    /// Custody balance disagrees with the sum of pending records
    #[error("solvency violated: custody holds {custody}, pending records total {pending}")]
    Insolvent { custody: Amount, pending: Amount },

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EscrowError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transfer-rejected error
    pub fn transfer_rejected<S: Into<String>>(msg: S) -> Self {
        Self::TransferRejected(msg.into())
    }

    /// Create a snapshot mismatch error
    pub fn snapshot_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::SnapshotMismatch(msg.into())
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateMessage(_)
            | Self::ZeroAmount
            | Self::ZeroAddress(_)
            | Self::CustodyParty(_)
            | Self::ZeroDuration
            | Self::ExpiryOverflow { .. } => ErrorKind::Validation,
            Self::NotAuthorized(_) | Self::NotSender { .. } => ErrorKind::Authorization,
            Self::MessageNotFound(_) | Self::AlreadySettled { .. } | Self::NotYetExpired { .. } => {
                ErrorKind::State
            }
            Self::TransferRejected(_) | Self::Token(_) => ErrorKind::Dependency,
            Self::Config(_) | Self::SnapshotMismatch(_) => ErrorKind::Configuration,
            Self::Insolvent { .. } => ErrorKind::Solvency,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

/// Errors raised by a token collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient balance: {account} holds {balance}, needs {needed}")]
    InsufficientBalance {
        account: Address,
        balance: Amount,
        needed: Amount,
    },

    #[error("insufficient allowance: {owner} allows {spender} {allowance}, needs {needed}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: Amount,
        needed: Amount,
    },

    #[error("balance overflow for {0}")]
    Overflow(Address),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinct_per_group() {
        let id = MessageId::from_bytes([7u8; 32]);
        assert_eq!(EscrowError::ZeroAmount.kind(), ErrorKind::Validation);
        assert_eq!(
            EscrowError::NotAuthorized(Address::from_bytes([1u8; 20])).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(EscrowError::CustodyParty("recipient").kind(), ErrorKind::Validation);
        assert_eq!(EscrowError::MessageNotFound(id).kind(), ErrorKind::State);
        assert_eq!(
            EscrowError::transfer_rejected("frozen").kind(),
            ErrorKind::Dependency
        );
    }

    #[test]
    fn test_display_carries_reason() {
        let err = EscrowError::DuplicateMessage(MessageId::from_bytes([0xab; 32]));
        assert!(err.to_string().starts_with("duplicate message: 0xabab"));
    }
}

//! Paid-message escrow ledger for StampMe
//!
//! A sender escrows tokens against a message id. The platform owner releases
//! them to the recipient (minus a platform fee) once the message is answered;
//! otherwise the sender reclaims the full amount after expiry.
//! - [`ledger::EscrowLedger`] holds the records and enforces the lifecycle
//! - [`token::TokenLedger`] is the fungible-token collaborator
//! - [`clock::Clock`] supplies the time used for expiry

pub mod clock;
pub mod config;
pub mod error;
pub mod fee;
pub mod ledger;
pub mod models;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use crate::config::LedgerConfig;
pub use error::{ErrorKind, EscrowError, TokenError};
pub use fee::{split_fee, FeeSplit};
pub use ledger::{DepositRequest, EscrowLedger, LedgerSnapshot, RefundReceipt, ReleaseReceipt};
pub use models::{Address, Amount, EscrowEvent, EscrowedMessage, LoggedEvent, MessageId, MessageStatus};
pub use token::{InMemoryToken, TokenLedger, TransferLeg};

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;

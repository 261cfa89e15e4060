//! Core data models for the escrow ledger
//!
//! Addresses, message ids, the escrow record with its status lattice, and
//! the events emitted for off-chain indexers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// Token quantity in base units
pub type Amount = u128;

/// Serde adapter writing [`Amount`] as a decimal string.
///
/// JSON numbers past `u64` do not survive buffered (tagged or flattened)
/// deserialization, so amounts always travel as strings.
pub mod amount_str {
    use super::Amount;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

macro_rules! hex_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Byte width
            pub const LEN: usize = $len;

            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// True when every byte is zero
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                let raw = hex::decode(digits).map_err(|e| ParseHexError {
                    kind: stringify!($name),
                    reason: e.to_string(),
                })?;
                let bytes: [u8; $len] = raw.try_into().map_err(|v: Vec<u8>| ParseHexError {
                    kind: stringify!($name),
                    reason: format!("expected {} bytes, got {}", $len, v.len()),
                })?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_bytes!(
    /// 20-byte account address, `0x`-prefixed hex on the wire
    Address,
    20
);

hex_bytes!(
    /// Caller-supplied 32-byte message identifier
    MessageId,
    32
);

impl Address {
    /// The zero address, never a valid party
    pub const ZERO: Address = Address([0u8; 20]);
}

/// Failure to parse an [`Address`] or [`MessageId`] from hex
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {reason}")]
pub struct ParseHexError {
    kind: &'static str,
    reason: String,
}

/// Lifecycle of an escrowed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Funds held, awaiting reply or expiry
    Pending,
    /// Funds released to the recipient
    Responded,
    /// Funds returned to the sender
    Refunded,
}

impl MessageStatus {
    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Responded | Self::Refunded)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Responded => "responded",
            Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// One escrow record per message id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowedMessage {
    pub id: MessageId,
    pub sender: Address,
    pub recipient: Address,
    #[serde(with = "amount_str")]
    pub amount: Amount,
    /// Unix seconds after which the sender may reclaim the funds
    pub expiry: u64,
    pub created_at: u64,
    pub responded: bool,
    pub refunded: bool,
}

impl EscrowedMessage {
    pub fn new(
        id: MessageId,
        sender: Address,
        recipient: Address,
        amount: Amount,
        created_at: u64,
        expiry: u64,
    ) -> Self {
        Self {
            id,
            sender,
            recipient,
            amount,
            expiry,
            created_at,
            responded: false,
            refunded: false,
        }
    }

    pub fn status(&self) -> MessageStatus {
        match (self.responded, self.refunded) {
            (true, _) => MessageStatus::Responded,
            (_, true) => MessageStatus::Refunded,
            _ => MessageStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.responded && !self.refunded
    }

    /// Refund eligibility at `now`
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expiry
    }
}

/// Event emitted for off-chain indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EscrowEvent {
    MessageSent {
        id: MessageId,
        sender: Address,
        recipient: Address,
        #[serde(with = "amount_str")]
        amount: Amount,
        expiry: u64,
    },
    FundsReleased {
        id: MessageId,
    },
    Refunded {
        id: MessageId,
    },
}

impl EscrowEvent {
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::MessageSent { id, .. } | Self::FundsReleased { id } | Self::Refunded { id } => *id,
        }
    }
}

/// Entry in the append-only event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    /// Monotonic sequence number, starting at 1
    pub seq: u64,
    /// Unix seconds at emission
    pub timestamp: u64,
    #[serde(flatten)]
    pub event: EscrowEvent,
}

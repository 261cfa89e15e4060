//! Replay scripts: one JSON step per line, applied to an in-memory ledger
//!
//! ```text
//! # fund the sender and let custody pull from it
//! {"op": "mint", "account": "0x01...01", "amount": 100}
//! {"op": "approve", "owner": "0x01...01", "amount": 100}
//! {"op": "deposit", "id": "hello", "sender": "0x01...01", "recipient": "0x02...02", "amount": 10, "expiry_duration": 3600}
//! {"op": "release", "caller": "owner", "id": "hello"}
//! ```
//!
//! Addresses accept the aliases `owner`, `custody` and `fee_wallet`. Message
//! ids are either 32-byte hex or a label of at most 32 bytes, zero-padded.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use stampme_escrow::{
    Address, DepositRequest, EscrowLedger, InMemoryToken, LedgerConfig, ManualClock, MessageId,
};
use std::sync::Arc;

/// One replay step
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Mint {
        account: String,
        amount: u64,
    },
    /// Allow custody to pull `amount` from `owner`
    Approve {
        owner: String,
        amount: u64,
    },
    Deposit {
        id: String,
        sender: String,
        recipient: String,
        amount: u64,
        expiry_duration: u64,
    },
    Release {
        caller: String,
        id: String,
    },
    Refund {
        caller: String,
        id: String,
    },
    Advance {
        secs: u64,
    },
    Freeze {
        account: String,
    },
    Unfreeze {
        account: String,
    },
}

/// Parse a script, keeping 1-based line numbers for error reports
pub fn parse_script(text: &str) -> Result<Vec<(usize, Step)>> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            serde_json::from_str::<Step>(line)
                .with_context(|| format!("line {}: invalid step", n))
                .map(|step| (n, step))
        })
        .collect()
}

/// Resolve `0x` hex or a short label into a message id
pub fn parse_message_id(raw: &str) -> Result<MessageId> {
    if raw.starts_with("0x") {
        return Ok(raw.parse::<MessageId>()?);
    }
    if raw.is_empty() || raw.len() > MessageId::LEN {
        bail!(
            "message label must be 1..={} bytes, got {}",
            MessageId::LEN,
            raw.len()
        );
    }
    let mut bytes = [0u8; MessageId::LEN];
    bytes[..raw.len()].copy_from_slice(raw.as_bytes());
    Ok(MessageId::from_bytes(bytes))
}

/// Ledger plus the collaborators a script drives
pub struct Replayer {
    pub ledger: EscrowLedger,
    pub token: Arc<InMemoryToken>,
    pub clock: Arc<ManualClock>,
}

impl Replayer {
    pub fn new(config: LedgerConfig, start_time: u64) -> Result<Self> {
        let token = Arc::new(InMemoryToken::new());
        let clock = Arc::new(ManualClock::new(start_time));
        let ledger = EscrowLedger::new(config, token.clone(), clock.clone())?;
        Ok(Self {
            ledger,
            token,
            clock,
        })
    }

    fn address(&self, raw: &str) -> Result<Address> {
        let config = self.ledger.config();
        match raw {
            "owner" => Ok(config.owner),
            "custody" => Ok(config.custody),
            "fee_wallet" => Ok(config.fee_wallet),
            _ => Ok(raw.parse::<Address>()?),
        }
    }

    /// Apply one step and describe what happened
    pub async fn apply(&self, step: &Step) -> Result<String> {
        match step {
            Step::Mint { account, amount } => {
                let account = self.address(account)?;
                self.token.mint(account, u128::from(*amount)).await?;
                Ok(format!("minted {} to {}", amount, account))
            }
            Step::Approve { owner, amount } => {
                let owner = self.address(owner)?;
                let custody = self.ledger.config().custody;
                self.token
                    .approve(owner, custody, u128::from(*amount))
                    .await;
                Ok(format!("{} approved custody for {}", owner, amount))
            }
            Step::Deposit {
                id,
                sender,
                recipient,
                amount,
                expiry_duration,
            } => {
                let msg = self
                    .ledger
                    .deposit(DepositRequest {
                        id: parse_message_id(id)?,
                        sender: self.address(sender)?,
                        recipient: self.address(recipient)?,
                        amount: u128::from(*amount),
                        expiry_duration: *expiry_duration,
                    })
                    .await?;
                Ok(format!("deposited {} for {} (expires {})", msg.amount, id, msg.expiry))
            }
            Step::Release { caller, id } => {
                let receipt = self
                    .ledger
                    .release(self.address(caller)?, parse_message_id(id)?)
                    .await?;
                Ok(format!(
                    "released {}: {} to recipient, {} fee",
                    id, receipt.split.payout, receipt.split.fee
                ))
            }
            Step::Refund { caller, id } => {
                let receipt = self
                    .ledger
                    .claim_refund(self.address(caller)?, parse_message_id(id)?)
                    .await?;
                Ok(format!("refunded {} to {}", receipt.amount, receipt.sender))
            }
            Step::Advance { secs } => {
                let now = self.clock.advance(*secs);
                Ok(format!("clock at {}", now))
            }
            Step::Freeze { account } => {
                let account = self.address(account)?;
                self.token.freeze(account).await;
                Ok(format!("froze {}", account))
            }
            Step::Unfreeze { account } => {
                let account = self.address(account)?;
                self.token.unfreeze(account).await;
                Ok(format!("unfroze {}", account))
            }
        }
    }
}

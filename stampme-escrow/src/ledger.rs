//! Escrow Ledger - custody of paid-message deposits
//!
//! Each message id maps to one [`EscrowedMessage`]. A record starts pending
//! and settles exactly once: released to the recipient (minus the platform
//! fee) by the owner, or refunded to the sender after expiry.
//!
//! Every operation takes the ledger-wide write lock before looking up the
//! record and keeps it through the token call and the flag update. A failed
//! transfer returns before any record or event is written, so an operation
//! either completes or leaves the ledger untouched.

use crate::{
    clock::Clock,
    config::LedgerConfig,
    error::EscrowError,
    fee::{split_fee, FeeSplit},
    models::{
        amount_str, Address, Amount, EscrowEvent, EscrowedMessage, LoggedEvent, MessageId,
        MessageStatus,
    },
    token::{TokenLedger, TokenResult, TransferLeg},
    EscrowResult,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Buffered events per subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Deposit request for a paid message
#[derive(Debug, Clone)]
pub struct DepositRequest {
    pub id: MessageId,
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    /// Seconds from now until the sender may reclaim the funds
    pub expiry_duration: u64,
}

/// Result of a successful release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReceipt {
    pub id: MessageId,
    pub recipient: Address,
    pub fee_wallet: Address,
    pub split: FeeSplit,
}

/// Result of a successful refund
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub id: MessageId,
    pub sender: Address,
    #[serde(with = "amount_str")]
    pub amount: Amount,
}

/// Serializable view of the whole ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub config: LedgerConfig,
    pub messages: Vec<EscrowedMessage>,
    pub events: Vec<LoggedEvent>,
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> EscrowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> EscrowResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    messages: BTreeMap<MessageId, EscrowedMessage>,
    events: Vec<LoggedEvent>,
}

/// Per-message escrow ledger
pub struct EscrowLedger {
    config: LedgerConfig,
    token: Arc<dyn TokenLedger>,
    clock: Arc<dyn Clock>,
    state: RwLock<LedgerState>,
    events_tx: broadcast::Sender<LoggedEvent>,
}

impl EscrowLedger {
    /// Create an empty ledger
    pub fn new(
        config: LedgerConfig,
        token: Arc<dyn TokenLedger>,
        clock: Arc<dyn Clock>,
    ) -> EscrowResult<Self> {
        config.validate()?;
        info!(
            owner = %config.owner,
            custody = %config.custody,
            fee_percentage = config.fee_percentage,
            "Initializing escrow ledger"
        );
        Ok(Self::with_state(config, token, clock, LedgerState::default()))
    }

    /// Rebuild a ledger from a snapshot taken under the same configuration
    pub fn restore(
        snapshot: LedgerSnapshot,
        config: LedgerConfig,
        token: Arc<dyn TokenLedger>,
        clock: Arc<dyn Clock>,
    ) -> EscrowResult<Self> {
        config.validate()?;
        if snapshot.config != config {
            return Err(EscrowError::snapshot_mismatch(
                "snapshot was taken under a different configuration",
            ));
        }

        let mut messages = BTreeMap::new();
        for msg in snapshot.messages {
            if msg.responded && msg.refunded {
                return Err(EscrowError::snapshot_mismatch(format!(
                    "message {} is both responded and refunded",
                    msg.id
                )));
            }
            if msg.sender == config.custody || msg.recipient == config.custody {
                return Err(EscrowError::snapshot_mismatch(format!(
                    "message {} names the custody account as a party",
                    msg.id
                )));
            }
            if msg.amount == 0 {
                return Err(EscrowError::snapshot_mismatch(format!(
                    "message {} has zero amount",
                    msg.id
                )));
            }
            if let Some(dup) = messages.insert(msg.id, msg) {
                return Err(EscrowError::snapshot_mismatch(format!(
                    "message {} appears twice",
                    dup.id
                )));
            }
        }

        let in_order = snapshot
            .events
            .iter()
            .enumerate()
            .all(|(i, e)| e.seq == i as u64 + 1);
        if !in_order {
            return Err(EscrowError::snapshot_mismatch(
                "event sequence numbers are not contiguous",
            ));
        }

        info!(
            messages = messages.len(),
            events = snapshot.events.len(),
            "Restored escrow ledger from snapshot"
        );

        let state = LedgerState {
            messages,
            events: snapshot.events,
        };
        Ok(Self::with_state(config, token, clock, state))
    }

    fn with_state(
        config: LedgerConfig,
        token: Arc<dyn TokenLedger>,
        clock: Arc<dyn Clock>,
        state: LedgerState,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            token,
            clock,
            state: RwLock::new(state),
            events_tx,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Escrow `amount` from the sender for a new message id
    pub async fn deposit(&self, request: DepositRequest) -> EscrowResult<EscrowedMessage> {
        if request.amount == 0 {
            return Err(EscrowError::ZeroAmount);
        }
        if request.sender.is_zero() {
            return Err(EscrowError::ZeroAddress("sender"));
        }
        if request.recipient.is_zero() {
            return Err(EscrowError::ZeroAddress("recipient"));
        }
        if request.sender == self.config.custody {
            return Err(EscrowError::CustodyParty("sender"));
        }
        if request.recipient == self.config.custody {
            return Err(EscrowError::CustodyParty("recipient"));
        }
        if request.expiry_duration == 0 {
            return Err(EscrowError::ZeroDuration);
        }

        let mut state = self.state.write().await;

        if state.messages.contains_key(&request.id) {
            warn!(id = %request.id, "Rejected duplicate deposit");
            return Err(EscrowError::DuplicateMessage(request.id));
        }

        let now = self.clock.now();
        let expiry = now
            .checked_add(request.expiry_duration)
            .ok_or(EscrowError::ExpiryOverflow {
                now,
                duration: request.expiry_duration,
            })?;

        let custody = self.config.custody;
        let pulled = self
            .token
            .transfer_from(custody, request.sender, custody, request.amount)
            .await;
        check_transfer(pulled, "deposit pull")?;

        let message = EscrowedMessage::new(
            request.id,
            request.sender,
            request.recipient,
            request.amount,
            now,
            expiry,
        );
        state.messages.insert(message.id, message.clone());

        self.emit(
            &mut state,
            EscrowEvent::MessageSent {
                id: message.id,
                sender: message.sender,
                recipient: message.recipient,
                amount: message.amount,
                expiry,
            },
        );

        info!(
            id = %message.id,
            sender = %message.sender,
            recipient = %message.recipient,
            amount = message.amount,
            expiry,
            "Escrowed message payment"
        );

        Ok(message)
    }

    /// Pay a pending message out to its recipient, minus the platform fee
    pub async fn release(&self, caller: Address, id: MessageId) -> EscrowResult<ReleaseReceipt> {
        if caller != self.config.owner {
            warn!(%caller, %id, "Rejected release from non-owner");
            return Err(EscrowError::NotAuthorized(caller));
        }

        let mut state = self.state.write().await;

        let message = state
            .messages
            .get(&id)
            .ok_or(EscrowError::MessageNotFound(id))?;
        ensure_pending(message)?;

        let split = split_fee(message.amount, self.config.fee_percentage)?;
        let recipient = message.recipient;
        let legs: Vec<TransferLeg> = [
            TransferLeg::new(self.config.fee_wallet, split.fee),
            TransferLeg::new(recipient, split.payout),
        ]
        .into_iter()
        .filter(|leg| leg.amount > 0)
        .collect();

        let paid = self
            .token
            .transfer_batch(self.config.custody, &legs)
            .await;
        check_transfer(paid, "release payout")?;

        if let Some(message) = state.messages.get_mut(&id) {
            message.responded = true;
        }
        self.emit(&mut state, EscrowEvent::FundsReleased { id });

        info!(
            %id,
            %recipient,
            payout = split.payout,
            fee = split.fee,
            "Released message payment"
        );

        Ok(ReleaseReceipt {
            id,
            recipient,
            fee_wallet: self.config.fee_wallet,
            split,
        })
    }

    /// Return an expired, unanswered message payment to its sender
    pub async fn claim_refund(&self, caller: Address, id: MessageId) -> EscrowResult<RefundReceipt> {
        let mut state = self.state.write().await;

        let message = state
            .messages
            .get(&id)
            .ok_or(EscrowError::MessageNotFound(id))?;
        if message.sender != caller {
            warn!(%caller, %id, "Rejected refund from non-sender");
            return Err(EscrowError::NotSender { id, caller });
        }
        ensure_pending(message)?;

        let now = self.clock.now();
        if !message.is_expired(now) {
            return Err(EscrowError::NotYetExpired {
                id,
                expiry: message.expiry,
                now,
            });
        }

        let (sender, amount) = (message.sender, message.amount);
        let returned = self
            .token
            .transfer(self.config.custody, sender, amount)
            .await;
        check_transfer(returned, "refund")?;

        if let Some(message) = state.messages.get_mut(&id) {
            message.refunded = true;
        }
        self.emit(&mut state, EscrowEvent::Refunded { id });

        info!(%id, %sender, amount, "Refunded message payment");

        Ok(RefundReceipt { id, sender, amount })
    }

    pub async fn get_message(&self, id: MessageId) -> EscrowResult<EscrowedMessage> {
        self.state
            .read()
            .await
            .messages
            .get(&id)
            .cloned()
            .ok_or(EscrowError::MessageNotFound(id))
    }

    pub async fn status(&self, id: MessageId) -> EscrowResult<MessageStatus> {
        Ok(self.get_message(id).await?.status())
    }

    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }

    /// Fee split a release of `amount` would apply
    pub fn fee_split(&self, amount: Amount) -> EscrowResult<FeeSplit> {
        split_fee(amount, self.config.fee_percentage)
    }

    /// Sum of amounts still held for pending messages
    pub async fn pending_total(&self) -> Amount {
        let state = self.state.read().await;
        sum_pending(&state)
    }

    /// Check that custody holds exactly the pending total
    pub async fn verify_solvency(&self) -> EscrowResult<Amount> {
        let state = self.state.read().await;
        let pending = sum_pending(&state);
        let custody = self.token.balance_of(self.config.custody).await;
        if custody != pending {
            warn!(custody, pending, "Solvency check failed");
            return Err(EscrowError::Insolvent { custody, pending });
        }
        Ok(pending)
    }

    /// Full event log in emission order
    pub async fn events(&self) -> Vec<LoggedEvent> {
        self.state.read().await.events.clone()
    }

    /// Events with a sequence number greater than `seq`
    pub async fn events_since(&self, seq: u64) -> Vec<LoggedEvent> {
        self.state
            .read()
            .await
            .events
            .iter()
            .filter(|e| e.seq > seq)
            .cloned()
            .collect()
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LoggedEvent> {
        self.events_tx.subscribe()
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read().await;
        LedgerSnapshot {
            config: self.config.clone(),
            messages: state.messages.values().cloned().collect(),
            events: state.events.clone(),
        }
    }

    fn emit(&self, state: &mut LedgerState, event: EscrowEvent) {
        let logged = LoggedEvent {
            seq: state.events.len() as u64 + 1,
            timestamp: self.clock.now(),
            event,
        };
        debug!(id = %logged.event.message_id(), seq = logged.seq, "Emitted escrow event");
        state.events.push(logged.clone());
        // No subscribers is not an error
        let _ = self.events_tx.send(logged);
    }
}

fn ensure_pending(message: &EscrowedMessage) -> EscrowResult<()> {
    if message.is_pending() {
        Ok(())
    } else {
        Err(EscrowError::AlreadySettled {
            id: message.id,
            state: message.status().to_string(),
        })
    }
}

fn check_transfer(result: TokenResult<bool>, what: &str) -> EscrowResult<()> {
    match result {
        Ok(true) => Ok(()),
        Ok(false) => {
            warn!(what, "Token transfer returned false");
            Err(EscrowError::transfer_rejected(format!("{} returned false", what)))
        }
        Err(e) => {
            warn!(what, error = %e, "Token transfer failed");
            Err(e.into())
        }
    }
}

fn sum_pending(state: &LedgerState) -> Amount {
    state
        .messages
        .values()
        .filter(|m| m.is_pending())
        .fold(0, |acc: Amount, m| acc.saturating_add(m.amount))
}

//! Shared fixtures for ledger integration tests

#![allow(dead_code)]

use stampme_escrow::{
    Address, Amount, DepositRequest, EscrowLedger, InMemoryToken, LedgerConfig, ManualClock,
    MessageId,
};
use std::sync::Arc;

pub const START: u64 = 1_700_000_000;
pub const HOUR: u64 = 3_600;

pub const OWNER: Address = Address::from_bytes([0x0a; 20]);
pub const CUSTODY: Address = Address::from_bytes([0xcc; 20]);
pub const FEE_WALLET: Address = Address::from_bytes([0xfe; 20]);
pub const TOKEN: Address = Address::from_bytes([0xee; 20]);
pub const SENDER: Address = Address::from_bytes([0x01; 20]);
pub const RECIPIENT: Address = Address::from_bytes([0x02; 20]);
pub const STRANGER: Address = Address::from_bytes([0x03; 20]);

pub struct Harness {
    pub ledger: EscrowLedger,
    pub token: Arc<InMemoryToken>,
    pub clock: Arc<ManualClock>,
}

pub fn config(fee_percentage: u8) -> LedgerConfig {
    LedgerConfig {
        token: TOKEN,
        custody: CUSTODY,
        fee_wallet: FEE_WALLET,
        fee_percentage,
        owner: OWNER,
    }
}

/// Ledger with `SENDER` funded and custody approved for `balance`
pub async fn harness(fee_percentage: u8, balance: Amount) -> Harness {
    let token = Arc::new(InMemoryToken::new());
    token.mint(SENDER, balance).await.unwrap();
    token.approve(SENDER, CUSTODY, balance).await;
    let clock = Arc::new(ManualClock::new(START));
    let ledger = EscrowLedger::new(config(fee_percentage), token.clone(), clock.clone()).unwrap();
    Harness {
        ledger,
        token,
        clock,
    }
}

pub fn msg_id(tag: &str) -> MessageId {
    let mut bytes = [0u8; 32];
    for (slot, b) in bytes.iter_mut().zip(tag.bytes()) {
        *slot = b;
    }
    MessageId::from_bytes(bytes)
}

pub fn deposit(tag: &str, amount: Amount, expiry_duration: u64) -> DepositRequest {
    DepositRequest {
        id: msg_id(tag),
        sender: SENDER,
        recipient: RECIPIENT,
        amount,
        expiry_duration,
    }
}

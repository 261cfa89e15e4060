//! Token collaborator used to move escrowed funds
//!
//! The ledger never touches balances itself. It pulls deposits with
//! [`TokenLedger::transfer_from`] and pays out with [`TokenLedger::transfer`]
//! or [`TokenLedger::transfer_batch`]. A `false` return is handled exactly
//! like an error.

use crate::{
    error::TokenError,
    models::{Address, Amount},
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

pub type TokenResult<T> = Result<T, TokenError>;

/// One outbound leg of a payout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLeg {
    pub to: Address,
    pub amount: Amount,
}

impl TransferLeg {
    pub fn new(to: Address, amount: Amount) -> Self {
        Self { to, amount }
    }
}

/// Fungible-token interface consumed by the escrow ledger
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Move `amount` from `owner` to `to` using allowance granted to `spender`
    async fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> TokenResult<bool>;

    /// Move `amount` out of `from`
    async fn transfer(&self, from: Address, to: Address, amount: Amount) -> TokenResult<bool>;

    /// Move every leg out of `from`, or none of them
    async fn transfer_batch(&self, from: Address, legs: &[TransferLeg]) -> TokenResult<bool>;

    async fn balance_of(&self, account: Address) -> Amount;
}

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<Address, Amount>,
    /// (owner, spender) -> remaining allowance
    allowances: HashMap<(Address, Address), Amount>,
    /// Accounts whose transfers return `false`
    frozen: HashSet<Address>,
}

impl TokenState {
    fn balance(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn touches_frozen(&self, from: &Address, legs: &[TransferLeg]) -> bool {
        self.frozen.contains(from) || legs.iter().any(|leg| self.frozen.contains(&leg.to))
    }

    /// Stage every leg against a scratch copy of the touched balances,
    /// then commit only if all legs fit.
    fn apply(&mut self, from: Address, legs: &[TransferLeg]) -> TokenResult<()> {
        let mut staged: HashMap<Address, Amount> = HashMap::new();
        staged.insert(from, self.balance(&from));

        for leg in legs {
            let available = staged[&from];
            let remaining =
                available
                    .checked_sub(leg.amount)
                    .ok_or(TokenError::InsufficientBalance {
                        account: from,
                        balance: available,
                        needed: leg.amount,
                    })?;
            staged.insert(from, remaining);

            let current = match staged.get(&leg.to) {
                Some(v) => *v,
                None => self.balance(&leg.to),
            };
            let credited = current
                .checked_add(leg.amount)
                .ok_or(TokenError::Overflow(leg.to))?;
            staged.insert(leg.to, credited);
        }

        self.balances.extend(staged);
        Ok(())
    }
}

/// In-memory token with balances, allowances and failure injection
#[derive(Debug, Default)]
pub struct InMemoryToken {
    state: RwLock<TokenState>,
}

impl InMemoryToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `account` out of thin air
    pub async fn mint(&self, account: Address, amount: Amount) -> TokenResult<()> {
        let mut state = self.state.write().await;
        let balance = state.balance(&account);
        let credited = balance
            .checked_add(amount)
            .ok_or(TokenError::Overflow(account))?;
        state.balances.insert(account, credited);
        debug!(%account, amount, "minted");
        Ok(())
    }

    /// Let `spender` pull up to `amount` from `owner`
    pub async fn approve(&self, owner: Address, spender: Address, amount: Amount) {
        self.state
            .write()
            .await
            .allowances
            .insert((owner, spender), amount);
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.state
            .read()
            .await
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(0)
    }

    /// Make every transfer touching `account` return `false`
    pub async fn freeze(&self, account: Address) {
        self.state.write().await.frozen.insert(account);
    }

    pub async fn unfreeze(&self, account: Address) {
        self.state.write().await.frozen.remove(&account);
    }

    /// Sum of all balances
    pub async fn total_supply(&self) -> Amount {
        self.state.read().await.balances.values().sum()
    }
}

#[async_trait]
impl TokenLedger for InMemoryToken {
    async fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> TokenResult<bool> {
        let mut state = self.state.write().await;
        let legs = [TransferLeg::new(to, amount)];
        if state.touches_frozen(&owner, &legs) {
            return Ok(false);
        }

        let allowance = state
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(0);
        if allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                needed: amount,
            });
        }

        state.apply(owner, &legs)?;
        state
            .allowances
            .insert((owner, spender), allowance - amount);
        Ok(true)
    }

    async fn transfer(&self, from: Address, to: Address, amount: Amount) -> TokenResult<bool> {
        self.transfer_batch(from, &[TransferLeg::new(to, amount)])
            .await
    }

    async fn transfer_batch(&self, from: Address, legs: &[TransferLeg]) -> TokenResult<bool> {
        let mut state = self.state.write().await;
        if state.touches_frozen(&from, legs) {
            return Ok(false);
        }
        state.apply(from, legs)?;
        Ok(true)
    }

    async fn balance_of(&self, account: Address) -> Amount {
        self.state.read().await.balance(&account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[tokio::test]
    async fn test_transfer_from_consumes_allowance() {
        let token = InMemoryToken::new();
        token.mint(addr(1), 100).await.unwrap();
        token.approve(addr(1), addr(9), 60).await;

        assert!(token.transfer_from(addr(9), addr(1), addr(9), 40).await.unwrap());
        assert_eq!(token.balance_of(addr(1)).await, 60);
        assert_eq!(token.balance_of(addr(9)).await, 40);
        assert_eq!(token.allowance(addr(1), addr(9)).await, 20);

        let err = token
            .transfer_from(addr(9), addr(1), addr(9), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientAllowance { .. }));
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let token = InMemoryToken::new();
        token.mint(addr(1), 10).await.unwrap();

        let legs = [TransferLeg::new(addr(2), 6), TransferLeg::new(addr(3), 6)];
        assert!(token.transfer_batch(addr(1), &legs).await.is_err());
        assert_eq!(token.balance_of(addr(1)).await, 10);
        assert_eq!(token.balance_of(addr(2)).await, 0);
    }

    #[tokio::test]
    async fn test_frozen_account_returns_false() {
        let token = InMemoryToken::new();
        token.mint(addr(1), 10).await.unwrap();
        token.freeze(addr(2)).await;

        assert!(!token.transfer(addr(1), addr(2), 5).await.unwrap());
        assert_eq!(token.balance_of(addr(1)).await, 10);

        token.unfreeze(addr(2)).await;
        assert!(token.transfer(addr(1), addr(2), 5).await.unwrap());
        assert_eq!(token.total_supply().await, 10);
    }
}

//! Platform fee split applied on release

use crate::{
    error::EscrowError,
    models::{amount_str, Amount},
    EscrowResult,
};
use serde::{Deserialize, Serialize};

/// Largest accepted fee percentage
pub const MAX_FEE_PERCENTAGE: u8 = 100;

/// Outcome of splitting an escrowed amount on release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    /// Cut sent to the platform fee wallet
    #[serde(with = "amount_str")]
    pub fee: Amount,
    /// Remainder sent to the recipient
    #[serde(with = "amount_str")]
    pub payout: Amount,
}

/// Split `amount` into `fee = floor(amount * percentage / 100)` and the rest.
///
/// The product is taken in two parts (`amount = 100q + r`) so no `u128`
/// amount can overflow; the rounding remainder stays with the payout.
pub fn split_fee(amount: Amount, percentage: u8) -> EscrowResult<FeeSplit> {
    if percentage > MAX_FEE_PERCENTAGE {
        return Err(EscrowError::config(format!(
            "fee percentage {} exceeds {}",
            percentage, MAX_FEE_PERCENTAGE
        )));
    }

    let pct = Amount::from(percentage);
    let fee = (amount / 100) * pct + (amount % 100) * pct / 100;

    Ok(FeeSplit {
        fee,
        payout: amount - fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_percent_of_ten() {
        let split = split_fee(10, 10).unwrap();
        assert_eq!(split, FeeSplit { fee: 1, payout: 9 });
    }

    #[test]
    fn test_remainder_goes_to_recipient() {
        // 10% of 19 is 1.9, floored to 1
        let split = split_fee(19, 10).unwrap();
        assert_eq!(split.fee, 1);
        assert_eq!(split.payout, 18);
    }

    #[test]
    fn test_edges() {
        assert_eq!(split_fee(1_000, 0).unwrap().fee, 0);
        assert_eq!(split_fee(1_000, 100).unwrap().payout, 0);
        assert_eq!(split_fee(1, 99).unwrap(), FeeSplit { fee: 0, payout: 1 });

        let max = split_fee(Amount::MAX, 100).unwrap();
        assert_eq!(max.fee, Amount::MAX);
    }

    #[test]
    fn test_percentage_out_of_range() {
        assert!(split_fee(10, 101).is_err());
    }
}

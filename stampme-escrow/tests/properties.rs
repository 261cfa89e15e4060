//! Property tests: fee conservation and solvency over random operation
//! sequences.

mod common;

use common::*;
use proptest::prelude::*;
use stampme_escrow::{split_fee, Amount, MessageStatus, TokenLedger};

#[derive(Debug, Clone)]
enum Op {
    Deposit { tag: u8, amount: Amount, duration: u64 },
    Release { tag: u8 },
    Refund { tag: u8 },
    Advance { secs: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6, 1u128..500, 1u64..7_200)
            .prop_map(|(tag, amount, duration)| Op::Deposit { tag, amount, duration }),
        (0u8..6).prop_map(|tag| Op::Release { tag }),
        (0u8..6).prop_map(|tag| Op::Refund { tag }),
        (0u64..3_600).prop_map(|secs| Op::Advance { secs }),
    ]
}

fn tag_name(tag: u8) -> String {
    format!("m{}", tag)
}

proptest! {
    #[test]
    fn fee_plus_payout_is_amount(amount in any::<u128>(), pct in 0u8..=100) {
        let split = split_fee(amount, pct).unwrap();
        prop_assert_eq!(split.fee + split.payout, amount);
        prop_assert!(split.fee <= amount);
    }

    #[test]
    fn fee_matches_wide_floor_division(amount in 0u128..(u64::MAX as u128), pct in 0u8..=100) {
        let split = split_fee(amount, pct).unwrap();
        prop_assert_eq!(split.fee, amount * pct as u128 / 100);
    }

    #[test]
    fn ledger_stays_solvent(fee in 0u8..=100, ops in prop::collection::vec(op_strategy(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let h = harness(fee, 1_000_000).await;
            let supply = h.token.total_supply().await;

            for op in ops {
                match op {
                    Op::Deposit { tag, amount, duration } => {
                        let _ = h.ledger.deposit(deposit(&tag_name(tag), amount, duration)).await;
                    }
                    Op::Release { tag } => {
                        let _ = h.ledger.release(OWNER, msg_id(&tag_name(tag))).await;
                    }
                    Op::Refund { tag } => {
                        let _ = h.ledger.claim_refund(SENDER, msg_id(&tag_name(tag))).await;
                    }
                    Op::Advance { secs } => {
                        h.clock.advance(secs);
                    }
                }

                prop_assert!(h.ledger.verify_solvency().await.is_ok());
                prop_assert_eq!(h.token.total_supply().await, supply);
            }

            let snapshot = h.ledger.snapshot().await;
            for msg in &snapshot.messages {
                prop_assert!(!(msg.responded && msg.refunded));
            }

            let released: Amount = snapshot
                .messages
                .iter()
                .filter(|m| m.status() == MessageStatus::Responded)
                .map(|m| m.amount)
                .sum();
            let paid_out = h.token.balance_of(RECIPIENT).await + h.token.balance_of(FEE_WALLET).await;
            prop_assert_eq!(paid_out, released);
            Ok(())
        })?;
    }
}

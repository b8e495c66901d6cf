//! Property-based tests for DividendService.
//!
//! - allocated amounts never exceed the pool
//! - only qualifying members receive anything

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::service::{DividendService, MIN_QUALIFYING_LOANS};
use super::types::{DividendPeriodSnapshot, DividendPeriodStatus, MemberEligibility};

fn member_strategy() -> impl Strategy<Value = MemberEligibility> {
    ((0i64..10_000_000i64), (0u32..5u32)).prop_map(|(cents, loans)| MemberEligibility {
        member_id: Uuid::new_v4(),
        average_fixed_balance: Decimal::new(cents, 2),
        loan_count: loans,
    })
}

proptest! {
    #[test]
    fn prop_allocation_stays_within_pool(
        pool_cents in 0i64..100_000_000i64,
        members in prop::collection::vec(member_strategy(), 0..30),
    ) {
        let period = DividendPeriodSnapshot {
            year: 2025,
            status: DividendPeriodStatus::Closed,
            total_interest_generated: Decimal::new(pool_cents, 2),
            total_distributed: Decimal::ZERO,
        };
        let shares = DividendService::allocate(&period, &members, MIN_QUALIFYING_LOANS).unwrap();
        prop_assert_eq!(shares.len(), members.len());

        let mut distributed = period;
        for share in &shares {
            prop_assert!(share.amount >= Decimal::ZERO);
            prop_assert!(share.amount.scale() <= 2);
            if !share.qualifies {
                prop_assert_eq!(share.amount, Decimal::ZERO);
            }
            distributed.total_distributed =
                DividendService::credit(&distributed, share.member_id, share.amount, false).unwrap();
        }
        prop_assert!(distributed.total_distributed <= period.total_interest_generated);
    }
}

//! Property-based tests for FundService.
//!
//! - available == inflow - outflow after every operation
//! - available never goes negative

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::period::PeriodKey;
use super::service::FundService;
use super::types::{AidStatus, FundSnapshot, FundStatus, FundTotals, MovementSnapshot};

#[derive(Debug, Clone)]
enum Op {
    Contribute(Decimal),
    Aid(Decimal),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let amount = (1i64..500_000i64).prop_map(|cents| Decimal::new(cents, 2));
    prop_oneof![
        amount.clone().prop_map(Op::Contribute),
        amount.prop_map(Op::Aid),
    ]
}

proptest! {
    #[test]
    fn prop_available_is_inflow_minus_outflow(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut movements = vec![MovementSnapshot {
            kind: FundService::opening_movement().kind,
            amount: Decimal::ZERO,
        }];
        let mut fund = FundSnapshot {
            id: Uuid::new_v4(),
            period: PeriodKey::parse("202401").unwrap(),
            status: FundStatus::Open,
            totals: FundTotals::default(),
        };

        for op in ops {
            let plan = match op {
                Op::Contribute(amount) => FundService::contribute(&fund, amount, Decimal::ZERO, true),
                Op::Aid(amount) => FundService::approve_aid(&fund, AidStatus::Pending, amount),
            };
            if let Ok(plan) = plan {
                prop_assert_eq!(plan.prior_balance, fund.totals.available);
                movements.push(MovementSnapshot { kind: plan.kind, amount: plan.amount });
                fund.totals = FundService::recompute_totals(&movements);
                prop_assert_eq!(plan.new_balance, fund.totals.available);
            }
            prop_assert_eq!(
                fund.totals.available,
                fund.totals.total_inflow - fund.totals.total_outflow
            );
            prop_assert!(fund.totals.available >= Decimal::ZERO);
        }

        let close = FundService::close_period(&fund, 0).unwrap();
        movements.push(MovementSnapshot { kind: close.kind, amount: close.amount });
        prop_assert_eq!(FundService::recompute_totals(&movements), fund.totals);
    }
}

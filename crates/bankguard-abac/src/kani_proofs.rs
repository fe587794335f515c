//! Kani proofs for ABAC decision evaluation
//!
//! These proofs verify correctness properties of the decision engine using
//! bounded model checking.
//!
//! **Proof Count**: 4 proofs (#1-4)
//!
//! Run with: `cargo kani --tests --harness verify_*`

#[cfg(kani)]
use crate::attributes::{OperationContext, PrincipalAttributes, ResourceAttributes};
#[cfg(kani)]
use crate::clock::within_window;
#[cfg(kani)]
use crate::evaluator::{self, Effect};
#[cfg(kani)]
use crate::policy::PolicyTable;
#[cfg(kani)]
use bankguard_types::Money;
#[cfg(kani)]
use chrono::{TimeDelta, TimeZone, Utc};

/// Proof #1: Suspension dominates
///
/// **Property**: A suspended principal is denied regardless of ownership
///
/// **Verification**:
/// - Owner of the account, verified, MFA fresh, but suspended
/// - Decision must be DENY with the suspension reason
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(10)]
fn verify_suspension_dominates() {
    let now = Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap();
    let principal = PrincipalAttributes::client("USR001")
        .verified()
        .with_mfa(now)
        .suspended();
    let resource = ResourceAttributes::new("ACC001", "USR001", "HN001");
    let table = PolicyTable::default();

    let decision = evaluator::evaluate(
        &table,
        &principal,
        &resource,
        "read_basic_info",
        &OperationContext::new(),
        now,
    );

    // Postcondition: Denied before any rule set is consulted
    assert_eq!(decision.effect, Effect::Deny);
    assert!(decision.derived_roles.is_empty());
}

/// Proof #2: MFA window is strict
///
/// **Property**: For any age in seconds, the window holds iff age < 900
///
/// **Verification**:
/// - Symbolic age in `[0, 3600]`
/// - `within_window` agrees with the strict comparison
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(10)]
fn verify_mfa_window_strict() {
    let age: i64 = kani::any();
    kani::assume((0..=3600).contains(&age));
    let now = Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap();
    let t = now - TimeDelta::seconds(age);

    assert_eq!(
        within_window(Some(t), now, TimeDelta::seconds(900)),
        age < 900
    );
}

/// Proof #3: Daily limit arithmetic never wraps
///
/// **Property**: used + amount either fits or reports overflow
///
/// **Verification**:
/// - Symbolic used and amount
/// - `checked_add` is `None` exactly when the sum exceeds `u64::MAX`
#[cfg(kani)]
#[kani::proof]
fn verify_money_checked_add() {
    let used: u64 = kani::any();
    let amount: u64 = kani::any();
    let sum = Money::new(used).checked_add(Money::new(amount));

    assert_eq!(sum.is_none(), used.checked_add(amount).is_none());
}

/// Proof #4: Evaluation determinism
///
/// **Property**: Same inputs always produce the same decision
///
/// **Verification**:
/// - Evaluate a transfer twice with identical inputs and instant
/// - Both decisions must be identical
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(10)]
fn verify_evaluation_determinism() {
    let now = Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap();
    let principal = PrincipalAttributes::client("USR001")
        .verified()
        .with_mfa(now)
        .with_transfer_limits(50_000_000, 0, 0);
    let resource = ResourceAttributes::new("ACC001", "USR001", "HN001");
    let op = OperationContext::new().with_amount(3_000_000);
    let table = PolicyTable::default();

    let action = "transfer_internal_small";
    let first = evaluator::evaluate(&table, &principal, &resource, action, &op, now);
    let second = evaluator::evaluate(&table, &principal, &resource, action, &op, now);

    // Postcondition: Identical decisions
    assert_eq!(first, second);
}

//! Decision engine.
//!
//! Orchestration order for one request:
//! 1. overlay the operation context on the stored account
//! 2. global denials (suspension, closure, regulatory hold)
//! 3. derived role resolution
//! 4. action table lookup, first matching rule set decides
//!
//! `evaluate` reads only its arguments. It never touches shared state, so it
//! is safe to call from any number of threads at once.

use bankguard_types::{AccountId, PrincipalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::{
    EffectiveResource, OperationContext, PrincipalAttributes, ResourceAttributes,
};
use crate::clock::days_since;
use crate::denial::check_global_denial;
use crate::policy::{Action, Condition, PolicyTable, ACTION_NOT_RECOGNIZED, NO_MATCHING_RULE};
use crate::roles::{self, DerivedRoleSet};

// ============================================================================
// Decision
// ============================================================================

/// Whether access is allowed or denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effect {
    Allow,
    Deny,
}

impl Default for Effect {
    /// Defaults to `Deny` (deny unless explicitly allowed).
    fn default() -> Self {
        Self::Deny
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Allow => f.write_str("ALLOW"),
            Effect::Deny => f.write_str("DENY"),
        }
    }
}

/// The outcome of one authorization request. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub effect: Effect,
    /// Audit-grade explanation of a denial; `None` on ALLOW.
    pub reason: Option<String>,
    /// Derived roles computed for this request. Empty on a global denial.
    pub derived_roles: DerivedRoleSet,
    /// The action name as requested, recognized or not.
    pub action: String,
    pub principal_id: PrincipalId,
    pub resource_id: AccountId,
    pub evaluated_at: DateTime<Utc>,
    /// Name of the rule set that decided, if one did.
    pub matched_rule: Option<String>,
}

impl Decision {
    /// Builds a DENY decision that no rule set produced.
    pub fn deny(
        principal_id: PrincipalId,
        resource_id: AccountId,
        action: &str,
        reason: &str,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            effect: Effect::Deny,
            reason: Some(reason.to_string()),
            derived_roles: DerivedRoleSet::new(),
            action: action.to_string(),
            principal_id,
            resource_id,
            evaluated_at,
            matched_rule: None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }
}

// ============================================================================
// Request context
// ============================================================================

/// Everything a condition may read.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub principal: &'a PrincipalAttributes,
    pub resource: EffectiveResource<'a>,
    pub now: DateTime<Utc>,
}

// ============================================================================
// Public API
// ============================================================================

/// Evaluates `action` by `principal` on `resource` at `now`.
///
/// # Postcondition
///
/// Always returns a `Decision`; business-rule outcomes and unknown actions
/// are DENY decisions, never errors or panics.
pub fn evaluate(
    table: &PolicyTable,
    principal: &PrincipalAttributes,
    resource: &ResourceAttributes,
    action: &str,
    operation: &OperationContext,
    now: DateTime<Utc>,
) -> Decision {
    let effective = EffectiveResource::new(resource, operation);
    let deny = |reason: &str| {
        Decision::deny(
            principal.id.clone(),
            resource.id.clone(),
            action,
            reason,
            now,
        )
    };

    if let Some(denial) = check_global_denial(principal, resource) {
        return deny(denial.reason());
    }

    let Some(rule_sets) = action
        .parse::<Action>()
        .ok()
        .and_then(|parsed| table.rule_sets(parsed))
    else {
        return deny(ACTION_NOT_RECOGNIZED);
    };

    let derived_roles = roles::resolve(principal, &effective, now, table.limits());
    let ctx = RequestContext {
        principal,
        resource: effective,
        now,
    };

    let (effect, reason, matched_rule) = match rule_sets
        .iter()
        .find(|rule_set| rule_set.requirement.is_satisfied(principal.role(), &derived_roles))
    {
        Some(rule_set) => {
            let holds = rule_set
                .conditions
                .iter()
                .all(|condition| evaluate_condition(condition, &ctx));
            if holds {
                (Effect::Allow, None, Some(rule_set.name.clone()))
            } else {
                (
                    Effect::Deny,
                    Some(rule_set.denial_reason.clone()),
                    Some(rule_set.name.clone()),
                )
            }
        }
        None => (Effect::Deny, Some(NO_MATCHING_RULE.to_string()), None),
    };

    Decision {
        effect,
        reason,
        derived_roles,
        action: action.to_string(),
        principal_id: principal.id.clone(),
        resource_id: resource.id.clone(),
        evaluated_at: now,
        matched_rule,
    }
}

// ============================================================================
// Condition Evaluation
// ============================================================================

/// Recursively evaluates a single condition against the request context.
pub fn evaluate_condition(condition: &Condition, ctx: &RequestContext<'_>) -> bool {
    let principal = ctx.principal;
    let resource = &ctx.resource;

    match condition {
        // -- Principal conditions --
        Condition::MfaVerified => principal.mfa_verified,
        Condition::TransferPinVerified => principal.transfer_pin_verified,
        Condition::PasswordChangedWithinDays(max_days) => {
            days_since(principal.last_password_change, ctx.now)
                .is_some_and(|days| days <= i64::from(*max_days))
        }
        Condition::DualApprovalRequired => principal
            .admin()
            .is_none_or(|admin| admin.dual_approval_required),

        // -- Operation conditions --
        Condition::AmountAtMost(max) => resource.amount() <= *max,
        Condition::AmountAbove(min) => resource.amount() > *min,
        Condition::WithinDailyTransferLimit => principal
            .daily_transfer_used
            .checked_add(resource.amount())
            .is_some_and(|total| total <= principal.daily_transfer_limit),
        Condition::WithinExternalTransferLimit => {
            resource.amount() <= principal.external_transfer_limit
        }

        // -- Effective resource conditions --
        Condition::FraudScoreBelow(max) => resource.fraud_score() < *max,
        Condition::BeneficiaryVerified => resource.beneficiary_verified(),
        Condition::ApprovedBySupervisor => resource.approved_by_supervisor(),
        Condition::SecondaryApproval => resource.secondary_approval(),
        Condition::FraudCheckPassed => resource.fraud_check_passed(),
        Condition::ZeroBalance => resource.stored().balance.is_zero(),
        Condition::NoPendingTransactions => resource.stored().pending_transactions == 0,
        Condition::ComplianceClearance => resource.compliance_clearance(),

        // -- Logical combinators --
        Condition::All(sub) => sub.iter().all(|c| evaluate_condition(c, ctx)),
        Condition::Any(sub) => sub.iter().any(|c| evaluate_condition(c, ctx)),
        Condition::Not(sub) => !evaluate_condition(sub, ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AdminAttributes, ComplianceAttributes, RoleProfile};
    use crate::policy::{PolicyLimits, RuleSet};
    use crate::roles::DerivedRole;
    use bankguard_types::{AccountStatus, AccountTier, Money, Role};
    use chrono::{TimeDelta, TimeZone};
    use proptest::prelude::*;
    use test_case::test_case;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap()
    }

    fn usr001() -> PrincipalAttributes {
        PrincipalAttributes::client("USR001")
            .verified()
            .with_mfa(now() - TimeDelta::minutes(5))
            .with_transfer_pin()
            .with_password_changed(now() - TimeDelta::days(30))
            .with_transfer_limits(50_000_000, 10_000_000, 20_000_000)
            .with_branch("HN001")
    }

    fn acc001() -> ResourceAttributes {
        ResourceAttributes::new("ACC001", "USR001", "HN001")
            .with_balance(15_000_000)
            .with_fraud_score(0.2)
    }

    fn admin(dual_approval_required: bool) -> PrincipalAttributes {
        PrincipalAttributes::new(
            "ADMIN001",
            RoleProfile::Admin(AdminAttributes {
                dual_approval_required,
                emergency_access: false,
            }),
        )
        .verified()
    }

    fn compliance() -> PrincipalAttributes {
        PrincipalAttributes::new(
            "COMP001",
            RoleProfile::ComplianceOfficer(ComplianceAttributes {
                clearance_level: 3,
                regional_access: true,
            }),
        )
        .verified()
    }

    fn run(
        principal: &PrincipalAttributes,
        resource: &ResourceAttributes,
        action: &str,
        op: &OperationContext,
    ) -> Decision {
        evaluate(&PolicyTable::default(), principal, resource, action, op, now())
    }

    #[test]
    fn test_owner_reads_basic_info() {
        let decision = run(&usr001(), &acc001(), "read_basic_info", &OperationContext::new());
        assert_eq!(decision.effect, Effect::Allow);
        assert!(decision.reason.is_none());
        assert!(decision.derived_roles.contains(DerivedRole::VerifiedOwner));
        assert!(decision.derived_roles.contains(DerivedRole::VerifiedOwnerWithMfa));
        assert_eq!(decision.matched_rule.as_deref(), Some("owner-read-basic-info"));
        assert_eq!(decision.evaluated_at, now());
    }

    #[test]
    fn test_stranger_gets_no_matching_rule() {
        let other = ResourceAttributes::new("ACC002", "USR002", "HCM001");
        let decision = run(&usr001(), &other, "read_basic_info", &OperationContext::new());
        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.reason.as_deref(), Some("no matching policy rule"));
        assert!(decision.matched_rule.is_none());
    }

    #[test]
    fn test_global_denial_skips_role_resolution() {
        let principal = usr001().suspended();
        let decision = run(&principal, &acc001(), "read_basic_info", &OperationContext::new());
        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.reason.as_deref(), Some("Principal is suspended"));
        assert!(decision.derived_roles.is_empty());
    }

    #[test]
    fn test_unknown_action_is_denied_not_an_error() {
        let decision = run(&usr001(), &acc001(), "teleport_funds", &OperationContext::new());
        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.reason.as_deref(), Some("Action not recognized"));
        assert_eq!(decision.action, "teleport_funds");
    }

    #[test]
    fn test_action_missing_from_custom_table() {
        let table = PolicyTable::new(PolicyLimits::default());
        let decision = evaluate(
            &table,
            &usr001(),
            &acc001(),
            "read_basic_info",
            &OperationContext::new(),
            now(),
        );
        assert_eq!(decision.reason.as_deref(), Some("Action not recognized"));
    }

    #[test]
    fn test_delete_account_always_denied() {
        for principal in [usr001(), admin(false), compliance()] {
            let decision = run(&principal, &acc001(), "delete_account", &OperationContext::new());
            assert_eq!(decision.effect, Effect::Deny);
            assert_eq!(decision.reason.as_deref(), Some("no matching policy rule"));
        }
    }

    #[test_case(3_000_000 => Effect::Allow; "well under cap")]
    #[test_case(5_000_000 => Effect::Allow; "exactly at cap")]
    #[test_case(5_000_001 => Effect::Deny; "one over cap")]
    fn test_small_transfer_boundary(amount: u64) -> Effect {
        let op = OperationContext::new().with_amount(amount);
        run(&usr001(), &acc001(), "transfer_internal_small", &op).effect
    }

    #[test]
    fn test_small_transfer_over_cap_reports_condition_failure() {
        // A standard-tier owner loses the small-transfer role, so no rule set
        // matches at all.
        let op = OperationContext::new().with_amount(5_000_001);
        let decision = run(&usr001(), &acc001(), "transfer_internal_small", &op);
        assert_eq!(decision.reason.as_deref(), Some("no matching policy rule"));

        // A VIP owner still qualifies via vip_client_verified and hits the
        // rule set's own amount condition.
        let vip = usr001().with_tier(AccountTier::Vip);
        let decision = run(&vip, &acc001(), "transfer_internal_small", &op);
        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.reason.as_deref(), Some("Transfer conditions not met"));
    }

    #[test]
    fn test_small_transfer_respects_daily_limit() {
        let principal = usr001().with_transfer_limits(50_000_000, 48_000_000, 20_000_000);
        let op = OperationContext::new().with_amount(2_000_000);
        assert_eq!(
            run(&principal, &acc001(), "transfer_internal_small", &op).effect,
            Effect::Allow
        );

        let op = OperationContext::new().with_amount(2_000_001);
        let decision = run(&principal, &acc001(), "transfer_internal_small", &op);
        assert_eq!(decision.reason.as_deref(), Some("Transfer conditions not met"));
    }

    #[test]
    fn test_daily_limit_overflow_fails_closed() {
        let principal = usr001().with_transfer_limits(u64::MAX, u64::MAX, 0);
        let vip = principal.with_tier(AccountTier::Vip);
        let op = OperationContext::new().with_amount(1);
        let decision = run(&vip, &acc001(), "transfer_internal_small", &op);
        assert_eq!(decision.effect, Effect::Deny);
    }

    #[test]
    fn test_large_transfer_window() {
        let op = OperationContext::new().with_amount(50_000_000);
        let account = acc001().with_fraud_score(0.1);
        assert_eq!(run(&usr001(), &account, "transfer_internal_large", &op).effect, Effect::Allow);

        let small = OperationContext::new().with_amount(5_000_000);
        let decision = run(&usr001(), &account, "transfer_internal_large", &small);
        assert_eq!(decision.reason.as_deref(), Some("Large transfer conditions not met"));

        let risky = acc001().with_fraud_score(0.2);
        let decision = run(&usr001(), &risky, "transfer_internal_large", &op);
        assert_eq!(decision.effect, Effect::Deny);
    }

    #[test]
    fn test_external_transfer_needs_verified_beneficiary() {
        let account = acc001().with_fraud_score(0.05);
        let op = OperationContext::new()
            .with_amount(5_000_000)
            .with_beneficiary_verified(false);
        let decision = run(&usr001(), &account, "transfer_external", &op);
        assert_eq!(decision.reason.as_deref(), Some("External transfer conditions not met"));

        let op = op.with_beneficiary_verified(true);
        assert_eq!(run(&usr001(), &account, "transfer_external", &op).effect, Effect::Allow);
    }

    #[test_case(30 => Effect::Allow; "recent password")]
    #[test_case(90 => Effect::Allow; "ninety days")]
    #[test_case(91 => Effect::Deny; "stale password")]
    fn test_history_password_age(days: i64) -> Effect {
        let principal = usr001().with_password_changed(now() - TimeDelta::days(days));
        run(&principal, &acc001(), "read_transaction_history", &OperationContext::new()).effect
    }

    #[test]
    fn test_history_without_password_date_is_denied() {
        let mut principal = usr001();
        principal.last_password_change = None;
        let decision = run(
            &principal,
            &acc001(),
            "read_transaction_history",
            &OperationContext::new(),
        );
        assert_eq!(
            decision.reason.as_deref(),
            Some("Password change required within 90 days")
        );
    }

    #[test]
    fn test_no_fallthrough_after_requirement_matches() {
        // Owner matches the first rule set; failing it must not fall through
        // to the staff rule set.
        let limits = PolicyLimits::default();
        let table = PolicyTable::new(limits).with_action(
            Action::ReadBasicInfo,
            vec![
                RuleSet::for_derived("owner", &[DerivedRole::VerifiedOwner])
                    .with_condition(Condition::ZeroBalance)
                    .with_denial_reason("balance must be zero"),
                RuleSet::for_derived("anyone-owner", &[DerivedRole::VerifiedOwner]),
            ],
        );
        let decision = evaluate(
            &table,
            &usr001(),
            &acc001(),
            "read_basic_info",
            &OperationContext::new(),
            now(),
        );
        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.reason.as_deref(), Some("balance must be zero"));
        assert_eq!(decision.matched_rule.as_deref(), Some("owner"));
    }

    #[test]
    fn test_credit_dual_approval() {
        let account = acc001();
        let approved = OperationContext::new().with_supervisor_approval(true);
        let decision = run(&admin(true), &account, "update_balance_credit", &approved);
        assert_eq!(decision.reason.as_deref(), Some("Supervisor approval required"));

        let both = approved.clone().with_secondary_approval(true);
        assert_eq!(
            run(&admin(true), &account, "update_balance_credit", &both).effect,
            Effect::Allow
        );
        assert_eq!(
            run(&admin(false), &account, "update_balance_credit", &approved).effect,
            Effect::Allow
        );

        let nothing = OperationContext::new();
        assert_eq!(
            run(&admin(false), &account, "update_balance_credit", &nothing).effect,
            Effect::Deny
        );
    }

    #[test]
    fn test_debit_requires_every_approval() {
        let full = OperationContext::new()
            .with_supervisor_approval(true)
            .with_secondary_approval(true)
            .with_fraud_check(true);
        assert_eq!(
            run(&admin(false), &acc001(), "update_balance_debit", &full).effect,
            Effect::Allow
        );

        let partial = OperationContext::new()
            .with_supervisor_approval(true)
            .with_secondary_approval(true);
        let decision = run(&admin(false), &acc001(), "update_balance_debit", &partial);
        assert_eq!(decision.reason.as_deref(), Some("Debit approvals incomplete"));
    }

    #[test]
    fn test_close_account_conditions() {
        let empty = ResourceAttributes::new("ACC009", "USR009", "HN001");
        let cleared = OperationContext::new().with_compliance_clearance(true);
        assert_eq!(run(&compliance(), &empty, "close_account", &cleared).effect, Effect::Allow);

        // The stored review flag never stands in for closure clearance.
        let mut flagged = empty.clone();
        flagged.compliance_clearance = true;
        let decision = run(&compliance(), &flagged, "close_account", &OperationContext::new());
        assert_eq!(decision.reason.as_deref(), Some("Account closure conditions not met"));

        let pending = empty.with_pending_transactions(2);
        assert_eq!(run(&admin(true), &pending, "close_account", &cleared).effect, Effect::Deny);
    }

    #[test]
    fn test_frozen_account_still_reachable_by_staff() {
        let frozen = acc001().with_status(AccountStatus::Frozen);
        let decision = run(&admin(true), &frozen, "read_basic_info", &OperationContext::new());
        assert_eq!(decision.effect, Effect::Allow);
    }

    #[test]
    fn test_operation_context_is_not_written_back() {
        let account = acc001();
        let op = OperationContext::new()
            .with_supervisor_approval(true)
            .with_fraud_score(0.0);
        let _ = run(&admin(true), &account, "update_balance_credit", &op);
        assert_eq!(account, acc001());
    }

    #[test]
    fn test_condition_tree() {
        let principal = admin(true);
        let account = acc001();
        let op = OperationContext::new().with_amount(1_000);
        let ctx = RequestContext {
            principal: &principal,
            resource: EffectiveResource::new(&account, &op),
            now: now(),
        };
        assert!(evaluate_condition(&Condition::DualApprovalRequired, &ctx));
        assert!(!evaluate_condition(
            &Condition::Not(Box::new(Condition::DualApprovalRequired)),
            &ctx
        ));
        assert!(evaluate_condition(
            &Condition::All(vec![
                Condition::AmountAtMost(Money::new(1_000)),
                Condition::Any(vec![Condition::ZeroBalance, Condition::FraudScoreBelow(0.25)]),
            ]),
            &ctx
        ));
        assert!(evaluate_condition(&Condition::All(vec![]), &ctx));
        assert!(!evaluate_condition(&Condition::Any(vec![]), &ctx));
    }

    #[test]
    fn test_decision_serializes_for_audit() {
        let decision = run(&usr001(), &acc001(), "read_basic_info", &OperationContext::new());
        let json = serde_json::to_value(&decision).expect("serialize");
        assert_eq!(json["effect"], "ALLOW");
        assert_eq!(json["principal_id"], "USR001");
        assert_eq!(json["derived_roles"][0], "verified_owner");
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        (0..Action::ALL.len()).prop_map(|i| Action::ALL[i])
    }

    fn arb_role() -> impl Strategy<Value = Role> {
        (0..Role::ALL.len()).prop_map(|i| Role::ALL[i])
    }

    fn principal_with_role(role: Role) -> PrincipalAttributes {
        let mut principal = PrincipalAttributes::new("USR001", RoleProfile::for_role(role))
            .verified()
            .with_mfa(now() - TimeDelta::minutes(1))
            .with_transfer_pin()
            .with_branch("HN001");
        principal.daily_transfer_limit = Money::new(u64::MAX / 2);
        principal
    }

    proptest! {
        /// Property: a suspended principal is denied every action
        #[test]
        fn prop_suspended_always_denied(action in arb_action(), role in arb_role(), amount in 0u64..200_000_000) {
            let principal = principal_with_role(role).suspended();
            let op = OperationContext::new().with_amount(amount).with_compliance_clearance(true);
            let decision = run(&principal, &acc001(), action.as_str(), &op);
            prop_assert_eq!(decision.effect, Effect::Deny);
            prop_assert_eq!(decision.reason.as_deref(), Some("Principal is suspended"));
        }

        /// Property: closed or held accounts are denied to everyone, staff included
        #[test]
        fn prop_closed_or_held_always_denied(action in arb_action(), role in arb_role(), closed in any::<bool>()) {
            let account = if closed {
                acc001().with_status(AccountStatus::Closed)
            } else {
                acc001().with_regulatory_hold()
            };
            let op = OperationContext::new()
                .with_supervisor_approval(true)
                .with_secondary_approval(true)
                .with_compliance_clearance(true);
            let decision = run(&principal_with_role(role), &account, action.as_str(), &op);
            prop_assert_eq!(decision.effect, Effect::Deny);
            prop_assert!(decision.derived_roles.is_empty());
        }

        /// Property: identical inputs and clock yield identical decisions
        #[test]
        fn prop_evaluation_is_pure(action in arb_action(), role in arb_role(), amount in 0u64..200_000_000) {
            let principal = principal_with_role(role);
            let op = OperationContext::new().with_amount(amount);
            let first = run(&principal, &acc001(), action.as_str(), &op);
            let second = run(&principal, &acc001(), action.as_str(), &op);
            prop_assert_eq!(first, second);
        }
    }
}

//! Action policy definitions.
//!
//! Each action maps to an ordered list of rule sets. A rule set pairs a role
//! requirement with a conjunction of conditions. The first rule set whose role
//! requirement is satisfied decides the action: ALLOW if its conditions hold,
//! DENY with its reason otherwise. Later rule sets are never consulted.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use bankguard_types::{Money, ParseEnumError, Role};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};
use crate::roles::{DerivedRole, DerivedRoleSet};

/// Reason reported when no rule set accepts the principal.
pub const NO_MATCHING_RULE: &str = "no matching policy rule";

/// Reason reported for an action name the table does not know.
pub const ACTION_NOT_RECOGNIZED: &str = "Action not recognized";

// ============================================================================
// Action
// ============================================================================

/// An operation a principal can request on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ReadBasicInfo,
    ReadFullDetails,
    ReadTransactionHistory,
    UpdateContactInfo,
    UpdateBalanceCredit,
    UpdateBalanceDebit,
    TransferInternalSmall,
    TransferInternalLarge,
    TransferExternal,
    FreezeAccount,
    CloseAccount,
    GenerateStatement,
    FlagSuspicious,
    DeleteAccount,
}

impl Action {
    pub const ALL: [Action; 14] = [
        Action::ReadBasicInfo,
        Action::ReadFullDetails,
        Action::ReadTransactionHistory,
        Action::UpdateContactInfo,
        Action::UpdateBalanceCredit,
        Action::UpdateBalanceDebit,
        Action::TransferInternalSmall,
        Action::TransferInternalLarge,
        Action::TransferExternal,
        Action::FreezeAccount,
        Action::CloseAccount,
        Action::GenerateStatement,
        Action::FlagSuspicious,
        Action::DeleteAccount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::ReadBasicInfo => "read_basic_info",
            Action::ReadFullDetails => "read_full_details",
            Action::ReadTransactionHistory => "read_transaction_history",
            Action::UpdateContactInfo => "update_contact_info",
            Action::UpdateBalanceCredit => "update_balance_credit",
            Action::UpdateBalanceDebit => "update_balance_debit",
            Action::TransferInternalSmall => "transfer_internal_small",
            Action::TransferInternalLarge => "transfer_internal_large",
            Action::TransferExternal => "transfer_external",
            Action::FreezeAccount => "freeze_account",
            Action::CloseAccount => "close_account",
            Action::GenerateStatement => "generate_statement",
            Action::FlagSuspicious => "flag_suspicious",
            Action::DeleteAccount => "delete_account",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "action",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// PolicyLimits
// ============================================================================

/// Numeric thresholds used by derived roles and rule-set conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyLimits {
    /// How long a completed MFA challenge stays fresh, in seconds.
    pub mfa_window_secs: u32,
    /// Largest amount a small internal transfer may move.
    pub small_transfer_max: Money,
    /// Largest amount a large internal transfer may move.
    pub large_transfer_max: Money,
    /// Fraud score must be strictly below this for small transfers.
    pub small_transfer_fraud_max: f64,
    /// Fraud score must be strictly below this for large transfers.
    pub large_transfer_fraud_max: f64,
    /// Fraud score must be strictly below this for external transfers.
    pub external_transfer_fraud_max: f64,
    /// Oldest password allowed for reading transaction history, in days.
    pub password_max_age_days: u32,
    /// Certification level that lets a teller work without a supervisor.
    pub teller_min_certification_level: u8,
}

impl Default for PolicyLimits {
    fn default() -> Self {
        Self {
            mfa_window_secs: 15 * 60,
            small_transfer_max: Money::new(5_000_000),
            large_transfer_max: Money::new(100_000_000),
            small_transfer_fraud_max: 0.3,
            large_transfer_fraud_max: 0.2,
            external_transfer_fraud_max: 0.1,
            password_max_age_days: 90,
            teller_min_certification_level: 2,
        }
    }
}

impl PolicyLimits {
    pub fn mfa_window(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.mfa_window_secs))
    }

    /// Rejects limits that would make the table incoherent.
    pub fn validate(&self) -> Result<()> {
        if self.mfa_window_secs == 0 {
            return Err(AuthzError::InvalidPolicyLimits(
                "mfa_window_secs must be greater than zero".to_string(),
            ));
        }
        if self.small_transfer_max > self.large_transfer_max {
            return Err(AuthzError::InvalidPolicyLimits(format!(
                "small_transfer_max ({}) exceeds large_transfer_max ({})",
                self.small_transfer_max, self.large_transfer_max
            )));
        }
        for (name, value) in [
            ("small_transfer_fraud_max", self.small_transfer_fraud_max),
            ("large_transfer_fraud_max", self.large_transfer_fraud_max),
            ("external_transfer_fraud_max", self.external_transfer_fraud_max),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AuthzError::InvalidPolicyLimits(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Condition
// ============================================================================

/// A predicate over the principal and the effective resource.
///
/// Leaf conditions read one attribute each; `All`, `Any` and `Not` compose
/// them into a predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    // -- Principal conditions --
    /// Principal has completed MFA (flag only, no window).
    MfaVerified,
    /// Principal has verified the transfer PIN.
    TransferPinVerified,
    /// Last password change is at most this many whole days ago.
    PasswordChangedWithinDays(u32),
    /// Principal is an administrator whose balance changes need a second
    /// approver. Non-admins and absent values count as required.
    DualApprovalRequired,

    // -- Operation conditions --
    /// Operation amount is at most the given value.
    AmountAtMost(Money),
    /// Operation amount is strictly greater than the given value.
    AmountAbove(Money),
    /// Principal's daily usage plus the amount stays within the daily limit.
    WithinDailyTransferLimit,
    /// Amount is at most the principal's external transfer limit.
    WithinExternalTransferLimit,

    // -- Effective resource conditions --
    /// Effective fraud score is strictly below the given value.
    FraudScoreBelow(f64),
    BeneficiaryVerified,
    ApprovedBySupervisor,
    SecondaryApproval,
    FraudCheckPassed,
    /// Stored balance is zero.
    ZeroBalance,
    NoPendingTransactions,
    /// Compliance clearance was granted for this request.
    ComplianceClearance,

    // -- Logical combinators --
    /// All sub-conditions must be true.
    All(Vec<Condition>),
    /// At least one sub-condition must be true.
    Any(Vec<Condition>),
    /// The sub-condition must be false.
    Not(Box<Condition>),
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::MfaVerified => f.write_str("mfa verified"),
            Condition::TransferPinVerified => f.write_str("transfer pin verified"),
            Condition::PasswordChangedWithinDays(days) => {
                write!(f, "password changed within {days} days")
            }
            Condition::DualApprovalRequired => f.write_str("dual approval required"),
            Condition::AmountAtMost(max) => write!(f, "amount <= {max}"),
            Condition::AmountAbove(min) => write!(f, "amount > {min}"),
            Condition::WithinDailyTransferLimit => f.write_str("used + amount <= daily limit"),
            Condition::WithinExternalTransferLimit => f.write_str("amount <= external limit"),
            Condition::FraudScoreBelow(max) => write!(f, "fraud score < {max}"),
            Condition::BeneficiaryVerified => f.write_str("beneficiary verified"),
            Condition::ApprovedBySupervisor => f.write_str("approved by supervisor"),
            Condition::SecondaryApproval => f.write_str("secondary approval"),
            Condition::FraudCheckPassed => f.write_str("fraud check passed"),
            Condition::ZeroBalance => f.write_str("balance == 0"),
            Condition::NoPendingTransactions => f.write_str("no pending transactions"),
            Condition::ComplianceClearance => f.write_str("compliance clearance"),
            Condition::All(sub) => write_joined(f, sub, " && "),
            Condition::Any(sub) => write_joined(f, sub, " || "),
            Condition::Not(sub) => write!(f, "!({sub})"),
        }
    }
}

fn write_joined(f: &mut std::fmt::Formatter<'_>, sub: &[Condition], sep: &str) -> std::fmt::Result {
    f.write_str("(")?;
    for (i, condition) in sub.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{condition}")?;
    }
    f.write_str(")")
}

// ============================================================================
// Rule sets
// ============================================================================

/// Who a rule set applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleRequirement {
    /// The principal's role is one of these.
    AnyRole(Vec<Role>),
    /// At least one of these derived roles holds.
    AnyDerived(Vec<DerivedRole>),
}

impl RoleRequirement {
    pub fn is_satisfied(&self, role: Role, derived: &DerivedRoleSet) -> bool {
        match self {
            RoleRequirement::AnyRole(roles) => roles.contains(&role),
            RoleRequirement::AnyDerived(roles) => derived.contains_any(roles),
        }
    }
}

impl Display for RoleRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleRequirement::AnyRole(roles) => {
                let names: Vec<&str> = roles.iter().copied().map(Role::as_str).collect();
                write!(f, "role in {{{}}}", names.join(", "))
            }
            RoleRequirement::AnyDerived(roles) => {
                let names: Vec<&str> = roles.iter().copied().map(DerivedRole::as_str).collect();
                write!(f, "derived any of {{{}}}", names.join(", "))
            }
        }
    }
}

/// A role requirement plus the conditions that must all hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Human-readable name for audit logging.
    pub name: String,
    pub requirement: RoleRequirement,
    /// Conjunction; empty means unconditional.
    pub conditions: Vec<Condition>,
    /// Reported when the requirement matches but a condition fails.
    pub denial_reason: String,
}

impl RuleSet {
    pub fn new(name: &str, requirement: RoleRequirement) -> Self {
        Self {
            name: name.to_string(),
            requirement,
            conditions: Vec::new(),
            denial_reason: "Rule conditions not met".to_string(),
        }
    }

    /// Shorthand for a rule set gated on the principal's role.
    pub fn for_roles(name: &str, roles: &[Role]) -> Self {
        Self::new(name, RoleRequirement::AnyRole(roles.to_vec()))
    }

    /// Shorthand for a rule set gated on derived roles.
    pub fn for_derived(name: &str, roles: &[DerivedRole]) -> Self {
        Self::new(name, RoleRequirement::AnyDerived(roles.to_vec()))
    }

    /// Adds a condition (builder pattern).
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_denial_reason(mut self, reason: &str) -> Self {
        self.denial_reason = reason.to_string();
        self
    }
}

// ============================================================================
// PolicyTable
// ============================================================================

/// The mapping from action to its ordered rule sets.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    limits: PolicyLimits,
    policies: BTreeMap<Action, Vec<RuleSet>>,
}

impl PolicyTable {
    /// Creates an empty table; every action is unregistered.
    pub fn new(limits: PolicyLimits) -> Self {
        Self {
            limits,
            policies: BTreeMap::new(),
        }
    }

    /// Registers the rule sets for an action, replacing any previous ones.
    pub fn with_action(mut self, action: Action, rule_sets: Vec<RuleSet>) -> Self {
        self.policies.insert(action, rule_sets);
        self
    }

    pub fn limits(&self) -> &PolicyLimits {
        &self.limits
    }

    /// Returns the rule sets for `action`, or `None` if it is unregistered.
    pub fn rule_sets(&self, action: Action) -> Option<&[RuleSet]> {
        self.policies.get(&action).map(Vec::as_slice)
    }

    /// Iterates registered actions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Action, &[RuleSet])> {
        self.policies
            .iter()
            .map(|(action, rule_sets)| (*action, rule_sets.as_slice()))
    }

    /// Returns the bank's standard table, with thresholds taken from `limits`.
    ///
    /// Every [`Action`] is registered. `delete_account` has no rule sets and
    /// is therefore always denied.
    pub fn standard(limits: PolicyLimits) -> Self {
        use Condition as C;
        use DerivedRole as D;

        let admin_or_compliance = [Role::Admin, Role::ComplianceOfficer];

        let read_basic_info = vec![
            RuleSet::for_roles("staff-read-basic-info", &admin_or_compliance),
            RuleSet::for_derived("owner-read-basic-info", &[D::VerifiedOwner]),
            RuleSet::for_derived("teller-read-basic-info", &[D::AuthorizedTeller]),
            RuleSet::for_derived("supervisor-read-basic-info", &[D::BranchSupervisor]),
        ];

        let read_full_details = vec![
            RuleSet::for_derived("owner-read-full-details", &[D::VerifiedOwnerWithMfa]),
            RuleSet::for_roles("staff-read-full-details", &admin_or_compliance),
            RuleSet::for_derived(
                "approved-teller-read-full-details",
                &[D::AuthorizedTellerWithApproval],
            ),
        ];

        let read_transaction_history = vec![
            RuleSet::for_derived("owner-read-history", &[D::VerifiedOwnerWithMfa])
                .with_condition(C::PasswordChangedWithinDays(limits.password_max_age_days))
                .with_denial_reason(&format!(
                    "Password change required within {} days",
                    limits.password_max_age_days
                )),
            RuleSet::for_roles("staff-read-history", &admin_or_compliance),
        ];

        let update_contact_info = vec![
            RuleSet::for_derived("owner-update-contact", &[D::VerifiedOwnerWithMfa]),
            RuleSet::for_derived("teller-update-contact", &[D::AuthorizedTeller]),
        ];

        let update_balance_credit = vec![
            RuleSet::for_roles("admin-credit", &[Role::Admin])
                .with_condition(C::ApprovedBySupervisor)
                .with_condition(C::Any(vec![
                    C::Not(Box::new(C::DualApprovalRequired)),
                    C::SecondaryApproval,
                ]))
                .with_denial_reason("Supervisor approval required"),
        ];

        let update_balance_debit = vec![
            RuleSet::for_roles("admin-debit", &[Role::Admin])
                .with_condition(C::ApprovedBySupervisor)
                .with_condition(C::SecondaryApproval)
                .with_condition(C::FraudCheckPassed)
                .with_denial_reason("Debit approvals incomplete"),
        ];

        let transfer_internal_small = vec![
            RuleSet::for_derived(
                "owner-small-transfer",
                &[D::VerifiedOwnerSmallTransfer, D::VipClientVerified],
            )
            .with_condition(C::AmountAtMost(limits.small_transfer_max))
            .with_condition(C::WithinDailyTransferLimit)
            .with_condition(C::FraudScoreBelow(limits.small_transfer_fraud_max))
            .with_denial_reason("Transfer conditions not met"),
        ];

        let transfer_internal_large = vec![
            RuleSet::for_derived("owner-large-transfer", &[D::VerifiedOwnerWithMfa])
                .with_condition(C::AmountAbove(limits.small_transfer_max))
                .with_condition(C::AmountAtMost(limits.large_transfer_max))
                .with_condition(C::TransferPinVerified)
                .with_condition(C::FraudScoreBelow(limits.large_transfer_fraud_max))
                .with_denial_reason("Large transfer conditions not met"),
        ];

        let transfer_external = vec![
            RuleSet::for_derived("owner-external-transfer", &[D::VerifiedOwnerWithMfa])
                .with_condition(C::MfaVerified)
                .with_condition(C::TransferPinVerified)
                .with_condition(C::BeneficiaryVerified)
                .with_condition(C::WithinExternalTransferLimit)
                .with_condition(C::FraudScoreBelow(limits.external_transfer_fraud_max))
                .with_denial_reason("External transfer conditions not met"),
        ];

        let freeze_account = vec![RuleSet::for_roles(
            "staff-freeze",
            &[Role::Admin, Role::Supervisor],
        )];

        let close_account = vec![
            RuleSet::for_roles("staff-close", &admin_or_compliance)
                .with_condition(C::ZeroBalance)
                .with_condition(C::NoPendingTransactions)
                .with_condition(C::ComplianceClearance)
                .with_denial_reason("Account closure conditions not met"),
        ];

        let generate_statement = vec![
            RuleSet::for_derived("owner-statement", &[D::VerifiedOwner]),
            RuleSet::for_roles("staff-statement", &admin_or_compliance),
            RuleSet::for_derived("supervisor-statement", &[D::BranchSupervisor]),
        ];

        let flag_suspicious = vec![RuleSet::for_roles(
            "analyst-flag",
            &[Role::FraudAnalyst],
        )];

        Self::new(limits)
            .with_action(Action::ReadBasicInfo, read_basic_info)
            .with_action(Action::ReadFullDetails, read_full_details)
            .with_action(Action::ReadTransactionHistory, read_transaction_history)
            .with_action(Action::UpdateContactInfo, update_contact_info)
            .with_action(Action::UpdateBalanceCredit, update_balance_credit)
            .with_action(Action::UpdateBalanceDebit, update_balance_debit)
            .with_action(Action::TransferInternalSmall, transfer_internal_small)
            .with_action(Action::TransferInternalLarge, transfer_internal_large)
            .with_action(Action::TransferExternal, transfer_external)
            .with_action(Action::FreezeAccount, freeze_account)
            .with_action(Action::CloseAccount, close_account)
            .with_action(Action::GenerateStatement, generate_statement)
            .with_action(Action::FlagSuspicious, flag_suspicious)
            .with_action(Action::DeleteAccount, Vec::new())
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::standard(PolicyLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
        assert!("transfer_everything".parse::<Action>().is_err());
        assert!("READ_BASIC_INFO".parse::<Action>().is_err());
    }

    #[test]
    fn default_limits() {
        let limits = PolicyLimits::default();
        assert_eq!(limits.mfa_window(), TimeDelta::minutes(15));
        assert_eq!(limits.small_transfer_max, Money::new(5_000_000));
        assert_eq!(limits.large_transfer_max, Money::new(100_000_000));
        assert_eq!(limits.password_max_age_days, 90);
        assert_eq!(limits.teller_min_certification_level, 2);
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn invalid_limits_are_rejected() {
        let zero_window = PolicyLimits {
            mfa_window_secs: 0,
            ..PolicyLimits::default()
        };
        assert!(zero_window.validate().is_err());

        let inverted_caps = PolicyLimits {
            small_transfer_max: Money::new(200_000_000),
            ..PolicyLimits::default()
        };
        assert!(inverted_caps.validate().is_err());

        let bad_threshold = PolicyLimits {
            external_transfer_fraud_max: 1.5,
            ..PolicyLimits::default()
        };
        let err = bad_threshold.validate().unwrap_err();
        assert!(err.to_string().contains("external_transfer_fraud_max"));
    }

    #[test]
    fn limits_deserialize_with_defaults() {
        let limits: PolicyLimits =
            serde_json::from_str(r#"{ "small_transfer_max": 2000000 }"#).expect("parse limits");
        assert_eq!(limits.small_transfer_max, Money::new(2_000_000));
        assert_eq!(limits.mfa_window_secs, 900);
    }

    #[test]
    fn standard_table_registers_every_action() {
        let table = PolicyTable::default();
        for action in Action::ALL {
            assert!(table.rule_sets(action).is_some(), "{action} missing");
        }
        assert_eq!(table.rule_sets(Action::DeleteAccount), Some(&[][..]));
    }

    #[test]
    fn standard_table_uses_configured_limits() {
        let limits = PolicyLimits {
            password_max_age_days: 30,
            ..PolicyLimits::default()
        };
        let table = PolicyTable::standard(limits);
        let rule_sets = table
            .rule_sets(Action::ReadTransactionHistory)
            .expect("registered");
        assert_eq!(
            rule_sets[0].conditions,
            vec![Condition::PasswordChangedWithinDays(30)]
        );
        assert_eq!(
            rule_sets[0].denial_reason,
            "Password change required within 30 days"
        );
    }

    #[test]
    fn original_rule_sets_precede_additions() {
        let table = PolicyTable::default();
        let names: Vec<&str> = table
            .rule_sets(Action::ReadBasicInfo)
            .expect("registered")
            .iter()
            .map(|rs| rs.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "staff-read-basic-info",
                "owner-read-basic-info",
                "teller-read-basic-info",
                "supervisor-read-basic-info",
            ]
        );
    }

    #[test]
    fn requirement_matching() {
        let derived: DerivedRoleSet = [DerivedRole::VerifiedOwner].into_iter().collect();
        let by_role = RoleRequirement::AnyRole(vec![Role::Admin, Role::ComplianceOfficer]);
        assert!(by_role.is_satisfied(Role::Admin, &derived));
        assert!(!by_role.is_satisfied(Role::Client, &derived));

        let by_derived = RoleRequirement::AnyDerived(vec![
            DerivedRole::VerifiedOwnerSmallTransfer,
            DerivedRole::VerifiedOwner,
        ]);
        assert!(by_derived.is_satisfied(Role::Client, &derived));
        assert!(!by_derived.is_satisfied(Role::Client, &DerivedRoleSet::new()));
    }

    #[test]
    fn condition_display() {
        let credit = Condition::Any(vec![
            Condition::Not(Box::new(Condition::DualApprovalRequired)),
            Condition::SecondaryApproval,
        ]);
        assert_eq!(
            credit.to_string(),
            "(!(dual approval required) || secondary approval)"
        );
        assert_eq!(
            Condition::AmountAtMost(Money::new(5_000_000)).to_string(),
            "amount <= 5,000,000 VND"
        );
    }
}

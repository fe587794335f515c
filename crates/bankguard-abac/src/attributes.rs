//! Attribute types for ABAC evaluation.
//!
//! Three attribute categories drive access decisions:
//! - **Principal attributes**: identity, verification state, limits, and a
//!   role profile carrying the role-specific fields
//! - **Resource attributes**: the stored account snapshot
//! - **Operation context**: ephemeral, request-scoped values (amount,
//!   approval flags) overlaid on the account for a single decision
//!
//! Every field has a documented default so "absent" and "false" are never
//! conflated. Defaults are applied by the constructors and by serde when a
//! snapshot omits a field.

use bankguard_types::{
    AccountId, AccountStatus, AccountTier, KycStatus, Money, PrincipalId, Role,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Role Profiles
// ============================================================================

/// Role-specific attributes of a teller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TellerAttributes {
    /// Certification is current. Default `false`.
    pub certification_valid: bool,
    /// Certification level (0 = none). Default `0`.
    pub certification_level: u8,
    /// Years of service. Default `0`.
    pub experience_years: u8,
    /// A supervisor is physically present at the branch. Default `false`.
    pub supervisor_present: bool,
}

/// Role-specific attributes of a branch supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorAttributes {
    /// Holds approval authority for the branch. Default `false`.
    pub approval_authority: bool,
}

/// Role-specific attributes of an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminAttributes {
    /// Balance changes need a secondary approval. Default `true`.
    pub dual_approval_required: bool,
    /// Break-glass access is enabled. Default `false`.
    pub emergency_access: bool,
}

impl Default for AdminAttributes {
    fn default() -> Self {
        Self {
            dual_approval_required: true,
            emergency_access: false,
        }
    }
}

/// Role-specific attributes of a compliance officer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceAttributes {
    /// Compliance clearance level. Default `0`.
    pub clearance_level: u8,
    /// Access spans the whole region, not only the home branch. Default `false`.
    pub regional_access: bool,
}

/// Role-specific attributes of a fraud analyst.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudAnalystAttributes {
    /// May open fraud investigations. Default `false`.
    pub investigation_authority: bool,
}

/// The role of a principal together with the fields only that role carries.
///
/// The principal's [`Role`] is derived from the variant, so a teller can never
/// be missing its certification fields and a client can never carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleProfile {
    Client,
    Teller(TellerAttributes),
    Supervisor(SupervisorAttributes),
    Admin(AdminAttributes),
    ComplianceOfficer(ComplianceAttributes),
    FraudAnalyst(FraudAnalystAttributes),
}

impl RoleProfile {
    /// Returns the role this profile belongs to.
    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Client => Role::Client,
            RoleProfile::Teller(_) => Role::Teller,
            RoleProfile::Supervisor(_) => Role::Supervisor,
            RoleProfile::Admin(_) => Role::Admin,
            RoleProfile::ComplianceOfficer(_) => Role::ComplianceOfficer,
            RoleProfile::FraudAnalyst(_) => Role::FraudAnalyst,
        }
    }

    /// Returns the default profile for a role.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Client => RoleProfile::Client,
            Role::Teller => RoleProfile::Teller(TellerAttributes::default()),
            Role::Supervisor => RoleProfile::Supervisor(SupervisorAttributes::default()),
            Role::Admin => RoleProfile::Admin(AdminAttributes::default()),
            Role::ComplianceOfficer => {
                RoleProfile::ComplianceOfficer(ComplianceAttributes::default())
            }
            Role::FraudAnalyst => RoleProfile::FraudAnalyst(FraudAnalystAttributes::default()),
        }
    }
}

// ============================================================================
// Principal Attributes
// ============================================================================

/// Attributes describing the principal making the request.
///
/// Snapshots are produced by an [`AttributeProvider`](crate::AttributeProvider)
/// before evaluation and are never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalAttributes {
    pub id: PrincipalId,
    /// Role and role-specific fields.
    pub profile: RoleProfile,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub kyc_status: KycStatus,
    #[serde(default)]
    pub mfa_verified: bool,
    /// When MFA was last completed. Absent means no MFA window is open.
    #[serde(default, deserialize_with = "lenient_instant::deserialize")]
    pub mfa_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transfer_pin_verified: bool,
    /// Absent means the password age is unknown, which fails every age check.
    #[serde(default, deserialize_with = "lenient_instant::deserialize")]
    pub last_password_change: Option<DateTime<Utc>>,
    #[serde(default)]
    pub account_tier: AccountTier,
    #[serde(default)]
    pub daily_transfer_limit: Money,
    #[serde(default)]
    pub daily_transfer_used: Money,
    #[serde(default)]
    pub external_transfer_limit: Money,
    #[serde(default)]
    pub branch_code: Option<String>,
}

impl PrincipalAttributes {
    /// Creates a principal with the given profile and every other field at
    /// its documented default.
    pub fn new(id: impl Into<PrincipalId>, profile: RoleProfile) -> Self {
        Self {
            id: id.into(),
            profile,
            suspended: false,
            kyc_status: KycStatus::Pending,
            mfa_verified: false,
            mfa_timestamp: None,
            transfer_pin_verified: false,
            last_password_change: None,
            account_tier: AccountTier::Standard,
            daily_transfer_limit: Money::ZERO,
            daily_transfer_used: Money::ZERO,
            external_transfer_limit: Money::ZERO,
            branch_code: None,
        }
    }

    /// Creates a client principal with defaults.
    pub fn client(id: impl Into<PrincipalId>) -> Self {
        Self::new(id, RoleProfile::Client)
    }

    /// Returns the principal's role.
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    /// Returns the teller fields if the principal is a teller.
    pub fn teller(&self) -> Option<&TellerAttributes> {
        match &self.profile {
            RoleProfile::Teller(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Returns the supervisor fields if the principal is a supervisor.
    pub fn supervisor(&self) -> Option<&SupervisorAttributes> {
        match &self.profile {
            RoleProfile::Supervisor(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Returns the admin fields if the principal is an administrator.
    pub fn admin(&self) -> Option<&AdminAttributes> {
        match &self.profile {
            RoleProfile::Admin(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Marks the principal as KYC-verified.
    pub fn verified(mut self) -> Self {
        self.kyc_status = KycStatus::Verified;
        self
    }

    /// Marks the principal as suspended.
    pub fn suspended(mut self) -> Self {
        self.suspended = true;
        self
    }

    /// Records a completed MFA challenge at `at`.
    pub fn with_mfa(mut self, at: DateTime<Utc>) -> Self {
        self.mfa_verified = true;
        self.mfa_timestamp = Some(at);
        self
    }

    /// Marks the transfer PIN as verified.
    pub fn with_transfer_pin(mut self) -> Self {
        self.transfer_pin_verified = true;
        self
    }

    /// Sets the last password change.
    pub fn with_password_changed(mut self, at: DateTime<Utc>) -> Self {
        self.last_password_change = Some(at);
        self
    }

    /// Sets the account tier.
    pub fn with_tier(mut self, tier: AccountTier) -> Self {
        self.account_tier = tier;
        self
    }

    /// Sets the daily limit, amount used today, and external transfer limit.
    pub fn with_transfer_limits(mut self, daily_limit: u64, used: u64, external: u64) -> Self {
        self.daily_transfer_limit = Money::new(daily_limit);
        self.daily_transfer_used = Money::new(used);
        self.external_transfer_limit = Money::new(external);
        self
    }

    /// Sets the home branch.
    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch_code = Some(branch.to_string());
        self
    }
}

// ============================================================================
// Resource Attributes
// ============================================================================

/// Attributes of the account being accessed, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    pub id: AccountId,
    pub owner_id: PrincipalId,
    #[serde(default)]
    pub status: AccountStatus,
    pub branch_code: String,
    #[serde(default)]
    pub regulatory_hold: bool,
    #[serde(default)]
    pub flagged_for_review: bool,
    /// Risk score in `[0, 1]`; lower is better. Default `0.0`.
    #[serde(default)]
    pub fraud_score: f64,
    #[serde(default)]
    pub balance: Money,
    #[serde(default)]
    pub daily_transfer_limit: Money,
    #[serde(default)]
    pub daily_transfer_used: Money,
    #[serde(default)]
    pub external_transfer_limit: Money,
    #[serde(default)]
    pub beneficiary_verified: bool,
    #[serde(default)]
    pub approved_by_supervisor: bool,
    #[serde(default)]
    pub secondary_approval: bool,
    #[serde(default)]
    pub fraud_check_passed: bool,
    #[serde(default)]
    pub compliance_clearance: bool,
    #[serde(default)]
    pub pending_transactions: u32,
}

impl ResourceAttributes {
    /// Creates an active account with every flag cleared and zero balances.
    pub fn new(id: impl Into<AccountId>, owner: impl Into<PrincipalId>, branch: &str) -> Self {
        Self {
            id: id.into(),
            owner_id: owner.into(),
            status: AccountStatus::Active,
            branch_code: branch.to_string(),
            regulatory_hold: false,
            flagged_for_review: false,
            fraud_score: 0.0,
            balance: Money::ZERO,
            daily_transfer_limit: Money::ZERO,
            daily_transfer_used: Money::ZERO,
            external_transfer_limit: Money::ZERO,
            beneficiary_verified: false,
            approved_by_supervisor: false,
            secondary_approval: false,
            fraud_check_passed: false,
            compliance_clearance: false,
            pending_transactions: 0,
        }
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_balance(mut self, balance: u64) -> Self {
        self.balance = Money::new(balance);
        self
    }

    pub fn with_fraud_score(mut self, score: f64) -> Self {
        self.fraud_score = score;
        self
    }

    pub fn with_regulatory_hold(mut self) -> Self {
        self.regulatory_hold = true;
        self
    }

    pub fn with_pending_transactions(mut self, count: u32) -> Self {
        self.pending_transactions = count;
        self
    }
}

// ============================================================================
// Operation Context
// ============================================================================

/// Ephemeral, request-scoped attributes supplied by the caller.
///
/// Overlaid on the stored account for exactly one decision (see
/// [`EffectiveResource`]); never written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationContext {
    pub amount: Option<Money>,
    pub to_account: Option<AccountId>,
    pub to_bank: Option<String>,
    /// In-flight risk assessment; overrides the stored score when present.
    pub fraud_score: Option<f64>,
    pub beneficiary_verified: Option<bool>,
    pub approved_by_supervisor: Option<bool>,
    pub secondary_approval: Option<bool>,
    pub fraud_check_passed: Option<bool>,
    /// Clearance granted for this closure request. Only read from here.
    pub compliance_clearance: Option<bool>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = Some(Money::new(amount));
        self
    }

    pub fn with_destination(mut self, to_account: &str) -> Self {
        self.to_account = Some(AccountId::from(to_account));
        self
    }

    pub fn with_bank(mut self, to_bank: &str) -> Self {
        self.to_bank = Some(to_bank.to_string());
        self
    }

    pub fn with_fraud_score(mut self, score: f64) -> Self {
        self.fraud_score = Some(score);
        self
    }

    pub fn with_beneficiary_verified(mut self, verified: bool) -> Self {
        self.beneficiary_verified = Some(verified);
        self
    }

    pub fn with_supervisor_approval(mut self, approved: bool) -> Self {
        self.approved_by_supervisor = Some(approved);
        self
    }

    pub fn with_secondary_approval(mut self, approved: bool) -> Self {
        self.secondary_approval = Some(approved);
        self
    }

    pub fn with_fraud_check(mut self, passed: bool) -> Self {
        self.fraud_check_passed = Some(passed);
        self
    }

    pub fn with_compliance_clearance(mut self, granted: bool) -> Self {
        self.compliance_clearance = Some(granted);
        self
    }
}

// ============================================================================
// Effective Resource
// ============================================================================

/// A stored account overlaid with the request's operation context.
///
/// Borrowed view: building one copies nothing and changes nothing.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveResource<'a> {
    stored: &'a ResourceAttributes,
    operation: &'a OperationContext,
}

impl<'a> EffectiveResource<'a> {
    pub fn new(stored: &'a ResourceAttributes, operation: &'a OperationContext) -> Self {
        Self { stored, operation }
    }

    /// The account as stored, without overrides.
    pub fn stored(&self) -> &'a ResourceAttributes {
        self.stored
    }

    /// Amount of the in-flight operation; `0` when absent.
    pub fn amount(&self) -> Money {
        self.operation.amount.unwrap_or(Money::ZERO)
    }

    pub fn fraud_score(&self) -> f64 {
        self.operation.fraud_score.unwrap_or(self.stored.fraud_score)
    }

    pub fn beneficiary_verified(&self) -> bool {
        self.operation
            .beneficiary_verified
            .unwrap_or(self.stored.beneficiary_verified)
    }

    pub fn approved_by_supervisor(&self) -> bool {
        self.operation
            .approved_by_supervisor
            .unwrap_or(self.stored.approved_by_supervisor)
    }

    pub fn secondary_approval(&self) -> bool {
        self.operation
            .secondary_approval
            .unwrap_or(self.stored.secondary_approval)
    }

    pub fn fraud_check_passed(&self) -> bool {
        self.operation
            .fraud_check_passed
            .unwrap_or(self.stored.fraud_check_passed)
    }

    /// Closure clearance granted for this request; `false` when absent.
    pub fn compliance_clearance(&self) -> bool {
        self.operation.compliance_clearance == Some(true)
    }
}

// ============================================================================
// Lenient timestamp decoding
// ============================================================================

/// Decodes optional RFC 3339 timestamps, mapping any malformed value to `None`.
///
/// An unreadable timestamp must not abort loading a snapshot, and it must not
/// open a time window either: absent fails every time-window predicate.
mod lenient_instant {
    use chrono::{DateTime, Utc};
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};
    use tracing::warn;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawInstant {
        Text(String),
        Other(IgnoredAny),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<RawInstant> = Option::deserialize(deserializer)?;
        Ok(match raw {
            None => None,
            Some(RawInstant::Text(value)) => match DateTime::parse_from_rfc3339(&value) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(err) => {
                    warn!(
                        value = %value,
                        error = %err,
                        "Unparsable timestamp attribute treated as absent"
                    );
                    None
                }
            },
            Some(RawInstant::Other(_)) => {
                warn!("Non-string timestamp attribute treated as absent");
                None
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_principal_defaults() {
        let principal = PrincipalAttributes::client("USR900");
        assert_eq!(principal.role(), Role::Client);
        assert!(!principal.suspended);
        assert_eq!(principal.kyc_status, KycStatus::Pending);
        assert!(!principal.mfa_verified);
        assert!(principal.mfa_timestamp.is_none());
        assert_eq!(principal.account_tier, AccountTier::Standard);
        assert_eq!(principal.daily_transfer_limit, Money::ZERO);
        assert!(principal.branch_code.is_none());
    }

    #[test]
    fn test_admin_defaults_to_dual_approval() {
        let profile = RoleProfile::for_role(Role::Admin);
        let RoleProfile::Admin(admin) = profile else {
            panic!("expected admin profile");
        };
        assert!(admin.dual_approval_required);
        assert!(!admin.emergency_access);
    }

    #[test]
    fn test_profile_role_matches_variant() {
        for role in Role::ALL {
            assert_eq!(RoleProfile::for_role(role).role(), role);
        }
    }

    #[test]
    fn test_role_accessors() {
        let teller = PrincipalAttributes::new(
            "TELL900",
            RoleProfile::Teller(TellerAttributes {
                certification_valid: true,
                certification_level: 2,
                ..TellerAttributes::default()
            }),
        );
        assert!(teller.teller().is_some());
        assert!(teller.admin().is_none());
        assert!(teller.supervisor().is_none());
    }

    #[test]
    fn test_principal_deserializes_with_defaults() {
        let json = r#"{
            "id": "TELL001",
            "profile": { "role": "teller", "certification_valid": true },
            "branch_code": "HN001"
        }"#;
        let principal: PrincipalAttributes = serde_json::from_str(json).expect("parse principal");
        assert_eq!(principal.role(), Role::Teller);
        let teller = principal.teller().expect("teller profile");
        assert!(teller.certification_valid);
        assert_eq!(teller.certification_level, 0);
        assert!(!principal.suspended);
        assert_eq!(principal.branch_code.as_deref(), Some("HN001"));
    }

    #[test]
    fn test_admin_deserializes_with_fail_closed_default() {
        let json = r#"{ "id": "ADMIN009", "profile": { "role": "admin" } }"#;
        let principal: PrincipalAttributes = serde_json::from_str(json).expect("parse admin");
        assert!(principal.admin().expect("admin").dual_approval_required);
    }

    #[test]
    fn test_unparsable_timestamp_becomes_absent() {
        let json = r#"{
            "id": "USR900",
            "profile": { "role": "client" },
            "mfa_verified": true,
            "mfa_timestamp": "five minutes ago",
            "last_password_change": "2025-01-08T10:00:00Z"
        }"#;
        let principal: PrincipalAttributes = serde_json::from_str(json).expect("parse principal");
        assert!(principal.mfa_verified);
        assert!(principal.mfa_timestamp.is_none());
        assert_eq!(
            principal.last_password_change,
            Some(Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_non_string_timestamps_become_absent() {
        for raw in ["1736330400", "true", "null", "{ \"at\": 1 }", "[2025, 1, 8]"] {
            let json = format!(
                r#"{{
                    "id": "USR900",
                    "profile": {{ "role": "client" }},
                    "mfa_verified": true,
                    "mfa_timestamp": {raw}
                }}"#
            );
            let principal: PrincipalAttributes =
                serde_json::from_str(&json).expect("malformed timestamp must not fail the load");
            assert!(principal.mfa_verified);
            assert!(principal.mfa_timestamp.is_none(), "{raw} should decode as absent");
        }
    }

    #[test]
    fn test_resource_defaults() {
        let account = ResourceAttributes::new("ACC900", "USR900", "HN001");
        assert_eq!(account.status, AccountStatus::Active);
        assert!(!account.regulatory_hold);
        assert!(!account.approved_by_supervisor);
        assert_eq!(account.balance, Money::ZERO);
        assert_eq!(account.pending_transactions, 0);
    }

    #[test]
    fn test_effective_resource_overrides() {
        let mut account =
            ResourceAttributes::new("ACC900", "USR900", "HN001").with_fraud_score(0.4);
        account.approved_by_supervisor = true;
        account.compliance_clearance = true;

        let empty = OperationContext::new();
        let effective = EffectiveResource::new(&account, &empty);
        assert_eq!(effective.amount(), Money::ZERO);
        assert!((effective.fraud_score() - 0.4).abs() < f64::EPSILON);
        assert!(effective.approved_by_supervisor());
        // Closure clearance is never inherited from the stored account.
        assert!(!effective.compliance_clearance());

        let op = OperationContext::new()
            .with_amount(3_000_000)
            .with_fraud_score(0.05)
            .with_supervisor_approval(false)
            .with_compliance_clearance(true);
        let effective = EffectiveResource::new(&account, &op);
        assert_eq!(effective.amount(), Money::new(3_000_000));
        assert!((effective.fraud_score() - 0.05).abs() < f64::EPSILON);
        assert!(!effective.approved_by_supervisor());
        assert!(effective.compliance_clearance());

        // The stored account is untouched.
        assert!(account.approved_by_supervisor);
        assert!((account.fraud_score - 0.4).abs() < f64::EPSILON);
    }
}

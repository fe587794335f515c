//! Built-in demo data.
//!
//! Four accounts and ten principals covering every role, a suspended client,
//! a client with a stale password, and a junior teller at another branch.
//! Timestamps are relative to the `now` passed in, so MFA windows are fresh
//! for whichever clock the caller uses.

use bankguard_abac::attributes::{
    AdminAttributes, ComplianceAttributes, FraudAnalystAttributes, SupervisorAttributes,
    TellerAttributes,
};
use bankguard_abac::{PrincipalAttributes, ResourceAttributes, RoleProfile};
use bankguard_types::{AccountStatus, AccountTier, Money};
use chrono::{DateTime, TimeDelta, Utc};

use crate::Seed;

/// Returns the full demo seed.
pub fn seed(now: DateTime<Utc>) -> Seed {
    Seed {
        principals: principals(now),
        accounts: accounts(),
    }
}

/// Demo accounts `ACC001`-`ACC004`.
pub fn accounts() -> Vec<ResourceAttributes> {
    let mut acc001 = ResourceAttributes::new("ACC001", "USR001", "HN001")
        .with_balance(25_000_000)
        .with_fraud_score(0.1);
    acc001.compliance_clearance = true;
    acc001.fraud_check_passed = true;
    set_limits(&mut acc001, 50_000_000, 5_000_000, 20_000_000);

    let mut acc002 = ResourceAttributes::new("ACC002", "USR002", "HN001")
        .with_balance(150_000_000)
        .with_fraud_score(0.05);
    acc002.compliance_clearance = true;
    acc002.fraud_check_passed = true;
    set_limits(&mut acc002, 200_000_000, 0, 100_000_000);

    // Frozen, held and flagged: exercises every global denial path.
    let mut acc003 = ResourceAttributes::new("ACC003", "USR003", "HCM001")
        .with_balance(500_000)
        .with_status(AccountStatus::Frozen)
        .with_regulatory_hold()
        .with_fraud_score(0.8)
        .with_pending_transactions(1);
    acc003.flagged_for_review = true;
    set_limits(&mut acc003, 10_000_000, 0, 5_000_000);

    // Zero balance and nothing pending: ready for closure.
    let mut acc004 = ResourceAttributes::new("ACC004", "USR004", "HN002").with_fraud_score(0.02);
    acc004.compliance_clearance = true;
    acc004.fraud_check_passed = true;
    set_limits(&mut acc004, 500_000_000, 0, 200_000_000);

    vec![acc001, acc002, acc003, acc004]
}

fn set_limits(account: &mut ResourceAttributes, daily: u64, used: u64, external: u64) {
    account.daily_transfer_limit = Money::new(daily);
    account.daily_transfer_used = Money::new(used);
    account.external_transfer_limit = Money::new(external);
}

/// Demo principals, one or more per role.
pub fn principals(now: DateTime<Utc>) -> Vec<PrincipalAttributes> {
    let days_ago = |days: i64| now - TimeDelta::days(days);
    let minutes_ago = |minutes: i64| now - TimeDelta::minutes(minutes);

    let usr001 = PrincipalAttributes::client("USR001")
        .verified()
        .with_mfa(minutes_ago(5))
        .with_transfer_pin()
        .with_password_changed(days_ago(30))
        .with_transfer_limits(50_000_000, 5_000_000, 20_000_000)
        .with_branch("HN001");

    let usr002 = PrincipalAttributes::client("USR002")
        .verified()
        .with_mfa(minutes_ago(10))
        .with_transfer_pin()
        .with_password_changed(days_ago(45))
        .with_transfer_limits(200_000_000, 0, 100_000_000)
        .with_tier(AccountTier::Vip)
        .with_branch("HN001");

    let usr003 = PrincipalAttributes::client("USR003")
        .verified()
        .suspended()
        .with_password_changed(days_ago(60))
        .with_transfer_limits(10_000_000, 0, 5_000_000)
        .with_branch("HCM001");

    let usr004 = PrincipalAttributes::client("USR004")
        .verified()
        .with_mfa(minutes_ago(2))
        .with_transfer_pin()
        .with_password_changed(days_ago(120))
        .with_transfer_limits(500_000_000, 0, 200_000_000)
        .with_tier(AccountTier::Premium)
        .with_branch("HN002");

    let tell001 = PrincipalAttributes::new(
        "TELL001",
        RoleProfile::Teller(TellerAttributes {
            certification_valid: true,
            certification_level: 2,
            experience_years: 4,
            supervisor_present: true,
        }),
    )
    .verified()
    .with_branch("HN001");

    let tell002 = PrincipalAttributes::new(
        "TELL002",
        RoleProfile::Teller(TellerAttributes {
            certification_valid: true,
            certification_level: 1,
            experience_years: 1,
            supervisor_present: false,
        }),
    )
    .verified()
    .with_branch("HCM001");

    let sup001 = PrincipalAttributes::new(
        "SUP001",
        RoleProfile::Supervisor(SupervisorAttributes {
            approval_authority: true,
        }),
    )
    .verified()
    .with_branch("HN001");

    let admin001 = PrincipalAttributes::new(
        "ADMIN001",
        RoleProfile::Admin(AdminAttributes {
            dual_approval_required: false,
            emergency_access: true,
        }),
    )
    .verified();

    let comp001 = PrincipalAttributes::new(
        "COMP001",
        RoleProfile::ComplianceOfficer(ComplianceAttributes {
            clearance_level: 3,
            regional_access: true,
        }),
    )
    .verified()
    .with_branch("HN001");

    let fraud001 = PrincipalAttributes::new(
        "FRAUD001",
        RoleProfile::FraudAnalyst(FraudAnalystAttributes {
            investigation_authority: true,
        }),
    )
    .verified();

    vec![
        usr001, usr002, usr003, usr004, tell001, tell002, sup001, admin001, comp001, fraud001,
    ]
}

//! Derived role resolution.
//!
//! A derived role is a named boolean computed from the principal, the
//! effective resource and the current instant. Roles are independent: several
//! can hold at once, and none is ever cached between decisions.

use std::collections::BTreeSet;
use std::fmt::Display;

use bankguard_types::{KycStatus, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::{EffectiveResource, PrincipalAttributes};
use crate::clock::within_window;
use crate::policy::PolicyLimits;

// ============================================================================
// DerivedRole
// ============================================================================

/// A role computed at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedRole {
    /// Owner of the account, not suspended, KYC-verified.
    VerifiedOwner,
    /// Verified owner with an MFA challenge inside the window.
    VerifiedOwnerWithMfa,
    /// Verified owner moving a small amount from a low-risk account.
    VerifiedOwnerSmallTransfer,
    /// Owner on the VIP or premium tier with MFA completed.
    VipClientVerified,
    /// Certified teller at the account's branch.
    AuthorizedTeller,
    /// Authorized teller acting on a supervisor-approved request.
    AuthorizedTellerWithApproval,
    /// Supervisor with approval authority at the account's branch.
    BranchSupervisor,
}

impl DerivedRole {
    pub const ALL: [DerivedRole; 7] = [
        DerivedRole::VerifiedOwner,
        DerivedRole::VerifiedOwnerWithMfa,
        DerivedRole::VerifiedOwnerSmallTransfer,
        DerivedRole::VipClientVerified,
        DerivedRole::AuthorizedTeller,
        DerivedRole::AuthorizedTellerWithApproval,
        DerivedRole::BranchSupervisor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DerivedRole::VerifiedOwner => "verified_owner",
            DerivedRole::VerifiedOwnerWithMfa => "verified_owner_with_mfa",
            DerivedRole::VerifiedOwnerSmallTransfer => "verified_owner_small_transfer",
            DerivedRole::VipClientVerified => "vip_client_verified",
            DerivedRole::AuthorizedTeller => "authorized_teller",
            DerivedRole::AuthorizedTellerWithApproval => "authorized_teller_with_approval",
            DerivedRole::BranchSupervisor => "branch_supervisor",
        }
    }
}

impl Display for DerivedRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DerivedRoleSet
// ============================================================================

/// The derived roles that hold for one decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivedRoleSet(BTreeSet<DerivedRole>);

impl DerivedRoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, role: DerivedRole) -> bool {
        self.0.contains(&role)
    }

    /// Returns whether any of `roles` is in the set.
    pub fn contains_any(&self, roles: &[DerivedRole]) -> bool {
        roles.iter().any(|role| self.0.contains(role))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = DerivedRole> + '_ {
        self.0.iter().copied()
    }

    fn insert_if(&mut self, role: DerivedRole, holds: bool) {
        if holds {
            self.0.insert(role);
        }
    }
}

impl FromIterator<DerivedRole> for DerivedRoleSet {
    fn from_iter<I: IntoIterator<Item = DerivedRole>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a DerivedRoleSet {
    type Item = DerivedRole;
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, DerivedRole>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

impl Display for DerivedRoleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.iter().map(DerivedRole::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Computes every derived role that holds for `principal` acting on `resource`
/// at `now`.
///
/// Total: absent attributes take their documented defaults and simply make the
/// affected predicates false.
pub fn resolve(
    principal: &PrincipalAttributes,
    resource: &EffectiveResource<'_>,
    now: DateTime<Utc>,
    limits: &PolicyLimits,
) -> DerivedRoleSet {
    let stored = resource.stored();
    let mut roles = DerivedRoleSet::new();

    let is_owner = stored.owner_id == principal.id;
    let is_verified = !principal.suspended && principal.kyc_status == KycStatus::Verified;
    let same_branch = principal
        .branch_code
        .as_deref()
        .is_some_and(|branch| !branch.is_empty() && branch == stored.branch_code);

    let verified_owner = is_owner && is_verified;
    roles.insert_if(DerivedRole::VerifiedOwner, verified_owner);

    let mfa_fresh = principal.mfa_verified
        && within_window(principal.mfa_timestamp, now, limits.mfa_window());
    roles.insert_if(DerivedRole::VerifiedOwnerWithMfa, verified_owner && mfa_fresh);

    roles.insert_if(
        DerivedRole::VerifiedOwnerSmallTransfer,
        verified_owner
            && resource.amount() <= limits.small_transfer_max
            && resource.fraud_score() < limits.small_transfer_fraud_max,
    );

    roles.insert_if(
        DerivedRole::VipClientVerified,
        verified_owner && principal.account_tier.is_vip() && principal.mfa_verified,
    );

    let authorized_teller = principal.teller().is_some_and(|teller| {
        teller.certification_valid
            && same_branch
            && (teller.supervisor_present
                || teller.certification_level >= limits.teller_min_certification_level)
    });
    roles.insert_if(DerivedRole::AuthorizedTeller, authorized_teller);
    roles.insert_if(
        DerivedRole::AuthorizedTellerWithApproval,
        authorized_teller && resource.approved_by_supervisor(),
    );

    roles.insert_if(
        DerivedRole::BranchSupervisor,
        principal.role() == Role::Supervisor
            && principal
                .supervisor()
                .is_some_and(|supervisor| supervisor.approval_authority)
            && same_branch,
    );

    roles
}

//! Absolute, action-independent denials.
//!
//! Checked before any role is resolved. The first matching predicate, in the
//! fixed order below, supplies the reported reason.

use bankguard_types::AccountStatus;
use serde::{Deserialize, Serialize};

use crate::attributes::{PrincipalAttributes, ResourceAttributes};

/// Why a request was denied before reaching the action table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalDenial {
    PrincipalSuspended,
    AccountClosed,
    RegulatoryHold,
}

impl GlobalDenial {
    pub fn reason(self) -> &'static str {
        match self {
            GlobalDenial::PrincipalSuspended => "Principal is suspended",
            GlobalDenial::AccountClosed => "Account is closed",
            GlobalDenial::RegulatoryHold => "Account under regulatory hold",
        }
    }
}

/// Returns the first global denial that applies, in priority order:
/// suspended principal, closed account, regulatory hold.
pub fn check_global_denial(
    principal: &PrincipalAttributes,
    resource: &ResourceAttributes,
) -> Option<GlobalDenial> {
    if principal.suspended {
        Some(GlobalDenial::PrincipalSuspended)
    } else if resource.status == AccountStatus::Closed {
        Some(GlobalDenial::AccountClosed)
    } else if resource.regulatory_hold {
        Some(GlobalDenial::RegulatoryHold)
    } else {
        None
    }
}

//! Error types for authorization.
//!
//! Business-rule outcomes are never errors: they are DENY decisions. Only
//! conditions under which no decision can be computed surface here.

use bankguard_types::{AccountId, PrincipalId};
use thiserror::Error;

/// Error type for authorization requests.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The principal does not exist in the attribute store.
    #[error("Principal not found: {0}")]
    PrincipalNotFound(PrincipalId),

    /// The account does not exist in the attribute store.
    #[error("Account not found: {0}")]
    ResourceNotFound(AccountId),

    /// The attribute store could not be read.
    #[error("Attribute provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Policy limits are inconsistent.
    #[error("Invalid policy limits: {0}")]
    InvalidPolicyLimits(String),
}

impl AuthzError {
    /// Returns whether the error reports a missing principal or account.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AuthzError::PrincipalNotFound(_) | AuthzError::ResourceNotFound(_)
        )
    }
}

/// Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

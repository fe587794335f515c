//! Error types for the attribute store.

use std::path::PathBuf;

use bankguard_abac::AuthzError;
use bankguard_types::{AccountId, Money, PrincipalId};
use thiserror::Error;

/// Error type for store reads and mutations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Principal not found: {0}")]
    PrincipalNotFound(PrincipalId),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Debit larger than the balance.
    #[error("Insufficient balance in {account}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        balance: Money,
        requested: Money,
    },

    /// A checked addition exceeded `u64::MAX`.
    #[error("Amount overflow updating {0}")]
    AmountOverflow(String),

    /// Zero amounts are rejected before any policy check.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),

    #[error("Fraud score must be within [0, 1], got {0}")]
    InvalidFraudScore(f64),

    #[error("Account already closed: {0}")]
    AlreadyClosed(AccountId),

    /// The store lock was poisoned by a panicking writer.
    #[error("Attribute store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read seed file {path}: {source}")]
    SeedIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse seed file {path}: {source}")]
    SeedParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<StoreError> for AuthzError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PrincipalNotFound(id) => AuthzError::PrincipalNotFound(id),
            StoreError::AccountNotFound(id) => AuthzError::ResourceNotFound(id),
            other => AuthzError::ProviderUnavailable(other.to_string()),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

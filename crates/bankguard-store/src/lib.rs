//! bankguard-store: In-memory attribute store for `bankguard`
//!
//! Holds principal and account attributes, hands out owned snapshots to the
//! decision engine through [`AttributeProvider`], and applies the mutations
//! that follow an allowed decision.
//!
//! # Lifecycle
//!
//! - **Seed**: [`InMemoryStore::new`], [`InMemoryStore::with_fixtures`] or
//!   [`InMemoryStore::from_json_file`]
//! - **Reset**: [`InMemoryStore::reset`] restores the seed (tests, demos)
//! - **Snapshot**: [`InMemoryStore::snapshot`] copies the current state
//!
//! # Example
//!
//! ```
//! use bankguard_abac::AttributeProvider;
//! use bankguard_store::InMemoryStore;
//! use bankguard_types::{AccountId, Money};
//! use chrono::Utc;
//!
//! let store = InMemoryStore::with_fixtures(Utc::now());
//! store.credit(&AccountId::from("ACC001"), Money::new(1_000)).unwrap();
//!
//! let account = store.resource(&AccountId::from("ACC001")).unwrap();
//! assert_eq!(account.balance, Money::new(25_001_000));
//!
//! store.reset().unwrap();
//! let account = store.resource(&AccountId::from("ACC001")).unwrap();
//! assert_eq!(account.balance, Money::new(25_000_000));
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use bankguard_abac::{AttributeProvider, AuthzError, PrincipalAttributes, ResourceAttributes};
use bankguard_types::{AccountId, AccountStatus, Money, PrincipalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub mod error;
pub mod fixtures;
pub mod operations;


pub use error::{Result, StoreError};
pub use operations::{Operations, OperationError, Receipt, TransferKind};

// ============================================================================
// Seed
// ============================================================================

/// The serialized form of a store: what it is created from and reset to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub principals: Vec<PrincipalAttributes>,
    #[serde(default)]
    pub accounts: Vec<ResourceAttributes>,
}

impl Seed {
    /// Reads a JSON seed file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| StoreError::SeedIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| StoreError::SeedParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// Suspicion flags
// ============================================================================

/// Severity attached to a suspicious-activity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

/// A fraud analyst's note that an account needs review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspicionFlag {
    pub reason: String,
    pub risk_level: RiskLevel,
    pub flagged_by: PrincipalId,
    pub flagged_at: DateTime<Utc>,
}

// ============================================================================
// StoreState
// ============================================================================

/// Principals and accounts, keyed by ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    principals: BTreeMap<PrincipalId, PrincipalAttributes>,
    accounts: BTreeMap<AccountId, ResourceAttributes>,
    flags: BTreeMap<AccountId, Vec<SuspicionFlag>>,
}

impl StoreState {
    /// Builds state from a seed. A duplicate ID replaces the earlier entry.
    pub fn from_seed(seed: &Seed) -> Self {
        let mut state = Self::default();
        for principal in &seed.principals {
            if state
                .principals
                .insert(principal.id.clone(), principal.clone())
                .is_some()
            {
                warn!(principal = %principal.id, "Duplicate principal in seed; keeping the last");
            }
        }
        for account in &seed.accounts {
            if state
                .accounts
                .insert(account.id.clone(), account.clone())
                .is_some()
            {
                warn!(account = %account.id, "Duplicate account in seed; keeping the last");
            }
        }
        state
    }

    /// Converts the current state back into seed form.
    pub fn to_seed(&self) -> Seed {
        Seed {
            principals: self.principals.values().cloned().collect(),
            accounts: self.accounts.values().cloned().collect(),
        }
    }

    pub fn principal(&self, id: &PrincipalId) -> Result<&PrincipalAttributes> {
        self.principals
            .get(id)
            .ok_or_else(|| StoreError::PrincipalNotFound(id.clone()))
    }

    pub fn account(&self, id: &AccountId) -> Result<&ResourceAttributes> {
        self.accounts
            .get(id)
            .ok_or_else(|| StoreError::AccountNotFound(id.clone()))
    }

    fn principal_mut(&mut self, id: &PrincipalId) -> Result<&mut PrincipalAttributes> {
        self.principals
            .get_mut(id)
            .ok_or_else(|| StoreError::PrincipalNotFound(id.clone()))
    }

    fn account_mut(&mut self, id: &AccountId) -> Result<&mut ResourceAttributes> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::AccountNotFound(id.clone()))
    }

    pub fn principals(&self) -> Vec<PrincipalAttributes> {
        self.principals.values().cloned().collect()
    }

    /// Every account, ordered by ID.
    pub fn accounts(&self) -> Vec<ResourceAttributes> {
        self.accounts.values().cloned().collect()
    }

    pub fn accounts_by_owner(&self, owner: &PrincipalId) -> Vec<ResourceAttributes> {
        self.filter_accounts(|account| account.owner_id == *owner)
    }

    pub fn accounts_by_branch(&self, branch: &str) -> Vec<ResourceAttributes> {
        self.filter_accounts(|account| account.branch_code == branch)
    }

    pub fn accounts_by_status(&self, status: AccountStatus) -> Vec<ResourceAttributes> {
        self.filter_accounts(|account| account.status == status)
    }

    fn filter_accounts(
        &self,
        keep: impl Fn(&ResourceAttributes) -> bool,
    ) -> Vec<ResourceAttributes> {
        self.accounts
            .values()
            .filter(|account| keep(account))
            .cloned()
            .collect()
    }

    /// Suspicion flags recorded against an account, oldest first.
    pub fn flags(&self, account: &AccountId) -> &[SuspicionFlag] {
        self.flags.get(account).map(Vec::as_slice).unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Adds `amount` to the balance.
    pub fn credit(&mut self, id: &AccountId, amount: Money) -> Result<ResourceAttributes> {
        require_positive(amount)?;
        let account = self.account_mut(id)?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| StoreError::AmountOverflow(format!("balance of {id}")))?;
        Ok(account.clone())
    }

    /// Subtracts `amount` from the balance.
    pub fn debit(&mut self, id: &AccountId, amount: Money) -> Result<ResourceAttributes> {
        require_positive(amount)?;
        let account = self.account_mut(id)?;
        let balance = account.balance;
        account.balance = balance
            .checked_sub(amount)
            .ok_or_else(|| StoreError::InsufficientBalance {
                account: id.clone(),
                balance,
                requested: amount,
            })?;
        Ok(account.clone())
    }

    /// Adds `amount` to the principal's transfer usage for today.
    pub fn record_transfer_usage(
        &mut self,
        id: &PrincipalId,
        amount: Money,
    ) -> Result<PrincipalAttributes> {
        let principal = self.principal_mut(id)?;
        principal.daily_transfer_used = principal
            .daily_transfer_used
            .checked_add(amount)
            .ok_or_else(|| StoreError::AmountOverflow(format!("daily transfer usage of {id}")))?;
        Ok(principal.clone())
    }

    pub fn freeze(&mut self, id: &AccountId) -> Result<ResourceAttributes> {
        let account = self.account_mut(id)?;
        if account.status == AccountStatus::Closed {
            return Err(StoreError::AlreadyClosed(id.clone()));
        }
        account.status = AccountStatus::Frozen;
        Ok(account.clone())
    }

    pub fn close(&mut self, id: &AccountId) -> Result<ResourceAttributes> {
        let account = self.account_mut(id)?;
        if account.status == AccountStatus::Closed {
            return Err(StoreError::AlreadyClosed(id.clone()));
        }
        account.status = AccountStatus::Closed;
        Ok(account.clone())
    }

    /// Marks the account for review and records the flag.
    pub fn flag_suspicious(
        &mut self,
        id: &AccountId,
        flag: SuspicionFlag,
    ) -> Result<ResourceAttributes> {
        let account = self.account_mut(id)?;
        account.flagged_for_review = true;
        let updated = account.clone();
        self.flags.entry(id.clone()).or_default().push(flag);
        Ok(updated)
    }

    /// Records an MFA result; a successful challenge opens a new window at `now`.
    pub fn update_mfa(
        &mut self,
        id: &PrincipalId,
        verified: bool,
        now: DateTime<Utc>,
    ) -> Result<PrincipalAttributes> {
        let principal = self.principal_mut(id)?;
        principal.mfa_verified = verified;
        principal.mfa_timestamp = Some(now);
        Ok(principal.clone())
    }

    pub fn approve_by_supervisor(&mut self, id: &AccountId) -> Result<ResourceAttributes> {
        let account = self.account_mut(id)?;
        account.approved_by_supervisor = true;
        Ok(account.clone())
    }

    pub fn verify_beneficiary(
        &mut self,
        id: &AccountId,
        verified: bool,
    ) -> Result<ResourceAttributes> {
        let account = self.account_mut(id)?;
        account.beneficiary_verified = verified;
        Ok(account.clone())
    }

    pub fn update_fraud_score(&mut self, id: &AccountId, score: f64) -> Result<ResourceAttributes> {
        if !(0.0..=1.0).contains(&score) {
            return Err(StoreError::InvalidFraudScore(score));
        }
        let account = self.account_mut(id)?;
        account.fraud_score = score;
        Ok(account.clone())
    }
}

fn require_positive(amount: Money) -> Result<()> {
    if amount.is_zero() {
        Err(StoreError::InvalidAmount(amount))
    } else {
        Ok(())
    }
}

impl AttributeProvider for StoreState {
    fn principal(&self, id: &PrincipalId) -> bankguard_abac::Result<PrincipalAttributes> {
        Ok(StoreState::principal(self, id)?.clone())
    }

    fn resource(&self, id: &AccountId) -> bankguard_abac::Result<ResourceAttributes> {
        Ok(self.account(id)?.clone())
    }
}

// ============================================================================
// InMemoryStore
// ============================================================================

/// A shareable, lock-protected store.
///
/// # Thread Safety
///
/// `InMemoryStore` is `Clone`; clones share the same state. Reads take a
/// shared lock, mutations and [`transact`](Self::transact) an exclusive one.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    seed: Arc<Seed>,
}

impl InMemoryStore {
    /// Creates a store holding `seed`.
    pub fn new(seed: Seed) -> Self {
        let state = StoreState::from_seed(&seed);
        info!(
            principals = state.principals.len(),
            accounts = state.accounts.len(),
            "Attribute store seeded"
        );
        Self {
            state: Arc::new(RwLock::new(state)),
            seed: Arc::new(seed),
        }
    }

    /// Creates a store holding the built-in demo data, timed relative to `now`.
    pub fn with_fixtures(now: DateTime<Utc>) -> Self {
        Self::new(fixtures::seed(now))
    }

    /// Creates a store from a JSON seed file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading seed file");
        Ok(Self::new(Seed::from_json_file(path)?))
    }

    /// Restores the state the store was created with.
    pub fn reset(&self) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        *state = StoreState::from_seed(&self.seed);
        debug!("Attribute store reset to seed");
        Ok(())
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> Result<StoreState> {
        self.read(StoreState::clone)
    }

    /// Runs `f` under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> Result<R> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(f(&state))
    }

    /// Runs `f` under the exclusive lock: one critical section for every
    /// read and write `f` makes.
    pub fn transact<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> Result<R> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(f(&mut state))
    }

    pub fn accounts(&self) -> Result<Vec<ResourceAttributes>> {
        self.read(StoreState::accounts)
    }

    pub fn accounts_by_owner(&self, owner: &PrincipalId) -> Result<Vec<ResourceAttributes>> {
        self.read(|state| state.accounts_by_owner(owner))
    }

    pub fn accounts_by_branch(&self, branch: &str) -> Result<Vec<ResourceAttributes>> {
        self.read(|state| state.accounts_by_branch(branch))
    }

    pub fn accounts_by_status(&self, status: AccountStatus) -> Result<Vec<ResourceAttributes>> {
        self.read(|state| state.accounts_by_status(status))
    }

    pub fn credit(&self, id: &AccountId, amount: Money) -> Result<ResourceAttributes> {
        self.transact(|state| state.credit(id, amount))?
    }

    pub fn debit(&self, id: &AccountId, amount: Money) -> Result<ResourceAttributes> {
        self.transact(|state| state.debit(id, amount))?
    }

    pub fn record_transfer_usage(
        &self,
        id: &PrincipalId,
        amount: Money,
    ) -> Result<PrincipalAttributes> {
        self.transact(|state| state.record_transfer_usage(id, amount))?
    }

    pub fn freeze(&self, id: &AccountId) -> Result<ResourceAttributes> {
        self.transact(|state| state.freeze(id))?
    }

    pub fn close(&self, id: &AccountId) -> Result<ResourceAttributes> {
        self.transact(|state| state.close(id))?
    }

    pub fn flag_suspicious(
        &self,
        id: &AccountId,
        flag: SuspicionFlag,
    ) -> Result<ResourceAttributes> {
        self.transact(|state| state.flag_suspicious(id, flag))?
    }

    pub fn update_mfa(
        &self,
        id: &PrincipalId,
        verified: bool,
        now: DateTime<Utc>,
    ) -> Result<PrincipalAttributes> {
        self.transact(|state| state.update_mfa(id, verified, now))?
    }

    pub fn approve_by_supervisor(&self, id: &AccountId) -> Result<ResourceAttributes> {
        self.transact(|state| state.approve_by_supervisor(id))?
    }

    pub fn verify_beneficiary(&self, id: &AccountId, verified: bool) -> Result<ResourceAttributes> {
        self.transact(|state| state.verify_beneficiary(id, verified))?
    }

    pub fn update_fraud_score(&self, id: &AccountId, score: f64) -> Result<ResourceAttributes> {
        self.transact(|state| state.update_fraud_score(id, score))?
    }
}

impl AttributeProvider for InMemoryStore {
    fn principal(&self, id: &PrincipalId) -> bankguard_abac::Result<PrincipalAttributes> {
        self.read(|state| state.principal(id).cloned())
            .map_err(AuthzError::from)?
            .map_err(AuthzError::from)
    }

    fn resource(&self, id: &AccountId) -> bankguard_abac::Result<ResourceAttributes> {
        self.read(|state| state.account(id).cloned())
            .map_err(AuthzError::from)?
            .map_err(AuthzError::from)
    }
}

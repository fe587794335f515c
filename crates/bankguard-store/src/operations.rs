//! Guarded account operations.
//!
//! Each operation evaluates its action and applies the mutation inside one
//! exclusive-lock critical section. Two concurrent transfers against the same
//! daily limit therefore cannot both pass the check and jointly exceed it.
//!
//! ```text
//! write lock ─┬─ snapshot principal + account
//!             ├─ Authorizer::decide
//!             ├─ DENY  → OperationError::Denied (nothing written)
//!             └─ ALLOW → mutate, return Receipt
//! ```

use std::sync::Arc;

use bankguard_abac::{Action, Authorizer, Decision, OperationContext};
use bankguard_types::{AccountId, AccountStatus, Money, PrincipalId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{InMemoryStore, RiskLevel, StoreError, StoreState, SuspicionFlag};

/// Error type for guarded operations.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The decision engine denied the action. Nothing was written.
    #[error("Access denied: {}", .0.reason.as_deref().unwrap_or("no reason given"))]
    Denied(Box<Decision>),

    /// The store rejected or could not apply the mutation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OperationError {
    /// Returns the denying decision, if this is a denial.
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            OperationError::Denied(decision) => Some(decision),
            OperationError::Store(_) => None,
        }
    }
}

/// Result type for guarded operations.
pub type Result<T> = std::result::Result<T, OperationError>;

/// Which transfer rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    InternalSmall,
    InternalLarge,
    External,
}

impl TransferKind {
    pub fn action(self) -> Action {
        match self {
            TransferKind::InternalSmall => Action::TransferInternalSmall,
            TransferKind::InternalLarge => Action::TransferInternalLarge,
            TransferKind::External => Action::TransferExternal,
        }
    }
}

// ============================================================================
// Receipts
// ============================================================================

/// The result of an allowed operation plus the decision that allowed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt<T> {
    pub decision: Decision,
    pub outcome: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub account_id: AccountId,
    pub amount: Money,
    pub new_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub kind: TransferKind,
    pub from_account: AccountId,
    pub to_account: Option<AccountId>,
    pub to_bank: Option<String>,
    pub amount: Money,
    /// The principal's usage for today after this transfer.
    pub daily_transfer_used: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub account_id: AccountId,
    pub status: AccountStatus,
    pub reason: String,
    pub changed_by: PrincipalId,
}

// ============================================================================
// Operations
// ============================================================================

/// Runs account operations against a store, guarded by an authorizer.
#[derive(Debug, Clone)]
pub struct Operations {
    store: InMemoryStore,
    authorizer: Arc<Authorizer>,
}

impl Operations {
    pub fn new(store: InMemoryStore, authorizer: Arc<Authorizer>) -> Self {
        Self { store, authorizer }
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    /// Adds `amount` to the account. Approval flags come from `approvals`.
    pub fn credit(
        &self,
        principal: &PrincipalId,
        account: &AccountId,
        amount: Money,
        approvals: OperationContext,
    ) -> Result<Receipt<BalanceChange>> {
        let op = OperationContext {
            amount: Some(amount),
            ..approvals
        };
        self.guarded(principal, account, Action::UpdateBalanceCredit, &op, |state, _| {
            let updated = state.credit(account, amount)?;
            Ok(BalanceChange {
                account_id: account.clone(),
                amount,
                new_balance: updated.balance,
            })
        })
    }

    /// Subtracts `amount` from the account.
    pub fn debit(
        &self,
        principal: &PrincipalId,
        account: &AccountId,
        amount: Money,
        approvals: OperationContext,
    ) -> Result<Receipt<BalanceChange>> {
        let op = OperationContext {
            amount: Some(amount),
            ..approvals
        };
        self.guarded(principal, account, Action::UpdateBalanceDebit, &op, |state, _| {
            let updated = state.debit(account, amount)?;
            Ok(BalanceChange {
                account_id: account.clone(),
                amount,
                new_balance: updated.balance,
            })
        })
    }

    /// Transfers `op.amount` out of `account` and adds it to the principal's
    /// daily usage.
    pub fn transfer(
        &self,
        principal: &PrincipalId,
        account: &AccountId,
        kind: TransferKind,
        op: OperationContext,
    ) -> Result<Receipt<TransferOutcome>> {
        let amount = op.amount.unwrap_or(Money::ZERO);
        if amount.is_zero() {
            return Err(StoreError::InvalidAmount(amount).into());
        }
        self.guarded(principal, account, kind.action(), &op, |state, _| {
            let updated = state.record_transfer_usage(principal, amount)?;
            Ok(TransferOutcome {
                kind,
                from_account: account.clone(),
                to_account: op.to_account.clone(),
                to_bank: op.to_bank.clone(),
                amount,
                daily_transfer_used: updated.daily_transfer_used,
            })
        })
    }

    pub fn freeze(
        &self,
        principal: &PrincipalId,
        account: &AccountId,
        reason: Option<&str>,
    ) -> Result<Receipt<StatusChange>> {
        let reason = reason.unwrap_or("Administrative action").to_string();
        self.guarded(
            principal,
            account,
            Action::FreezeAccount,
            &OperationContext::new(),
            |state, _| {
                let updated = state.freeze(account)?;
                Ok(StatusChange {
                    account_id: account.clone(),
                    status: updated.status,
                    reason,
                    changed_by: principal.clone(),
                })
            },
        )
    }

    /// Closes the account. `compliance_clearance` is the clearance granted
    /// for this request.
    pub fn close(
        &self,
        principal: &PrincipalId,
        account: &AccountId,
        compliance_clearance: bool,
    ) -> Result<Receipt<StatusChange>> {
        let op = OperationContext::new().with_compliance_clearance(compliance_clearance);
        self.guarded(principal, account, Action::CloseAccount, &op, |state, _| {
            let updated = state.close(account)?;
            Ok(StatusChange {
                account_id: account.clone(),
                status: updated.status,
                reason: "Account closed".to_string(),
                changed_by: principal.clone(),
            })
        })
    }

    pub fn flag_suspicious(
        &self,
        principal: &PrincipalId,
        account: &AccountId,
        reason: Option<&str>,
        risk_level: RiskLevel,
    ) -> Result<Receipt<SuspicionFlag>> {
        let reason = reason.unwrap_or("Suspicious activity detected").to_string();
        self.guarded(
            principal,
            account,
            Action::FlagSuspicious,
            &OperationContext::new(),
            |state, decision| {
                let flag = SuspicionFlag {
                    reason,
                    risk_level,
                    flagged_by: principal.clone(),
                    flagged_at: decision.evaluated_at,
                };
                state.flag_suspicious(account, flag.clone())?;
                Ok(flag)
            },
        )
    }

    /// Evaluates `action` and, if allowed, applies `mutate`, all under the
    /// store's write lock.
    fn guarded<T>(
        &self,
        principal_id: &PrincipalId,
        account_id: &AccountId,
        action: Action,
        op: &OperationContext,
        mutate: impl FnOnce(&mut StoreState, &Decision) -> std::result::Result<T, StoreError>,
    ) -> Result<Receipt<T>> {
        self.store.transact(|state| -> Result<Receipt<T>> {
            let principal = state.principal(principal_id)?.clone();
            let account = state.account(account_id)?.clone();
            let decision = self
                .authorizer
                .decide(&principal, &account, action.as_str(), op);

            if !decision.is_allowed() {
                warn!(
                    principal = %principal_id,
                    account = %account_id,
                    action = %action,
                    reason = decision.reason.as_deref().unwrap_or_default(),
                    "Operation denied"
                );
                return Err(OperationError::Denied(Box::new(decision)));
            }

            let outcome = mutate(state, &decision)?;
            info!(
                principal = %principal_id,
                account = %account_id,
                action = %action,
                "Operation applied"
            );
            Ok(Receipt { decision, outcome })
        })?
    }
}

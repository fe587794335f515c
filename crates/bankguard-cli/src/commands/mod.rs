//! CLI command implementations.

pub mod actions;
pub mod check;
pub mod config;
pub mod list;
pub mod roles;
pub mod version;

use bankguard_abac::OperationContext;
use bankguard_types::{AccountId, Money};
use clap::Args;

/// Per-request overrides shared by `check` and `roles`.
///
/// Boolean overrides take an optional value: `--beneficiary-verified` means
/// true, `--beneficiary-verified false` overrides the stored flag with false.
#[derive(Args, Debug, Default, Clone)]
pub struct OperationArgs {
    /// Amount in VND.
    #[arg(long)]
    pub amount: Option<u64>,

    /// Fraud score override in [0, 1].
    #[arg(long)]
    pub fraud_score: Option<f64>,

    /// Destination account.
    #[arg(long)]
    pub to_account: Option<String>,

    /// Destination bank for external transfers.
    #[arg(long)]
    pub to_bank: Option<String>,

    /// Beneficiary verification override.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub beneficiary_verified: Option<bool>,

    /// Supervisor approval override.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub approved_by_supervisor: Option<bool>,

    /// Secondary approval override.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub secondary_approval: Option<bool>,

    /// Fraud check override.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub fraud_check_passed: Option<bool>,

    /// Compliance clearance for a closure request.
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub compliance_clearance: Option<bool>,
}

impl OperationArgs {
    pub fn to_context(&self) -> OperationContext {
        OperationContext {
            amount: self.amount.map(Money::new),
            to_account: self.to_account.as_deref().map(AccountId::from),
            to_bank: self.to_bank.clone(),
            fraud_score: self.fraud_score,
            beneficiary_verified: self.beneficiary_verified,
            approved_by_supervisor: self.approved_by_supervisor,
            secondary_approval: self.secondary_approval,
            fraud_check_passed: self.fraud_check_passed,
            compliance_clearance: self.compliance_clearance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_args_override_nothing() {
        assert_eq!(OperationArgs::default().to_context(), OperationContext::default());
    }

    #[test]
    fn args_map_onto_context() {
        let args = OperationArgs {
            amount: Some(5_000_000),
            beneficiary_verified: Some(false),
            to_account: Some("ACC002".to_string()),
            ..OperationArgs::default()
        };
        let op = args.to_context();
        assert_eq!(op.amount, Some(Money::new(5_000_000)));
        assert_eq!(op.beneficiary_verified, Some(false));
        assert_eq!(op.to_account, Some(AccountId::from("ACC002")));
        assert_eq!(op.approved_by_supervisor, None);
    }
}

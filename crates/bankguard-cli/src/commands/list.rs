//! Authorized account listing.

use anyhow::{Context, Result};
use bankguard_abac::{AttributeProvider, OperationContext, ResourceAttributes};
use bankguard_types::{AccountStatus, PrincipalId};

use crate::session::Session;
use crate::style::print_result_table;

/// Narrows the candidate accounts before authorization.
#[derive(Debug, Default)]
pub struct AccountFilter {
    pub branch: Option<String>,
    pub status: Option<AccountStatus>,
    pub owner: Option<String>,
}

impl AccountFilter {
    pub fn matches(&self, account: &ResourceAttributes) -> bool {
        self.branch
            .as_deref()
            .is_none_or(|branch| account.branch_code == branch)
            && self.status.is_none_or(|status| account.status == status)
            && self
                .owner
                .as_deref()
                .is_none_or(|owner| account.owner_id.as_str() == owner)
    }
}

/// Prints the accounts `principal` may perform `action` on.
pub fn run(session: &Session, principal: &str, action: &str, filter: &AccountFilter) -> Result<()> {
    let principal = session
        .store
        .principal(&PrincipalId::from(principal))
        .context("Failed to fetch principal")?;

    let candidates: Vec<ResourceAttributes> = session
        .store
        .accounts()
        .context("Failed to list accounts")?
        .into_iter()
        .filter(|account| filter.matches(account))
        .collect();

    let authorized = session.authorizer.filter_authorized(
        &principal,
        &candidates,
        action,
        &OperationContext::new(),
    );

    let rows: Vec<Vec<String>> = authorized
        .into_iter()
        .map(|account| {
            vec![
                account.id.to_string(),
                account.owner_id.to_string(),
                account.branch_code.clone(),
                account.status.to_string(),
                account.balance.to_string(),
            ]
        })
        .collect();

    print_result_table(
        &["Account", "Owner", "Branch", "Status", "Balance"],
        &rows,
        "account",
    );
    Ok(())
}

//! Derived role inspection.

use anyhow::{Context, Result};
use bankguard_abac::attributes::EffectiveResource;
use bankguard_abac::{AttributeProvider, DerivedRole, check_global_denial, resolve};
use bankguard_types::{AccountId, PrincipalId};

use super::OperationArgs;
use crate::session::Session;
use crate::style::colors::SemanticStyle;
use crate::style::{print_labeled, print_spacer, print_warn};

/// Prints every derived role and whether `principal` holds it on `resource`.
pub fn run(
    session: &Session,
    principal: &str,
    resource: &str,
    operation: &OperationArgs,
) -> Result<()> {
    let principal = session
        .store
        .principal(&PrincipalId::from(principal))
        .context("Failed to fetch principal")?;
    let account = session
        .store
        .resource(&AccountId::from(resource))
        .context("Failed to fetch account")?;

    let op = operation.to_context();
    let effective = EffectiveResource::new(&account, &op);
    let held = resolve(
        &principal,
        &effective,
        session.authorizer.now(),
        session.authorizer.table().limits(),
    );

    println!(
        "{}",
        format!("Derived roles for {} on {}", principal.id, account.id).header()
    );
    print_labeled("Role", principal.role().as_str());
    print_labeled("Account owner", account.owner_id.as_str());
    print_labeled("Account branch", &account.branch_code);
    print_spacer();

    for role in DerivedRole::ALL {
        if held.contains(role) {
            println!("  {} {}", "✓".allow(), role);
        } else {
            println!("  {} {}", "·".muted(), role.muted());
        }
    }

    if let Some(denial) = check_global_denial(&principal, &account) {
        print_spacer();
        print_warn(&format!(
            "{}: every action is denied before roles are consulted",
            denial.reason()
        ));
    }

    Ok(())
}

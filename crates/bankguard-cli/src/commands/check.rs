//! Single-decision command.

use std::process::ExitCode;

use anyhow::{Context, Result};
use bankguard_abac::policy::NO_MATCHING_RULE;
use bankguard_abac::{Decision, EvaluationRequest};
use chrono::SecondsFormat;
use tracing::error;

use super::OperationArgs;
use crate::session::Session;
use crate::style::colors::SemanticStyle;
use crate::style::{print_failure, print_hint, print_labeled, print_success};

/// Exit status for a DENY, distinct from usage and runtime errors.
const DENIED: u8 = 2;

/// Evaluates one request.
///
/// A missing principal or account is an error, since no decision exists for
/// it. Any other provider failure fails closed as a DENY.
pub fn run(
    session: &Session,
    principal: &str,
    resource: &str,
    action: &str,
    operation: &OperationArgs,
    json: bool,
) -> Result<ExitCode> {
    let request =
        EvaluationRequest::new(principal, resource, action).with_operation(operation.to_context());
    let decision = match session.authorizer.authorize(&session.store, &request) {
        Ok(decision) => decision,
        Err(err) if err.is_not_found() => {
            return Err(err).context("Failed to authorize request");
        }
        Err(err) => {
            error!(error = %err, action = %request.action, "Authorization failed closed");
            Decision::deny(
                request.principal_id.clone(),
                request.resource_id.clone(),
                &request.action,
                &err.to_string(),
                session.authorizer.now(),
            )
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        print_decision(&decision);
    }

    Ok(if decision.is_allowed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(DENIED)
    })
}

fn print_decision(decision: &Decision) {
    let summary = format!(
        "{} {} on {} by {}",
        decision.effect,
        decision.action.code(),
        decision.resource_id,
        decision.principal_id
    );
    if decision.is_allowed() {
        print_success(&summary);
    } else {
        print_failure(&summary);
    }

    if let Some(reason) = &decision.reason {
        print_labeled("Reason", reason);
    }
    if let Some(rule) = &decision.matched_rule {
        print_labeled("Rule", &rule.code());
    }
    print_labeled("Derived roles", &decision.derived_roles.to_string());
    print_labeled(
        "Evaluated at",
        &decision
            .evaluated_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    );

    if decision.reason.as_deref() == Some(NO_MATCHING_RULE) {
        print_hint(&format!(
            "bankguard roles {} {} shows which roles were derived",
            decision.principal_id, decision.resource_id
        ));
    }
}

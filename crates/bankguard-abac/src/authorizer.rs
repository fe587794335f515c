//! Request-level authorization.
//!
//! [`Authorizer`] wraps the pure engine with the pieces a caller needs around
//! it: an injected [`Clock`], snapshot fetching through an
//! [`AttributeProvider`], audit recording, and parallel batch evaluation.

use std::sync::Arc;

use bankguard_types::{AccountId, PrincipalId};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::attributes::{OperationContext, PrincipalAttributes, ResourceAttributes};
use crate::audit::{AuditRecord, AuditSink, TracingAuditSink};
use crate::clock::Clock;
use crate::error::Result;
use crate::evaluator::{Decision, evaluate};
use crate::policy::PolicyTable;
use crate::provider::AttributeProvider;

/// A decision request addressed by IDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub principal_id: PrincipalId,
    pub resource_id: AccountId,
    pub action: String,
    #[serde(default)]
    pub operation: OperationContext,
    /// When the caller issued the request. Audit only; never drives
    /// time-window checks.
    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
}

impl EvaluationRequest {
    pub fn new(
        principal_id: impl Into<PrincipalId>,
        resource_id: impl Into<AccountId>,
        action: &str,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            resource_id: resource_id.into(),
            action: action.to_string(),
            operation: OperationContext::default(),
            requested_at: None,
        }
    }

    pub fn with_operation(mut self, operation: OperationContext) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_requested_at(mut self, at: DateTime<Utc>) -> Self {
        self.requested_at = Some(at);
        self
    }
}

/// Evaluates requests against a policy table using an injected clock.
///
/// Stateless apart from configuration: every call reads "now" from the clock
/// and recomputes derived roles from fresh snapshots.
pub struct Authorizer {
    table: PolicyTable,
    clock: Arc<dyn Clock>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl Authorizer {
    /// Creates an authorizer that records decisions with [`TracingAuditSink`].
    pub fn new(table: PolicyTable, clock: Arc<dyn Clock>) -> Self {
        Self {
            table,
            clock,
            audit: Some(Arc::new(TracingAuditSink)),
        }
    }

    /// Replaces the audit sink.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Disables audit recording (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit = None;
        self
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    /// Current instant according to the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fetches snapshots for `request` and evaluates it.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when either snapshot cannot be fetched.
    /// Callers must treat an error as DENY.
    pub fn authorize<P>(&self, provider: &P, request: &EvaluationRequest) -> Result<Decision>
    where
        P: AttributeProvider + ?Sized,
    {
        let principal = provider.principal(&request.principal_id)?;
        let resource = provider.resource(&request.resource_id)?;
        let decision = evaluate(
            &self.table,
            &principal,
            &resource,
            &request.action,
            &request.operation,
            self.clock.now(),
        );
        self.record(&decision, request.requested_at);
        Ok(decision)
    }

    /// Like [`authorize`](Self::authorize), but converts any failure into a
    /// DENY decision whose reason names the failure.
    pub fn authorize_or_deny<P>(&self, provider: &P, request: &EvaluationRequest) -> Decision
    where
        P: AttributeProvider + ?Sized,
    {
        match self.authorize(provider, request) {
            Ok(decision) => decision,
            Err(err) => {
                if err.is_not_found() {
                    debug!(error = %err, action = %request.action, "Authorization target missing");
                } else {
                    error!(error = %err, action = %request.action, "Authorization failed closed");
                }
                let decision = Decision::deny(
                    request.principal_id.clone(),
                    request.resource_id.clone(),
                    &request.action,
                    &err.to_string(),
                    self.clock.now(),
                );
                self.record(&decision, request.requested_at);
                decision
            }
        }
    }

    /// Evaluates already-fetched snapshots at the clock's current instant.
    pub fn decide(
        &self,
        principal: &PrincipalAttributes,
        resource: &ResourceAttributes,
        action: &str,
        operation: &OperationContext,
    ) -> Decision {
        let decision = evaluate(
            &self.table,
            principal,
            resource,
            action,
            operation,
            self.clock.now(),
        );
        self.record(&decision, None);
        decision
    }

    /// Evaluates one action by `principal` against each resource, in parallel.
    ///
    /// Every decision shares one instant. The result is in input order.
    pub fn evaluate_batch(
        &self,
        principal: &PrincipalAttributes,
        resources: &[ResourceAttributes],
        action: &str,
        operation: &OperationContext,
    ) -> Vec<Decision> {
        let now = self.clock.now();
        let decisions: Vec<Decision> = resources
            .par_iter()
            .map(|resource| evaluate(&self.table, principal, resource, action, operation, now))
            .collect();
        for decision in &decisions {
            self.record(decision, None);
        }
        decisions
    }

    /// Returns the resources `principal` may perform `action` on, in input
    /// order.
    pub fn filter_authorized<'r>(
        &self,
        principal: &PrincipalAttributes,
        resources: &'r [ResourceAttributes],
        action: &str,
        operation: &OperationContext,
    ) -> Vec<&'r ResourceAttributes> {
        let decisions = self.evaluate_batch(principal, resources, action, operation);
        resources
            .iter()
            .zip(decisions)
            .filter(|(_, decision)| decision.is_allowed())
            .map(|(resource, _)| resource)
            .collect()
    }

    fn record(&self, decision: &Decision, requested_at: Option<DateTime<Utc>>) {
        if let Some(sink) = &self.audit {
            sink.record(&AuditRecord {
                decision: decision.clone(),
                requested_at,
            });
        }
    }
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("table", &self.table)
            .field("audit_enabled", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::{TimeDelta, TimeZone};

    use crate::audit::MemoryAuditSink;
    use crate::clock::FixedClock;
    use crate::error::AuthzError;
    use crate::evaluator::Effect;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap()
    }

    #[derive(Default)]
    struct MapProvider {
        principals: BTreeMap<PrincipalId, PrincipalAttributes>,
        accounts: BTreeMap<AccountId, ResourceAttributes>,
        offline: bool,
    }

    impl MapProvider {
        fn with_principal(mut self, principal: PrincipalAttributes) -> Self {
            self.principals.insert(principal.id.clone(), principal);
            self
        }

        fn with_account(mut self, account: ResourceAttributes) -> Self {
            self.accounts.insert(account.id.clone(), account);
            self
        }
    }

    impl AttributeProvider for MapProvider {
        fn principal(&self, id: &PrincipalId) -> Result<PrincipalAttributes> {
            if self.offline {
                return Err(AuthzError::ProviderUnavailable("offline".to_string()));
            }
            self.principals
                .get(id)
                .cloned()
                .ok_or_else(|| AuthzError::PrincipalNotFound(id.clone()))
        }

        fn resource(&self, id: &AccountId) -> Result<ResourceAttributes> {
            if self.offline {
                return Err(AuthzError::ProviderUnavailable("offline".to_string()));
            }
            self.accounts
                .get(id)
                .cloned()
                .ok_or_else(|| AuthzError::ResourceNotFound(id.clone()))
        }
    }

    fn owner() -> PrincipalAttributes {
        PrincipalAttributes::client("USR001")
            .verified()
            .with_mfa(now() - TimeDelta::minutes(5))
    }

    fn provider() -> MapProvider {
        MapProvider::default()
            .with_principal(owner())
            .with_account(ResourceAttributes::new("ACC001", "USR001", "HN001"))
            .with_account(ResourceAttributes::new("ACC002", "USR002", "HN001"))
    }

    fn authorizer() -> Authorizer {
        Authorizer::new(PolicyTable::default(), Arc::new(FixedClock::new(now()))).without_audit()
    }

    #[test]
    fn authorize_uses_injected_clock_not_requested_at() {
        let request = EvaluationRequest::new("USR001", "ACC001", "read_full_details")
            .with_requested_at(now() + TimeDelta::hours(2));
        let decision = authorizer().authorize(&provider(), &request).expect("decision");
        assert_eq!(decision.effect, Effect::Allow);
        assert_eq!(decision.evaluated_at, now());
    }

    #[test]
    fn authorize_reports_missing_principal() {
        let request = EvaluationRequest::new("USR404", "ACC001", "read_basic_info");
        let err = authorizer().authorize(&provider(), &request).unwrap_err();
        assert!(matches!(err, AuthzError::PrincipalNotFound(_)));
        assert!(err.is_not_found());
    }

    #[test]
    fn authorize_or_deny_fails_closed() {
        let offline = MapProvider {
            offline: true,
            ..provider()
        };
        let request = EvaluationRequest::new("USR001", "ACC001", "read_basic_info");
        let decision = authorizer().authorize_or_deny(&offline, &request);
        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(
            decision.reason.as_deref(),
            Some("Attribute provider unavailable: offline")
        );

        let missing = EvaluationRequest::new("USR001", "ACC404", "read_basic_info");
        let decision = authorizer().authorize_or_deny(&provider(), &missing);
        assert_eq!(decision.reason.as_deref(), Some("Account not found: ACC404"));
    }

    #[test]
    fn audit_sink_receives_every_decision() {
        let sink = Arc::new(MemoryAuditSink::new());
        let authorizer = Authorizer::new(PolicyTable::default(), Arc::new(FixedClock::new(now())))
            .with_audit_sink(sink.clone());

        let requested_at = now() - TimeDelta::seconds(2);
        let allowed = EvaluationRequest::new("USR001", "ACC001", "read_basic_info")
            .with_requested_at(requested_at);
        let denied = EvaluationRequest::new("USR001", "ACC002", "read_basic_info");
        let missing = EvaluationRequest::new("USR404", "ACC001", "read_basic_info");

        authorizer.authorize(&provider(), &allowed).expect("decision");
        authorizer.authorize(&provider(), &denied).expect("decision");
        authorizer.authorize_or_deny(&provider(), &missing);

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].requested_at, Some(requested_at));
        assert!(records[0].decision.is_allowed());
        assert!(!records[1].decision.is_allowed());
        assert_eq!(records[2].decision.principal_id.as_str(), "USR404");
    }

    #[test]
    fn without_audit_records_nothing() {
        let sink = Arc::new(MemoryAuditSink::new());
        let authorizer = Authorizer::new(PolicyTable::default(), Arc::new(FixedClock::new(now())))
            .with_audit_sink(sink.clone())
            .without_audit();
        authorizer.decide(
            &owner(),
            &ResourceAttributes::new("ACC001", "USR001", "HN001"),
            "read_basic_info",
            &OperationContext::new(),
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn filter_authorized_preserves_input_order() {
        let accounts: Vec<ResourceAttributes> = (0..64)
            .map(|i| {
                let owner = if i % 3 == 0 { "USR001" } else { "USR002" };
                ResourceAttributes::new(format!("ACC{i:03}"), owner, "HN001")
            })
            .collect();

        let allowed = authorizer().filter_authorized(
            &owner(),
            &accounts,
            "read_basic_info",
            &OperationContext::new(),
        );
        let ids: Vec<&str> = allowed.iter().map(|a| a.id.as_str()).collect();
        let expected: Vec<String> = (0..64)
            .filter(|i| i % 3 == 0)
            .map(|i| format!("ACC{i:03}"))
            .collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn evaluate_batch_matches_individual_decisions() {
        let authorizer = authorizer();
        let accounts = vec![
            ResourceAttributes::new("ACC001", "USR001", "HN001"),
            ResourceAttributes::new("ACC002", "USR002", "HN001"),
            ResourceAttributes::new("ACC003", "USR001", "HN001").with_regulatory_hold(),
        ];
        let op = OperationContext::new();
        let batch = authorizer.evaluate_batch(&owner(), &accounts, "generate_statement", &op);
        assert_eq!(batch.len(), 3);
        for (account, decision) in accounts.iter().zip(&batch) {
            assert_eq!(
                decision,
                &authorizer.decide(&owner(), account, "generate_statement", &op)
            );
        }
        assert_eq!(
            batch[2].reason.as_deref(),
            Some("Account under regulatory hold")
        );
    }
}

//! Audit sinks for authorization decisions.
//!
//! The engine produces decisions; sinks record them. Nothing here persists
//! anything: [`TracingAuditSink`] emits structured events and
//! [`MemoryAuditSink`] keeps records in memory for inspection.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::evaluator::Decision;

/// A decision plus the instant the caller says the request was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub decision: Decision,
    /// Caller-supplied request time, kept for the record only.
    pub requested_at: Option<DateTime<Utc>>,
}

/// Receives every decision an [`Authorizer`](crate::Authorizer) produces.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Emits each decision as a `tracing` event.
///
/// Allowed decisions log at `info`, denied ones at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        let decision = &record.decision;
        if decision.is_allowed() {
            info!(
                principal = %decision.principal_id,
                resource = %decision.resource_id,
                action = %decision.action,
                derived_roles = %decision.derived_roles,
                rule = ?decision.matched_rule,
                requested_at = ?record.requested_at,
                "Access granted"
            );
        } else {
            warn!(
                principal = %decision.principal_id,
                resource = %decision.resource_id,
                action = %decision.action,
                derived_roles = %decision.derived_roles,
                reason = decision.reason.as_deref().unwrap_or_default(),
                requested_at = ?record.requested_at,
                "Access denied"
            );
        }
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(_) => error!(
                action = %record.decision.action,
                "Audit buffer poisoned; record dropped"
            ),
        }
    }
}

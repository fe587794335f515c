//! # bankguard-abac: Attribute-Based Access Control for bank accounts
//!
//! Produces a deterministic ALLOW/DENY decision for a principal performing an
//! action on an account, together with the derived roles that justified it
//! and an audit-grade reason.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  EvaluationRequest                           │
//! │  (principal + account + action + op context) │
//! └─────────────────┬───────────────────────────┘
//!                   │  AttributeProvider snapshots, Clock::now()
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision Engine                             │
//! │  ├─ Global denials (suspended/closed/hold)   │
//! │  ├─ Derived role resolution                  │
//! │  └─ Action table, first matching rule set    │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision                                    │
//! │  - Effect (ALLOW/DENY)                       │
//! │  - Derived roles                             │
//! │  - Audit reason                              │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//!               AuditSink
//! ```
//!
//! ## Derived Roles
//!
//! - **`verified_owner`**: owns the account, not suspended, KYC verified
//! - **`verified_owner_with_mfa`**: plus an MFA challenge within 15 minutes
//! - **`verified_owner_small_transfer`**: plus amount <= 5,000,000 and fraud score < 0.3
//! - **`vip_client_verified`**: VIP or premium owner with MFA
//! - **`authorized_teller`**: certified teller at the account's branch
//! - **`authorized_teller_with_approval`**: plus supervisor approval
//! - **`branch_supervisor`**: supervisor with approval authority at the branch
//!
//! ## Examples
//!
//! ```
//! use bankguard_abac::{evaluate, Effect, OperationContext, PolicyTable};
//! use bankguard_abac::attributes::{PrincipalAttributes, ResourceAttributes};
//! use chrono::{TimeDelta, TimeZone, Utc};
//!
//! let now = Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap();
//! let owner = PrincipalAttributes::client("USR001")
//!     .verified()
//!     .with_mfa(now - TimeDelta::minutes(5))
//!     .with_transfer_limits(50_000_000, 10_000_000, 20_000_000);
//! let account = ResourceAttributes::new("ACC001", "USR001", "HN001").with_fraud_score(0.2);
//!
//! let table = PolicyTable::default();
//! let op = OperationContext::new().with_amount(3_000_000);
//! let decision = evaluate(&table, &owner, &account, "transfer_internal_small", &op, now);
//! assert_eq!(decision.effect, Effect::Allow);
//! ```

pub mod attributes;
pub mod audit;
pub mod authorizer;
pub mod clock;
pub mod denial;
pub mod error;
pub mod evaluator;
pub mod policy;
pub mod provider;
pub mod roles;

// Kani proofs for bounded model checking
#[cfg(any(test, kani))]
mod kani_proofs;

pub use attributes::{
    EffectiveResource, OperationContext, PrincipalAttributes, ResourceAttributes, RoleProfile,
};
pub use audit::{AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use authorizer::{Authorizer, EvaluationRequest};
pub use clock::{Clock, FixedClock, SystemClock};
pub use denial::{GlobalDenial, check_global_denial};
pub use error::{AuthzError, Result};
pub use evaluator::{Decision, Effect, evaluate};
pub use policy::{Action, Condition, PolicyLimits, PolicyTable, RoleRequirement, RuleSet};
pub use provider::AttributeProvider;
pub use roles::{DerivedRole, DerivedRoleSet, resolve};

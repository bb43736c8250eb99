//! ```text
//! PolicyStore ──► ScanGateway ─┬─► HoneypotCheck ──► HoneypotResponder
//!                              │
//!                              ├─► InputScan ──┬─► RemoteGuardClient
//!                              │               └─► HeuristicDetector (fallback)
//!                              │
//!                              ├─► Generation ──► TextGenerator (opaque)
//!                              │
//!                              ├─► OutputScan ──► (same detector selection)
//!                              │
//!                              ├─► Reconciliation ──► FalsePositiveReconciler
//!                              │
//!                              └─► AuditLog (one event per terminal outcome)
//! ```
//!
//! # palisade
//!
//! **Content security scanning gateway for LLM-backed assistants.**
//!
//! `palisade` sits between user-submitted text, a generative text backend,
//! and an external threat-detection policy.  Every request runs a two-sided
//! scan protocol (input before generation, output after) with a local
//! heuristic detector standing in whenever the remote detector is absent or
//! unreachable.  Blocked output verdicts are reconciled against a domain
//! allowlist to suppress false positives, and when scanning is
//! administratively off the gateway can still recognize attack patterns and
//! answer them with deterministic honeypot decoys.  Every decision lands in
//! a bounded, append-only audit trail.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use palisade::prelude::*;
//!
//! let generator = Arc::new(HttpTextGenerator::new("http://127.0.0.1:11434"));
//! let gateway = ScanGateway::builder(generator).build()?;
//!
//! let outcome = gateway
//!     .handle(ScanRequest::new("I had a chicken salad for lunch"))
//!     .await?;
//! println!("{}", outcome.content());
//! ```
//!
//! ## Modules
//!
//! - [`config`] – scanning policy, environment bootstrap, runtime updates
//! - [`verdict`] – the Allow/Block result type shared by every scan
//! - [`detect`] – rule table, heuristic and remote detectors, reconciliation
//! - [`honeypot`] – deterministic decoys for attacks seen while scanning is off
//! - [`gateway`] – the per-request state machine tying it all together
//! - [`audit`] – bounded, append-only trail of scan decisions
//! - [`generate`] – the opaque text-generator boundary
//! - [`api`] – the JSON-over-HTTP surface

#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod api;
pub mod audit;
pub mod config;
pub mod detect;
pub mod gateway;
pub mod generate;
pub mod honeypot;
pub mod verdict;

/// Re-exports for convenient access to core types.
pub mod prelude {
    pub use crate::audit::{AuditLog, EventFilter, RequestIdentity, SecurityEvent};
    pub use crate::config::{PolicyBuilder, PolicyConfig, PolicyStore, PolicyUpdate};
    pub use crate::detect::heuristic::{HeuristicConfig, HeuristicDetector};
    pub use crate::detect::reconcile::FalsePositiveReconciler;
    pub use crate::detect::remote::RemoteGuardClient;
    pub use crate::detect::rules::ThreatCategory;
    pub use crate::gateway::{
        GatewayError, ScanGateway, ScanOutcome, ScanPhase, ScanReport, ScanRequest,
    };
    pub use crate::generate::{GeneratorError, HttpTextGenerator, TextGenerator};
    pub use crate::honeypot::HoneypotResponder;
    pub use crate::verdict::{ScanAction, Verdict, VerdictSource};
}

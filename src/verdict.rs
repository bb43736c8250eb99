//! Verdict types produced by every scan.
//!
//! A [`Verdict`] is the tagged result of a single scan pass: a binary
//! [`ScanAction`], a human-readable reason, a scan-local identifier, and the
//! [`VerdictSource`] that produced it.  Reconciliation never mutates a
//! verdict; an override produces a *new* verdict with a fresh identifier.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical reason attached to verdicts that pass cleanly.
pub const REASON_CLEAN: &str = "content passed security scan";

/// Canonical reason attached when scanning is administratively disabled.
pub const REASON_SCAN_DISABLED: &str = "security scanning disabled";

/// Canonical reason for the authoritative block produced by a remote
/// credential rejection.  Never interpreted as "no threat".
pub const REASON_AUTH_FAILED: &str = "authentication failed - invalid credentials";

// ── ScanAction ─────────────────────────────────────────────────────────

/// The binary decision of a single scan, with no partial or ambiguous states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanAction {
    /// The content may proceed.
    Allow,
    /// The content must not reach the generator or the caller.
    Block,
}

// ── VerdictSource ──────────────────────────────────────────────────────

/// Which detector produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    /// The configured remote detection API.
    Remote,
    /// The local pattern-based fallback detector.
    Heuristic,
    /// Synthesized while scanning was administratively off.
    Disabled,
}

impl std::fmt::Display for VerdictSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Heuristic => write!(f, "heuristic"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

// ── Verdict ────────────────────────────────────────────────────────────

/// The outcome of one scan pass.
///
/// `id` is scan-local (fresh UUID per verdict, not globally durable); it
/// exists so that audit consumers can correlate the two verdicts of a single
/// request without relying on position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Allow or Block.
    pub action: ScanAction,
    /// Human-readable reason for the decision.
    pub reason: String,
    /// Scan-local identifier.
    pub id: String,
    /// Which detector produced this verdict.
    pub source: VerdictSource,
}

impl Verdict {
    /// Construct an allowing verdict with a fresh identifier.
    #[must_use]
    pub fn allow(reason: impl Into<String>, source: VerdictSource) -> Self {
        Self {
            action: ScanAction::Allow,
            reason: reason.into(),
            id: Uuid::new_v4().to_string(),
            source,
        }
    }

    /// Construct a blocking verdict with a fresh identifier.
    #[must_use]
    pub fn block(reason: impl Into<String>, source: VerdictSource) -> Self {
        Self {
            action: ScanAction::Block,
            reason: reason.into(),
            id: Uuid::new_v4().to_string(),
            source,
        }
    }

    /// Returns `true` if the action is [`ScanAction::Allow`].
    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.action == ScanAction::Allow
    }

    /// Returns `true` if the action is [`ScanAction::Block`].
    #[must_use]
    pub fn is_block(&self) -> bool {
        self.action == ScanAction::Block
    }

    /// Whether this verdict is the authoritative block produced by a remote
    /// credential rejection.  Such verdicts are exempt from reconciliation.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        self.is_block() && self.reason == REASON_AUTH_FAILED
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_constructor() {
        let v = Verdict::allow(REASON_CLEAN, VerdictSource::Heuristic);
        assert!(v.is_allow());
        assert!(!v.is_block());
        assert_eq!(v.reason, REASON_CLEAN);
        assert_eq!(v.source, VerdictSource::Heuristic);
    }

    #[test]
    fn block_constructor() {
        let v = Verdict::block("password_request", VerdictSource::Remote);
        assert!(v.is_block());
        assert_eq!(v.source, VerdictSource::Remote);
    }

    #[test]
    fn verdict_ids_are_unique() {
        let a = Verdict::allow(REASON_CLEAN, VerdictSource::Heuristic);
        let b = Verdict::allow(REASON_CLEAN, VerdictSource::Heuristic);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn auth_failure_detection() {
        let auth = Verdict::block(REASON_AUTH_FAILED, VerdictSource::Remote);
        assert!(auth.is_auth_failure());

        let policy = Verdict::block("secret_request", VerdictSource::Remote);
        assert!(!policy.is_auth_failure());

        let allow = Verdict::allow(REASON_AUTH_FAILED, VerdictSource::Remote);
        assert!(!allow.is_auth_failure());
    }

    #[test]
    fn action_round_trips_json() {
        let json = serde_json::to_string(&ScanAction::Block).unwrap();
        assert_eq!(json, r#""block""#);
        let parsed: ScanAction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ScanAction::Block);
    }

    #[test]
    fn source_display() {
        assert_eq!(VerdictSource::Remote.to_string(), "remote");
        assert_eq!(VerdictSource::Heuristic.to_string(), "heuristic");
        assert_eq!(VerdictSource::Disabled.to_string(), "disabled");
    }
}

//! The consolidated threat-rule table.
//!
//! One ordered list of [`ThreatRule`]s, owned here and consumed by three
//! call sites: the heuristic scan path, the honeypot classifier, and the
//! false-positive reconciler's marker set.  Keeping a single table is what
//! keeps category strings consistent everywhere.
//!
//! Ordering is significant: the first matching rule wins, and the order is
//! preserved exactly so repeated scans of the same text are reproducible.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

// ── ThreatCategory ─────────────────────────────────────────────────────

/// High-level classification of a credential-extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ThreatCategory {
    /// Requests for API keys.
    ApiKey,
    /// Requests for secrets in general.
    Secret,
    /// Requests for passwords.
    Password,
    /// Requests for account credentials.
    Credential,
    /// Requests for access or session tokens.
    Token,
    /// Requests for private key material.
    PrivateKey,
    /// Probing phrasings that fish for internal state without naming a
    /// specific credential kind.
    Probing,
}

impl std::fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey => write!(f, "api_key"),
            Self::Secret => write!(f, "secret"),
            Self::Password => write!(f, "password"),
            Self::Credential => write!(f, "credential"),
            Self::Token => write!(f, "token"),
            Self::PrivateKey => write!(f, "private_key"),
            Self::Probing => write!(f, "probing"),
        }
    }
}

// ── ThreatRule ─────────────────────────────────────────────────────────

/// A built-in detection rule.
#[derive(Debug, Clone)]
pub struct ThreatRule {
    /// Unique identifier (e.g. `"PW-001"`).
    pub id: Cow<'static, str>,
    /// Which threat category this rule belongs to.
    pub category: ThreatCategory,
    /// Canonical reason string attached to blocking verdicts.
    pub reason: Cow<'static, str>,
    /// Raw regex pattern string (compiled into a `RegexSet`).
    pub pattern: Cow<'static, str>,
}

/// A user-provided detection rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRule {
    /// Unique identifier.
    pub id: String,
    /// Which threat category this rule belongs to.
    pub category: ThreatCategory,
    /// Canonical reason string attached to blocking verdicts.
    pub reason: String,
    /// Raw regex pattern string.
    pub pattern: String,
}

// ── Built-in rules ─────────────────────────────────────────────────────

macro_rules! rule {
    ($id:expr, $cat:expr, $reason:expr, $re:expr) => {
        ThreatRule {
            id: Cow::Borrowed($id),
            category: $cat,
            reason: Cow::Borrowed($reason),
            pattern: Cow::Borrowed($re),
        }
    };
}

/// Returns the built-in rule table, in evaluation order.
#[must_use]
pub fn builtin_rules() -> Vec<ThreatRule> {
    use ThreatCategory::{ApiKey, Credential, Password, PrivateKey, Probing, Secret, Token};

    vec![
        rule!("AK-001", ApiKey, "api_key_request", r"(?i)api[\s_-]?key"),
        rule!("SC-001", Secret, "secret_request", r"(?i)\bsecrets?\b"),
        rule!("PW-001", Password, "password_request", r"(?i)\bpasswords?\b"),
        rule!(
            "CR-001",
            Credential,
            "credential_request",
            r"(?i)\bcredentials?\b"
        ),
        rule!("TK-001", Token, "token_request", r"(?i)\btokens?\b"),
        rule!(
            "PK-001",
            PrivateKey,
            "private_key_request",
            r"(?i)private[\s_-]?key"
        ),
        rule!("PR-001", Probing, "probing_request", r"(?i)show\s+me\s+your\b"),
        rule!("PR-002", Probing, "probing_request", r"(?i)what\s+is\s+your\b"),
        rule!("PR-003", Probing, "probing_request", r"(?i)tell\s+me\s+your\b"),
    ]
}

// ── Marker vocabulary ──────────────────────────────────────────────────

/// Literal marker terms derived from the rule table, used by the
/// reconciler to veto an allowlist override.  These are plain substrings
/// (matched case-insensitively via Aho-Corasick), not regexes, so the set
/// spells out the spacing variants the regexes above fold together.
#[must_use]
pub fn malicious_markers() -> &'static [&'static str] {
    &[
        "api key",
        "api_key",
        "apikey",
        "secret",
        "password",
        "credential",
        "token",
        "private key",
        "private_key",
        "show me your",
        "what is your",
        "tell me your",
    ]
}

// ── Tests ──────────────────────────────────────────────────────────────

//! Local pattern-based fallback detector.
//!
//! [`HeuristicDetector`] compiles the rule table into a [`RegexSet`] for
//! one-pass multi-pattern matching.  The winning rule is the one with the
//! lowest index in the table (first-match-wins), which keeps verdicts
//! deterministic across repeated scans.

use std::borrow::Cow;

use regex::RegexSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::verdict::{REASON_CLEAN, Verdict, VerdictSource};

use super::rules::{CustomRule, ThreatCategory, ThreatRule, builtin_rules};

// ── HeuristicConfig ────────────────────────────────────────────────────

/// Configuration for [`HeuristicDetector`].
///
/// Uses a builder pattern; all setters are `#[must_use]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HeuristicConfig {
    /// Additional user-provided rules, appended after the built-ins.
    #[serde(default)]
    pub additional_rules: Vec<CustomRule>,
    /// Built-in rule IDs to disable.
    #[serde(default)]
    pub disabled_rules: Vec<String>,
}

impl HeuristicConfig {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append user-provided rules.
    #[must_use]
    pub fn additional_rules(mut self, rules: Vec<CustomRule>) -> Self {
        self.additional_rules = rules;
        self
    }

    /// Disable built-in rules by ID.
    #[must_use]
    pub fn disabled_rules(mut self, ids: Vec<String>) -> Self {
        self.disabled_rules = ids;
        self
    }
}

// ── DetectorError ──────────────────────────────────────────────────────

/// Errors from detector construction.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// A rule pattern failed to compile.
    #[error("rule '{rule_id}' failed to compile: {reason}")]
    InvalidRule {
        /// Identifier of the offending rule.
        rule_id: String,
        /// What went wrong.
        reason: String,
    },
}

// ── RuleMatch ──────────────────────────────────────────────────────────

/// The winning rule of a detection pass.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    /// Which rule triggered.
    pub rule_id: Cow<'static, str>,
    /// Category of the matched rule.
    pub category: ThreatCategory,
    /// Canonical reason string of the matched rule.
    pub reason: Cow<'static, str>,
}

// ── Internal unified rule entry ────────────────────────────────────────

#[derive(Debug, Clone)]
struct RuleEntry {
    id: Cow<'static, str>,
    category: ThreatCategory,
    reason: Cow<'static, str>,
}

// ── HeuristicDetector ──────────────────────────────────────────────────

/// Ordered multi-pattern threat detector.
///
/// Also serves as the category classifier for the honeypot path: the
/// same table and the same first-match-wins semantics drive both.
#[derive(Debug, Clone)]
pub struct HeuristicDetector {
    regex_set: RegexSet,
    entries: Vec<RuleEntry>,
}

impl HeuristicDetector {
    /// Build a detector from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::InvalidRule`] if any pattern fails to
    /// compile.
    pub fn new(config: HeuristicConfig) -> Result<Self, DetectorError> {
        let disabled: std::collections::HashSet<&str> =
            config.disabled_rules.iter().map(String::as_str).collect();

        let builtins: Vec<ThreatRule> = builtin_rules()
            .into_iter()
            .filter(|r| !disabled.contains(r.id.as_ref()))
            .collect();

        let mut patterns: Vec<String> =
            Vec::with_capacity(builtins.len() + config.additional_rules.len());
        let mut entries: Vec<RuleEntry> = Vec::with_capacity(patterns.capacity());

        for r in &builtins {
            patterns.push(r.pattern.to_string());
            entries.push(RuleEntry {
                id: r.id.clone(),
                category: r.category,
                reason: r.reason.clone(),
            });
        }

        for cr in &config.additional_rules {
            patterns.push(cr.pattern.clone());
            entries.push(RuleEntry {
                id: Cow::Owned(cr.id.clone()),
                category: cr.category,
                reason: Cow::Owned(cr.reason.clone()),
            });
        }

        let regex_set = RegexSet::new(&patterns).map_err(|e| {
            // RegexSet reports the whole set; recompile singly to pinpoint.
            for (i, p) in patterns.iter().enumerate() {
                if let Err(single) = regex::Regex::new(p) {
                    return DetectorError::InvalidRule {
                        rule_id: entries[i].id.to_string(),
                        reason: single.to_string(),
                    };
                }
            }
            DetectorError::InvalidRule {
                rule_id: "<set>".into(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self { regex_set, entries })
    }

    /// Build a detector over the full built-in table.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError`] if any built-in rule fails to compile.
    pub fn with_defaults() -> Result<Self, DetectorError> {
        Self::new(HeuristicConfig::default())
    }

    /// Return the first rule (in table order) matching `text`, if any.
    ///
    /// `RegexSet` reports matched pattern indices in ascending order, so
    /// the first reported index is the first rule in the table.
    #[must_use]
    pub fn detect(&self, text: &str) -> Option<RuleMatch> {
        let idx = self.regex_set.matches(text).into_iter().next()?;
        let entry = &self.entries[idx];
        Some(RuleMatch {
            rule_id: entry.id.clone(),
            category: entry.category,
            reason: entry.reason.clone(),
        })
    }

    /// Scan `text` and produce a heuristic [`Verdict`].
    ///
    /// No match yields Allow with the canonical clean reason.
    #[must_use]
    pub fn scan(&self, text: &str) -> Verdict {
        match self.detect(text) {
            Some(m) => {
                tracing::debug!(rule = %m.rule_id, category = %m.category, "heuristic rule matched");
                Verdict::block(m.reason, VerdictSource::Heuristic)
            }
            None => Verdict::allow(REASON_CLEAN, VerdictSource::Heuristic),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

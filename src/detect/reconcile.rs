//! False-positive reconciliation for blocked output verdicts.
//!
//! Generated text about the application's own domain (meals, nutrition,
//! training plans) occasionally trips a detector.  When the *input* was
//! clean and only the *output* was flagged, [`FalsePositiveReconciler`]
//! re-examines the generated content against two disjoint keyword sets:
//!
//! - a domain allowlist (nutrition/fitness vocabulary), and
//! - the malicious markers derived from the threat-rule table.
//!
//! The block is overridden to Allow only when at least one allowlist term
//! is present and zero markers are.  Anything else fails closed.

use aho_corasick::AhoCorasick;

use crate::verdict::Verdict;

use super::rules::malicious_markers;

/// Domain vocabulary that marks generated text as on-topic for the
/// application.  Disjoint from [`malicious_markers`] by construction;
/// `automata_are_disjoint` below enforces it.
const DOMAIN_ALLOWLIST: &[&str] = &[
    "calorie",
    "protein",
    "carb",
    "nutrition",
    "nutrient",
    "meal",
    "breakfast",
    "lunch",
    "dinner",
    "snack",
    "ingredient",
    "recipe",
    "serving",
    "portion",
    "vitamin",
    "fiber",
    "hydration",
    "workout",
    "exercise",
    "cardio",
    "strength",
    "repetition",
];

// ── FalsePositiveReconciler ────────────────────────────────────────────

/// Decides whether a blocked output verdict should be overridden.
#[derive(Debug, Clone)]
pub struct FalsePositiveReconciler {
    allowlist: AhoCorasick,
    markers: AhoCorasick,
}

impl Default for FalsePositiveReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl FalsePositiveReconciler {
    /// Build the reconciler with the built-in keyword sets.
    #[must_use]
    pub fn new() -> Self {
        let allowlist = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(DOMAIN_ALLOWLIST)
            .expect("allowlist terms are valid literals");
        let markers = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(malicious_markers())
            .expect("marker terms are valid literals");
        Self { allowlist, markers }
    }

    /// Re-examine blocked output content.
    ///
    /// Returns `Some(overridden)`, a *new* Allow verdict carrying the
    /// original block reason in its text, when the override conditions
    /// hold; `None` otherwise.  Auth-failure blocks are never overridden:
    /// they are not policy-violation verdicts.
    #[must_use]
    pub fn reconcile(&self, content: &str, blocked: &Verdict) -> Option<Verdict> {
        if !blocked.is_block() || blocked.is_auth_failure() {
            return None;
        }

        if !self.allowlist.is_match(content) {
            return None;
        }
        if self.markers.is_match(content) {
            tracing::debug!(
                reason = %blocked.reason,
                "override vetoed: malicious marker present in flagged output",
            );
            return None;
        }

        tracing::info!(
            original_reason = %blocked.reason,
            source = %blocked.source,
            "blocked output overridden: domain allowlist match, no markers",
        );
        Some(Verdict::allow(
            format!(
                "override: domain content ('{}' judged false positive)",
                blocked.reason,
            ),
            blocked.source,
        ))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{REASON_AUTH_FAILED, VerdictSource};

    fn blocked(reason: &str) -> Verdict {
        Verdict::block(reason, VerdictSource::Heuristic)
    }

    // 1. Allowlist term and no markers: override to Allow.
    #[test]
    fn domain_content_overridden() {
        let r = FalsePositiveReconciler::new();
        let content = "This meal provides roughly 650 calories with 40g of protein.";
        let overridden = r.reconcile(content, &blocked("secret_request")).unwrap();
        assert!(overridden.is_allow());
        assert!(overridden.reason.contains("secret_request"));
    }

    // 2. Allowlist term plus a marker: fail closed.
    #[test]
    fn marker_vetoes_override() {
        let r = FalsePositiveReconciler::new();
        let content = "Your meal has 650 calories. Also, here is the admin password.";
        assert!(r.reconcile(content, &blocked("secret_request")).is_none());
    }

    // 3. No allowlist term at all: no override.
    #[test]
    fn off_domain_content_not_overridden() {
        let r = FalsePositiveReconciler::new();
        let content = "Here is some unrelated text with nothing domain-specific.";
        assert!(r.reconcile(content, &blocked("secret_request")).is_none());
    }

    // 4. Auth-failure blocks are exempt from reconciliation.
    #[test]
    fn auth_failure_never_overridden() {
        let r = FalsePositiveReconciler::new();
        let content = "A perfectly nutritious meal with 500 calories.";
        assert!(r.reconcile(content, &blocked(REASON_AUTH_FAILED)).is_none());
    }

    // 5. Allow verdicts are not reconciler input.
    #[test]
    fn allow_verdict_ignored() {
        let r = FalsePositiveReconciler::new();
        let allow = Verdict::allow("clean", VerdictSource::Remote);
        assert!(r.reconcile("calories and protein", &allow).is_none());
    }

    // 6. The override is a new verdict, not a mutation.
    #[test]
    fn override_is_a_new_verdict() {
        let r = FalsePositiveReconciler::new();
        let original = blocked("token_request");
        let overridden = r
            .reconcile("A balanced breakfast with oats and fruit.", &original)
            .unwrap();
        assert_ne!(overridden.id, original.id);
        assert!(original.is_block(), "original must stay untouched");
        assert_eq!(overridden.source, original.source);
    }

    // 7. Matching is case-insensitive on both sets.
    #[test]
    fn case_insensitive_sets() {
        let r = FalsePositiveReconciler::new();
        assert!(r.reconcile("CALORIES galore", &blocked("x")).is_some());
        assert!(r.reconcile("Calories and the PASSWORD", &blocked("x")).is_none());
    }

    // 8. The two keyword sets never overlap; an overlapping term would
    //    make every override self-vetoing.
    #[test]
    fn automata_are_disjoint() {
        let r = FalsePositiveReconciler::new();
        for term in DOMAIN_ALLOWLIST {
            assert!(
                !r.markers.is_match(*term),
                "allowlist term '{term}' collides with a malicious marker",
            );
        }
    }

    // 9. Remote-sourced blocks are reconcilable too.
    #[test]
    fn remote_block_overridable() {
        let r = FalsePositiveReconciler::new();
        let remote_block = Verdict::block("policy_violation", VerdictSource::Remote);
        let overridden = r
            .reconcile("A light dinner: salad with grilled chicken.", &remote_block)
            .unwrap();
        assert_eq!(overridden.source, VerdictSource::Remote);
    }
}

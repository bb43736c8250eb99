//! The scan orchestrator: the full request lifecycle.
//!
//! ```text
//! ScanRequest ──► ScanGateway
//!                   │
//!                   ├─ policy disabled ──► HoneypotCheck ──┬─ hit  ──► Honeypotted
//!                   │                                      └─ miss ──► Generation ──► Allowed
//!                   │
//!                   └─ policy enabled ───► InputScan ──► Generation ──► OutputScan
//!                                             │                            │
//!                                             └─ block ──► Blocked         ├─ block ──► Reconciliation
//!                                                                          │             ├─ override ──► Allowed
//!                                                                          │             └─ uphold  ──► Blocked
//!                                                                          └─ allow ──► Allowed
//! ```
//!
//! Each request walks the named [`ScanPhase`]s strictly in order: the input
//! scan precedes generation, which precedes the output scan.  Every terminal
//! Allow or Block outcome appends exactly one [`SecurityEvent`] before the
//! result is returned.  If the caller drops the request future mid-flight,
//! in-flight work is cancelled and nothing is logged; events exist only for
//! decisions actually reached.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::audit::{AuditLog, RequestIdentity, SecurityEvent};
use crate::config::{PolicyConfig, PolicyStore};
use crate::detect::heuristic::{DetectorError, HeuristicDetector};
use crate::detect::reconcile::FalsePositiveReconciler;
use crate::detect::remote::{RemoteGuardClient, RemoteGuardError};
use crate::detect::rules::ThreatCategory;
use crate::generate::{GENERATION_TIMEOUT, GeneratorError, TextGenerator};
use crate::honeypot::HoneypotResponder;
use crate::verdict::{REASON_AUTH_FAILED, REASON_SCAN_DISABLED, Verdict, VerdictSource};

/// Model requested from the generation backend when none is configured.
pub const DEFAULT_MODEL: &str = "llama3.1";

// ── ScanPhase ──────────────────────────────────────────────────────────

/// Named phase of the per-request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Detection-only pass over raw input while scanning is disabled.
    HoneypotCheck,
    /// Pre-generation scan of the user input.
    InputScan,
    /// The call into the text generator.
    Generation,
    /// Post-generation scan of the produced text.
    OutputScan,
    /// False-positive review of a blocked output verdict.
    Reconciliation,
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HoneypotCheck => write!(f, "honeypot_check"),
            Self::InputScan => write!(f, "input_scan"),
            Self::Generation => write!(f, "generation"),
            Self::OutputScan => write!(f, "output_scan"),
            Self::Reconciliation => write!(f, "reconciliation"),
        }
    }
}

// ── ScanRequest ────────────────────────────────────────────────────────

/// One inbound request to the gateway.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// The user-submitted text to scan and analyze.
    pub text: String,
    /// Optional context prefixed to the prompt before generation.
    pub context: Option<String>,
    /// Caller identity for the audit record.
    pub identity: RequestIdentity,
}

impl ScanRequest {
    /// Create a request from user text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
            identity: RequestIdentity::default(),
        }
    }

    /// Attach context to prefix the generation prompt.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach caller identity.
    #[must_use]
    pub fn with_identity(mut self, identity: RequestIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// The prompt handed to the generator: context-prefixed when present.
    #[must_use]
    fn prompt(&self) -> String {
        match &self.context {
            Some(context) => format!("{context}\n\n{}", self.text),
            None => self.text.clone(),
        }
    }
}

// ── ScanReport ─────────────────────────────────────────────────────────

/// The verdicts accumulated by one request, as exposed to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Verdict of the input scan.
    pub input_verdict: Verdict,
    /// Verdict of the output scan, when one ran.
    pub output_verdict: Option<Verdict>,
}

impl ScanReport {
    /// Whether a scan actually ran (as opposed to the disabled paths,
    /// where the input verdict is only a placeholder).
    #[must_use]
    pub fn scan_completed(&self) -> bool {
        self.input_verdict.source != VerdictSource::Disabled
    }
}

// ── ScanOutcome ────────────────────────────────────────────────────────

/// Terminal success state of a request.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// The generator ran and its output cleared scanning (or scanning was
    /// off).
    Generated {
        /// The generated text.
        content: String,
        /// The model that produced it.
        model: String,
        /// The verdicts accumulated along the way.
        report: ScanReport,
    },
    /// Scanning was off, an attack pattern was detected, and a decoy was
    /// served without ever invoking the generator.
    Honeypotted {
        /// The decoy text.
        content: String,
        /// Category of the detected pattern.
        category: ThreatCategory,
        /// The detection verdict recorded for audit.
        verdict: Verdict,
    },
}

impl ScanOutcome {
    /// The text handed back to the caller.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Generated { content, .. } | Self::Honeypotted { content, .. } => content,
        }
    }
}

// ── GatewayError ───────────────────────────────────────────────────────

/// Terminal failure states of a request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A scan blocked the request.  Authoritative; never retried.
    #[error("content blocked by security scan: {reason}")]
    Blocked {
        /// Reason of the blocking verdict.
        reason: String,
        /// Phase in which the block was decided.
        phase: ScanPhase,
        /// Both verdicts, for the error payload.
        report: ScanReport,
    },

    /// The generation backend failed.
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

// ── ScanGateway ────────────────────────────────────────────────────────

/// Composes policy, detectors, honeypot, generator, and audit log into
/// the full request lifecycle.
pub struct ScanGateway {
    policy: Arc<PolicyStore>,
    audit: Arc<AuditLog>,
    detector: HeuristicDetector,
    remote: RemoteGuardClient,
    reconciler: FalsePositiveReconciler,
    honeypot: HoneypotResponder,
    generator: Arc<dyn TextGenerator>,
    model: String,
    generation_timeout: Duration,
}

impl std::fmt::Debug for ScanGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanGateway")
            .field("model", &self.model)
            .field("generation_timeout", &self.generation_timeout)
            .finish_non_exhaustive()
    }
}

impl ScanGateway {
    /// Start building a gateway around the given generator.
    #[must_use]
    pub fn builder(generator: Arc<dyn TextGenerator>) -> GatewayBuilder {
        GatewayBuilder {
            policy: None,
            audit: None,
            detector: None,
            remote: None,
            generator,
            model: DEFAULT_MODEL.to_owned(),
            generation_timeout: GENERATION_TIMEOUT,
        }
    }

    /// The shared policy store.
    #[must_use]
    pub fn policy(&self) -> &Arc<PolicyStore> {
        &self.policy
    }

    /// The shared audit log.
    #[must_use]
    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Run one request through the full lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Blocked`] when a scan blocks the request
    /// (after an audit event has been appended), or
    /// [`GatewayError::Generator`] when the backend fails.
    pub async fn handle(&self, request: ScanRequest) -> Result<ScanOutcome, GatewayError> {
        let config = self.policy.snapshot();

        if !config.enabled {
            return self.handle_disabled(request).await;
        }

        // InputScan: the generator is never invoked past a block here.
        let input_verdict = self
            .scan_text(&request.text, &config, ScanPhase::InputScan)
            .await;
        if input_verdict.is_block() {
            tracing::info!(
                phase = %ScanPhase::InputScan,
                reason = %input_verdict.reason,
                source = %input_verdict.source,
                "input blocked",
            );
            let report = ScanReport {
                input_verdict: input_verdict.clone(),
                output_verdict: None,
            };
            self.audit.append(
                SecurityEvent::builder(request.text.as_str(), input_verdict.clone())
                    .blocked(true)
                    .identity(request.identity)
                    .build(),
            );
            return Err(GatewayError::Blocked {
                reason: input_verdict.reason,
                phase: ScanPhase::InputScan,
                report,
            });
        }

        // Generation
        let content = self.generate(&request).await?;

        // OutputScan
        let raw_output_verdict = self
            .scan_text(&content, &config, ScanPhase::OutputScan)
            .await;

        let output_verdict = if raw_output_verdict.is_block() {
            // Reconciliation: only reachable with an allowed input.
            match self.reconciler.reconcile(&content, &raw_output_verdict) {
                Some(overridden) => overridden,
                None => {
                    tracing::info!(
                        phase = %ScanPhase::Reconciliation,
                        reason = %raw_output_verdict.reason,
                        "output block upheld",
                    );
                    let report = ScanReport {
                        input_verdict: input_verdict.clone(),
                        output_verdict: Some(raw_output_verdict.clone()),
                    };
                    self.audit.append(
                        SecurityEvent::builder(request.text.as_str(), input_verdict)
                            .ai_response(content.as_str())
                            .output_verdict(raw_output_verdict.clone())
                            .blocked(true)
                            .identity(request.identity)
                            .build(),
                    );
                    return Err(GatewayError::Blocked {
                        reason: raw_output_verdict.reason,
                        phase: ScanPhase::OutputScan,
                        report,
                    });
                }
            }
        } else {
            raw_output_verdict
        };

        // Allowed
        let report = ScanReport {
            input_verdict: input_verdict.clone(),
            output_verdict: Some(output_verdict.clone()),
        };
        self.audit.append(
            SecurityEvent::builder(request.text.as_str(), input_verdict)
                .ai_response(content.as_str())
                .output_verdict(output_verdict)
                .identity(request.identity)
                .build(),
        );
        Ok(ScanOutcome::Generated {
            content,
            model: self.model.clone(),
            report,
        })
    }

    /// The disabled-policy paths: honeypot check, else unscanned
    /// generation.
    async fn handle_disabled(&self, request: ScanRequest) -> Result<ScanOutcome, GatewayError> {
        // HoneypotCheck: detection only, never a block.
        if let Some(hit) = self.detector.detect(&request.text) {
            tracing::warn!(
                phase = %ScanPhase::HoneypotCheck,
                rule = %hit.rule_id,
                category = %hit.category,
                "attack pattern detected while scanning disabled; serving decoy",
            );
            let verdict = Verdict::block(hit.reason.clone(), VerdictSource::Disabled);
            let decoy = self.honeypot.respond(&request.text, hit.category);
            self.audit.append(
                SecurityEvent::builder(request.text.as_str(), verdict.clone())
                    .ai_response(decoy.as_str())
                    .honeypot(true)
                    .identity(request.identity)
                    .build(),
            );
            return Ok(ScanOutcome::Honeypotted {
                content: decoy,
                category: hit.category,
                verdict,
            });
        }

        // Scanning is fully opt-in: no scanning at all on this path.
        let input_verdict = Verdict::allow(REASON_SCAN_DISABLED, VerdictSource::Disabled);
        let content = self.generate(&request).await?;
        let report = ScanReport {
            input_verdict: input_verdict.clone(),
            output_verdict: None,
        };
        self.audit.append(
            SecurityEvent::builder(request.text.as_str(), input_verdict)
                .ai_response(content.as_str())
                .identity(request.identity)
                .build(),
        );
        Ok(ScanOutcome::Generated {
            content,
            model: self.model.clone(),
            report,
        })
    }

    /// Invoke the generator with an explicit timeout.
    async fn generate(&self, request: &ScanRequest) -> Result<String, GeneratorError> {
        let prompt = request.prompt();
        tracing::debug!(
            phase = %ScanPhase::Generation,
            model = %self.model,
            prompt_len = prompt.len(),
            "invoking text generator",
        );
        match tokio::time::timeout(
            self.generation_timeout,
            self.generator.generate(&prompt, &self.model),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GeneratorError::Network {
                reason: format!(
                    "generation timed out after {}s",
                    self.generation_timeout.as_secs(),
                ),
            }),
        }
    }

    /// Scan text with whichever detector the policy selects.
    ///
    /// Remote transport failures are recovered here via heuristic
    /// fallback; credential rejections become an authoritative block.
    async fn scan_text(&self, text: &str, config: &PolicyConfig, phase: ScanPhase) -> Verdict {
        if config.has_remote_credentials() {
            match self.remote.scan(text, config).await {
                Ok(verdict) => verdict,
                Err(RemoteGuardError::Auth) => {
                    tracing::error!(
                        phase = %phase,
                        "remote guard rejected credentials; treating as authoritative block",
                    );
                    Verdict::block(REASON_AUTH_FAILED, VerdictSource::Remote)
                }
                Err(RemoteGuardError::Transport { reason }) => {
                    tracing::warn!(
                        phase = %phase,
                        %reason,
                        "remote guard unreachable; falling back to heuristic detector",
                    );
                    self.detector.scan(text)
                }
            }
        } else {
            tracing::debug!(phase = %phase, "no remote credentials configured; heuristic scan");
            self.detector.scan(text)
        }
    }
}

// ── GatewayBuilder ─────────────────────────────────────────────────────

/// Builder for [`ScanGateway`].
pub struct GatewayBuilder {
    policy: Option<Arc<PolicyStore>>,
    audit: Option<Arc<AuditLog>>,
    detector: Option<HeuristicDetector>,
    remote: Option<RemoteGuardClient>,
    generator: Arc<dyn TextGenerator>,
    model: String,
    generation_timeout: Duration,
}

impl GatewayBuilder {
    /// Use a shared policy store (defaults to a fresh one).
    #[must_use]
    pub fn policy(mut self, policy: Arc<PolicyStore>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Use a shared audit log (defaults to a fresh in-memory log).
    #[must_use]
    pub fn audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Use a custom heuristic detector (defaults to the built-in table).
    #[must_use]
    pub fn detector(mut self, detector: HeuristicDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Use a custom remote guard client.
    #[must_use]
    pub fn remote(mut self, remote: RemoteGuardClient) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Set the model requested from the generator.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the generation timeout.
    #[must_use]
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError`] if the default heuristic detector fails
    /// to compile (only possible with a corrupted rule table).
    pub fn build(self) -> Result<ScanGateway, DetectorError> {
        let detector = match self.detector {
            Some(detector) => detector,
            None => HeuristicDetector::with_defaults()?,
        };
        Ok(ScanGateway {
            policy: self.policy.unwrap_or_default(),
            audit: self.audit.unwrap_or_else(|| Arc::new(AuditLog::in_memory())),
            detector,
            remote: self.remote.unwrap_or_default(),
            reconciler: FalsePositiveReconciler::new(),
            honeypot: HoneypotResponder::new(),
            generator: self.generator,
            model: self.model,
            generation_timeout: self.generation_timeout,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

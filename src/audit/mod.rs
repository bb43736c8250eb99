//! Append-only, capacity-bounded audit trail of scan decisions.
//!
//! Every scanned request terminates in exactly one [`SecurityEvent`].
//! The log enforces a retention cap with FIFO eviction: appends beyond
//! capacity drop the oldest record.  Queries return newest-first.
//!
//! Storage sits behind the [`EventStore`] trait.  Only
//! [`InMemoryStore`] ships; durable persistence is deliberately out of
//! scope (see DESIGN.md).

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detect::rules::ThreatCategory;
use crate::verdict::Verdict;

/// Default retention cap.
pub const DEFAULT_RETENTION: usize = 1000;

// ── RequestIdentity ────────────────────────────────────────────────────

/// Caller identity attached to a scan, when known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestIdentity {
    /// Stable user identifier.
    pub user_id: Option<String>,
    /// Display name.
    pub username: Option<String>,
}

// ── SecurityEvent ──────────────────────────────────────────────────────

/// One immutable record of a scan decision.
///
/// Invariants: `blocked` is `true` iff the request's final outcome (after
/// reconciliation) was a block; `honeypot` is `true` only when scanning
/// was disabled and a decoy was served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Event identifier.
    pub id: Uuid,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// The user-submitted text that was scanned.
    pub user_input: String,
    /// Generated (or decoy) text, when any was produced.
    pub ai_response: Option<String>,
    /// Verdict of the input scan.
    pub input_verdict: Verdict,
    /// Verdict of the output scan, when one ran.
    pub output_verdict: Option<Verdict>,
    /// Whether the final outcome was a block.
    pub blocked: bool,
    /// Whether a honeypot decoy was served.
    pub honeypot: bool,
    /// Caller user identifier, if known.
    pub user_id: Option<String>,
    /// Caller display name, if known.
    pub username: Option<String>,
}

impl SecurityEvent {
    /// Start building an event from the scanned input and its verdict.
    #[must_use]
    pub fn builder(user_input: impl Into<String>, input_verdict: Verdict) -> SecurityEventBuilder {
        SecurityEventBuilder {
            user_input: user_input.into(),
            ai_response: None,
            input_verdict,
            output_verdict: None,
            blocked: false,
            honeypot: false,
            identity: RequestIdentity::default(),
        }
    }
}

/// Builder for [`SecurityEvent`].
#[derive(Debug)]
pub struct SecurityEventBuilder {
    user_input: String,
    ai_response: Option<String>,
    input_verdict: Verdict,
    output_verdict: Option<Verdict>,
    blocked: bool,
    honeypot: bool,
    identity: RequestIdentity,
}

impl SecurityEventBuilder {
    /// Attach the generated (or decoy) response text.
    #[must_use]
    pub fn ai_response(mut self, response: impl Into<String>) -> Self {
        self.ai_response = Some(response.into());
        self
    }

    /// Attach the output-scan verdict.
    #[must_use]
    pub fn output_verdict(mut self, verdict: Verdict) -> Self {
        self.output_verdict = Some(verdict);
        self
    }

    /// Mark the final outcome as a block.
    #[must_use]
    pub fn blocked(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }

    /// Mark the event as a served honeypot decoy.
    #[must_use]
    pub fn honeypot(mut self, honeypot: bool) -> Self {
        self.honeypot = honeypot;
        self
    }

    /// Attach caller identity.
    #[must_use]
    pub fn identity(mut self, identity: RequestIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Finalize the event, stamping id and timestamp.
    #[must_use]
    pub fn build(self) -> SecurityEvent {
        SecurityEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_input: self.user_input,
            ai_response: self.ai_response,
            input_verdict: self.input_verdict,
            output_verdict: self.output_verdict,
            blocked: self.blocked,
            honeypot: self.honeypot,
            user_id: self.identity.user_id,
            username: self.identity.username,
        }
    }
}

// ── EventFilter ────────────────────────────────────────────────────────

/// Query filter for audit listings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventFilter {
    /// Every event.
    #[default]
    All,
    /// Events whose final outcome was a block.
    Blocked,
    /// Events whose final outcome was an allow (honeypots excluded).
    Allowed,
    /// Honeypot decoy events.
    Honeypot,
    /// Events whose input or output verdict names the given category.
    Category(ThreatCategory),
}

impl EventFilter {
    /// Parse the `type` query parameter used by the HTTP surface.
    /// Unknown or absent values mean "no filter".
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("blocked") => Self::Blocked,
            Some("allowed") => Self::Allowed,
            Some("honeypot") => Self::Honeypot,
            _ => Self::All,
        }
    }

    /// Whether `event` passes this filter.
    #[must_use]
    pub fn matches(&self, event: &SecurityEvent) -> bool {
        match self {
            Self::All => true,
            Self::Blocked => event.blocked,
            Self::Allowed => !event.blocked && !event.honeypot,
            Self::Honeypot => event.honeypot,
            Self::Category(category) => {
                let prefix = category.to_string();
                let names = |v: &Verdict| v.reason.starts_with(&prefix);
                names(&event.input_verdict)
                    || event.output_verdict.as_ref().is_some_and(names)
            }
        }
    }
}

// ── Pagination ─────────────────────────────────────────────────────────

/// Pagination envelope returned alongside report slices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: usize,
    /// Requested page size.
    pub limit: usize,
    /// Total matching events.
    pub total: usize,
    /// Total pages at this limit.
    pub pages: usize,
}

// ── EventStore ─────────────────────────────────────────────────────────

/// Storage seam for audit events.
///
/// Implementations own the retention policy.  `events` returns an
/// oldest-first snapshot; ordering and filtering live in [`AuditLog`].
pub trait EventStore: Send + Sync {
    /// Append one event, evicting as needed.
    fn append(&self, event: SecurityEvent);
    /// Snapshot of retained events, oldest first.
    fn events(&self) -> Vec<SecurityEvent>;
    /// Drop all retained events.
    fn clear(&self);
    /// Number of retained events.
    fn len(&self) -> usize;
}

/// Capacity-bounded in-memory store with FIFO eviction.
#[derive(Debug)]
pub struct InMemoryStore {
    inner: RwLock<VecDeque<SecurityEvent>>,
    capacity: usize,
}

impl InMemoryStore {
    /// Create a store retaining at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(VecDeque::new()),
            capacity,
        }
    }
}

impl EventStore for InMemoryStore {
    fn append(&self, event: SecurityEvent) {
        let mut events = self.inner.write().unwrap();
        events.push_back(event);
        while events.len() > self.capacity {
            let evicted = events.pop_front();
            if let Some(evicted) = evicted {
                tracing::debug!(event_id = %evicted.id, "retention cap reached, oldest event evicted");
            }
        }
    }

    fn events(&self) -> Vec<SecurityEvent> {
        self.inner.read().unwrap().iter().cloned().collect()
    }

    fn clear(&self) {
        self.inner.write().unwrap().clear();
    }

    fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }
}

// ── AuditLog ───────────────────────────────────────────────────────────

/// The audit trail: one appended event per scanned request.
pub struct AuditLog {
    store: Box<dyn EventStore>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("len", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl AuditLog {
    /// In-memory log with the default retention cap.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_capacity(DEFAULT_RETENTION)
    }

    /// In-memory log with a custom retention cap.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: Box::new(InMemoryStore::new(capacity)),
        }
    }

    /// Log backed by a caller-provided store.
    #[must_use]
    pub fn with_store(store: Box<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Append one event.
    pub fn append(&self, event: SecurityEvent) {
        tracing::debug!(
            event_id = %event.id,
            blocked = event.blocked,
            honeypot = event.honeypot,
            "audit event recorded",
        );
        self.store.append(event);
    }

    /// Matching events, newest first.
    #[must_use]
    pub fn list(&self, filter: &EventFilter) -> Vec<SecurityEvent> {
        self.store
            .events()
            .into_iter()
            .rev()
            .filter(|e| filter.matches(e))
            .collect()
    }

    /// A newest-first page of matching events plus its pagination
    /// envelope.  `page` is 1-based; `limit` of zero is clamped to one.
    #[must_use]
    pub fn page(
        &self,
        page: usize,
        limit: usize,
        filter: &EventFilter,
    ) -> (Vec<SecurityEvent>, Pagination) {
        let page = page.max(1);
        let limit = limit.max(1);
        let matching = self.list(filter);
        let total = matching.len();
        let pages = total.div_ceil(limit);

        let slice: Vec<SecurityEvent> = matching
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();

        (
            slice,
            Pagination {
                page,
                limit,
                total,
                pages,
            },
        )
    }

    /// Drop every retained event.
    pub fn clear(&self) {
        self.store.clear();
        tracing::info!("audit log cleared");
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

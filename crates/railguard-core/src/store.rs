use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::ComplianceError;
use crate::types::{ComplianceLogEntry, DepositEvent, UserComplianceState};
use crate::ComplianceResult;

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// Access to per-user compliance records. Injected into each component at
/// construction; there are no process-wide singletons.
///
/// `with_user` runs the closure under that user's entry lock, making
/// check-then-update sequences atomic per user. Commits and period resets
/// both go through it, so they serialize against each other.
pub trait UserStore: Send + Sync {
    fn get(&self, user_id: &str) -> Option<UserComplianceState>;

    fn insert(&self, state: UserComplianceState);

    fn with_user<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserComplianceState) -> R,
    ) -> ComplianceResult<R>;

    fn for_each(&self, f: impl FnMut(&mut UserComplianceState));
}

/// Append-only deposit-event log with range queries per user.
pub trait DepositEventStore: Send + Sync {
    fn append(&self, event: DepositEvent);

    /// Events for a user with `timestamp >= since`, unordered.
    fn events_since(&self, user_id: &str, since: DateTime<Utc>) -> Vec<DepositEvent>;

    fn all_for_user(&self, user_id: &str) -> Vec<DepositEvent>;

    /// Toggle the review flag on an existing event. The only permitted
    /// mutation of a deposit event.
    fn set_flag(&self, event_id: Uuid, reason: &str) -> ComplianceResult<DepositEvent>;
}

/// Append-only audit sink. Entries are never read back for decisions.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: ComplianceLogEntry);
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// Concurrent in-memory user store backed by a DashMap; the map's entry
/// guard provides the per-user lock.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<String, UserComplianceState>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserStore for MemoryUserStore {
    fn get(&self, user_id: &str) -> Option<UserComplianceState> {
        self.users.get(user_id).map(|entry| entry.value().clone())
    }

    fn insert(&self, state: UserComplianceState) {
        self.users.insert(state.user_id.clone(), state);
    }

    fn with_user<R>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserComplianceState) -> R,
    ) -> ComplianceResult<R> {
        let mut entry = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| ComplianceError::user_not_found(user_id))?;
        Ok(f(entry.value_mut()))
    }

    fn for_each(&self, mut f: impl FnMut(&mut UserComplianceState)) {
        for mut entry in self.users.iter_mut() {
            f(entry.value_mut());
        }
    }
}

/// In-memory deposit-event log keyed by user.
#[derive(Debug, Default)]
pub struct MemoryDepositStore {
    events: DashMap<String, Vec<DepositEvent>>,
}

impl MemoryDepositStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DepositEventStore for MemoryDepositStore {
    fn append(&self, event: DepositEvent) {
        self.events
            .entry(event.user_id.clone())
            .or_default()
            .push(event);
    }

    fn events_since(&self, user_id: &str, since: DateTime<Utc>) -> Vec<DepositEvent> {
        self.events
            .get(user_id)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|e| e.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn all_for_user(&self, user_id: &str) -> Vec<DepositEvent> {
        self.events
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn set_flag(&self, event_id: Uuid, reason: &str) -> ComplianceResult<DepositEvent> {
        for mut entry in self.events.iter_mut() {
            if let Some(event) = entry.value_mut().iter_mut().find(|e| e.id == event_id) {
                event.flagged = true;
                event.flag_reason = Some(reason.to_string());
                return Ok(event.clone());
            }
        }
        Err(ComplianceError::NotFound {
            entity: "deposit event",
            id: event_id.to_string(),
        })
    }
}

/// In-memory audit log, readable for tests and review tooling.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: RwLock<Vec<ComplianceLogEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ComplianceLogEntry> {
        self.entries.read().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, entry: ComplianceLogEntry) {
        self.entries.write().push(entry);
    }
}

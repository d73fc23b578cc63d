//! Security event sink.
//!
//! Rejected identifiers and path escapes are reported to a [`SecuritySink`]
//! injected into the store. [`AuditRing`] is the in-process implementation:
//! a bounded ring that evicts the oldest event when full.
//!
//! ```text
//!   open(cap) ──► record … record ──► close() ──► drained events
//!                 [e1 e2 … e_cap]       later records are dropped
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::types::DocumentType;

/// Category of security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventKind {
    /// Identifier failed sanitization
    InvalidIdentifier,
    /// Constructed path resolved outside the history root
    PathEscape,
}

/// A single recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEvent {
    pub at: DateTime<Utc>,
    pub kind: SecurityEventKind,
    pub document_type: DocumentType,
    /// Offending identifier or path, escaped for logging
    pub detail: String,
}

impl SecurityEvent {
    pub fn new(kind: SecurityEventKind, document_type: DocumentType, detail: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            kind,
            document_type,
            detail: detail.into(),
        }
    }
}

/// Receiver for security events.
pub trait SecuritySink: Send + Sync {
    fn record(&self, event: SecurityEvent);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SecuritySink for NullSink {
    fn record(&self, _event: SecurityEvent) {}
}

struct RingState {
    events: VecDeque<SecurityEvent>,
    capacity: usize,
    open: bool,
    evicted: u64,
    dropped: u64,
}

/// Bounded in-memory event ring with an explicit open/close lifecycle.
pub struct AuditRing {
    state: Mutex<RingState>,
}

impl AuditRing {
    /// Open a ring holding at most `capacity` events.
    pub fn open(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RingState {
                events: VecDeque::with_capacity(capacity),
                capacity,
                open: true,
                evicted: 0,
                dropped: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the retained events, oldest first.
    pub fn snapshot(&self) -> Vec<SecurityEvent> {
        self.lock().events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Events pushed out by newer ones.
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    /// Events offered after `close`.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Stop accepting events and drain what was retained.
    pub fn close(&self) -> Vec<SecurityEvent> {
        let mut state = self.lock();
        state.open = false;
        state.events.drain(..).collect()
    }
}

impl SecuritySink for AuditRing {
    fn record(&self, event: SecurityEvent) {
        let mut state = self.lock();
        if !state.open {
            state.dropped += 1;
            log::debug!("Audit ring closed, dropping {:?} event", event.kind);
            return;
        }
        if state.capacity == 0 {
            state.evicted += 1;
            return;
        }
        if state.events.len() == state.capacity {
            state.events.pop_front();
            state.evicted += 1;
        }
        state.events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(detail: &str) -> SecurityEvent {
        SecurityEvent::new(SecurityEventKind::InvalidIdentifier, DocumentType::Post, detail)
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let ring = AuditRing::open(3);
        for i in 0..5 {
            ring.record(event(&format!("e{i}")));
        }
        let details: Vec<_> = ring.snapshot().into_iter().map(|e| e.detail).collect();
        assert_eq!(details, vec!["e2", "e3", "e4"]);
        assert_eq!(ring.evicted(), 2);
    }

    #[test]
    fn test_close_drains_and_rejects() {
        let ring = AuditRing::open(8);
        ring.record(event("before"));
        let drained = ring.close();
        assert_eq!(drained.len(), 1);
        assert!(!ring.is_open());

        ring.record(event("after"));
        assert!(ring.is_empty());
        assert_eq!(ring.dropped(), 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let ring = AuditRing::open(100);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let ring = Arc::clone(&ring);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        ring.record(event(&format!("t{t}-{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ring.len(), 40);
    }
}

//! Subscription Tracking
//!
//! Bookkeeping for live reading-stream subscriptions.
//!
//! # Design
//!
//! Every subscription is independent: it owns its own timer and value
//! source, and nothing is shared between subscribers on the emission path.
//! The registry only observes them. Each open subscription is represented
//! by a [`SubscriptionHandle`]; dropping the handle unregisters it, so a
//! client disconnect (which drops the response stream and everything it
//! owns) is reflected here without any explicit teardown call.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a subscription (one streaming call).
pub type SubscriptionId = u64;

/// Per-subscription counters.
#[derive(Debug)]
struct SubscriptionEntry {
    opened_at: DateTime<Utc>,
    readings_sent: AtomicU64,
}

/// Snapshot of one live subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    /// Subscription identifier.
    pub id: SubscriptionId,
    /// When the subscription was opened.
    pub opened_at: DateTime<Utc>,
    /// Readings delivered so far.
    pub readings_sent: u64,
}

/// Aggregate subscription statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Currently open subscriptions.
    pub active: usize,
    /// Subscriptions opened since start.
    pub total_opened: u64,
    /// Readings delivered across all subscriptions since start.
    pub readings_emitted: u64,
}

// =============================================================================
// Registry
// =============================================================================

/// Registry of live subscriptions.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use sensor_stream::SubscriptionRegistry;
///
/// let registry = Arc::new(SubscriptionRegistry::new());
///
/// let handle = SubscriptionRegistry::open(&registry, 1);
/// handle.record_reading();
/// assert_eq!(registry.stats().active, 1);
///
/// drop(handle);
/// assert_eq!(registry.stats().active, 0);
/// assert_eq!(registry.stats().readings_emitted, 1);
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    active: RwLock<HashMap<SubscriptionId, Arc<SubscriptionEntry>>>,
    total_opened: AtomicU64,
    readings_emitted: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscription.
    ///
    /// The subscription stays registered for as long as the returned handle
    /// is alive. Reusing an id that is still active replaces the previous
    /// entry's counters.
    #[must_use]
    pub fn open(registry: &Arc<Self>, id: SubscriptionId) -> SubscriptionHandle {
        let entry = Arc::new(SubscriptionEntry {
            opened_at: Utc::now(),
            readings_sent: AtomicU64::new(0),
        });
        registry.active.write().insert(id, Arc::clone(&entry));
        registry.total_opened.fetch_add(1, Ordering::Relaxed);

        SubscriptionHandle {
            id,
            entry,
            registry: Arc::clone(registry),
        }
    }

    /// Number of currently open subscriptions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    /// Snapshot of all live subscriptions, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<SubscriptionInfo> {
        let mut infos: Vec<_> = self
            .active
            .read()
            .iter()
            .map(|(id, entry)| entry_info(*id, entry))
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Aggregate statistics.
    #[must_use]
    pub fn stats(&self) -> SubscriptionStats {
        SubscriptionStats {
            active: self.active_count(),
            total_opened: self.total_opened.load(Ordering::Relaxed),
            readings_emitted: self.readings_emitted.load(Ordering::Relaxed),
        }
    }

    fn close(&self, id: SubscriptionId, entry: &Arc<SubscriptionEntry>) {
        let mut active = self.active.write();
        // Only remove our own entry; the id may have been re-registered.
        if active.get(&id).is_some_and(|current| Arc::ptr_eq(current, entry)) {
            active.remove(&id);
        }
    }
}

fn entry_info(id: SubscriptionId, entry: &SubscriptionEntry) -> SubscriptionInfo {
    SubscriptionInfo {
        id,
        opened_at: entry.opened_at,
        readings_sent: entry.readings_sent.load(Ordering::Relaxed),
    }
}

// =============================================================================
// Handle
// =============================================================================

/// RAII registration of one live subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    entry: Arc<SubscriptionEntry>,
    registry: Arc<SubscriptionRegistry>,
}

impl SubscriptionHandle {
    /// Subscription identifier.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Count one reading delivered on this subscription.
    pub fn record_reading(&self) {
        self.entry.readings_sent.fetch_add(1, Ordering::Relaxed);
        self.registry
            .readings_emitted
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Readings delivered on this subscription so far.
    #[must_use]
    pub fn readings_sent(&self) -> u64 {
        self.entry.readings_sent.load(Ordering::Relaxed)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.registry.close(self.id, &self.entry);
    }
}

// =============================================================================
// Tests
// =============================================================================

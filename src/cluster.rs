//! Counter clusters.
//!
//! A cluster is a group of counter cells (one per [`CounterKind`]) sharing
//! a key and a reference count. The registry owns every cluster and
//! serializes structural access under its lock; cell mutation stays
//! lock-free.
//!
//! Structural fields use atomics only because clusters sit behind `Arc`
//! so producer handles can reach their cells without the lock. Every
//! structural mutation still happens with the registry lock held.

use crate::component::Component;
use crate::counter::{CounterCell, CounterKind};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

/// The identity of a cluster: component plus two free-form strings.
///
/// `id` names the configuration element the counters belong to; `instance`
/// distinguishes several counter sets managed by the same element (a
/// destination file writer uses the expanded filename, a TCP source uses
/// the client address). Absent values are normalized to empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterKey {
    /// Packed component kind and direction.
    pub component: Component,
    /// Identifier of the owning configuration element.
    pub id: String,
    /// Sub-identifier within the owning element.
    pub instance: String,
}

impl ClusterKey {
    pub(crate) fn new(component: Component, id: Option<&str>, instance: Option<&str>) -> Self {
        Self {
            component,
            id: id.unwrap_or("").to_owned(),
            instance: instance.unwrap_or("").to_owned(),
        }
    }
}

/// A group of counter cells sharing a key and a reference count.
pub struct StatsCluster {
    key: ClusterKey,
    cells: [CounterCell; CounterKind::COUNT],
    live_mask: AtomicU8,
    ref_cnt: AtomicU32,
    dynamic: AtomicBool,
}

impl StatsCluster {
    pub(crate) fn new(key: ClusterKey) -> Self {
        Self {
            key,
            cells: std::array::from_fn(|_| CounterCell::new()),
            live_mask: AtomicU8::new(0),
            ref_cnt: AtomicU32::new(1),
            dynamic: AtomicBool::new(false),
        }
    }

    /// The cluster's key.
    pub fn key(&self) -> &ClusterKey {
        &self.key
    }

    /// The cell for `kind`.
    ///
    /// A cell whose kind was never registered reads as zero but carries no
    /// meaning; publication skips it.
    pub fn counter(&self, kind: CounterKind) -> &CounterCell {
        &self.cells[kind as usize]
    }

    /// Whether `kind` has ever been registered in this cluster.
    pub fn is_live(&self, kind: CounterKind) -> bool {
        self.live_mask.load(Ordering::Relaxed) & kind.mask() != 0
    }

    pub(crate) fn mark_live(&self, kind: CounterKind) {
        self.live_mask.fetch_or(kind.mask(), Ordering::Relaxed);
    }

    /// Iterate the `(kind, cell)` pairs registered at least once, in
    /// ordinal kind order.
    pub fn live_counters(&self) -> impl Iterator<Item = (CounterKind, &CounterCell)> + '_ {
        let mask = self.live_mask.load(Ordering::Relaxed);
        CounterKind::ALL
            .iter()
            .filter(move |kind| mask & kind.mask() != 0)
            .map(|&kind| (kind, &self.cells[kind as usize]))
    }

    /// Number of outstanding (kind, registration) pairs.
    pub fn ref_count(&self) -> u32 {
        self.ref_cnt.load(Ordering::Relaxed)
    }

    pub(crate) fn ref_inc(&self) {
        self.ref_cnt.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn ref_dec(&self) {
        let prev = self.ref_cnt.fetch_sub(1, Ordering::Relaxed);
        assert!(prev > 0, "unbalanced counter unregistration");
    }

    /// Whether the cluster is eligible for expiration-driven pruning.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic.load(Ordering::Relaxed)
    }

    pub(crate) fn set_dynamic(&self) {
        self.dynamic.store(true, Ordering::Relaxed);
    }

    /// The expiration decision for one publish-and-prune pass.
    ///
    /// Static clusters never expire. A dynamic cluster expires only when
    /// nothing references it, it carries a stamp, and the stamp is at
    /// least `lifetime` seconds behind `now`.
    pub fn is_expired(&self, now: i64, lifetime: u64) -> bool {
        if !self.is_dynamic() {
            return false;
        }
        if self.ref_count() > 0 {
            return false;
        }
        if !self.is_live(CounterKind::Stamp) {
            return false;
        }
        let stamp = self.counter(CounterKind::Stamp).get();
        stamp <= now - lifetime as i64
    }
}

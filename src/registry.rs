//! The counter registry.
//!
//! The registry is a hash map from [`ClusterKey`] to [`StatsCluster`],
//! protected by a single non-reentrant mutex. All structural operations
//! (registration, unregistration, iteration, removal) go through the
//! [`StatsLock`] guard returned by [`StatsRegistry::lock`], so the
//! "caller must hold the registry lock" contract holds by construction
//! and producers batch many registrations under one acquisition.
//!
//! The hot path does not touch the lock: a [`CounterHandle`] obtained
//! while registered reaches its cell through a cheap shared reference and
//! increments it with a single atomic operation.
//!
//! # Threading
//!
//! Once registered, mutating a counter through its handle is safe from any
//! thread. The mutex is not reentrant; acquiring it twice from one thread
//! deadlocks.

use crate::cluster::{ClusterKey, StatsCluster};
use crate::component::Component;
use crate::config::StatsOptions;
use crate::counter::{CounterCell, CounterKind};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::ops::Deref;
use std::sync::Arc;

type ClusterMap = HashMap<ClusterKey, Arc<StatsCluster>, ahash::RandomState>;

/// A borrowed reference to one counter cell, valid for mutation while the
/// producer's registration is outstanding.
///
/// Handles are cheap to clone and may be used from any thread without the
/// registry lock. Dropping a handle does not unregister it; producers must
/// pair every registration with an unregistration.
#[derive(Clone)]
pub struct CounterHandle {
    cluster: Arc<StatsCluster>,
    kind: CounterKind,
}

impl CounterHandle {
    /// The kind this handle was registered for.
    pub fn kind(&self) -> CounterKind {
        self.kind
    }

    #[inline]
    fn cell(&self) -> &CounterCell {
        self.cluster.counter(self.kind)
    }

    /// Increment by one.
    #[inline]
    pub fn inc(&self) {
        self.cell().inc();
    }

    /// Decrement by one.
    #[inline]
    pub fn dec(&self) {
        self.cell().dec();
    }

    /// Add `delta` to the counter.
    #[inline]
    pub fn add(&self, delta: i64) {
        self.cell().add(delta);
    }

    /// Overwrite the value; used for the `Stamp` kind.
    #[inline]
    pub fn set(&self, value: i64) {
        self.cell().set(value);
    }

    /// Load the current value.
    #[inline]
    pub fn get(&self) -> i64 {
        self.cell().get()
    }
}

/// A reference to a dynamic cluster, handed out by
/// [`StatsLock::register_dynamic_counter`] so related counter kinds can be
/// attached without another key lookup.
#[derive(Clone)]
pub struct ClusterHandle {
    inner: Arc<StatsCluster>,
}

impl Deref for ClusterHandle {
    type Target = StatsCluster;

    fn deref(&self) -> &StatsCluster {
        &self.inner
    }
}

/// The process-wide statistics registry.
///
/// Constructed once at daemon startup, shared by reference with every
/// producer, and torn down at exit. There is deliberately no global
/// instance.
pub struct StatsRegistry {
    clusters: Mutex<ClusterMap>,
    options: RwLock<StatsOptions>,
}

impl StatsRegistry {
    /// Create an empty registry with the given options.
    pub fn new(options: StatsOptions) -> Self {
        Self {
            clusters: Mutex::new(ClusterMap::default()),
            options: RwLock::new(options),
        }
    }

    /// Acquire the registry lock.
    ///
    /// Producers are expected to acquire once and batch their
    /// registrations; the lock is not on the steady-state counting path.
    pub fn lock(&self) -> StatsLock<'_> {
        StatsLock {
            registry: self,
            clusters: self.clusters.lock(),
        }
    }

    /// The current options.
    pub fn options(&self) -> StatsOptions {
        *self.options.read()
    }

    /// Replace the options.
    pub fn set_options(&self, options: StatsOptions) {
        *self.options.write() = options;
    }

    /// Whether a counter declared at `level` materializes right now.
    pub fn check_level(&self, level: u8) -> bool {
        self.options.read().check_level(level)
    }
}

/// Guard over the registry lock; every structural operation lives here.
pub struct StatsLock<'a> {
    registry: &'a StatsRegistry,
    clusters: MutexGuard<'a, ClusterMap>,
}

impl StatsLock<'_> {
    /// Look up or create the cluster for a key, bumping its reference
    /// count. Returns the cluster and whether it is new (created, or
    /// revived from an orphaned state with no outstanding registrations).
    fn add_counter(
        &mut self,
        level: u8,
        component: Component,
        id: Option<&str>,
        instance: Option<&str>,
    ) -> Option<(Arc<StatsCluster>, bool)> {
        if !self.registry.check_level(level) {
            return None;
        }

        let key = ClusterKey::new(component, id, instance);
        match self.clusters.entry(key) {
            Entry::Occupied(entry) => {
                let cluster = entry.get().clone();
                // an orphan that simply has not been pruned yet counts as new
                let new = cluster.ref_count() == 0;
                cluster.ref_inc();
                Some((cluster, new))
            }
            Entry::Vacant(entry) => {
                let cluster = Arc::new(StatsCluster::new(entry.key().clone()));
                entry.insert(cluster.clone());
                Some((cluster, true))
            }
        }
    }

    /// Register a counter of `kind` for the given key at the declared
    /// statistics level.
    ///
    /// Returns `None` when the current options gate the level; no cluster
    /// is created in that case and callers must tolerate the absent
    /// handle. Whenever multiple producers touch the same counter, each
    /// registers it under the same key and the cluster is freed only after
    /// all of them have unregistered.
    pub fn register_counter(
        &mut self,
        level: u8,
        component: Component,
        id: Option<&str>,
        instance: Option<&str>,
        kind: CounterKind,
    ) -> Option<CounterHandle> {
        let (cluster, _new) = self.add_counter(level, component, id, instance)?;
        cluster.mark_live(kind);
        Some(CounterHandle { cluster, kind })
    }

    /// Register a dynamic counter: the cluster becomes eligible for
    /// expiration-driven pruning once all registrations are released.
    ///
    /// Returns the cluster handle (for
    /// [`register_associated_counter`](Self::register_associated_counter)),
    /// the counter handle, and a flag that is true when the cluster was
    /// created or revived from an orphaned state.
    ///
    /// # Panics
    ///
    /// Panics if the key already names a static cluster with outstanding
    /// registrations; mixing dynamic and static registration of one key is
    /// a programming error.
    pub fn register_dynamic_counter(
        &mut self,
        level: u8,
        component: Component,
        id: Option<&str>,
        instance: Option<&str>,
        kind: CounterKind,
    ) -> Option<(ClusterHandle, CounterHandle, bool)> {
        let (cluster, new) = self.add_counter(level, component, id, instance)?;
        assert!(
            new || cluster.is_dynamic(),
            "dynamic registration on a static cluster"
        );
        cluster.set_dynamic();
        cluster.mark_live(kind);
        Some((
            ClusterHandle {
                inner: cluster.clone(),
            },
            CounterHandle { cluster, kind },
            new,
        ))
    }

    /// Register another counter kind inside a cluster already obtained
    /// from [`register_dynamic_counter`](Self::register_dynamic_counter),
    /// avoiding a second key lookup.
    ///
    /// # Panics
    ///
    /// Panics if the cluster is not dynamic.
    pub fn register_associated_counter(
        &mut self,
        cluster: &ClusterHandle,
        kind: CounterKind,
    ) -> CounterHandle {
        assert!(
            cluster.inner.is_dynamic(),
            "associated registration on a non-dynamic cluster"
        );
        cluster.inner.mark_live(kind);
        cluster.inner.ref_inc();
        CounterHandle {
            cluster: cluster.inner.clone(),
            kind,
        }
    }

    /// Release a registration made with
    /// [`register_counter`](Self::register_counter).
    ///
    /// A `None` handle is a tolerated no-op, matching the gated
    /// registration path. The cluster itself is never destroyed here;
    /// pruning does that.
    ///
    /// # Panics
    ///
    /// Panics if no cluster exists for the key, the kind was never
    /// registered in it, or the handle does not point at that cluster's
    /// cell.
    pub fn unregister_counter(
        &mut self,
        component: Component,
        id: Option<&str>,
        instance: Option<&str>,
        kind: CounterKind,
        handle: Option<CounterHandle>,
    ) {
        let Some(handle) = handle else {
            return;
        };

        let key = ClusterKey::new(component, id, instance);
        let cluster = self
            .clusters
            .get(&key)
            .expect("unregistering a counter that was never registered");
        assert!(
            cluster.is_live(kind),
            "unregistering a counter kind that was never registered"
        );
        assert!(
            Arc::ptr_eq(cluster, &handle.cluster) && handle.kind == kind,
            "counter handle does not match the registered cell"
        );
        cluster.ref_dec();
    }

    /// Release a registration made with
    /// [`register_dynamic_counter`](Self::register_dynamic_counter) or
    /// [`register_associated_counter`](Self::register_associated_counter),
    /// skipping the key lookup.
    ///
    /// # Panics
    ///
    /// Panics if the kind was never registered in the cluster or the
    /// handle does not point at that cluster's cell.
    pub fn unregister_dynamic_counter(
        &mut self,
        cluster: &ClusterHandle,
        kind: CounterKind,
        handle: CounterHandle,
    ) {
        assert!(
            cluster.inner.is_live(kind),
            "unregistering a counter kind that was never registered"
        );
        assert!(
            Arc::ptr_eq(&cluster.inner, &handle.cluster) && handle.kind == kind,
            "counter handle does not match the registered cell"
        );
        cluster.inner.ref_dec();
    }

    /// Instantly create (if needed) and increment a dynamic `Processed`
    /// counter, stamping it when `timestamp` is nonnegative. All
    /// registrations taken here are released before returning.
    ///
    /// This is the single-shot path for classification events (class,
    /// rule id, tag, severity, facility, sender).
    pub fn register_and_increment_dynamic_counter(
        &mut self,
        level: u8,
        component: Component,
        id: Option<&str>,
        instance: Option<&str>,
        timestamp: i64,
    ) {
        let Some((cluster, counter, _new)) =
            self.register_dynamic_counter(level, component, id, instance, CounterKind::Processed)
        else {
            return;
        };
        counter.inc();
        if timestamp >= 0 {
            let stamp = self.register_associated_counter(&cluster, CounterKind::Stamp);
            stamp.set(timestamp);
            self.unregister_dynamic_counter(&cluster, CounterKind::Stamp, stamp);
        }
        self.unregister_dynamic_counter(&cluster, CounterKind::Processed, counter);
    }

    /// Number of clusters currently registered.
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Look up a cluster by key without registering anything.
    pub fn get_cluster(
        &self,
        component: Component,
        id: Option<&str>,
        instance: Option<&str>,
    ) -> Option<ClusterHandle> {
        let key = ClusterKey::new(component, id, instance);
        self.clusters.get(&key).map(|cluster| ClusterHandle {
            inner: cluster.clone(),
        })
    }

    /// Visit every cluster. Iteration order is unspecified but stable for
    /// the duration of the call.
    pub fn foreach_cluster<F>(&self, mut visitor: F)
    where
        F: FnMut(&StatsCluster),
    {
        for cluster in self.clusters.values() {
            visitor(cluster);
        }
    }

    /// Visit every cluster and remove those for which the predicate
    /// returns true, in a single pass.
    pub fn foreach_cluster_remove<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&StatsCluster) -> bool,
    {
        self.clusters.retain(|_, cluster| !predicate(cluster));
    }

    /// Visit every live `(cluster, kind, cell)` triple.
    pub fn foreach_counter<F>(&self, mut visitor: F)
    where
        F: FnMut(&StatsCluster, CounterKind, &CounterCell),
    {
        for cluster in self.clusters.values() {
            for (kind, cell) in cluster.live_counters() {
                visitor(cluster, kind, cell);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKind;

    fn registry(level: u8) -> StatsRegistry {
        StatsRegistry::new(StatsOptions {
            level,
            ..Default::default()
        })
    }

    #[test]
    fn test_register_creates_cluster() {
        let registry = registry(0);
        let mut lock = registry.lock();
        let counter = lock
            .register_counter(
                0,
                ComponentKind::File.source(),
                Some("s_file"),
                Some("/var/log/messages"),
                CounterKind::Processed,
            )
            .unwrap();
        counter.inc();
        assert_eq!(counter.get(), 1);
        assert_eq!(lock.cluster_count(), 1);
    }

    #[test]
    fn test_same_key_dedupes() {
        let registry = registry(0);
        let mut lock = registry.lock();
        let component = ComponentKind::File.destination();
        let a = lock
            .register_counter(0, component, Some("d"), None, CounterKind::Processed)
            .unwrap();
        let b = lock
            .register_counter(0, component, Some("d"), None, CounterKind::Dropped)
            .unwrap();
        assert_eq!(lock.cluster_count(), 1);

        a.inc();
        b.inc();
        let cluster = lock.get_cluster(component, Some("d"), None).unwrap();
        assert_eq!(cluster.ref_count(), 2);
        assert_eq!(cluster.counter(CounterKind::Processed).get(), 1);
        assert_eq!(cluster.counter(CounterKind::Dropped).get(), 1);
    }

    #[test]
    fn test_level_gate_refuses() {
        let registry = registry(0);
        let mut lock = registry.lock();
        let counter = lock.register_counter(
            1,
            ComponentKind::Tcp.source(),
            Some("s_net"),
            None,
            CounterKind::Processed,
        );
        assert!(counter.is_none());
        assert_eq!(lock.cluster_count(), 0);
    }

    #[test]
    fn test_unregister_none_is_noop() {
        let registry = registry(0);
        let mut lock = registry.lock();
        lock.unregister_counter(
            ComponentKind::Tcp.source(),
            Some("s_net"),
            None,
            CounterKind::Processed,
            None,
        );
        assert_eq!(lock.cluster_count(), 0);
    }

    #[test]
    #[should_panic(expected = "never registered")]
    fn test_unregister_unknown_key_panics() {
        let registry = registry(0);
        let mut lock = registry.lock();
        let counter = lock
            .register_counter(
                0,
                ComponentKind::File.source(),
                Some("a"),
                None,
                CounterKind::Processed,
            )
            .unwrap();
        lock.unregister_counter(
            ComponentKind::File.source(),
            Some("b"),
            None,
            CounterKind::Processed,
            Some(counter),
        );
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_unregister_mismatched_handle_panics() {
        let registry = registry(0);
        let mut lock = registry.lock();
        let component = ComponentKind::File.source();
        let _a = lock
            .register_counter(0, component, Some("a"), None, CounterKind::Processed)
            .unwrap();
        let b = lock
            .register_counter(0, component, Some("b"), None, CounterKind::Processed)
            .unwrap();
        lock.unregister_counter(component, Some("a"), None, CounterKind::Processed, Some(b));
    }

    #[test]
    #[should_panic(expected = "dynamic registration on a static cluster")]
    fn test_dynamic_on_static_panics() {
        let registry = registry(0);
        let mut lock = registry.lock();
        let component = ComponentKind::Sender.source();
        let _held = lock
            .register_counter(0, component, Some("10.0.0.1"), None, CounterKind::Processed)
            .unwrap();
        let _ = lock.register_dynamic_counter(
            0,
            component,
            Some("10.0.0.1"),
            None,
            CounterKind::Processed,
        );
    }
}

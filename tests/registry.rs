//! Integration tests for registration, de-duplication and reference
//! counting.

use stats_core::{ComponentKind, CounterKind, StatsOptions, StatsRegistry};

fn registry_at_level(level: u8) -> StatsRegistry {
    StatsRegistry::new(StatsOptions {
        level,
        ..Default::default()
    })
}

#[test]
fn test_cluster_uniqueness() {
    let registry = registry_at_level(0);
    let mut lock = registry.lock();
    let component = ComponentKind::File.source();

    for _ in 0..10 {
        let _ = lock.register_counter(0, component, Some("s_file"), Some("/a"), CounterKind::Processed);
    }
    let _ = lock.register_counter(0, component, Some("s_file"), Some("/b"), CounterKind::Processed);
    let _ = lock.register_counter(
        0,
        ComponentKind::File.destination(),
        Some("s_file"),
        Some("/a"),
        CounterKind::Processed,
    );

    // one cluster per distinct key; direction is part of the key
    assert_eq!(lock.cluster_count(), 3);
}

#[test]
fn test_ref_count_balance() {
    let registry = registry_at_level(0);
    let mut lock = registry.lock();
    let component = ComponentKind::Tcp.source();

    let a = lock.register_counter(0, component, Some("s_net"), None, CounterKind::Processed);
    let b = lock.register_counter(0, component, Some("s_net"), None, CounterKind::Dropped);
    let c = lock.register_counter(0, component, Some("s_net"), None, CounterKind::Processed);

    let cluster = lock.get_cluster(component, Some("s_net"), None).unwrap();
    assert_eq!(cluster.ref_count(), 3);

    lock.unregister_counter(component, Some("s_net"), None, CounterKind::Processed, a);
    lock.unregister_counter(component, Some("s_net"), None, CounterKind::Dropped, b);
    assert_eq!(cluster.ref_count(), 1);

    lock.unregister_counter(component, Some("s_net"), None, CounterKind::Processed, c);
    assert_eq!(cluster.ref_count(), 0);

    // static cluster stays in the registry at zero refs
    assert_eq!(lock.cluster_count(), 1);
}

#[test]
fn test_level_gating_is_conservative() {
    let registry = registry_at_level(1);
    let mut lock = registry.lock();

    let granted = lock.register_counter(
        1,
        ComponentKind::Center.source(),
        Some("received"),
        None,
        CounterKind::Processed,
    );
    let gated = lock.register_counter(
        2,
        ComponentKind::Host.source(),
        Some("example"),
        None,
        CounterKind::Processed,
    );

    assert!(granted.is_some());
    assert!(gated.is_none());
    assert_eq!(lock.cluster_count(), 1);
}

#[test]
fn test_absent_and_empty_strings_are_one_key() {
    let registry = registry_at_level(0);
    let mut lock = registry.lock();
    let component = ComponentKind::Global.source();

    let _ = lock.register_counter(0, component, None, None, CounterKind::Processed);
    let _ = lock.register_counter(0, component, Some(""), Some(""), CounterKind::Processed);

    assert_eq!(lock.cluster_count(), 1);
    let cluster = lock.get_cluster(component, None, None).unwrap();
    assert_eq!(cluster.ref_count(), 2);
}

#[test]
fn test_dynamic_registration_and_association() {
    let registry = registry_at_level(0);
    let mut lock = registry.lock();
    let component = ComponentKind::Sender.source();

    let (cluster, processed, new) = lock
        .register_dynamic_counter(0, component, Some("10.0.0.1"), None, CounterKind::Processed)
        .unwrap();
    assert!(new);
    assert!(cluster.is_dynamic());
    assert_eq!(cluster.ref_count(), 1);

    let stamp = lock.register_associated_counter(&cluster, CounterKind::Stamp);
    assert_eq!(cluster.ref_count(), 2);
    stamp.set(1_700_000_000);
    processed.inc();

    assert!(cluster.is_live(CounterKind::Processed));
    assert!(cluster.is_live(CounterKind::Stamp));

    lock.unregister_dynamic_counter(&cluster, CounterKind::Stamp, stamp);
    lock.unregister_dynamic_counter(&cluster, CounterKind::Processed, processed);
    assert_eq!(cluster.ref_count(), 0);
    assert_eq!(lock.cluster_count(), 1);
}

#[test]
fn test_reregistration_revives_orphaned_cluster() {
    let registry = registry_at_level(0);
    let mut lock = registry.lock();
    let component = ComponentKind::Sender.source();

    let (cluster, processed, _new) = lock
        .register_dynamic_counter(0, component, Some("10.0.0.1"), None, CounterKind::Processed)
        .unwrap();
    let stamp = lock.register_associated_counter(&cluster, CounterKind::Stamp);
    processed.inc();
    lock.unregister_dynamic_counter(&cluster, CounterKind::Stamp, stamp);
    lock.unregister_dynamic_counter(&cluster, CounterKind::Processed, processed);
    drop(cluster);

    // same key again: same cluster comes back with its history intact
    let (cluster, processed, new) = lock
        .register_dynamic_counter(0, component, Some("10.0.0.1"), None, CounterKind::Processed)
        .unwrap();
    assert!(new);
    assert_eq!(cluster.ref_count(), 1);
    assert!(cluster.is_live(CounterKind::Stamp));
    assert_eq!(cluster.counter(CounterKind::Processed).get(), 1);
    assert_eq!(lock.cluster_count(), 1);

    lock.unregister_dynamic_counter(&cluster, CounterKind::Processed, processed);
}

#[test]
fn test_register_and_increment_dynamic_counter() {
    let registry = registry_at_level(0);
    let mut lock = registry.lock();
    let component = ComponentKind::Severity.source();

    for _ in 0..3 {
        lock.register_and_increment_dynamic_counter(0, component, Some("error"), None, 1_000);
    }

    let cluster = lock.get_cluster(component, Some("error"), None).unwrap();
    assert!(cluster.is_dynamic());
    assert_eq!(cluster.ref_count(), 0);
    assert_eq!(cluster.counter(CounterKind::Processed).get(), 3);
    assert_eq!(cluster.counter(CounterKind::Stamp).get(), 1_000);
}

#[test]
fn test_register_and_increment_without_timestamp() {
    let registry = registry_at_level(0);
    let mut lock = registry.lock();
    let component = ComponentKind::Tag.source();

    lock.register_and_increment_dynamic_counter(0, component, Some("audit"), None, -1);

    let cluster = lock.get_cluster(component, Some("audit"), None).unwrap();
    assert_eq!(cluster.counter(CounterKind::Processed).get(), 1);
    assert!(!cluster.is_live(CounterKind::Stamp));
    assert_eq!(cluster.ref_count(), 0);
}

#[test]
fn test_gated_register_and_increment_is_noop() {
    let registry = registry_at_level(0);
    let mut lock = registry.lock();

    lock.register_and_increment_dynamic_counter(
        2,
        ComponentKind::Sender.source(),
        Some("10.0.0.1"),
        None,
        1_000,
    );
    assert_eq!(lock.cluster_count(), 0);
}

#[test]
fn test_handle_usable_after_lock_release() {
    let registry = registry_at_level(0);
    let counter = {
        let mut lock = registry.lock();
        lock.register_counter(
            0,
            ComponentKind::Program.destination(),
            Some("d_prog"),
            None,
            CounterKind::Stored,
        )
        .unwrap()
    };

    counter.inc();
    counter.add(4);
    counter.dec();
    assert_eq!(counter.get(), 4);

    let mut lock = registry.lock();
    lock.unregister_counter(
        ComponentKind::Program.destination(),
        Some("d_prog"),
        None,
        CounterKind::Stored,
        Some(counter),
    );
}

#[test]
fn test_foreach_counter_visits_live_cells_only() {
    let registry = registry_at_level(0);
    let mut lock = registry.lock();
    let component = ComponentKind::File.destination();

    let processed = lock
        .register_counter(0, component, Some("d"), None, CounterKind::Processed)
        .unwrap();
    processed.add(5);

    let mut visited = Vec::new();
    lock.foreach_counter(|cluster, kind, cell| {
        visited.push((cluster.key().id.clone(), kind, cell.get()));
    });
    assert_eq!(visited, vec![("d".to_owned(), CounterKind::Processed, 5)]);
}

//! Tabular exposition of the live counter set.
//!
//! External tooling reads counters through the control-socket
//! collaborator, which holds the registry lock and serves this format:
//! one semicolon-separated line per live counter, preceded by a header.
//! The state column is `d` for dynamic clusters, `o` for orphaned ones
//! (no outstanding registrations) and `a` for active static ones.

use crate::counter::CounterKind;
use crate::registry::StatsLock;

/// Column header line.
pub const CSV_HEADER: &str = "SourceName;SourceId;SourceInstance;State;Type;Number";

/// Render every live counter as one `;`-separated line.
pub fn format_csv(lock: &StatsLock<'_>) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(CSV_HEADER);
    out.push('\n');

    lock.foreach_counter(|cluster, kind, cell| {
        let key = cluster.key();
        let state = if cluster.is_dynamic() {
            "d"
        } else if cluster.ref_count() == 0 {
            "o"
        } else {
            "a"
        };
        let value = match kind {
            CounterKind::Stamp => cell.get().to_string(),
            _ => (cell.get() as u64).to_string(),
        };
        out.push_str(&format!(
            "{};{};{};{};{};{}\n",
            key.component.label(),
            key.id,
            key.instance,
            state,
            kind.tag_name(),
            value
        ));
    });

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKind;
    use crate::config::StatsOptions;
    use crate::registry::StatsRegistry;

    #[test]
    fn test_empty_registry_is_header_only() {
        let registry = StatsRegistry::new(StatsOptions::default());
        let lock = registry.lock();
        assert_eq!(format_csv(&lock), format!("{}\n", CSV_HEADER));
    }

    #[test]
    fn test_static_counter_line() {
        let registry = StatsRegistry::new(StatsOptions::default());
        let mut lock = registry.lock();
        let counter = lock
            .register_counter(
                0,
                ComponentKind::File.destination(),
                Some("d_file"),
                Some("/var/log/a"),
                CounterKind::Processed,
            )
            .unwrap();
        counter.add(12);

        let csv = format_csv(&lock);
        assert!(csv.contains("dst.file;d_file;/var/log/a;a;processed;12\n"));
    }

    #[test]
    fn test_orphaned_and_dynamic_states() {
        let registry = StatsRegistry::new(StatsOptions::default());
        let mut lock = registry.lock();

        let component = ComponentKind::Tcp.source();
        let counter = lock
            .register_counter(0, component, Some("s_net"), None, CounterKind::Dropped)
            .unwrap();
        lock.unregister_counter(component, Some("s_net"), None, CounterKind::Dropped, Some(counter));

        lock.register_and_increment_dynamic_counter(
            0,
            ComponentKind::Sender.source(),
            Some("10.0.0.1"),
            None,
            1_000,
        );

        let csv = format_csv(&lock);
        assert!(csv.contains("src.tcp;s_net;;o;dropped;0\n"));
        assert!(csv.contains("src.sender;10.0.0.1;;d;processed;1\n"));
        assert!(csv.contains("src.sender;10.0.0.1;;d;stamp;1000\n"));
    }
}

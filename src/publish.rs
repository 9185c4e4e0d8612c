//! The publish-and-prune pass.
//!
//! One pass walks the registry under a single lock acquisition, formats a
//! tag per live counter into a `"Log statistics"` event, and in the same
//! walk removes every expired dynamic cluster. Event emission happens
//! after the lock is released. When at least one cluster was pruned, a
//! separate notice reports the count and the oldest dropped timestamp.
//!
//! Output goes to an [`EventSink`], the typed seam to the daemon's logging
//! facility. [`TracingSink`] is the production implementation; tests
//! substitute a recording sink.

use crate::cluster::StatsCluster;
use crate::counter::CounterKind;
use crate::registry::StatsRegistry;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Priority of an emitted event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Routine informational output (the periodic statistics record).
    Info,
    /// Operationally notable output (the pruning report).
    Notice,
}

/// One `name="value"` tag on an event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag name; a counter-kind name or a fixed report field.
    pub name: &'static str,
    /// Formatted tag value.
    pub value: String,
}

impl Tag {
    /// Build a tag.
    pub fn new(name: &'static str, value: String) -> Self {
        Self { name, value }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=\"{}\"", self.name, self.value)
    }
}

/// A structured event record handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsEvent {
    /// Record priority.
    pub priority: Priority,
    /// Fixed record title.
    pub message: &'static str,
    /// Tags in registry walk order.
    pub tags: Vec<Tag>,
}

/// Receiver for formatted statistics output.
pub trait EventSink: Send + Sync {
    /// Deliver one event record.
    fn emit(&self, event: StatsEvent);
}

/// Sink that forwards event records to the `tracing` facade.
///
/// `tracing` has no notice level, so both priorities emit at info; the
/// record keeps its own [`Priority`] for sinks that can do better.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: StatsEvent) {
        let tags = event
            .tags
            .iter()
            .map(Tag::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(target: "stats", "{}; {}", event.message, tags);
    }
}

/// Current wall-clock time as Unix seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

fn format_cluster_tags(cluster: &StatsCluster, tags: &mut Vec<Tag>) {
    let key = cluster.key();
    // the separator disappears when either part is empty
    let separator = if !key.id.is_empty() && !key.instance.is_empty() {
        ","
    } else {
        ""
    };
    for (kind, cell) in cluster.live_counters() {
        let value = match kind {
            CounterKind::Stamp => cell.get().to_string(),
            _ => (cell.get() as u64).to_string(),
        };
        tags.push(Tag::new(
            kind.tag_name(),
            format!(
                "{}({}{}{})={}",
                key.component.label(),
                key.id,
                separator,
                key.instance,
                value
            ),
        ));
    }
}

/// Run one publish-and-prune pass over the registry at time `now` (Unix
/// seconds).
///
/// With `log_freq == 0` no statistics record is produced, but expired
/// dynamic clusters are still pruned and the pruning notice is still
/// emitted. Administrative commands may call this directly; the periodic
/// scheduler calls it on every elapse.
pub fn publish_and_prune(registry: &StatsRegistry, sink: &dyn EventSink, now: i64) {
    let options = registry.options();
    let mut event = (options.log_freq > 0).then(|| StatsEvent {
        priority: Priority::Info,
        message: "Log statistics",
        tags: Vec::new(),
    });

    let mut dropped_counters = 0u64;
    let mut oldest_counter = 0i64;

    {
        let mut lock = registry.lock();
        lock.foreach_cluster_remove(|cluster| {
            if let Some(event) = event.as_mut() {
                format_cluster_tags(cluster, &mut event.tags);
            }
            let expired = cluster.is_expired(now, options.lifetime);
            if expired {
                let stamp = cluster.counter(CounterKind::Stamp).get();
                if oldest_counter == 0 || stamp < oldest_counter {
                    oldest_counter = stamp;
                }
                dropped_counters += 1;
            }
            expired
        });
    }

    if let Some(event) = event {
        sink.emit(event);
    }

    if dropped_counters > 0 {
        sink.emit(StatsEvent {
            priority: Priority::Notice,
            message: "Pruning stats-counters have finished",
            tags: vec![
                Tag::new("dropped", dropped_counters.to_string()),
                Tag::new("oldest-timestamp", oldest_counter.to_string()),
            ],
        });
    }
}

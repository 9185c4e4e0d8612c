//! Statistics counter registry for a log-processing daemon.
//!
//! Components of the daemon need counters to track metrics such as the
//! number of records processed, dropped or stored in a queue. This crate
//! provides the registry those counters live in, the policy that decides
//! which registrations materialize, and the periodic pass that publishes
//! the live set and prunes idle dynamic counters.
//!
//! Every counter belongs to a cluster identified by a triple:
//!
//! - **component**: which kind of daemon component owns it, packed with a
//!   source/destination direction flag ([`Component`])
//! - **id**: the name of the configuration element, e.g. a destination's
//!   name from the configuration file
//! - **instance**: distinguishes several counter sets under one element,
//!   e.g. the expanded filename of a file writer
//!
//! # Architecture
//!
//! ```text
//!  producers                 registry                  publisher
//!  ---------                 --------                  ---------
//!  lock() ──► register ──►  key ──► Cluster           every freq secs:
//!  (batched)                        ├─ cells[5]  ◄──  walk + format
//!  handle.inc() ───────────────────►│  (atomic)       + prune expired
//!  (no lock)                        ├─ live_mask      ──► EventSink
//!                                   ├─ ref_cnt
//!                                   └─ dynamic
//! ```
//!
//! Structural operations go through the [`StatsLock`] guard so the lock
//! contract is enforced by construction; the counting hot path is a
//! single atomic operation on a [`CounterHandle`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stats_core::{ComponentKind, CounterKind, Stats, StatsOptions, TracingSink};
//!
//! let stats = Stats::new(StatsOptions::default(), Arc::new(TracingSink));
//!
//! // registration is batched under one lock acquisition
//! let processed = {
//!     let mut lock = stats.registry().lock();
//!     lock.register_counter(
//!         0,
//!         ComponentKind::File.destination(),
//!         Some("d_file"),
//!         Some("/var/log/out"),
//!         CounterKind::Processed,
//!     )
//! };
//!
//! // the hot path never touches the lock
//! if let Some(processed) = &processed {
//!     processed.inc();
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cluster;
mod component;
mod config;
mod counter;
mod publish;
mod registry;
mod scheduler;
mod snapshot;
mod stats;

pub use cluster::{ClusterKey, StatsCluster};
pub use component::{Component, ComponentKind, ComponentLabel};
pub use config::StatsOptions;
pub use counter::{CounterCell, CounterKind};
pub use publish::{EventSink, Priority, StatsEvent, Tag, TracingSink, publish_and_prune};
pub use registry::{ClusterHandle, CounterHandle, StatsLock, StatsRegistry};
pub use scheduler::{SchedulerError, StatsTimer};
pub use snapshot::{CSV_HEADER, format_csv};
pub use stats::Stats;

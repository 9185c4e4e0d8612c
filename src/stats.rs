//! Subsystem lifecycle.
//!
//! [`Stats`] ties the registry, the event sink and the periodic scheduler
//! together. The daemon constructs one at startup, hands the registry out
//! to producers, reconfigures it on reload, and drops it at teardown.

use crate::config::StatsOptions;
use crate::publish::{self, EventSink};
use crate::registry::StatsRegistry;
use crate::scheduler::{SchedulerError, StatsTimer};
use std::sync::Arc;
use std::time::Duration;

/// Owner of the statistics subsystem.
pub struct Stats {
    registry: Arc<StatsRegistry>,
    sink: Arc<dyn EventSink>,
    timer: Option<StatsTimer>,
}

impl Stats {
    /// Allocate the registry with the given options. The scheduler is not
    /// armed yet; call [`reinit`](Self::reinit) once configuration is
    /// complete.
    pub fn new(options: StatsOptions, sink: Arc<dyn EventSink>) -> Self {
        Self {
            registry: Arc::new(StatsRegistry::new(options)),
            sink,
            timer: None,
        }
    }

    /// The shared registry, for handing to producers.
    pub fn registry(&self) -> &Arc<StatsRegistry> {
        &self.registry
    }

    /// Swap the options and restart the scheduler at the new effective
    /// frequency. Existing clusters and outstanding registrations are
    /// untouched.
    pub fn reinit(&mut self, options: StatsOptions) -> Result<(), SchedulerError> {
        self.registry.set_options(options);
        self.restart_timer()
    }

    /// Run one publish-and-prune pass right now, outside the periodic
    /// schedule. Administrative commands use this.
    pub fn publish_and_prune(&self) {
        publish::publish_and_prune(&self.registry, self.sink.as_ref(), publish::unix_now());
    }

    fn restart_timer(&mut self) -> Result<(), SchedulerError> {
        self.stop_timer();

        let freq = StatsTimer::effective_freq(&self.registry.options());
        let registry = self.registry.clone();
        let sink = self.sink.clone();
        self.timer = Some(StatsTimer::start(Duration::from_secs(freq), move || {
            publish::publish_and_prune(&registry, sink.as_ref(), publish::unix_now());
        })?);
        Ok(())
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
    }
}

impl Drop for Stats {
    fn drop(&mut self) {
        // the timer joins here, so no pass can run against a dead subsystem
        self.stop_timer();
    }
}

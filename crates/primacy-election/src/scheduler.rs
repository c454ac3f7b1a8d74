//! Leadership election scheduler — cached primacy with a background refresh.
//!
//! The first `is_primary` call runs one round inline, publishes the
//! verdict, and spawns a task that repeats the round every `interval`.
//! Every later call reads the cached verdict without touching the network.
//!
//! ```text
//! is_primary(group)
//!   ├── blank group → true
//!   ├── first call (once, even under concurrency)
//!   │   ├── poll(group) → publish verdict (false on failure)
//!   │   └── spawn run_election_loop
//!   └── read cached ElectionState
//!
//! run_election_loop (every interval, until shutdown)
//!   ├── Ok(verdict) → replace ElectionState
//!   └── Err(_)      → keep previous ElectionState
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use primacy_core::{epoch_secs, ElectionState};

use crate::poller::ElectionPoller;

/// Default period between background rounds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// The armed background task.
struct ScheduledTask {
    /// Group polled by the background task.
    group: String,
    handle: JoinHandle<()>,
}

/// Serves cached primacy verdicts, refreshed by a background task.
pub struct LeadershipElectionScheduler {
    poller: Arc<ElectionPoller>,
    interval: Duration,
    /// Latest completed verdict. Replaced whole, never patched.
    state: Arc<watch::Sender<ElectionState>>,
    /// One-shot gate: set once the priming round ran and the task is armed.
    scheduled: OnceCell<ScheduledTask>,
    /// Stop signal for the background task.
    shutdown_tx: watch::Sender<bool>,
}

impl LeadershipElectionScheduler {
    /// Create an unscheduled scheduler. Nothing runs until the first
    /// `is_primary` call.
    pub fn new(poller: ElectionPoller) -> Self {
        let (state, _) = watch::channel(ElectionState::default());
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            poller: Arc::new(poller),
            interval: DEFAULT_POLL_INTERVAL,
            state: Arc::new(state),
            scheduled: OnceCell::new(),
            shutdown_tx,
        }
    }

    /// Set the period between background rounds.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Whether this instance is the group's primary.
    ///
    /// Only callers arriving before the first round completes wait on it;
    /// everyone else reads the cached verdict.
    pub async fn is_primary(&self, group: &str) -> bool {
        let group = group.trim();
        if group.is_empty() {
            return true;
        }

        let task = self.scheduled.get_or_init(|| self.schedule(group)).await;
        if task.group != group {
            warn!(
                requested = %group,
                polled = %task.group,
                "primary check requested for a different group; serving cached verdict"
            );
        }

        self.state.borrow().is_primary
    }

    /// Snapshot of the cached state.
    pub fn state(&self) -> ElectionState {
        *self.state.borrow()
    }

    /// Receiver notified whenever a round replaces the cached state.
    pub fn subscribe(&self) -> watch::Receiver<ElectionState> {
        self.state.subscribe()
    }

    /// Whether the background task has been armed.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.initialized()
    }

    /// Stop the background task. The last verdict stays readable, and a
    /// later first call still primes the cache but arms no task.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send_replace(true);
        if let Some(task) = self.scheduled.get() {
            task.handle.abort();
            info!(group = %task.group, "primary check stopped");
        }
    }

    /// Run the priming round and arm the background task.
    async fn schedule(&self, group: &str) -> ScheduledTask {
        info!(%group, interval = ?self.interval, "scheduling primary check");

        let is_primary = match self.poller.poll(group).await {
            Ok(is_primary) => is_primary,
            Err(e) => {
                warn!(%group, error = %e, "priming primary check failed; assuming not primary");
                false
            }
        };
        publish(&self.state, group, is_primary);

        let handle = tokio::spawn(run_election_loop(
            group.to_string(),
            self.poller.clone(),
            self.state.clone(),
            self.interval,
            self.shutdown_tx.subscribe(),
        ));

        ScheduledTask {
            group: group.to_string(),
            handle,
        }
    }
}

impl Drop for LeadershipElectionScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send_replace(true);
        if let Some(task) = self.scheduled.get() {
            task.handle.abort();
        }
    }
}

/// Replace the cached state with a fresh verdict.
fn publish(state: &watch::Sender<ElectionState>, group: &str, is_primary: bool) {
    let previous = state.send_replace(ElectionState::evaluated(is_primary, epoch_secs()));
    if previous.last_evaluated.is_none() || previous.is_primary != is_primary {
        info!(%group, is_primary, "primary status changed");
    } else {
        debug!(%group, is_primary, "primary status unchanged");
    }
}

/// Periodic rounds for one group.
async fn run_election_loop(
    group: String,
    poller: Arc<ElectionPoller>,
    state: Arc<watch::Sender<ElectionState>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    if *shutdown.borrow() {
        debug!(%group, "election loop not started, scheduler already stopped");
        return;
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(%group, "election loop starting");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match poller.poll(&group).await {
                    Ok(is_primary) => publish(&state, &group, is_primary),
                    Err(e) => {
                        warn!(%group, error = %e, "primary check failed; keeping previous verdict");
                    }
                }
            }
            _ = shutdown.changed() => {
                debug!(%group, "election loop shutting down");
                break;
            }
        }
    }
}

use futures::FutureExt;
use mai_core::{FlowState, MaiError};
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::flow::ThinkingFlow;

/// Tick cadence per flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveIntervals {
    pub engaged: Duration,
    pub focused: Duration,
}

impl Default for ObserveIntervals {
    fn default() -> Self {
        Self {
            engaged: Duration::from_secs(20),
            focused: Duration::from_secs(5),
        }
    }
}

impl ObserveIntervals {
    /// How long to wait after a tick. `None` for a dormant flow, which waits
    /// for a signal instead.
    pub fn budget_for(&self, state: FlowState) -> Option<Duration> {
        match state {
            FlowState::Dormant => None,
            FlowState::Engaged => Some(self.engaged),
            FlowState::Focused => Some(self.focused),
        }
    }
}

/// Control loop deciding when one flow runs an observation tick.
///
/// The owning flow's mutex guards the state and the stop flag; `signal` plays
/// the condition variable. Every wait registers with `signal` *before* the
/// guarded state is checked, so a change published between the check and the
/// wait still wakes the loop. Indefinite waits (dormant) and timed waits
/// (engaged, focused) use the same signal.
pub struct FlowScheduler {
    signal: Notify,
    intervals: ObserveIntervals,
    task: Mutex<Option<JoinHandle<()>>>,
    ticks: AtomicU64,
}

impl FlowScheduler {
    pub fn new(intervals: ObserveIntervals) -> Self {
        Self {
            signal: Notify::new(),
            intervals,
            task: Mutex::new(None),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn intervals(&self) -> ObserveIntervals {
        self.intervals
    }

    /// Observation ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Wake the loop so it re-reads state and the stop flag.
    pub(crate) fn signal(&self) {
        self.signal.notify_waiters();
    }

    pub(crate) fn set_task(&self, handle: JoinHandle<()>) {
        *self.task.lock() = Some(handle);
    }

    pub(crate) fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().take()
    }

    pub(crate) fn abort_task(&self) -> bool {
        match self.task.lock().as_ref() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Observer task of `flow` for the run numbered `generation`.
    ///
    /// The guard is built before the future is returned, so dropping the task
    /// before its first poll still clears the observing flag.
    pub(crate) fn run(
        flow: Arc<ThinkingFlow>,
        generation: u64,
    ) -> impl Future<Output = ()> + Send + 'static {
        let guard = ObservingGuard { flow, generation };
        async move {
            let flow = &guard.flow;
            info!(stream = %flow.id(), generation, "observer started");
            flow.scheduler().observe(flow).await;
            info!(stream = %flow.id(), ticks = flow.tick_count(), "observer stopped");
        }
    }

    async fn observe(&self, flow: &ThinkingFlow) {
        loop {
            // Park while dormant.
            loop {
                let notified = self.signal.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                {
                    let inner = flow.inner.lock();
                    if inner.stop_requested {
                        return;
                    }
                    if inner.state != FlowState::Dormant {
                        break;
                    }
                }
                trace!(stream = %flow.id(), "parked while dormant");
                notified.await;
            }

            self.tick(flow).await;

            let notified = self.signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let budget = {
                let inner = flow.inner.lock();
                if inner.stop_requested {
                    return;
                }
                self.intervals.budget_for(inner.state)
            };
            let Some(budget) = budget else {
                continue;
            };

            tokio::select! {
                _ = &mut notified => {
                    trace!(stream = %flow.id(), "woken before interval elapsed");
                }
                _ = tokio::time::sleep(budget) => {}
            }
        }
    }

    /// Run the decision hook once, outside the flow lock.
    ///
    /// Errors and panics are logged; the loop keeps going.
    async fn tick(&self, flow: &ThinkingFlow) {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(stream = %flow.id(), tick, state = %flow.state(), "observation tick");

        let outcome = AssertUnwindSafe(flow.hook().observe(flow))
            .catch_unwind()
            .await;
        let reason = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("hook panicked: {}", panic_message(payload.as_ref())),
        };
        let err = MaiError::Tick {
            stream: flow.id().to_string(),
            reason,
        };
        warn!(error = %err, tick, "observation tick failed, continuing");
    }
}

/// Clears the observing flag however the loop ends, including an abort
/// before the first poll. An aborted loop counts as stopped. A guard from an
/// older run leaves a newer run's flags alone.
struct ObservingGuard {
    flow: Arc<ThinkingFlow>,
    generation: u64,
}

impl Drop for ObservingGuard {
    fn drop(&mut self) {
        let mut inner = self.flow.inner.lock();
        if inner.generation == self.generation {
            inner.observing = false;
            inner.stop_requested = true;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

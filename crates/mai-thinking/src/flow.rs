use chrono::{DateTime, Utc};
use mai_config::ThinkingConfig;
use mai_core::{ConversationItem, FlowSnapshot, FlowState, MaiError, Result, StreamId};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

use crate::executor::TaskExecutor;
use crate::hook::DecisionHook;
use crate::scheduler::{FlowScheduler, ObserveIntervals};
use crate::window::ObservationWindow;

/// Construction parameters shared by every flow of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSettings {
    pub window_size: usize,
    pub intervals: ObserveIntervals,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            window_size: 100,
            intervals: ObserveIntervals::default(),
        }
    }
}

impl FlowSettings {
    /// Reject settings a flow cannot run with: a zero window or a zero interval.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, reason: &str| MaiError::ConfigValidation {
            field: field.to_string(),
            reason: reason.to_string(),
        };
        if self.window_size == 0 {
            return Err(invalid("window_size", "must be at least 1"));
        }
        if self.intervals.engaged.is_zero() {
            return Err(invalid("intervals.engaged", "must be longer than zero"));
        }
        if self.intervals.focused.is_zero() {
            return Err(invalid("intervals.focused", "must be longer than zero"));
        }
        Ok(())
    }
}

impl From<&ThinkingConfig> for FlowSettings {
    fn from(config: &ThinkingConfig) -> Self {
        Self {
            window_size: config.observation_window_size,
            intervals: ObserveIntervals {
                engaged: Duration::from_secs(config.engaged_interval_secs),
                focused: Duration::from_secs(config.focused_interval_secs),
            },
        }
    }
}

/// Everything guarded by the flow mutex.
pub(crate) struct FlowInner {
    pub(crate) state: FlowState,
    pub(crate) last_active: DateTime<Utc>,
    pub(crate) window: ObservationWindow,
    pub(crate) stop_requested: bool,
    pub(crate) observing: bool,
    /// Bumped on every start; an observer only clears flags of its own run.
    pub(crate) generation: u64,
}

/// The scheduling and state unit of one interaction stream.
///
/// Always handled through an `Arc`; the observer task keeps the flow alive
/// while it runs.
pub struct ThinkingFlow {
    id: StreamId,
    pub(crate) inner: Mutex<FlowInner>,
    scheduler: FlowScheduler,
    hook: Arc<dyn DecisionHook>,
    executor: Option<TaskExecutor>,
    this: Weak<ThinkingFlow>,
}

impl ThinkingFlow {
    /// A flow with no executor. It never observes on its own; useful for
    /// inspection and tests.
    pub fn new(id: StreamId, settings: FlowSettings, hook: Arc<dyn DecisionHook>) -> Arc<Self> {
        Self::build(id, settings, hook, None)
    }

    /// A flow that runs its observer on `executor` and starts it on first activity.
    pub fn with_executor(
        id: StreamId,
        settings: FlowSettings,
        hook: Arc<dyn DecisionHook>,
        executor: TaskExecutor,
    ) -> Arc<Self> {
        Self::build(id, settings, hook, Some(executor))
    }

    /// `settings` are taken as given; a zero window size is raised to 1.
    /// Call [`FlowSettings::validate`] first to reject it instead.
    fn build(
        id: StreamId,
        settings: FlowSettings,
        hook: Arc<dyn DecisionHook>,
        executor: Option<TaskExecutor>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id,
            inner: Mutex::new(FlowInner {
                state: FlowState::Dormant,
                last_active: Utc::now(),
                window: ObservationWindow::new(settings.window_size),
                stop_requested: false,
                observing: false,
                generation: 0,
            }),
            scheduler: FlowScheduler::new(settings.intervals),
            hook,
            executor,
            this: this.clone(),
        })
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    // ── Mutation ───────────────────────────────────────────────

    /// Record a new conversation item.
    ///
    /// A dormant flow becomes engaged and its scheduler is woken. Engaged and
    /// focused flows keep their state. Never blocks on the observer.
    pub fn record_item(&self, item: impl Into<Arc<ConversationItem>>) {
        let item = item.into();
        let (promoted, wants_observer) = {
            let mut inner = self.inner.lock();
            inner.window.push(item);
            inner.last_active = Utc::now();
            let promoted = inner.state == FlowState::Dormant;
            if promoted {
                inner.state = FlowState::Engaged;
            }
            (promoted, !inner.observing && !inner.stop_requested)
        };

        if promoted {
            debug!(stream = %self.id, "promoted to engaged by new item");
            self.scheduler.signal();
        }
        if wants_observer && self.executor.is_some() {
            self.start_observing();
        }
    }

    /// Overwrite the state. Any transition is allowed, including downgrades.
    pub fn set_state(&self, state: FlowState) {
        let previous = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            inner.state = state;
            inner.last_active = Utc::now();
            previous
        };
        debug!(stream = %self.id, from = %previous, to = %state, "state set");
        self.scheduler.signal();
    }

    /// Put back state, activity and window contents read from storage.
    pub(crate) fn restore_from(
        &self,
        state: FlowState,
        last_active: DateTime<Utc>,
        items: Vec<ConversationItem>,
    ) {
        let mut inner = self.inner.lock();
        inner.state = state;
        inner.last_active = last_active;
        inner.window.refill(items.into_iter().map(Arc::new));
    }

    // ── Observer lifecycle ─────────────────────────────────────

    /// Start the observer loop on the flow's executor.
    ///
    /// Returns `false` when there is no executor or a loop is already running
    /// (including one still winding down after a stop).
    pub fn start_observing(&self) -> bool {
        let Some(executor) = &self.executor else {
            warn!(stream = %self.id, "cannot observe without an executor");
            return false;
        };
        let Some(this) = self.this.upgrade() else {
            return false;
        };
        let generation = {
            let mut inner = self.inner.lock();
            if inner.observing {
                return false;
            }
            inner.observing = true;
            inner.stop_requested = false;
            inner.generation += 1;
            inner.generation
        };
        let handle = executor.spawn_observer(FlowScheduler::run(this, generation));
        self.scheduler.set_task(handle);
        true
    }

    /// Ask the observer loop to stop. Safe to call any number of times.
    ///
    /// A tick in progress finishes first; the loop exits at its next wake point.
    pub fn stop_observing(&self) {
        let first = {
            let mut inner = self.inner.lock();
            !std::mem::replace(&mut inner.stop_requested, true)
        };
        self.scheduler.signal();
        if first {
            debug!(stream = %self.id, "stop requested");
        }
    }

    /// Wait for the observer task to finish. Returns at once if none was started.
    pub async fn join_observer(&self) -> Result<()> {
        let Some(handle) = self.scheduler.take_task() else {
            return Ok(());
        };
        match handle.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(MaiError::Shutdown {
                stream: self.id.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Cancel the observer task without waiting for the current tick.
    /// Returns `true` if a running task was aborted.
    pub fn abort_observer(&self) -> bool {
        self.scheduler.abort_task()
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn is_observing(&self) -> bool {
        self.inner.lock().observing
    }

    pub fn state(&self) -> FlowState {
        self.inner.lock().state
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.inner.lock().last_active
    }

    pub fn window_len(&self) -> usize {
        self.inner.lock().window.len()
    }

    /// Copy of the window contents, oldest first.
    pub fn window_snapshot(&self) -> Vec<Arc<ConversationItem>> {
        self.inner.lock().window.snapshot()
    }

    /// State, activity and the window items not yet in storage.
    pub fn snapshot(&self) -> FlowSnapshot {
        self.pending_snapshot().0
    }

    /// Snapshot plus the window entries its `unsaved` items were copied from,
    /// so the ids storage assigns can be written back with [`Self::mark_saved`].
    pub(crate) fn pending_snapshot(&self) -> (FlowSnapshot, Vec<Arc<ConversationItem>>) {
        let inner = self.inner.lock();
        let pending = inner.window.unsaved();
        let snapshot = FlowSnapshot {
            stream: self.id,
            state: inner.state,
            last_active: inner.last_active,
            unsaved: pending.iter().map(|i| (**i).clone()).collect(),
        };
        (snapshot, pending)
    }

    pub(crate) fn mark_saved(&self, pending: Vec<Arc<ConversationItem>>, ids: Vec<i64>) {
        let saved: Vec<_> = pending.into_iter().zip(ids).collect();
        self.inner.lock().window.mark_saved(&saved);
    }

    pub fn tick_count(&self) -> u64 {
        self.scheduler.tick_count()
    }

    pub(crate) fn scheduler(&self) -> &FlowScheduler {
        &self.scheduler
    }

    pub(crate) fn hook(&self) -> &Arc<dyn DecisionHook> {
        &self.hook
    }
}

impl std::fmt::Debug for ThinkingFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ThinkingFlow")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("last_active", &inner.last_active)
            .field("window_len", &inner.window.len())
            .field("observing", &inner.observing)
            .finish()
    }
}

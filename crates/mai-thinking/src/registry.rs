use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use mai_config::ThinkingConfig;
use mai_core::{
    ConversationItem, FlowSnapshot, FlowState, MaiError, Result, StreamId, StreamRecord,
    StreamStore,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::executor::TaskExecutor;
use crate::flow::{FlowSettings, ThinkingFlow};
use crate::hook::DecisionHook;

/// Aggregate flow counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlowStateCounts {
    pub total: usize,
    pub dormant: usize,
    pub engaged: usize,
    pub focused: usize,
}

/// Outcome of [`FlowRegistry::restore_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub skipped: usize,
}

/// Outcome of [`FlowRegistry::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Flows asked to stop.
    pub stopped: usize,
    /// Flows whose observer had to be aborted or whose snapshot was not saved.
    pub failures: usize,
    /// Snapshots written to storage.
    pub flushed: usize,
}

/// Process-wide map of interaction streams to their thinking flows.
///
/// Cheap to clone; clones share the same map.
#[derive(Clone)]
pub struct FlowRegistry {
    flows: Arc<DashMap<StreamId, Arc<ThinkingFlow>>>,
    store: Arc<dyn StreamStore>,
    executor: TaskExecutor,
    hook: Arc<dyn DecisionHook>,
    settings: FlowSettings,
    shutdown_grace: Duration,
}

impl FlowRegistry {
    /// Fails with [`MaiError::ConfigValidation`] when `config` gives a zero
    /// window size or interval.
    pub fn new(
        store: Arc<dyn StreamStore>,
        executor: TaskExecutor,
        hook: Arc<dyn DecisionHook>,
        config: &ThinkingConfig,
    ) -> Result<Self> {
        let settings = FlowSettings::from(config);
        settings.validate()?;
        Ok(Self {
            flows: Arc::new(DashMap::new()),
            store,
            executor,
            hook,
            settings,
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
        })
    }

    fn new_flow(&self, id: StreamId) -> Arc<ThinkingFlow> {
        ThinkingFlow::with_executor(id, self.settings, self.hook.clone(), self.executor.clone())
    }

    // ── Lookup ─────────────────────────────────────────────────

    /// Return the flow of `id`, creating it and its stream record on first use.
    ///
    /// Concurrent callers for the same id get the same flow and only one
    /// record is written. If the record cannot be written nothing is inserted.
    ///
    /// Blocking: a new id writes to storage while holding that id's map shard.
    /// From async code use [`deliver`](Self::deliver).
    pub fn get_or_create(&self, id: &StreamId) -> Result<Arc<ThinkingFlow>> {
        if let Some(flow) = self.flows.get(id) {
            return Ok(flow.clone());
        }

        match self.flows.entry(*id) {
            Entry::Occupied(slot) => Ok(slot.get().clone()),
            Entry::Vacant(slot) => {
                self.store.create_stream(id)?;
                let flow = self.new_flow(*id);
                slot.insert(flow.clone());
                info!(stream = %id, "created thinking flow");
                Ok(flow)
            }
        }
    }

    /// Route an inbound item to its stream's flow.
    ///
    /// Creating a new stream runs on the blocking pool, off the async workers.
    pub async fn deliver(&self, item: ConversationItem) -> Result<Arc<ThinkingFlow>> {
        let flow = match self.get(&item.stream) {
            Some(flow) => flow,
            None => {
                let registry = self.clone();
                let id = item.stream;
                self.executor
                    .submit_blocking(move || registry.get_or_create(&id))
                    .await
                    .map_err(|e| {
                        MaiError::Persistence(format!("stream creation task failed: {e}"))
                    })??
            }
        };
        flow.record_item(item);
        Ok(flow)
    }

    pub fn get(&self, id: &StreamId) -> Option<Arc<ThinkingFlow>> {
        self.flows.get(id).map(|f| f.clone())
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.flows.iter().map(|f| *f.key()).collect()
    }

    // ── Startup ────────────────────────────────────────────────

    /// Restore then start observers for every flow that is not dormant.
    pub fn initialize(&self) -> Result<RestoreReport> {
        let report = self.restore_all()?;
        let started = self.run_observers();
        info!(
            restored = report.restored,
            skipped = report.skipped,
            started,
            "flow registry initialized"
        );
        Ok(report)
    }

    /// Rebuild one flow per persisted stream record.
    ///
    /// A record that cannot be restored is logged and skipped. Only a failure
    /// to list the records fails the call.
    pub fn restore_all(&self) -> Result<RestoreReport> {
        let records = self.store.load_streams()?;
        let mut report = RestoreReport::default();

        for record in &records {
            match self.restore_one(record) {
                Ok(flow) => {
                    debug!(stream = %flow.id(), state = %flow.state(), window = flow.window_len(), "restored flow");
                    self.flows.entry(flow.id()).or_insert(flow);
                    report.restored += 1;
                }
                Err(e) => {
                    let err = MaiError::RestoreItem {
                        stream: record.id.clone(),
                        reason: e.to_string(),
                    };
                    warn!(error = %err, "skipping stream");
                    report.skipped += 1;
                }
            }
        }

        info!(restored = report.restored, skipped = report.skipped, "restored thinking flows");
        Ok(report)
    }

    fn restore_one(&self, record: &StreamRecord) -> Result<Arc<ThinkingFlow>> {
        let id = record.stream_id()?;
        let state = record.flow_state()?;
        let last_active = record.last_active()?.unwrap_or_else(Utc::now);
        let items = self.store.recent_items(&id, self.settings.window_size)?;

        let flow = self.new_flow(id);
        flow.restore_from(state, last_active, items);
        Ok(flow)
    }

    /// Start the observer of every flow that is at least engaged.
    ///
    /// Dormant flows start on their first recorded item.
    pub fn run_observers(&self) -> usize {
        self.flows
            .iter()
            .filter(|f| f.state().is_at_least(FlowState::Engaged))
            .filter(|f| f.start_observing())
            .count()
    }

    // ── Introspection ──────────────────────────────────────────

    pub fn state_counts(&self) -> FlowStateCounts {
        let mut counts = FlowStateCounts::default();
        for flow in self.flows.iter() {
            counts.total += 1;
            match flow.state() {
                FlowState::Dormant => counts.dormant += 1,
                FlowState::Engaged => counts.engaged += 1,
                FlowState::Focused => counts.focused += 1,
            }
        }
        counts
    }

    // ── Shutdown ───────────────────────────────────────────────

    /// Stop every observer, then flush every flow's snapshot to storage.
    ///
    /// Window items without a storage id are appended to the stream's
    /// messages and take the assigned ids, so a later restore sees them and a
    /// second shutdown does not write them again.
    ///
    /// Per-flow failures are logged and counted; shutdown always runs to the end.
    pub async fn shutdown(&self) -> ShutdownReport {
        let flows: Vec<Arc<ThinkingFlow>> = self.flows.iter().map(|f| f.clone()).collect();
        let mut report = ShutdownReport {
            stopped: flows.len(),
            ..Default::default()
        };
        info!(flows = flows.len(), "shutting down thinking flows");

        for flow in &flows {
            flow.stop_observing();
        }

        if !self.executor.wait_observers(self.shutdown_grace).await {
            for flow in flows.iter().filter(|f| f.is_observing()) {
                flow.abort_observer();
                let err = MaiError::Shutdown {
                    stream: flow.id().to_string(),
                    reason: format!("observer still running after {:?}, aborted", self.shutdown_grace),
                };
                error!(error = %err, "flow did not stop cleanly");
                report.failures += 1;
            }
        }

        let mut pending_by_stream = Vec::with_capacity(flows.len());
        let snapshots: Vec<FlowSnapshot> = flows
            .iter()
            .map(|f| {
                let (snapshot, pending) = f.pending_snapshot();
                pending_by_stream.push(pending);
                snapshot
            })
            .collect();
        let store = self.store.clone();
        let flush = self.executor.submit_blocking(move || {
            snapshots
                .into_iter()
                .map(|snap| (snap.stream, store.save_snapshot(&snap)))
                .collect::<Vec<_>>()
        });

        match flush.await {
            Ok(outcomes) => {
                for ((flow, pending), (stream, outcome)) in
                    flows.iter().zip(pending_by_stream).zip(outcomes)
                {
                    match outcome {
                        Ok(ids) => {
                            flow.mark_saved(pending, ids);
                            report.flushed += 1;
                        }
                        Err(e) => {
                            let err = MaiError::Shutdown {
                                stream: stream.to_string(),
                                reason: e.to_string(),
                            };
                            error!(error = %err, "failed to flush flow");
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "flush task failed");
                report.failures += flows.len();
            }
        }

        info!(
            stopped = report.stopped,
            flushed = report.flushed,
            failures = report.failures,
            "thinking flows shut down"
        );
        report
    }
}

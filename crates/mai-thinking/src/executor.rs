use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Execution service for thinking flows.
///
/// Long-lived observer loops are tracked so shutdown can wait for them;
/// short blocking work (storage calls) goes to the blocking pool.
#[derive(Clone)]
pub struct TaskExecutor {
    handle: Handle,
    observers: TaskTracker,
}

impl TaskExecutor {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            observers: TaskTracker::new(),
        }
    }

    /// Executor bound to the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Spawn a long-lived observer loop.
    pub fn spawn_observer<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.observers.spawn_on(task, &self.handle)
    }

    /// Run short blocking work off the async workers.
    pub fn submit_blocking<F, R>(&self, work: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_blocking(work)
    }

    /// Number of observer loops still running.
    pub fn active_observers(&self) -> usize {
        self.observers.len()
    }

    /// Wait up to `grace` for every observer loop to finish.
    ///
    /// Returns `false` if some loops were still running when the grace period
    /// ran out. The executor accepts new observers again afterwards.
    pub async fn wait_observers(&self, grace: Duration) -> bool {
        self.observers.close();
        let finished = tokio::time::timeout(grace, self.observers.wait())
            .await
            .is_ok();
        self.observers.reopen();
        finished
    }
}

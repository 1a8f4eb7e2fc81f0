use async_trait::async_trait;
use mai_core::Result;
use tracing::debug;

use crate::flow::ThinkingFlow;

/// The judgment step run once per observation tick.
///
/// Implementations may call [`ThinkingFlow::set_state`] on the flow they are
/// given. They must not start or stop its observer.
#[async_trait]
pub trait DecisionHook: Send + Sync {
    async fn observe(&self, flow: &ThinkingFlow) -> Result<()>;
}

/// Hook that only logs the tick. Used until a real judgment step is plugged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleHook;

#[async_trait]
impl DecisionHook for IdleHook {
    async fn observe(&self, flow: &ThinkingFlow) -> Result<()> {
        debug!(
            stream = %flow.id(),
            state = %flow.state(),
            window = flow.window_len(),
            "idle observation"
        );
        Ok(())
    }
}

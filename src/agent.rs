//! The hot-swappable behavior façade in front of a component's state.
//! Agents are side-effect-only and their cached instance may be dropped by
//! `clearAgentCache()` at any moment between work items, so they must not
//! carry durable data of their own, only a reference to the component's
//! state.

use async_trait::async_trait;

/// An agent is bound to `(componentType, agentType)` via the
/// [`crate::registry::ComponentRegistry`]. `onActivate`/`onDeactivate` are
/// unconditional capabilities (default no-ops cost nothing); `onCrossDay`
/// is opt-in: `supports_cross_day` lets `Actor::crossDay` skip agents
/// that don't implement it rather than invoking a hook that does nothing.
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    /// Runs once, right after the component's state has loaded. A
    /// failure here is the "component activation error" of spec §7: it
    /// propagates to the caller of `getAgent` and the component remains
    /// inactive so the next call retries.
    async fn on_activate(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }

    async fn on_deactivate(&self) {}

    fn supports_cross_day(&self) -> bool {
        false
    }

    async fn on_cross_day(&self, _open_server_day: u32) {}
}

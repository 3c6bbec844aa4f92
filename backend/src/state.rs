//! Application state management.

use crate::capabilities::CapabilityRegistry;
use crate::mcp::heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
use crate::mcp::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default push endpoint path.
pub const DEFAULT_MCP_PATH: &str = "/mcp";
/// Default pull endpoint path.
pub const DEFAULT_MESSAGES_PATH: &str = "/mcp/messages";
/// Default push channel buffer, in frames.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Transport tuning shared by the HTTP handlers.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Interval between keep-alive comments on each push stream.
    pub heartbeat_interval: Duration,
    /// Frames buffered per push stream before writers wait.
    pub channel_capacity: usize,
    /// Path of the push endpoint.
    pub mcp_path: String,
    /// Path of the pull endpoint, announced to clients in the endpoint event.
    pub messages_path: String,
    /// Close sessions without pull traffic for this long. `None` keeps them
    /// open for as long as the stream is.
    pub idle_timeout: Option<Duration>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            mcp_path: DEFAULT_MCP_PATH.to_string(),
            messages_path: DEFAULT_MESSAGES_PATH.to_string(),
            idle_timeout: None,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Tools and resources, immutable after startup
    capabilities: Arc<CapabilityRegistry>,
    /// Live sessions, one per open push stream
    sessions: SessionRegistry,
    settings: TransportSettings,
}

impl AppState {
    /// Create new application state serving `capabilities`.
    pub fn new(capabilities: CapabilityRegistry, settings: TransportSettings) -> Self {
        let capabilities = Arc::new(capabilities);
        Self {
            inner: Arc::new(AppStateInner {
                sessions: SessionRegistry::new(capabilities.clone()),
                capabilities,
                settings,
            }),
        }
    }

    /// Get the capability registry.
    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.inner.capabilities
    }

    /// Get the session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.inner.settings
    }

    /// Start the idle-session reaper if an idle timeout is configured.
    ///
    /// The task stops when `shutdown` is cancelled.
    pub fn spawn_idle_reaper(&self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let max_idle = self.inner.settings.idle_timeout?;
        let sessions = self.inner.sessions.clone();
        let period = (max_idle / 2).max(Duration::from_secs(1));
        info!("Closing MCP sessions idle for more than {:?}", max_idle);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let reaped = sessions.reap_idle(max_idle);
                        if reaped > 0 {
                            debug!("Idle reaper closed {} session(s)", reaped);
                        }
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::tests::full_store;
    use crate::capabilities::WidgetDelivery;
    use crate::mcp::PushChannel;

    fn state(idle_timeout: Option<Duration>) -> AppState {
        let capabilities =
            CapabilityRegistry::load(&full_store(), WidgetDelivery::Reference).unwrap();
        AppState::new(
            capabilities,
            TransportSettings {
                idle_timeout,
                ..TransportSettings::default()
            },
        )
    }

    #[test]
    fn test_sessions_share_capabilities() {
        let state = state(None);
        assert!(Arc::ptr_eq(
            state.capabilities(),
            state.sessions().capabilities()
        ));
        assert_eq!(state.settings().mcp_path, "/mcp");
        assert_eq!(state.settings().messages_path, "/mcp/messages");
    }

    #[tokio::test]
    async fn test_no_reaper_without_timeout() {
        let state = state(None);
        assert!(state.spawn_idle_reaper(CancellationToken::new()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_closes_idle_sessions() {
        let state = state(Some(Duration::from_secs(10)));
        let (push, _rx) = PushChannel::new(4);
        let session = state.sessions().create(push);

        let shutdown = CancellationToken::new();
        let reaper = state.spawn_idle_reaper(shutdown.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert!(state.sessions().lookup(session.id()).is_none());

        shutdown.cancel();
        reaper.await.unwrap();
    }
}

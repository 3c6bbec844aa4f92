//! Per-session keep-alive frames.
//!
//! Intermediaries often close idle streaming responses; a heartbeat task
//! writes a comment frame on a fixed interval for as long as its session is
//! open. The task ends when the session's token is cancelled, and tears the
//! session down itself if the stream stops accepting frames.

use super::session::{PushFrame, PushOutcome, SessionHandle, SessionRegistry};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// Default interval between heartbeat frames.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Spawn the heartbeat task for `session`.
pub fn spawn(
    session: &SessionHandle,
    sessions: SessionRegistry,
    period: Duration,
) -> JoinHandle<()> {
    let id = session.id().to_string();
    let push = session.push_channel().clone();
    let cancel = session.cancellation().clone();

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => match push.try_push(PushFrame::Heartbeat) {
                    PushOutcome::Queued => trace!("Heartbeat queued for session {}", id),
                    // The stream is already backed up with data; no keep-alive needed.
                    PushOutcome::Full => debug!("Skipping heartbeat for busy session {}", id),
                    PushOutcome::Closed => {
                        warn!("Push channel for session {} closed, tearing down", id);
                        sessions.remove(&id);
                        break;
                    }
                },
            }
        }
        debug!("Heartbeat stopped for session {}", id);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::tests::full_store;
    use crate::capabilities::{CapabilityRegistry, WidgetDelivery};
    use crate::mcp::session::PushChannel;
    use std::sync::Arc;

    fn registry() -> SessionRegistry {
        let capabilities =
            CapabilityRegistry::load(&full_store(), WidgetDelivery::Reference).unwrap();
        SessionRegistry::new(Arc::new(capabilities))
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_heartbeats_until_cancelled() {
        let sessions = registry();
        let (push, mut rx) = PushChannel::new(8);
        let session = sessions.create(push);
        let task = spawn(&session, sessions.clone(), Duration::from_secs(15));

        // Nothing before the first interval elapses.
        tokio::time::sleep(Duration::from_secs(14)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.recv().await, Some(PushFrame::Heartbeat));

        sessions.remove(session.id());
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_removes_session() {
        let sessions = registry();
        let (push, rx) = PushChannel::new(8);
        let session = sessions.create(push);
        let task = spawn(&session, sessions.clone(), Duration::from_secs(1));

        drop(rx);
        tokio::time::sleep(Duration::from_secs(2)).await;
        task.await.unwrap();
        assert!(sessions.lookup(session.id()).is_none());
    }
}

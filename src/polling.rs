//! Periodic polling of a JSON feed.
//!
//! The poller fetches once immediately and then on every tick of a fixed
//! interval until stopped. Ticks are not gated on earlier fetches finishing:
//! a slow response can land after a newer one, and whichever completes last
//! is what subscribers see.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::client::FeedSource;
use crate::errors::QuakeError;

/// Poll cadence used by the dashboard when none is configured (6 minutes).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(360);

/// What subscribers can observe about the feed.
#[derive(Debug, Clone, Default)]
pub struct PollStatus {
    /// Latest successfully parsed payload
    pub data: Option<Arc<serde_json::Value>>,
    /// True while the most recent completed attempt succeeded
    pub is_connected: bool,
    /// Most recent error, cleared on success
    pub error: Option<String>,
    /// Count of payloads received so far
    pub received: u64,
}

/// Handle to a running poll loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct Poller {
    handle: JoinHandle<()>,
    status: watch::Receiver<PollStatus>,
}

impl Poller {
    /// Spawn the poll loop on the current runtime.
    pub fn start<S: FeedSource>(source: Arc<S>, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(PollStatus::default());
        let handle = tokio::spawn(poll_loop(source, interval, tx));

        Self { handle, status: rx }
    }

    /// New receiver for status updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.status.clone()
    }

    /// Stop polling. In-flight fetches are cancelled with the loop.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn poll_loop<S: FeedSource>(
    source: Arc<S>,
    interval: Duration,
    tx: watch::Sender<PollStatus>,
) {
    // First tick completes immediately.
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let source = Arc::clone(&source);
                in_flight.spawn(async move { source.fetch().await });
            }
            Some(joined) = in_flight.join_next() => {
                match joined {
                    Ok(result) => record_result(&tx, result),
                    Err(e) => warn!("fetch task failed: {e}"),
                }
            }
        }
    }
}

fn record_result(tx: &watch::Sender<PollStatus>, result: Result<serde_json::Value, QuakeError>) {
    match result {
        Ok(payload) => {
            tx.send_modify(|status| {
                status.data = Some(Arc::new(payload));
                status.is_connected = true;
                status.error = None;
                status.received += 1;
            });
            debug!("feed payload received");
        }
        Err(e) => {
            warn!("fetch failed, will retry: {e}");
            if let QuakeError::Api { message, .. } = &e {
                debug!(body = %message, "error response body");
            }
            tx.send_modify(|status| {
                status.is_connected = false;
                status.error = Some(e.to_string());
            });
        }
    }
}

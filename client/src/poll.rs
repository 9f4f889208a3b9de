use crate::{Client, Result};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tictactoe_types::BoardSnapshot;
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, trace, warn};

/// Default cadence of the polling loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Capacity of the channel between fetchers and the controller.
pub(crate) const DELIVERY_CAPACITY: usize = 16;

/// A snapshot tagged with the sequence number issued when it was requested.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Polled {
    pub seq: u64,
    pub snapshot: BoardSnapshot,
}

/// Issues strictly increasing request sequence numbers, starting at 1.
#[derive(Clone, Debug, Default)]
pub struct Sequencer(Arc<AtomicU64>);

impl Sequencer {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Where fetched snapshots come from and where they go.
#[derive(Clone)]
pub(crate) struct Source {
    pub client: Client,
    pub room: String,
    pub user_id: String,
    pub sequencer: Sequencer,
    pub deliveries: mpsc::Sender<Polled>,
}

impl Source {
    async fn fetch(&self, seq: u64) -> Result<Polled> {
        let response = self.client.state(&self.room, &self.user_id).await?;
        Ok(Polled {
            seq,
            snapshot: BoardSnapshot::from(response),
        })
    }

    /// Fetches one snapshot now, outside the regular cadence.
    pub fn fetch_once(&self) {
        let source = self.clone();
        let seq = source.sequencer.next();
        tokio::spawn(async move {
            match source.fetch(seq).await {
                Ok(polled) => {
                    if source.deliveries.send(polled).await.is_err() {
                        debug!(seq, "snapshot receiver dropped; refresh discarded");
                    }
                }
                Err(err) => warn!(seq, error = %err, "out-of-band refresh failed"),
            }
        });
    }
}

/// Handle to a running polling loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct PollHandle {
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stops the loop. Returns `true` only for the call that actually
    /// stopped it; later calls are no-ops.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.task.abort();
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts fetching a snapshot every `interval`, beginning immediately.
///
/// A failed fetch is logged and retried on the next tick. The loop ends when
/// stopped or when the receiving side of `deliveries` is dropped.
pub(crate) fn spawn(source: Source, interval: Duration) -> PollHandle {
    let stopped = Arc::new(AtomicBool::new(false));
    let flag = stopped.clone();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if flag.load(Ordering::Acquire) {
                break;
            }
            let seq = source.sequencer.next();
            match source.fetch(seq).await {
                Ok(polled) => {
                    trace!(seq, "poll succeeded");
                    if source.deliveries.send(polled).await.is_err() {
                        debug!("snapshot receiver dropped; polling stopped");
                        break;
                    }
                }
                Err(err) => warn!(seq, error = %err, "poll failed; retrying next tick"),
            }
        }
    });
    PollHandle { stopped, task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_numbers_increase_across_clones() {
        let sequencer = Sequencer::default();
        let other = sequencer.clone();
        assert_eq!(sequencer.next(), 1);
        assert_eq!(other.next(), 2);
        assert_eq!(sequencer.next(), 3);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let task = tokio::spawn(std::future::pending::<()>());
        let handle = PollHandle {
            stopped: Arc::new(AtomicBool::new(false)),
            task,
        };
        assert!(!handle.is_stopped());
        assert!(handle.stop());
        assert!(!handle.stop());
        assert!(handle.is_stopped());
    }
}

use crate::{
    poll::{self, PollHandle, Polled, Sequencer, Source, DELIVERY_CAPACITY},
    reconcile::{Engine, Event, Phase, SkipReason},
    Client, Error, Result,
};
use std::time::Duration;
use tictactoe_types::Player;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Identity granted by the server for one game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub room_id: String,
    pub user_id: String,
    pub player: Player,
    /// Cleared once the game ends.
    pub active: bool,
}

/// Result of a move request that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// Accepted by the server.
    Sent,
    /// Blocked locally; nothing was sent.
    Skipped(SkipReason),
}

/// Owns a session, its polling loop, and the reconciliation engine.
///
/// Snapshots from the periodic poller and from out-of-band refreshes arrive
/// on one channel tagged with the sequence number issued when they were
/// requested. Anything older than the last applied snapshot is dropped, so
/// reconciliation follows request order even when responses overtake each
/// other. The controller keeps only a weak handle to that channel: once the
/// poller is stopped and no refresh is in flight, the channel closes.
pub struct Controller {
    client: Client,
    session: Session,
    engine: Engine,
    sequencer: Sequencer,
    last_applied: u64,
    poll_interval: Duration,
    deliveries: mpsc::WeakSender<Polled>,
    receiver: mpsc::Receiver<Polled>,
    poller: Option<PollHandle>,
}

impl Controller {
    /// Joins `room` and returns a controller for the new session. Any
    /// failure leaves nothing behind; callers start over.
    pub async fn join(client: Client, room: &str, poll_interval: Duration) -> Result<Self> {
        let joined = client.join(room).await?;
        let player = Player::from_index(joined.player_index).ok_or(Error::UnexpectedResponse)?;
        info!(room, player = player.index(), color = player.color(), "joined room");

        let session = Session {
            room_id: room.to_string(),
            user_id: joined.user_id,
            player,
            active: true,
        };
        Ok(Self::new(client, session, poll_interval))
    }

    pub(crate) fn new(client: Client, session: Session, poll_interval: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(DELIVERY_CAPACITY);
        let deliveries = sender.downgrade();
        Self {
            client,
            session,
            engine: Engine::new(),
            sequencer: Sequencer::default(),
            last_applied: 0,
            poll_interval,
            deliveries,
            receiver,
            poller: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    /// Returns a sender for the delivery channel, reopening it if every
    /// previous sender is gone.
    fn sender(&mut self) -> mpsc::Sender<Polled> {
        if let Some(sender) = self.deliveries.upgrade() {
            return sender;
        }
        let (sender, receiver) = mpsc::channel(DELIVERY_CAPACITY);
        let mut closed = std::mem::replace(&mut self.receiver, receiver);
        // The closed channel holds at most its capacity, so this never fills.
        while let Ok(polled) = closed.try_recv() {
            if sender.try_send(polled).is_err() {
                warn!("dropping buffered snapshot while reopening deliveries");
            }
        }
        self.deliveries = sender.downgrade();
        sender
    }

    fn source(&mut self) -> Source {
        Source {
            client: self.client.clone(),
            room: self.session.room_id.clone(),
            user_id: self.session.user_id.clone(),
            sequencer: self.sequencer.clone(),
            deliveries: self.sender(),
        }
    }

    /// Starts the polling loop. Does nothing if it is already running or the
    /// session has ended.
    pub fn start_polling(&mut self) {
        if !self.session.active || self.is_polling() {
            return;
        }
        debug!(interval_ms = self.poll_interval.as_millis() as u64, "polling started");
        self.poller = Some(poll::spawn(self.source(), self.poll_interval));
    }

    /// Stops the polling loop. Returns `true` if this call stopped it.
    pub fn stop_polling(&mut self) -> bool {
        match &self.poller {
            Some(poller) => {
                let stopped = poller.stop();
                if stopped {
                    debug!("polling stopped");
                }
                stopped
            }
            None => false,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .as_ref()
            .is_some_and(|poller| !poller.is_stopped())
    }

    /// Reconciles one delivery. Returns `None` if it was superseded by a
    /// snapshot requested later.
    pub fn apply(&mut self, polled: Polled) -> Option<Vec<Event>> {
        if polled.seq <= self.last_applied {
            debug!(
                seq = polled.seq,
                last_applied = self.last_applied,
                "dropping superseded snapshot"
            );
            return None;
        }
        self.last_applied = polled.seq;

        let events = self.engine.apply(&polled.snapshot);
        if events
            .iter()
            .any(|event| matches!(event, Event::GameEnded(_)))
        {
            self.session.active = false;
            self.stop_polling();
        }
        Some(events)
    }

    /// Waits for the next snapshot that is not superseded and returns its
    /// events, which may be empty. Returns `None` once the session has ended,
    /// or once polling is stopped and every pending refresh has finished.
    ///
    /// Cancel safe: no delivery is lost if the future is dropped.
    pub async fn next_events(&mut self) -> Option<Vec<Event>> {
        loop {
            if !self.session.active {
                return None;
            }
            let polled = self.receiver.recv().await?;
            if let Some(events) = self.apply(polled) {
                return Some(events);
            }
        }
    }

    /// Fetches a snapshot now instead of waiting for the next tick. The
    /// result arrives through [`Controller::next_events`].
    pub fn refresh(&mut self) {
        self.source().fetch_once();
    }

    /// Sends a move if the local view allows it.
    ///
    /// Guard failures return [`Submission::Skipped`] without contacting the
    /// server. Server rejections are returned as errors and leave local state
    /// untouched; the next snapshot is authoritative.
    pub async fn submit_move(&mut self, index: usize) -> Result<Submission> {
        if let Err(reason) = self.engine.check_move(index) {
            debug!(index, %reason, "move skipped");
            return Ok(Submission::Skipped(reason));
        }

        if let Err(err) = self
            .client
            .submit_move(&self.session.room_id, &self.session.user_id, index)
            .await
        {
            warn!(index, error = %err, "move not accepted");
            return Err(err);
        }
        debug!(index, "move accepted");
        self.refresh();
        Ok(Submission::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tictactoe_types::{Board, BoardSnapshot, BOARD_CELLS};

    fn controller() -> Controller {
        let client = Client::new("http://127.0.0.1:9").unwrap();
        let session = Session {
            room_id: "abc".to_string(),
            user_id: "user".to_string(),
            player: Player::Zero,
            active: true,
        };
        Controller::new(client, session, Duration::from_secs(1))
    }

    fn board(filled: &[(usize, Player)]) -> Board {
        let mut board = [None; BOARD_CELLS];
        for (index, player) in filled {
            board[*index] = Some(*player);
        }
        board
    }

    #[test]
    fn test_superseded_snapshot_is_dropped() {
        let mut controller = controller();

        let newer = Polled {
            seq: 2,
            snapshot: BoardSnapshot::active(board(&[(0, Player::Zero)]), false),
        };
        let events = controller.apply(newer).unwrap();
        assert!(events.contains(&Event::MoveRevealed {
            index: 0,
            player: Player::Zero
        }));

        // A late answer to an earlier request must not be applied.
        let older = Polled {
            seq: 1,
            snapshot: BoardSnapshot::active(board(&[]), true),
        };
        assert_eq!(controller.apply(older), None);
        assert!(!controller.engine().is_local_turn());

        let duplicate = Polled {
            seq: 2,
            snapshot: BoardSnapshot::active(board(&[(0, Player::Zero)]), true),
        };
        assert_eq!(controller.apply(duplicate), None);

        let next = Polled {
            seq: 3,
            snapshot: BoardSnapshot::active(board(&[(0, Player::Zero), (4, Player::One)]), true),
        };
        assert_eq!(
            controller.apply(next).unwrap(),
            vec![
                Event::TurnChanged { local: true },
                Event::MoveRevealed {
                    index: 4,
                    player: Player::One
                },
            ]
        );
    }

    #[test]
    fn test_game_end_deactivates_session() {
        let mut controller = controller();
        let finished = Polled {
            seq: 1,
            snapshot: BoardSnapshot::active(board(&[]), false)
                .with_outcome(tictactoe_types::Outcome::Draw),
        };
        controller.apply(finished).unwrap();
        assert!(!controller.session().active);
        assert!(controller.phase().is_terminal());
        assert!(!controller.is_polling());
    }

    #[tokio::test]
    async fn test_guarded_move_is_skipped_without_request() {
        // Nothing listens at this address, so any request would fail.
        let mut controller = controller();
        assert_eq!(
            controller.submit_move(0).await.unwrap(),
            Submission::Skipped(SkipReason::NotInProgress)
        );

        controller.apply(Polled {
            seq: 1,
            snapshot: BoardSnapshot::active(board(&[(4, Player::One)]), true),
        });
        assert_eq!(
            controller.submit_move(4).await.unwrap(),
            Submission::Skipped(SkipReason::CellOccupied)
        );
        assert_eq!(
            controller.submit_move(12).await.unwrap(),
            Submission::Skipped(SkipReason::InvalidCell)
        );
    }

    #[tokio::test]
    async fn test_next_events_ends_once_nothing_can_arrive() {
        let mut controller = controller();
        assert_eq!(controller.next_events().await, None);

        controller.start_polling();
        assert!(controller.stop_polling());
        let events = tokio::time::timeout(Duration::from_secs(2), controller.next_events())
            .await
            .expect("next_events should not wait after polling stopped");
        assert_eq!(events, None);

        // A refresh that fails closes the channel again.
        controller.refresh();
        let events = tokio::time::timeout(Duration::from_secs(2), controller.next_events())
            .await
            .expect("next_events should end after the refresh finished");
        assert_eq!(events, None);
        assert!(controller.session().active);
    }

    #[tokio::test]
    async fn test_start_polling_after_game_end_is_noop() {
        let mut controller = controller();
        controller.apply(Polled {
            seq: 1,
            snapshot: BoardSnapshot::active(board(&[]), false)
                .with_outcome(tictactoe_types::Outcome::Won(Player::One)),
        });
        controller.start_polling();
        assert!(!controller.is_polling());
        assert_eq!(controller.next_events().await, None);
    }
}

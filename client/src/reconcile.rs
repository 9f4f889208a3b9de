//! Turns authoritative room snapshots into view events.
//!
//! The [`Engine`] keeps a mirror of every cell it has already announced and
//! the last turn indicator it reported. Each snapshot is diffed against that
//! state, so re-applying a snapshot (or an older one) produces nothing new.

use tictactoe_types::{Board, BoardSnapshot, Outcome, Player, BOARD_CELLS};
use tracing::{debug, info, warn};

/// Lifecycle of a game as observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Seated, opponent not yet joined.
    Waiting,
    /// Both seats taken, turns being exchanged.
    InProgress,
    /// Decided. Absorbing.
    Terminal(Outcome),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Terminal(_))
    }
}

/// A fact the view has not been told yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    TurnChanged { local: bool },
    MoveRevealed { index: usize, player: Player },
    GameEnded(Outcome),
}

/// Why a move was not sent to the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NotInProgress,
    NotYourTurn,
    InvalidCell,
    CellOccupied,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SkipReason::NotInProgress => "game is not in progress",
            SkipReason::NotYourTurn => "not your turn",
            SkipReason::InvalidCell => "no such cell",
            SkipReason::CellOccupied => "cell already taken",
        })
    }
}

#[derive(Clone, Debug)]
pub struct Engine {
    phase: Phase,
    mirror: Board,
    local_turn: Option<bool>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Waiting,
            mirror: [None; BOARD_CELLS],
            local_turn: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Cells announced so far.
    pub fn mirror(&self) -> &Board {
        &self.mirror
    }

    /// Last turn indicator reported to the view.
    pub fn is_local_turn(&self) -> bool {
        self.local_turn == Some(true)
    }

    /// Reconciles one snapshot and returns the events it reveals, in order:
    /// turn change, newly filled cells by ascending index, game end.
    pub fn apply(&mut self, snapshot: &BoardSnapshot) -> Vec<Event> {
        if self.phase.is_terminal() {
            return Vec::new();
        }

        // A missing flag keeps the current phase.
        let active = snapshot
            .game_active
            .unwrap_or(self.phase == Phase::InProgress);
        if !active {
            if self.phase == Phase::InProgress {
                warn!("server reported an inactive room mid-game; ignoring snapshot");
            }
            return Vec::new();
        }
        if self.phase == Phase::Waiting {
            info!("opponent joined; game in progress");
            self.phase = Phase::InProgress;
        }

        let mut events = Vec::new();
        if let Some(local) = snapshot.is_local_turn {
            if self.local_turn != Some(local) {
                self.local_turn = Some(local);
                events.push(Event::TurnChanged { local });
            }
        }

        // Cells are written once per game; a filled mirror cell is never
        // overwritten.
        for (index, (seen, incoming)) in self.mirror.iter_mut().zip(snapshot.cells).enumerate() {
            if let (None, Some(player)) = (*seen, incoming) {
                *seen = Some(player);
                debug!(index, player = player.index(), "move revealed");
                events.push(Event::MoveRevealed { index, player });
            }
        }

        if let Some(outcome) = snapshot.outcome {
            info!(%outcome, "game over");
            self.phase = Phase::Terminal(outcome);
            events.push(Event::GameEnded(outcome));
        }
        events
    }

    /// Checks whether a move at `index` may be sent right now.
    pub fn check_move(&self, index: usize) -> Result<(), SkipReason> {
        if self.phase != Phase::InProgress {
            return Err(SkipReason::NotInProgress);
        }
        if !self.is_local_turn() {
            return Err(SkipReason::NotYourTurn);
        }
        match self.mirror.get(index) {
            None => Err(SkipReason::InvalidCell),
            Some(Some(_)) => Err(SkipReason::CellOccupied),
            Some(None) => Ok(()),
        }
    }
}

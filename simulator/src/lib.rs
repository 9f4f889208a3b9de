use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tictactoe_types::{
    api::{JoinResponse, StateResponse},
    board::{self, Board, Outcome, Player, BOARD_CELLS},
};
use tracing::{debug, info};
use uuid::Uuid;

mod api;
pub use api::Api;

/// Number of seats in a room.
pub const ROOM_SEATS: usize = 2;

#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// Rooms untouched for longer than this are evicted.
    pub room_ttl: Duration,
    /// How often the eviction sweep runs.
    pub cleanup_interval: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            room_ttl: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(600),
        }
    }
}

/// Rejections surfaced to API callers as `{error}` bodies.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room ID required")]
    RoomIdRequired,
    #[error("Room is full")]
    RoomFull,
    #[error("Room not found")]
    RoomNotFound,
    #[error("Game over")]
    GameOver,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Cell occupied")]
    CellOccupied,
    #[error("Invalid cell index")]
    InvalidCell,
}

#[derive(Debug)]
struct Room {
    board: Board,
    players: Vec<String>,
    turn: Option<Player>,
    outcome: Option<Outcome>,
    last_update: Instant,
}

impl Room {
    fn new(now: Instant) -> Self {
        Self {
            board: [None; BOARD_CELLS],
            players: Vec::with_capacity(ROOM_SEATS),
            turn: None,
            outcome: None,
            last_update: now,
        }
    }

    fn seat(&self, user_id: &str) -> Option<Player> {
        self.players
            .iter()
            .position(|player| player == user_id)
            .and_then(|index| u8::try_from(index).ok())
            .and_then(Player::from_index)
    }

    fn is_active(&self) -> bool {
        self.players.len() == ROOM_SEATS
    }
}

/// In-memory room registry implementing the rules of the room API.
pub struct Simulator {
    pub config: SimulatorConfig,
    rooms: Mutex<HashMap<String, Room>>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<String, Room>> {
        match self.rooms.lock() {
            Ok(rooms) => rooms,
            Err(poisoned) => {
                tracing::warn!("room registry lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Seats a new user in `room_id`, creating the room on first join.
    pub fn join(&self, room_id: &str) -> Result<JoinResponse, RoomError> {
        if room_id.is_empty() {
            return Err(RoomError::RoomIdRequired);
        }
        let now = Instant::now();
        let mut rooms = self.rooms();
        let room = rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(now));
        if room.players.len() >= ROOM_SEATS {
            return Err(RoomError::RoomFull);
        }

        let user_id = Uuid::new_v4().to_string();
        room.players.push(user_id.clone());
        room.last_update = now;
        let player_index = (room.players.len() - 1) as u8;

        // The first joiner opens once both seats are taken.
        if room.is_active() {
            room.turn = Some(Player::Zero);
            info!(room = room_id, "room full; game started");
        }
        debug!(room = room_id, player_index, "player joined");

        Ok(JoinResponse {
            user_id,
            player_index,
            room_id: Some(room_id.to_string()),
        })
    }

    /// Returns the room as seen from `user_id`'s seat. Refreshes the room's
    /// idle timer.
    pub fn state(&self, room_id: &str, user_id: &str) -> Result<StateResponse, RoomError> {
        let mut rooms = self.rooms();
        let room = rooms.get_mut(room_id).ok_or(RoomError::RoomNotFound)?;
        room.last_update = Instant::now();

        let game_active = room.is_active();
        let my_turn = game_active && room.turn.is_some() && room.turn == room.seat(user_id);
        Ok(StateResponse::new(
            game_active,
            my_turn,
            &room.board,
            room.outcome,
            room.players.len() as u8,
        ))
    }

    /// Places `user_id`'s marker at `index` and advances the game.
    pub fn make_move(&self, room_id: &str, user_id: &str, index: usize) -> Result<(), RoomError> {
        let mut rooms = self.rooms();
        let room = rooms.get_mut(room_id).ok_or(RoomError::RoomNotFound)?;
        if room.outcome.is_some() {
            return Err(RoomError::GameOver);
        }
        let player = match (room.turn, room.seat(user_id)) {
            (Some(turn), Some(seat)) if turn == seat => seat,
            _ => return Err(RoomError::NotYourTurn),
        };
        let cell = room.board.get_mut(index).ok_or(RoomError::InvalidCell)?;
        if cell.is_some() {
            return Err(RoomError::CellOccupied);
        }

        *cell = Some(player);
        room.last_update = Instant::now();
        match board::outcome(&room.board) {
            Some(outcome) => {
                info!(room = room_id, %outcome, "game finished");
                room.outcome = Some(outcome);
            }
            None => room.turn = Some(player.opponent()),
        }
        debug!(room = room_id, index, player = player.index(), "move applied");
        Ok(())
    }

    /// Removes rooms idle for longer than the configured TTL.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let ttl = self.config.room_ttl;
        let mut rooms = self.rooms();
        let before = rooms.len();
        rooms.retain(|_, room| now.saturating_duration_since(room.last_update) <= ttl);
        before - rooms.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms().len()
    }

    /// Runs the eviction sweep on the configured interval until aborted.
    pub fn spawn_cleanup(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let simulator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(simulator.config.cleanup_interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = simulator.evict_idle(Instant::now());
                if evicted > 0 {
                    info!(evicted, remaining = simulator.room_count(), "evicted idle rooms");
                }
            }
        })
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

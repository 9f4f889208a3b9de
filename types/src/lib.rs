pub mod api;
pub mod board;

pub use board::{Board, BoardSnapshot, Cell, Outcome, Player, BOARD_CELLS};

use std::fmt;

/// Number of cells on the 3x3 board.
pub const BOARD_CELLS: usize = 9;

/// Every row, column, and diagonal that wins the game.
pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// One of the two seats in a room. Seat 0 joined first and moves first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Player {
    Zero,
    One,
}

impl Player {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Player::Zero),
            1 => Some(Player::One),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Player::Zero => 0,
            Player::One => 1,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Player::Zero => Player::One,
            Player::One => Player::Zero,
        }
    }

    /// Display name used in status lines.
    pub fn color(self) -> &'static str {
        match self {
            Player::Zero => "Red",
            Player::One => "Blue",
        }
    }

    /// Marker drawn on the board.
    pub fn mark(self) -> char {
        match self {
            Player::Zero => 'X',
            Player::One => 'O',
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {} ({})", self.index(), self.color())
    }
}

/// A board cell: empty or claimed by a player.
pub type Cell = Option<Player>;

/// Row-major board, index 0 is top-left.
pub type Board = [Cell; BOARD_CELLS];

/// How a finished game ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Won(Player),
    Draw,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Won(player) => write!(f, "{} wins", player.color()),
            Outcome::Draw => f.write_str("draw"),
        }
    }
}

/// Returns the player holding a complete line, if any.
pub fn winning_player(board: &Board) -> Option<Player> {
    WIN_LINES.iter().find_map(|[a, b, c]| match board[*a] {
        Some(player) if board[*b] == Some(player) && board[*c] == Some(player) => Some(player),
        _ => None,
    })
}

/// Decides the game: a completed line wins, otherwise a full board is a draw.
pub fn outcome(board: &Board) -> Option<Outcome> {
    if let Some(player) = winning_player(board) {
        return Some(Outcome::Won(player));
    }
    if board.iter().all(Option::is_some) {
        return Some(Outcome::Draw);
    }
    None
}

/// Authoritative view of a room at one poll instant.
///
/// Fields the server omitted are `None` and mean "no change" to whoever
/// interprets the snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub cells: Board,
    pub game_active: Option<bool>,
    pub is_local_turn: Option<bool>,
    pub outcome: Option<Outcome>,
}

impl BoardSnapshot {
    /// Snapshot of an active game with the given cells.
    pub fn active(cells: Board, is_local_turn: bool) -> Self {
        Self {
            cells,
            game_active: Some(true),
            is_local_turn: Some(is_local_turn),
            outcome: None,
        }
    }

    /// Snapshot of a room still waiting for its second player.
    pub fn waiting() -> Self {
        Self {
            game_active: Some(false),
            is_local_turn: Some(false),
            ..Self::default()
        }
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(cells: &[(usize, Player)]) -> Board {
        let mut board = [None; BOARD_CELLS];
        for (index, player) in cells {
            board[*index] = Some(*player);
        }
        board
    }

    #[test]
    fn test_every_line_wins() {
        for line in WIN_LINES {
            let cells: Vec<_> = line.iter().map(|index| (*index, Player::One)).collect();
            assert_eq!(winning_player(&board(&cells)), Some(Player::One));
        }
    }

    #[test]
    fn test_mixed_line_does_not_win() {
        let board = board(&[(0, Player::Zero), (1, Player::One), (2, Player::Zero)]);
        assert_eq!(winning_player(&board), None);
        assert_eq!(outcome(&board), None);
    }

    #[test]
    fn test_full_board_without_line_is_draw() {
        // X O X
        // X O O
        // O X X
        use Player::{One as O, Zero as X};
        let board = board(&[
            (0, X),
            (1, O),
            (2, X),
            (3, X),
            (4, O),
            (5, O),
            (6, O),
            (7, X),
            (8, X),
        ]);
        assert_eq!(outcome(&board), Some(Outcome::Draw));
    }

    #[test]
    fn test_win_on_last_cell_beats_draw() {
        use Player::{One as O, Zero as X};
        let board = board(&[
            (0, X),
            (1, O),
            (2, X),
            (3, O),
            (4, X),
            (5, O),
            (6, O),
            (7, X),
            (8, X),
        ]);
        assert_eq!(outcome(&board), Some(Outcome::Won(X)));
    }

    #[test]
    fn test_player_index_round_trip() {
        assert_eq!(Player::from_index(0), Some(Player::Zero));
        assert_eq!(Player::from_index(1), Some(Player::One));
        assert_eq!(Player::from_index(2), None);
        assert_eq!(Player::Zero.opponent(), Player::One);
        assert_eq!(Player::One.index(), 1);
    }
}

use crate::reconcile::Event;
use std::io::Write;
use tictactoe_types::{Board, Outcome, Player, BOARD_CELLS};
use tracing::warn;

/// Rendering capability driven by reconciliation events.
pub trait View {
    fn place_marker(&mut self, index: usize, player: Player);

    fn turn_changed(&mut self, local: bool);

    fn game_ended(&mut self, outcome: Outcome);
}

/// Forwards `events` to `view` in order.
pub fn render<V: View + ?Sized>(view: &mut V, events: &[Event]) {
    for event in events {
        match *event {
            Event::MoveRevealed { index, player } => view.place_marker(index, player),
            Event::TurnChanged { local } => view.turn_changed(local),
            Event::GameEnded(outcome) => view.game_ended(outcome),
        }
    }
}

/// Status line shown while the room has a single player.
pub const WAITING_STATUS: &str = "Waiting for opponent...";

pub fn turn_status(local: bool) -> &'static str {
    if local {
        "Your Turn!"
    } else {
        "Opponent's Turn"
    }
}

pub fn outcome_status(outcome: Outcome) -> String {
    match outcome {
        Outcome::Won(player) => format!("Game Over! {} Wins!", player.color()),
        Outcome::Draw => "Game Over! Draw!".to_string(),
    }
}

/// Draws the board as a 3x3 grid. Empty cells show the number to type to
/// claim them.
pub fn draw_board(board: &Board) -> String {
    let mut out = String::new();
    for (index, cell) in board.iter().enumerate() {
        let symbol = match cell {
            Some(player) => player.mark(),
            None => char::from_digit(index as u32 + 1, 10).unwrap_or('?'),
        };
        out.push(' ');
        out.push(symbol);
        out.push(' ');
        if index % 3 < 2 {
            out.push('|');
        } else if index + 1 < BOARD_CELLS {
            out.push_str("\n---+---+---\n");
        }
    }
    out.push('\n');
    out
}

/// Text view writing the board and status lines to `out`.
pub struct TerminalView<W: Write> {
    out: W,
    local: Player,
    board: Board,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, local: Player) -> Self {
        Self {
            out,
            local,
            board: [None; BOARD_CELLS],
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn status(&mut self, line: &str) {
        if let Err(err) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            warn!(error = %err, "failed to write status");
        }
    }

    /// Prints who the local player is.
    pub fn announce(&mut self) {
        let line = format!(
            "You are {} ({}). Enter a cell number 1-9 to move, q to quit.",
            self.local.color(),
            self.local.mark()
        );
        self.status(&line);
    }
}

impl<W: Write> View for TerminalView<W> {
    fn place_marker(&mut self, index: usize, player: Player) {
        let Some(cell) = self.board.get_mut(index) else {
            return;
        };
        *cell = Some(player);
        let drawn = draw_board(&self.board);
        if let Err(err) = write!(self.out, "\n{drawn}") {
            warn!(error = %err, "failed to draw board");
        }
    }

    fn turn_changed(&mut self, local: bool) {
        self.status(turn_status(local));
    }

    fn game_ended(&mut self, outcome: Outcome) {
        let mut line = outcome_status(outcome);
        match outcome {
            Outcome::Won(player) if player == self.local => line.push_str(" You win."),
            Outcome::Won(_) => line.push_str(" You lose."),
            Outcome::Draw => {}
        }
        self.status(&line);
    }
}

//! JSON bodies exchanged over the room HTTP API.
//!
//! Responses are decoded leniently: every field a client reads is optional
//! and cell or winner values it does not recognize decode as "nothing".

use crate::board::{Board, BoardSnapshot, Outcome, Player, BOARD_CELLS};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Winner label used for a drawn game.
pub const DRAW_LABEL: &str = "draw";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub room: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub user_id: String,
    pub player_index: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Decodes a field as `None` when its value has the wrong shape, so one bad
/// field never rejects the rest of the body.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub game_active: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub my_turn: Option<bool>,
    #[serde(default)]
    pub winner: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub board: Option<Vec<Value>>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub player_count: Option<u8>,
}

impl StateResponse {
    /// Builds the response a server sends for one seat of a room.
    pub fn new(
        game_active: bool,
        my_turn: bool,
        board: &Board,
        outcome: Option<Outcome>,
        player_count: u8,
    ) -> Self {
        Self {
            game_active: Some(game_active),
            my_turn: Some(my_turn),
            winner: outcome.map(encode_outcome),
            board: Some(encode_board(board)),
            player_count: Some(player_count),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub room: String,
    pub user_id: String,
    pub index: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn encode_board(board: &Board) -> Vec<Value> {
    board
        .iter()
        .map(|cell| match cell {
            Some(player) => Value::from(player.index()),
            None => Value::Null,
        })
        .collect()
}

pub fn encode_outcome(outcome: Outcome) -> Value {
    match outcome {
        Outcome::Won(player) => Value::from(player.index()),
        Outcome::Draw => Value::from(DRAW_LABEL),
    }
}

/// Decodes a wire cell. Anything other than `0` or `1` is an empty cell.
pub fn decode_cell(value: &Value) -> Option<Player> {
    value
        .as_u64()
        .and_then(|index| u8::try_from(index).ok())
        .and_then(Player::from_index)
}

/// Decodes a wire board. Short boards are padded with empty cells and extra
/// cells are ignored.
pub fn decode_board(values: &[Value]) -> Board {
    let mut board = [None; BOARD_CELLS];
    for (cell, value) in board.iter_mut().zip(values) {
        *cell = decode_cell(value);
    }
    board
}

/// Decodes a wire winner: `0`, `1`, or `"draw"`. Anything else is no winner.
pub fn decode_outcome(value: &Value) -> Option<Outcome> {
    match value {
        Value::String(label) if label == DRAW_LABEL => Some(Outcome::Draw),
        other => decode_cell(other).map(Outcome::Won),
    }
}

impl From<&StateResponse> for BoardSnapshot {
    fn from(response: &StateResponse) -> Self {
        Self {
            cells: response
                .board
                .as_deref()
                .map(decode_board)
                .unwrap_or([None; BOARD_CELLS]),
            game_active: response.game_active,
            is_local_turn: response.my_turn,
            outcome: response.winner.as_ref().and_then(decode_outcome),
        }
    }
}

impl From<StateResponse> for BoardSnapshot {
    fn from(response: StateResponse) -> Self {
        Self::from(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(body: Value) -> BoardSnapshot {
        let response: StateResponse = serde_json::from_value(body).unwrap();
        BoardSnapshot::from(response)
    }

    #[test]
    fn test_decode_full_state() {
        let snapshot = decode(json!({
            "game_active": true,
            "my_turn": false,
            "winner": null,
            "board": [0, null, 1, null, null, null, null, null, null],
            "player_count": 2
        }));
        assert_eq!(snapshot.game_active, Some(true));
        assert_eq!(snapshot.is_local_turn, Some(false));
        assert_eq!(snapshot.outcome, None);
        assert_eq!(snapshot.cells[0], Some(Player::Zero));
        assert_eq!(snapshot.cells[1], None);
        assert_eq!(snapshot.cells[2], Some(Player::One));
    }

    #[test]
    fn test_decode_winner_values() {
        assert_eq!(decode_outcome(&json!(0)), Some(Outcome::Won(Player::Zero)));
        assert_eq!(decode_outcome(&json!(1)), Some(Outcome::Won(Player::One)));
        assert_eq!(decode_outcome(&json!("draw")), Some(Outcome::Draw));
        assert_eq!(decode_outcome(&json!("nobody")), None);
        assert_eq!(decode_outcome(&json!(7)), None);
        assert_eq!(decode_outcome(&Value::Null), None);
    }

    #[test]
    fn test_missing_fields_decode_as_unknown() {
        let snapshot = decode(json!({}));
        assert_eq!(snapshot.game_active, None);
        assert_eq!(snapshot.is_local_turn, None);
        assert_eq!(snapshot.outcome, None);
        assert!(snapshot.cells.iter().all(Option::is_none));
    }

    #[test]
    fn test_malformed_board_is_lenient() {
        let snapshot = decode(json!({
            "game_active": true,
            "board": [1, "x", -1, 2]
        }));
        assert_eq!(snapshot.cells[0], Some(Player::One));
        assert!(snapshot.cells[1..].iter().all(Option::is_none));

        let long: Vec<Value> = (0..12).map(|_| json!(0)).collect();
        let board = decode_board(&long);
        assert!(board.iter().all(|cell| *cell == Some(Player::Zero)));
    }

    #[test]
    fn test_bad_field_keeps_the_rest_of_the_snapshot() {
        let snapshot = decode(json!({
            "game_active": true,
            "winner": 0,
            "board": [0, 0, 0, 1, 1, null, null, null, null],
            "player_count": -1
        }));
        assert_eq!(snapshot.outcome, Some(Outcome::Won(Player::Zero)));
        assert_eq!(snapshot.game_active, Some(true));
        assert_eq!(snapshot.cells[2], Some(Player::Zero));
        assert_eq!(snapshot.cells[4], Some(Player::One));

        let snapshot = decode(json!({"winner": "draw", "board": "corrupt", "my_turn": "yes"}));
        assert_eq!(snapshot.outcome, Some(Outcome::Draw));
        assert_eq!(snapshot.is_local_turn, None);
        assert!(snapshot.cells.iter().all(Option::is_none));
    }

    #[test]
    fn test_server_response_shape() {
        let mut board = [None; BOARD_CELLS];
        board[4] = Some(Player::One);
        let response = StateResponse::new(true, true, &board, Some(Outcome::Draw), 2);
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["winner"], json!("draw"));
        assert_eq!(body["board"][4], json!(1));
        assert_eq!(body["board"][0], Value::Null);
        assert_eq!(body["player_count"], json!(2));

        let response = StateResponse::new(false, false, &[None; BOARD_CELLS], None, 1);
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["winner"], Value::Null);
    }
}

use axum::{
    extract::{Query, State as AxumState},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tictactoe_types::api::MoveResponse;

use crate::{RoomError, Simulator};

// Request bodies are decoded with every field optional so that missing
// fields map onto the API's own error messages instead of extractor
// rejections.

#[derive(Deserialize)]
pub(super) struct JoinBody {
    #[serde(default)]
    room: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct StateParams {
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct MoveBody {
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    index: Option<i64>,
}

pub(super) async fn join(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Json(body): Json<JoinBody>,
) -> Response {
    let room = body.room.unwrap_or_default();
    match simulator.join(&room) {
        Ok(joined) => Json(joined).into_response(),
        Err(err) => {
            tracing::debug!(room, error = %err, "join rejected");
            err.into_response()
        }
    }
}

pub(super) async fn state(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Query(params): Query<StateParams>,
) -> Response {
    let Some(room) = params.room else {
        return RoomError::RoomNotFound.into_response();
    };
    let user_id = params.user_id.unwrap_or_default();
    match simulator.state(&room, &user_id) {
        Ok(state) => Json(state).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn make_move(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Json(body): Json<MoveBody>,
) -> Response {
    let Some(room) = body.room else {
        return RoomError::RoomNotFound.into_response();
    };
    let user_id = body.user_id.unwrap_or_default();
    let Some(index) = body.index.and_then(|index| usize::try_from(index).ok()) else {
        return RoomError::InvalidCell.into_response();
    };
    match simulator.make_move(&room, &user_id, index) {
        Ok(()) => Json(MoveResponse {
            success: true,
            error: None,
        })
        .into_response(),
        Err(err) => {
            tracing::debug!(room, index, error = %err, "move rejected");
            err.into_response()
        }
    }
}

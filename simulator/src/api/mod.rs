use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tictactoe_types::api::ErrorResponse;
use tower_http::trace::TraceLayer;

use crate::{RoomError, Simulator};

mod http;

pub struct Api {
    simulator: Arc<Simulator>,
}

impl Api {
    pub fn new(simulator: Arc<Simulator>) -> Self {
        Self { simulator }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/join", post(http::join))
            .route("/api/state", get(http::state))
            .route("/api/move", post(http::make_move))
            .layer(TraceLayer::new_for_http())
            .with_state(self.simulator.clone())
    }
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        let status = match self {
            RoomError::RoomNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

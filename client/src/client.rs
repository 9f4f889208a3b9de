use crate::{Error, Result};
use reqwest::{Response, StatusCode};
use std::time::Duration;
use tictactoe_types::api::{
    ErrorResponse, JoinRequest, JoinResponse, MoveRequest, MoveResponse, StateResponse,
};
use tracing::{debug, trace};
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for the room API.
#[derive(Clone, Debug)]
pub struct Client {
    pub base_url: Url,
    pub http_client: reqwest::Client,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;

        // Validate URL scheme
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }

        // Keep any path prefix when joining endpoint paths
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Takes a seat in `room`. A rejection by the server is
    /// [`Error::JoinRejected`] and is final for this attempt.
    pub async fn join(&self, room: &str) -> Result<JoinResponse> {
        let url = self.endpoint("api/join")?;
        let response = self
            .http_client
            .post(url)
            .json(&JoinRequest {
                room: room.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejection(response, Error::JoinRejected).await);
        }
        let joined = response.json::<JoinResponse>().await?;
        debug!(room, player_index = joined.player_index, "join accepted");
        Ok(joined)
    }

    /// Fetches the room as seen from `user_id`'s seat.
    pub async fn state(&self, room: &str, user_id: &str) -> Result<StateResponse> {
        let url = self.endpoint("api/state")?;
        let response = self
            .http_client
            .get(url)
            .query(&[("room", room), ("user_id", user_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            trace!(room, %status, "state request failed");
            return Err(Error::Failed(status));
        }
        Ok(response.json::<StateResponse>().await?)
    }

    /// Asks the server to place `user_id`'s marker at `index`.
    pub async fn submit_move(&self, room: &str, user_id: &str, index: usize) -> Result<()> {
        let url = self.endpoint("api/move")?;
        let response = self
            .http_client
            .post(url)
            .json(&MoveRequest {
                room: room.to_string(),
                user_id: user_id.to_string(),
                index,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejection(response, Error::MoveRejected).await);
        }

        // An empty or unexpected success body still counts as accepted.
        let body = response.text().await?;
        let accepted = serde_json::from_str::<MoveResponse>(&body).unwrap_or_default();
        match accepted.error {
            Some(message) => Err(Error::MoveRejected(message)),
            None => Ok(()),
        }
    }
}

/// Maps a failed response to an error. Only client errors are rejections;
/// server errors stay [`Error::Failed`] whatever their body says.
async fn rejection(response: Response, reject: fn(String) -> Error) -> Error {
    let status: StatusCode = response.status();
    if !status.is_client_error() {
        return Error::Failed(status);
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse { error }) => reject(error),
        Err(_) => {
            trace!(%status, body, "rejection without an error field");
            let body = body.trim();
            if body.is_empty() {
                reject(status.to_string())
            } else {
                reject(body.to_string())
            }
        }
    }
}

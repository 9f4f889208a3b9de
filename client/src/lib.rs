pub mod client;
pub mod config;
pub mod poll;
pub mod reconcile;
pub mod session;
pub mod view;

pub use client::Client;
pub use config::ClientConfig;
pub use poll::{PollHandle, Polled, DEFAULT_POLL_INTERVAL};
pub use reconcile::{Engine, Event, Phase, SkipReason};
pub use session::{Controller, Session, Submission};
pub use view::{render, TerminalView, View};
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {0}")]
    Failed(reqwest::StatusCode),
    #[error("join rejected: {0}")]
    JoinRejected(String),
    #[error("move rejected: {0}")]
    MoveRejected(String),
    #[error("unexpected response")]
    UnexpectedResponse,
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
    #[error("invalid config: {0}")]
    Config(String),
}

impl Error {
    /// Network failures and server errors, which a later attempt may not hit.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Reqwest(_) => true,
            Error::Failed(status) => status.is_server_error(),
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the chat synchronization core
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("invalid participants: self and peer ids are both required")]
    InvalidParticipants,

    #[error("message content is empty")]
    EmptyContent,

    #[error("history unavailable: {0}")]
    HistoryUnavailable(String),

    #[error("send failed: {content:?} returned for retry")]
    SendFailed { content: String },

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

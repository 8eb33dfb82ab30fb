//! Error taxonomy for the client core.
//!
//! Remote failures are classified in [`crate::api::ApiError`]; audio backend
//! failures in [`crate::audio::AudioError`]. This enum is what the session
//! and audio layers hand to callers. Storage corruption never appears here:
//! corrupt cached documents are downgraded to "absent" where they are
//! detected.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A remote call failed. Carries the classification from the HTTP layer.
    #[error(transparent)]
    Api(#[from] crate::api::ApiError),

    /// Login was rejected. The server's reason is deliberately not carried
    /// here; it is logged and collapsed to this generic condition.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The operation needs an auth token and none is available.
    #[error("authentication required")]
    AuthenticationRequired,

    /// A field failed local validation before any network call was made.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    /// `start_recording` was called while a recording session is active.
    #[error("a recording is already in progress")]
    AlreadyRecording,

    /// `stop_recording` was called with no recording session active.
    #[error("no recording in progress")]
    NotRecording,

    /// The native audio backend failed to start or stop a session.
    #[error(transparent)]
    Audio(#[from] crate::audio::AudioError),

    /// Durable storage could not be written.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

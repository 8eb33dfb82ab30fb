//! # intona-core
//!
//! Headless client core for the intonation-training service:
//! - credential and progress persistence (`store`, `progress`)
//! - the remote session client (`api`)
//! - the user session controller (`session`)
//! - the record/playback state machine (`audio`)
//! - the practice attempt orchestrator (`practice`)
//! - built-in lesson content (`catalog`)
//!
//! Presentation layers consume this crate through plain async calls and
//! returned values; nothing here knows about rendering or navigation.

pub mod api;
pub mod audio;
pub mod catalog;
pub mod error;
pub mod models;
pub mod practice;
pub mod progress;
pub mod session;
pub mod store;

pub use error::{Error, Result};
pub use models::User;
pub use session::{AuthState, UserSession};

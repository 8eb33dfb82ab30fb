//! Wire types for the intonation-training server API.
//!
//! Request and response bodies for the six server operations, with field
//! names matching the wire exactly. No I/O lives here; the HTTP client is
//! in `intona-core`.

pub mod analyze;
pub mod auth;

pub use analyze::{AnalysisDetails, AnalyzeResponse};
pub use auth::{
    AuthResponse, ChangePasswordRequest, ChangePasswordResponse, LoginRequest, RegisterRequest,
    RegisterResponse, UserProfile, VerificationRequest, VerificationResponse,
};

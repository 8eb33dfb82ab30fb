//! Domain models owned by the client.

use chrono::{DateTime, Utc};
use intona_api::UserProfile;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// The authenticated account as the client holds it, including local
/// per-construction progress and unlocked achievements.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub progress: HashMap<String, ConstructionProgress>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
}

impl User {
    /// Builds a [`User`] from the server's profile payload.
    ///
    /// A profile with a blank id or username is not a valid account and is
    /// treated as absent rather than partially trusted.
    pub fn from_profile(profile: UserProfile) -> Option<Self> {
        if profile.id.trim().is_empty() || profile.username.trim().is_empty() {
            tracing::warn!(
                id = %profile.id,
                username = %profile.username,
                "rejecting profile with blank identity fields"
            );
            return None;
        }
        Some(Self {
            id: profile.id,
            username: profile.username,
            email: profile.email,
            progress: HashMap::new(),
            achievements: Vec::new(),
        })
    }
}

/// Progress on one intonation construction.
///
/// `average_score` is the running mean of the scores that completed each
/// level in `completed_levels`. Completing a level a second time re-asserts
/// membership but never moves the average.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConstructionProgress {
    pub construction_id: String,
    pub completed_levels: HashSet<String>,
    pub average_score: f32,
}

impl ConstructionProgress {
    pub fn new(construction_id: impl Into<String>) -> Self {
        Self {
            construction_id: construction_id.into(),
            completed_levels: HashSet::new(),
            average_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon_url: String,
    #[serde(default)]
    pub is_unlocked: bool,
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// A finished or in-progress recording on disk.
///
/// The audio session manager owns at most one of these at a time; it is
/// consumed by the analyze step or replaced when a new recording starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingArtifact {
    pub file_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, username: &str) -> UserProfile {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "username": username,
            "email": "mira@example.com",
            "isVerified": true,
        }))
        .unwrap()
    }

    #[test]
    fn profile_with_identity_becomes_a_user() {
        let user = User::from_profile(profile("u1", "mira")).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.username, "mira");
        assert!(user.progress.is_empty());
    }

    #[test]
    fn blank_id_or_username_is_treated_as_absent() {
        assert!(User::from_profile(profile("", "mira")).is_none());
        assert!(User::from_profile(profile("u1", "   ")).is_none());
    }
}

//! Durable credential storage: the auth token and the cached user record.
//!
//! Both live as independent documents under one data directory; there is no
//! transactional envelope across them. Reads fail closed: a missing or
//! corrupt document yields `None` rather than an error, because a damaged
//! cache must never take down startup.

use crate::error::Result;
use crate::models::User;
use async_trait::async_trait;
use secrecy::SecretString;
use std::io;
use std::path::{Path, PathBuf};

const TOKEN_FILE: &str = "auth_token";
const USER_FILE: &str = "user.json";

#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn save_token(&self, token: &str) -> Result<()> {
        write_document(&self.dir.join(TOKEN_FILE), token.as_bytes()).await?;
        tracing::debug!("auth token persisted");
        Ok(())
    }

    pub async fn auth_token(&self) -> Option<String> {
        let token = tokio::fs::read_to_string(self.dir.join(TOKEN_FILE))
            .await
            .ok()?;
        if token.is_empty() { None } else { Some(token) }
    }

    pub async fn save_user(&self, user: &User) -> Result<()> {
        let document = serde_json::to_vec(user).map_err(io::Error::other)?;
        write_document(&self.dir.join(USER_FILE), &document).await?;
        tracing::debug!(user_id = %user.id, "user record persisted");
        Ok(())
    }

    pub async fn cached_user(&self) -> Option<User> {
        let document = tokio::fs::read(self.dir.join(USER_FILE)).await.ok()?;
        match serde_json::from_slice(&document) {
            Ok(user) => Some(user),
            Err(error) => {
                tracing::warn!(%error, "cached user record is corrupt, treating as absent");
                None
            }
        }
    }

    /// Removes both the token and the user record. Both removals are
    /// attempted even if the first fails, so a subsequent read never
    /// observes one cleared and the other intact on the success path.
    pub async fn clear(&self) -> Result<()> {
        let token = remove_if_present(&self.dir.join(TOKEN_FILE)).await;
        let user = remove_if_present(&self.dir.join(USER_FILE)).await;
        token?;
        user?;
        Ok(())
    }
}

#[async_trait]
impl crate::api::TokenSource for CredentialStore {
    async fn token(&self) -> Option<SecretString> {
        self.auth_token().await.map(SecretString::from)
    }
}

/// Writes through a temp file and renames into place, so a crash mid-write
/// cannot leave a torn document behind.
async fn write_document(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let staged = path.with_extension("tmp");
    tokio::fs::write(&staged, contents).await?;
    tokio::fs::rename(&staged, path).await
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Achievement, ConstructionProgress};
    use std::collections::{HashMap, HashSet};

    fn sample_user() -> User {
        let mut progress = HashMap::new();
        progress.insert(
            "ik1".to_string(),
            ConstructionProgress {
                construction_id: "ik1".into(),
                completed_levels: HashSet::from(["ik1_level1".to_string(), "ik1_level2".to_string()]),
                average_score: 80.0,
            },
        );
        User {
            id: "u1".into(),
            username: "mira".into(),
            email: "mira@example.com".into(),
            progress,
            achievements: vec![Achievement {
                id: "first_steps".into(),
                title: "First steps".into(),
                description: "Complete any level".into(),
                icon_url: "https://server/icons/first_steps.png".into(),
                is_unlocked: true,
                unlocked_at: None,
            }],
        }
    }

    #[tokio::test]
    async fn saved_user_round_trips_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        let user = sample_user();

        store.save_user(&user).await.unwrap();
        assert_eq!(store.cached_user().await, Some(user));
    }

    #[tokio::test]
    async fn token_round_trips_and_empty_reads_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());

        assert_eq!(store.auth_token().await, None);
        store.save_token("tok-123").await.unwrap();
        assert_eq!(store.auth_token().await, Some("tok-123".to_string()));
    }

    #[tokio::test]
    async fn corrupt_user_document_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());

        tokio::fs::write(dir.path().join(USER_FILE), b"{not json")
            .await
            .unwrap();
        assert_eq!(store.cached_user().await, None);
    }

    #[tokio::test]
    async fn clear_removes_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());

        store.save_token("tok-123").await.unwrap();
        store.save_user(&sample_user()).await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.auth_token().await, None);
        assert!(store.cached_user().await.is_none());
    }

    #[tokio::test]
    async fn clear_on_an_empty_store_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("never_written"));
        store.clear().await.unwrap();
    }
}

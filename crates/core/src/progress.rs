//! Persistent record of which levels have ever been passed.
//!
//! A level is admitted once a practice attempt reaches the pass threshold
//! and is never removed afterwards; the set only resets as part of a full
//! account reset. Stored independently of the credential documents.

use crate::error::Result;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;

const LEDGER_FILE: &str = "passed_levels.json";

#[derive(Debug, Clone)]
pub struct ProgressLedger {
    path: PathBuf,
}

impl ProgressLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join(LEDGER_FILE),
        }
    }

    /// All level ids ever passed. A missing or corrupt ledger reads as
    /// empty rather than failing.
    pub async fn passed_levels(&self) -> HashSet<String> {
        let Ok(document) = tokio::fs::read(&self.path).await else {
            return HashSet::new();
        };
        match serde_json::from_slice(&document) {
            Ok(levels) => levels,
            Err(error) => {
                tracing::warn!(%error, "passed-levels ledger is corrupt, treating as empty");
                HashSet::new()
            }
        }
    }

    pub async fn is_passed(&self, level_id: &str) -> bool {
        self.passed_levels().await.contains(level_id)
    }

    pub async fn mark_passed(&self, level_id: &str) -> Result<()> {
        let mut levels = self.passed_levels().await;
        if !levels.insert(level_id.to_string()) {
            return Ok(());
        }
        // Serialized sorted so the document is stable across rewrites.
        let mut sorted: Vec<&str> = levels.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        let document = serde_json::to_vec(&sorted).map_err(io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staged = self.path.with_extension("tmp");
        tokio::fs::write(&staged, &document).await?;
        tokio::fs::rename(&staged, &self.path).await?;
        tracing::info!(level_id, "level marked as passed");
        Ok(())
    }

    pub async fn passed_count_for(&self, level_ids: &[&str]) -> usize {
        let passed = self.passed_levels().await;
        level_ids.iter().filter(|id| passed.contains(**id)).count()
    }

    /// Full reset. Only meaningful as part of an account logout/reset.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

//! Audio session manager: the record/playback state machine.
//!
//! At most one recording session and one active playback exist at any time.
//! Starting a new playback stops the prior one first (stop-then-start, so
//! native resources are released before new ones are claimed). Playback
//! completion arrives on a oneshot channel from the backend; a watcher task
//! drives the state back to resting automatically, so callers subscribe or
//! poll [`AudioSessionManager::state`] instead of assuming synchronous
//! completion.
//!
//! Native I/O failures never leave the manager dangling: every failure path
//! resets the state to a safe non-recording/non-playing value.

use crate::error::{Error, Result};
use crate::models::RecordingArtifact;
use async_trait::async_trait;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error as ThisError;
use tokio::sync::{Mutex, oneshot};
use uuid::Uuid;

#[derive(Debug, Clone, ThisError)]
pub enum AudioError {
    #[error("audio device error: {0}")]
    Device(String),
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("audio file error: {0}")]
    File(String),
}

/// Native capture/playback operations the manager drives.
///
/// A backend owns at most one capture and one playback session internally;
/// the manager guarantees it never asks for a second of either without
/// stopping the first.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AudioBackend: Send + Sync + 'static {
    /// Begins capturing from the default input device into `destination`.
    async fn start_capture(&self, destination: &Path) -> std::result::Result<(), AudioError>;

    /// Stops the running capture and finalizes the file.
    async fn finish_capture(&self) -> std::result::Result<(), AudioError>;

    /// Begins playing `source`. The returned channel resolves when playback
    /// reaches the end of the file; it is dropped if playback is stopped
    /// early.
    async fn start_playback(
        &self,
        source: &Path,
    ) -> std::result::Result<oneshot::Receiver<()>, AudioError>;

    /// Stops the running playback, releasing its resources. Must be safe to
    /// call when nothing is playing.
    async fn stop_playback(&self) -> std::result::Result<(), AudioError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    Idle,
    Recording,
    Recorded,
    Playing,
}

struct Inner {
    state: AudioState,
    artifact: Option<RecordingArtifact>,
    /// Bumped on every playback start/stop so a superseded playback's
    /// completion cannot clobber the state of its successor.
    generation: u64,
}

pub struct AudioSessionManager<B: AudioBackend> {
    backend: B,
    recordings_dir: PathBuf,
    inner: Arc<Mutex<Inner>>,
}

impl<B: AudioBackend> AudioSessionManager<B> {
    pub fn new(backend: B, recordings_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            recordings_dir: recordings_dir.into(),
            inner: Arc::new(Mutex::new(Inner {
                state: AudioState::Idle,
                artifact: None,
                generation: 0,
            })),
        }
    }

    pub async fn state(&self) -> AudioState {
        self.inner.lock().await.state
    }

    /// Starts a new recording at a fresh unique path.
    ///
    /// Fails with [`Error::AlreadyRecording`] while a recording is active.
    /// Any previous artifact is replaced only once the new capture has
    /// actually started. An active playback is stopped first.
    pub async fn start_recording(&self) -> Result<RecordingArtifact> {
        let mut inner = self.inner.lock().await;
        if inner.state == AudioState::Recording {
            return Err(Error::AlreadyRecording);
        }
        if inner.state == AudioState::Playing {
            inner.generation += 1;
            if let Err(error) = self.backend.stop_playback().await {
                inner.state = resting_state(inner.artifact.as_ref());
                return Err(error.into());
            }
            inner.state = resting_state(inner.artifact.as_ref());
        }

        tokio::fs::create_dir_all(&self.recordings_dir).await?;
        let path = self
            .recordings_dir
            .join(format!("recording_{}.wav", Uuid::new_v4()));
        match self.backend.start_capture(&path).await {
            Ok(()) => {
                let artifact = RecordingArtifact {
                    file_path: path,
                    created_at: Utc::now(),
                };
                tracing::debug!(path = %artifact.file_path.display(), "recording started");
                inner.artifact = Some(artifact.clone());
                inner.state = AudioState::Recording;
                Ok(artifact)
            }
            Err(error) => {
                tracing::warn!(%error, "failed to start recording");
                inner.state = resting_state(inner.artifact.as_ref());
                Err(error.into())
            }
        }
    }

    /// Finalizes the running recording and returns its artifact.
    pub async fn stop_recording(&self) -> Result<RecordingArtifact> {
        let mut inner = self.inner.lock().await;
        if inner.state != AudioState::Recording {
            return Err(Error::NotRecording);
        }
        match self.backend.finish_capture().await {
            Ok(()) => match inner.artifact.clone() {
                Some(artifact) => {
                    inner.state = AudioState::Recorded;
                    tracing::debug!(path = %artifact.file_path.display(), "recording finished");
                    Ok(artifact)
                }
                None => {
                    inner.state = AudioState::Idle;
                    Err(Error::NotRecording)
                }
            },
            Err(error) => {
                tracing::warn!(%error, "failed to finalize recording, discarding artifact");
                inner.artifact = None;
                inner.state = AudioState::Idle;
                Err(error.into())
            }
        }
    }

    /// Plays `source` (a recorded artifact or any bundled reference audio),
    /// stopping a prior playback first. Completion is observed
    /// asynchronously and returns the state to resting on its own.
    pub async fn play(&self, source: &Path) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == AudioState::Recording {
            return Err(Error::AlreadyRecording);
        }
        if inner.state == AudioState::Playing {
            inner.generation += 1;
            if let Err(error) = self.backend.stop_playback().await {
                inner.state = resting_state(inner.artifact.as_ref());
                return Err(error.into());
            }
        }

        inner.generation += 1;
        let generation = inner.generation;
        match self.backend.start_playback(source).await {
            Ok(done) => {
                inner.state = AudioState::Playing;
                tracing::debug!(source = %source.display(), "playback started");
                let shared = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    // Err means the sender was dropped by an early stop; the
                    // generation check makes either outcome safe.
                    let _ = done.await;
                    let mut inner = shared.lock().await;
                    if inner.generation == generation && inner.state == AudioState::Playing {
                        inner.state = resting_state(inner.artifact.as_ref());
                        tracing::debug!("playback completed");
                    }
                });
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%error, "failed to start playback");
                inner.state = resting_state(inner.artifact.as_ref());
                Err(error.into())
            }
        }
    }

    /// Stops playback. Idempotent: stopping when nothing is playing is not
    /// an error.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != AudioState::Playing {
            return Ok(());
        }
        inner.generation += 1;
        let result = self.backend.stop_playback().await;
        inner.state = resting_state(inner.artifact.as_ref());
        result.map_err(Into::into)
    }

    /// The current artifact, if a finished (or in-progress) recording
    /// exists. Does not consume it.
    pub async fn recording(&self) -> Option<RecordingArtifact> {
        self.inner.lock().await.artifact.clone()
    }

    /// Consumes the finished recording, leaving the manager without an
    /// artifact. Returns `None` while recording or when nothing has been
    /// recorded.
    pub async fn take_recording(&self) -> Option<RecordingArtifact> {
        let mut inner = self.inner.lock().await;
        if inner.state == AudioState::Recording {
            return None;
        }
        let artifact = inner.artifact.take();
        if inner.state == AudioState::Recorded {
            inner.state = AudioState::Idle;
        }
        artifact
    }
}

fn resting_state(artifact: Option<&RecordingArtifact>) -> AudioState {
    if artifact.is_some() {
        AudioState::Recorded
    } else {
        AudioState::Idle
    }
}

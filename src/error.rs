use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by the adapters, the renderer and the coordinator.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Credentials or endpoints are missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote service answered with a failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Polling gave up before the backend reached a terminal state.
    #[error("timed out after {attempts} polls ({:.1}s)", .elapsed.as_secs_f32())]
    Timeout { attempts: usize, elapsed: Duration },

    /// Missing or unreadable input, or nothing to work on.
    #[error("input error: {0}")]
    Input(String),

    /// Drawing, measuring or encoding failed.
    #[error("render error: {0}")]
    Render(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Transport,
    Backend,
    Timeout,
    Input,
    Render,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration(_) => ErrorKind::Configuration,
            PipelineError::Transport(_) => ErrorKind::Transport,
            PipelineError::Backend(_) => ErrorKind::Backend,
            PipelineError::Timeout { .. } => ErrorKind::Timeout,
            PipelineError::Input(_) => ErrorKind::Input,
            PipelineError::Render(_) => ErrorKind::Render,
        }
    }

    pub(crate) fn render(err: anyhow::Error) -> Self {
        PipelineError::Render(format!("{:#}", err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ocr,
    Translate,
    Render,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ocr => "ocr",
            Stage::Translate => "translate",
            Stage::Render => "render",
        }
    }

    /// Human-readable summary used as the `message` of a failed tool call.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Stage::Ocr => "text recognition failed",
            Stage::Translate => "translation failed",
            Stage::Render => "image rendering failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`PipelineError`] tagged with the stage that produced it.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub error: PipelineError,
}

impl StageError {
    pub fn new(stage: Stage, error: PipelineError) -> Self {
        Self { stage, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

//! Pipeline state machine.

use crate::{PipelineError, PipelineFailure};

/// States of a single signing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    FetchingAssets,
    LoadingCredential,
    Rendering,
    Composing,
    Signing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingAssets => "fetching_assets",
            Self::LoadingCredential => "loading_credential",
            Self::Rendering => "rendering",
            Self::Composing => "composing",
            Self::Signing => "signing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// The state that follows this one on success.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::FetchingAssets),
            Self::FetchingAssets => Some(Self::LoadingCredential),
            Self::LoadingCredential => Some(Self::Rendering),
            Self::Rendering => Some(Self::Composing),
            Self::Composing => Some(Self::Signing),
            Self::Signing => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the state of one pipeline run.
///
/// Owned by a single request; never shared.
#[derive(Debug)]
pub struct PipelineRun {
    state: PipelineState,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Move to the next state in sequence.
    ///
    /// Terminal states do not advance.
    pub fn advance(&mut self) -> PipelineState {
        if let Some(next) = self.state.next() {
            tracing::debug!(from = %self.state, to = %next, "pipeline state");
            self.state = next;
        }
        self.state
    }

    /// Run a stage: advance into it, then execute `f`, converting its error
    /// into a failure tagged with the stage.
    pub fn stage<T>(
        &mut self,
        expected: PipelineState,
        f: impl FnOnce() -> Result<T, PipelineError>,
    ) -> Result<T, PipelineFailure> {
        self.advance();
        debug_assert_eq!(self.state, expected, "pipeline stages out of order");
        f().map_err(|error| self.fail(error))
    }

    /// Mark the run as failed in its current state.
    pub fn fail(&mut self, error: PipelineError) -> PipelineFailure {
        let stage = self.state;
        tracing::debug!(from = %stage, to = %PipelineState::Failed, "pipeline state");
        self.state = PipelineState::Failed;
        PipelineFailure { stage, error }
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

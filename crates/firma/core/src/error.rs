//! Signing pipeline error taxonomy.

use thiserror::Error;

use crate::PipelineState;

/// Result alias for pipeline components.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error raised by one of the pipeline components.
///
/// Every variant is terminal for the request that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("invalid credential: {0}")]
    Credential(String),

    #[error("invalid document: {0}")]
    DocumentParse(String),

    #[error("invalid image: {0}")]
    ImageDecode(String),

    #[error("overlay rendering failed: {0}")]
    Render(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl PipelineError {
    /// Create a fetch error for a URL.
    pub fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// The taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Credential(_) => ErrorKind::Credential,
            Self::DocumentParse(_) => ErrorKind::DocumentParse,
            Self::ImageDecode(_) => ErrorKind::ImageDecode,
            Self::Render(_) => ErrorKind::Render,
            Self::Signing(_) => ErrorKind::Signing,
        }
    }
}

/// Error kinds surfaced at the orchestration boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Fetch,
    Credential,
    DocumentParse,
    ImageDecode,
    Render,
    Signing,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "FetchError",
            Self::Credential => "CredentialError",
            Self::DocumentParse => "DocumentParseError",
            Self::ImageDecode => "ImageDecodeError",
            Self::Render => "RenderError",
            Self::Signing => "SigningError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline run that ended in the `Failed` state.
///
/// Carries the state the run was in when the error occurred.
#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct PipelineFailure {
    pub stage: PipelineState,
    #[source]
    pub error: PipelineError,
}

impl PipelineFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let err = PipelineError::fetch("http://x/a.p12", "HTTP 404 Not Found");
        assert_eq!(err.kind().as_str(), "FetchError");
        assert_eq!(err.to_string(), "failed to fetch http://x/a.p12: HTTP 404 Not Found");

        let err = PipelineError::Credential("mac verify failure".into());
        assert_eq!(err.kind(), ErrorKind::Credential);
        assert_eq!(err.kind().to_string(), "CredentialError");
    }

    #[test]
    fn test_failure_displays_inner_error() {
        let failure = PipelineFailure {
            stage: PipelineState::Signing,
            error: PipelineError::Signing("key is not RSA".into()),
        };
        assert_eq!(failure.to_string(), "signing failed: key is not RSA");
        assert_eq!(failure.kind(), ErrorKind::Signing);
    }
}

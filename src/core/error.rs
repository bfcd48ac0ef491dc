use thiserror::Error;
use crate::adapters::pipeline::FailureType;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed invocation event: {0}")]
    Event(String),

    #[error("artifact unreadable: {0}")]
    ArtifactUnreadable(String),

    #[error("platform rejected request: {0}")]
    PlatformRequestRejected(String),

    #[error("unmapped {stage} status '{status}'")]
    UnmappedStatus { stage: &'static str, status: String },

    #[error("credential or storage failure: {0:#}")]
    CredentialOrStorage(anyhow::Error),

    #[error("{0:#}")]
    Platform(anyhow::Error),
}

impl PipelineError {
    pub fn failure_type(&self) -> FailureType {
        match self {
            PipelineError::Config(_) => FailureType::ConfigurationError,
            _ => FailureType::JobFailed,
        }
    }

    pub fn storage(err: anyhow::Error) -> Self {
        PipelineError::CredentialOrStorage(err)
    }

    pub fn platform(err: anyhow::Error) -> Self {
        PipelineError::Platform(err)
    }
}

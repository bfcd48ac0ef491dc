use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    JobFailed,
    ConfigurationError,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FailureDetails {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: FailureType,
}

impl FailureDetails {
    pub fn job_failed(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: FailureType::JobFailed }
    }
}

/// The calling orchestrator. Exactly one of these is sent per invocation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PipelineReporter: Send + Sync {
    async fn report_success(&self, job_id: &str, continuation_token: Option<String>, summary: Option<String>) -> Result<()>;

    async fn report_failure(&self, job_id: &str, details: FailureDetails) -> Result<()>;
}

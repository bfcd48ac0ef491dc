use anyhow::Context;
use std::fmt;
use std::future::Future;
use log::info;
use crate::adapters::pipeline::FailureDetails;
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::status::{StageStatus, Verdict};

/// Name of the platform resource an earlier invocation submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What one invocation tells the calling orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Continue { token: ContinuationToken, summary: String },
    Succeeded { summary: String },
    Failed(FailureDetails),
}

/// Queries the resource behind `token` once and maps its status through the
/// stage table. Nothing is retried here; the orchestrator re-invokes.
pub async fn poll<S, Fut>(token: &ContinuationToken, describe: Fut) -> PipelineResult<Outcome>
where
    S: StageStatus,
    Fut: Future<Output = anyhow::Result<String>>,
{
    let raw = describe
        .await
        .with_context(|| format!("Failed to describe {} resource {}", S::STAGE, token))
        .map_err(PipelineError::platform)?;
    let status: S = raw.parse()?;
    let summary = status.message().to_string();
    info!("{} {}: {} ({})", S::STAGE, token, status, summary);

    Ok(match status.verdict() {
        Verdict::KeepPolling => Outcome::Continue { token: token.clone(), summary },
        Verdict::Succeeded => Outcome::Succeeded { summary },
        Verdict::Failed => Outcome::Failed(FailureDetails::job_failed(summary)),
    })
}

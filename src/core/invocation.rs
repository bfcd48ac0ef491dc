use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use log::{info, error};
use crate::adapters::pipeline::{FailureDetails, PipelineReporter};
use crate::adapters::storage::ArtifactCredentials;
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::poller::{ContinuationToken, Outcome};
use crate::utils::config::StageConfig;

#[cfg(test)]
use mockall::automock;

/// The event the pipeline hands to each invocation.
#[derive(Deserialize, Debug, Clone)]
pub struct InvocationEvent {
    #[serde(rename = "CodePipeline.job")]
    pub job: PipelineJob,
}

/// Only the id is parsed eagerly so that a malformed `data` block can still
/// be reported against the job.
#[derive(Deserialize, Debug, Clone)]
pub struct PipelineJob {
    pub id: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageData {
    #[serde(default)]
    pub input_artifacts: Vec<Artifact>,
    #[serde(default)]
    pub output_artifacts: Vec<Artifact>,
    pub artifact_credentials: ArtifactCredentials,
    #[serde(default)]
    pub continuation_token: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub name: String,
    pub location: ArtifactLocation,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLocation {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub s3_location: S3Location,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct S3Location {
    pub bucket_name: String,
    pub object_key: String,
}

impl StageData {
    pub fn input_location(&self) -> PipelineResult<&S3Location> {
        self.input_artifacts.first()
            .map(|a| &a.location.s3_location)
            .ok_or_else(|| PipelineError::ArtifactUnreadable("event has no input artifact".to_string()))
    }

    pub fn output_location(&self) -> PipelineResult<&S3Location> {
        self.output_artifacts.first()
            .map(|a| &a.location.s3_location)
            .ok_or_else(|| PipelineError::ArtifactUnreadable("event has no output artifact".to_string()))
    }
}

/// Where a stage stands, as far as the token the orchestrator carries says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageState {
    AwaitingSubmission,
    AwaitingCompletion(ContinuationToken),
}

impl StageState {
    pub fn from_token(token: Option<String>) -> Self {
        match token {
            Some(token) => StageState::AwaitingCompletion(ContinuationToken::new(token)),
            None => StageState::AwaitingSubmission,
        }
    }
}

/// One orchestration stage: how to submit its work and how to check on it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StageDriver: Send + Sync {
    async fn submit(&self, config: &StageConfig, data: &StageData) -> PipelineResult<Outcome>;

    async fn poll(&self, token: &ContinuationToken) -> PipelineResult<Outcome>;
}

/// Runs one invocation end to end and reports its outcome.
///
/// Every error raised while advancing the stage becomes a failure report.
/// The only error returned is a failure to deliver that report.
pub async fn handle(
    driver: &dyn StageDriver,
    reporter: &dyn PipelineReporter,
    job: PipelineJob,
    config: PipelineResult<StageConfig>,
) -> Result<Outcome> {
    let outcome = match advance(driver, job.data, config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Pipeline job {} failed: {}", job.id, e);
            Outcome::Failed(FailureDetails { message: e.to_string(), kind: e.failure_type() })
        }
    };
    report(reporter, &job.id, outcome.clone())
        .await
        .with_context(|| format!("Failed to report outcome of pipeline job {}", job.id))?;
    Ok(outcome)
}

async fn advance(
    driver: &dyn StageDriver,
    data: Value,
    config: PipelineResult<StageConfig>,
) -> PipelineResult<Outcome> {
    let config = config?;
    let data: StageData = serde_json::from_value(data)
        .map_err(|e| PipelineError::Event(e.to_string()))?;

    match StageState::from_token(data.continuation_token.clone()) {
        StageState::AwaitingSubmission => {
            info!("No continuation token, submitting");
            driver.submit(&config, &data).await
        }
        StageState::AwaitingCompletion(token) => {
            info!("Resuming with continuation token {}", token);
            driver.poll(&token).await
        }
    }
}

async fn report(reporter: &dyn PipelineReporter, job_id: &str, outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Continue { token, summary } => {
            reporter.report_success(job_id, Some(token.into_inner()), Some(summary)).await
        }
        Outcome::Succeeded { summary } => reporter.report_success(job_id, None, Some(summary)).await,
        Outcome::Failed(details) => reporter.report_failure(job_id, details).await,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use crate::adapters::pipeline::{FailureType, MockPipelineReporter};
    use crate::utils::config::tests::sample_config;

    pub(crate) fn stage_data(token: Option<&str>) -> Value {
        let mut data = json!({
            "inputArtifacts": [{
                "name": "SourceOutput",
                "location": {"type": "S3", "s3Location": {"bucketName": "artifacts", "objectKey": "pipeline/SourceOut/abc.zip"}}
            }],
            "outputArtifacts": [{
                "name": "TrainOutput",
                "location": {"type": "S3", "s3Location": {"bucketName": "artifacts", "objectKey": "pipeline/TrainOut/def"}}
            }],
            "artifactCredentials": {"accessKeyId": "AKID", "secretAccessKey": "secret", "sessionToken": "token"}
        });
        if let Some(token) = token {
            data["continuationToken"] = json!(token);
        }
        data
    }

    fn job(token: Option<&str>) -> PipelineJob {
        PipelineJob { id: "job-1".to_string(), data: stage_data(token) }
    }

    fn succeeded() -> PipelineResult<Outcome> {
        Ok(Outcome::Succeeded { summary: "done".to_string() })
    }

    #[test]
    fn parses_pipeline_event() {
        let event: InvocationEvent = serde_json::from_value(json!({
            "CodePipeline.job": {"id": "11111111-abcd", "data": stage_data(Some("tok"))}
        }))
        .unwrap();
        let data: StageData = serde_json::from_value(event.job.data).unwrap();

        assert_eq!(event.job.id, "11111111-abcd");
        assert_eq!(data.continuation_token.as_deref(), Some("tok"));
        assert_eq!(data.input_location().unwrap().object_key, "pipeline/SourceOut/abc.zip");
        assert_eq!(data.output_location().unwrap().bucket_name, "artifacts");
    }

    #[test]
    fn token_presence_selects_the_state() {
        assert_eq!(StageState::from_token(None), StageState::AwaitingSubmission);
        assert_eq!(
            StageState::from_token(Some("sentiment-2024".to_string())),
            StageState::AwaitingCompletion(ContinuationToken::new("sentiment-2024"))
        );
    }

    #[tokio::test]
    async fn submits_without_token_and_never_polls() {
        let mut driver = MockStageDriver::new();
        driver.expect_submit().times(1).returning(|_, _| {
            Ok(Outcome::Continue { token: ContinuationToken::new("sentiment-1"), summary: "submitted".to_string() })
        });
        driver.expect_poll().times(0);
        let mut reporter = MockPipelineReporter::new();
        reporter.expect_report_success()
            .withf(|id, token, _| id == "job-1" && token.as_deref() == Some("sentiment-1"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        handle(&driver, &reporter, job(None), Ok(sample_config())).await.unwrap();
    }

    #[tokio::test]
    async fn polls_with_token_and_never_submits() {
        let mut driver = MockStageDriver::new();
        driver.expect_submit().times(0);
        driver.expect_poll()
            .withf(|token| token.as_str() == "sentiment-1")
            .times(1)
            .returning(|_| succeeded());
        let mut reporter = MockPipelineReporter::new();
        reporter.expect_report_success()
            .withf(|_, token, _| token.is_none())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let outcome = handle(&driver, &reporter, job(Some("sentiment-1")), Ok(sample_config())).await.unwrap();

        assert!(matches!(outcome, Outcome::Succeeded { .. }));
    }

    #[tokio::test]
    async fn driver_errors_become_failure_reports() {
        let mut driver = MockStageDriver::new();
        driver.expect_poll().returning(|_| {
            Err(PipelineError::UnmappedStatus { stage: "training", status: "Paused".to_string() })
        });
        let mut reporter = MockPipelineReporter::new();
        reporter.expect_report_success().times(0);
        reporter.expect_report_failure()
            .withf(|_, details| details.kind == FailureType::JobFailed && details.message.contains("Paused"))
            .times(1)
            .returning(|_, _| Ok(()));

        handle(&driver, &reporter, job(Some("sentiment-1")), Ok(sample_config())).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_configuration_is_reported_before_any_platform_call() {
        let mut driver = MockStageDriver::new();
        driver.expect_submit().times(0);
        driver.expect_poll().times(0);
        let mut reporter = MockPipelineReporter::new();
        reporter.expect_report_failure()
            .withf(|_, details| details.kind == FailureType::ConfigurationError)
            .times(1)
            .returning(|_, _| Ok(()));

        let config = Err(PipelineError::Config("IMG must be set".to_string()));
        handle(&driver, &reporter, job(None), config).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_stage_data_is_reported() {
        let driver = MockStageDriver::new();
        let mut reporter = MockPipelineReporter::new();
        reporter.expect_report_failure()
            .withf(|id, details| id == "job-7" && details.message.starts_with("malformed invocation event"))
            .times(1)
            .returning(|_, _| Ok(()));

        let job = PipelineJob { id: "job-7".to_string(), data: json!({"inputArtifacts": []}) };
        handle(&driver, &reporter, job, Ok(sample_config())).await.unwrap();
    }

    #[tokio::test]
    async fn report_delivery_failures_are_returned() {
        let mut driver = MockStageDriver::new();
        driver.expect_poll().returning(|_| succeeded());
        let mut reporter = MockPipelineReporter::new();
        reporter.expect_report_success().returning(|_, _, _| Err(anyhow::anyhow!("connection reset")));

        let result = handle(&driver, &reporter, job(Some("sentiment-1")), Ok(sample_config())).await;

        assert!(result.is_err());
    }
}

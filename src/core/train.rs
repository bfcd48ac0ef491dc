use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use log::{info, debug};
use crate::adapters::platform::{
    AlgorithmSpecification, OutputDataConfig, ResourceConfig, StoppingCondition, TrainingJobRequest,
};
use crate::core::artifact::{fetch_commit_id, training_job_artifact};
use crate::core::clients::Clients;
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::invocation::{StageData, StageDriver};
use crate::core::manifest::{InputManifest, ManifestResolver};
use crate::core::poller::{poll, ContinuationToken, Outcome};
use crate::core::record::JobRecord;
use crate::core::session::ArtifactSession;
use crate::core::status::TrainingStatus;
use crate::utils::config::StageConfig;
use crate::utils::lib::resource_name;

pub const HYPERPARAMETER_PREFIX: &str = "input/config/";
pub const METADATA_STORE_HYPERPARAMETER: &str = "meta_data_store";

/// Training stage: submits a training job and polls it until it finishes.
pub struct Trainer {
    clients: Clients,
    clock: fn() -> DateTime<Utc>,
}

impl Trainer {
    pub fn new(clients: Clients) -> Self {
        Self { clients, clock: Utc::now }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    async fn load_hyperparameters(&self, config: &StageConfig) -> PipelineResult<BTreeMap<String, String>> {
        let objects = self.clients.store.list_objects(&config.source_bucket, HYPERPARAMETER_PREFIX)
            .await
            .context("Failed to list hyperparameter configuration")
            .map_err(PipelineError::storage)?;

        let Some(object) = objects.into_iter().find(|o| o.key != HYPERPARAMETER_PREFIX) else {
            info!("No hyperparameter configuration under {}, using defaults", HYPERPARAMETER_PREFIX);
            return Ok(BTreeMap::new());
        };

        info!("Reading hyperparameters from {}", object.key);
        let body = self.clients.store.get_object(&config.source_bucket, &object.key)
            .await
            .with_context(|| format!("Failed to read hyperparameters from {}", object.key))
            .map_err(PipelineError::storage)?;
        parse_hyperparameters(&body)
    }
}

/// Flattens a JSON object into the string map the platform accepts.
pub fn parse_hyperparameters(body: &[u8]) -> PipelineResult<BTreeMap<String, String>> {
    let doc: Value = serde_json::from_slice(body)
        .map_err(|e| PipelineError::ArtifactUnreadable(format!("hyperparameters are not valid JSON: {}", e)))?;
    let Value::Object(entries) = doc else {
        return Err(PipelineError::ArtifactUnreadable("hyperparameters must be a JSON object".to_string()));
    };
    Ok(entries
        .into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect())
}

pub fn build_request(
    config: &StageConfig,
    job_name: &str,
    manifest: InputManifest,
    hyperparameters: &BTreeMap<String, String>,
) -> TrainingJobRequest {
    let mut hyper_parameters = hyperparameters.clone();
    hyper_parameters.insert(METADATA_STORE_HYPERPARAMETER.to_string(), config.metadata_table.clone());

    TrainingJobRequest {
        training_job_name: job_name.to_string(),
        hyper_parameters,
        algorithm_specification: AlgorithmSpecification {
            training_image: config.image.clone(),
            training_input_mode: "File".to_string(),
        },
        role_arn: config.role_arn.clone(),
        input_data_config: manifest.channels,
        resource_config: resource_config(config),
        output_data_config: OutputDataConfig { s3_output_path: config.dest_uri.clone() },
        stopping_condition: StoppingCondition { max_runtime_in_seconds: config.max_runtime_secs },
    }
}

fn resource_config(config: &StageConfig) -> ResourceConfig {
    ResourceConfig {
        instance_type: config.instance_type.clone(),
        instance_count: config.instance_count,
        volume_size_gb: config.volume_size_gb,
    }
}

#[async_trait]
impl StageDriver for Trainer {
    async fn submit(&self, config: &StageConfig, data: &StageData) -> PipelineResult<Outcome> {
        let hyperparameters = self.load_hyperparameters(config).await?;
        let manifest = ManifestResolver::new(self.clients.store.as_ref(), &config.source_bucket, &config.source_data_uri)
            .resolve()
            .await?;

        let session = ArtifactSession::open(self.clients.sessions.as_ref(), &data.artifact_credentials)?;
        let source_commit = fetch_commit_id(&session, data.input_location()?).await?;

        let job_name = resource_name(&config.name_prefix, (self.clock)(), config.name_suffix);
        info!("Submitting training job {}", job_name);
        session.write(data.output_location()?, training_job_artifact(&job_name)?).await?;

        let record = JobRecord {
            job_name: job_name.clone(),
            source_commit,
            resource_config: resource_config(config),
            training_image: config.image.clone(),
            input_bucket: config.source_bucket.clone(),
            input_manifest: manifest.versions.clone(),
            hyperparameters: hyperparameters.clone(),
        };
        self.clients.metadata.put_item(&config.metadata_table, &job_name, record.create_item())
            .await
            .with_context(|| format!("Failed to create job record {}", job_name))
            .map_err(PipelineError::storage)?;

        let request = build_request(config, &job_name, manifest, &hyperparameters);
        debug!("Training job request: {:?}", request);
        let arn = self.clients.platform.create_training_job(&request)
            .await
            .with_context(|| format!("Failed to create training job {}", job_name))
            .map_err(PipelineError::platform)?;

        match arn {
            Some(arn) => {
                info!("Training job {} created as {}", job_name, arn);
                Ok(Outcome::Continue {
                    token: ContinuationToken::new(job_name),
                    summary: format!("Training job {} submitted", arn),
                })
            }
            None => Err(PipelineError::PlatformRequestRejected(format!(
                "Invalid Request: no identifier returned for training job {}",
                job_name
            ))),
        }
    }

    async fn poll(&self, token: &ContinuationToken) -> PipelineResult<Outcome> {
        let platform = self.clients.platform.clone();
        poll::<TrainingStatus, _>(token, async move {
            platform.describe_training_job(token.as_str()).await.map(|d| d.status)
        })
        .await
    }
}

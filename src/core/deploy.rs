use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use crate::adapters::platform::{
    ContainerDefinition, EndpointConfigRequest, EndpointRequest, ModelRequest, ProductionVariant,
};
use crate::core::artifact::fetch_training_job_name;
use crate::core::clients::Clients;
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::invocation::{StageData, StageDriver};
use crate::core::poller::{poll, ContinuationToken, Outcome};
use crate::core::record::{training_summary_updates, DeploymentRecord};
use crate::core::session::ArtifactSession;
use crate::core::status::EndpointStatus;
use crate::utils::config::StageConfig;
use crate::utils::lib::resource_name;

pub const VARIANT_NAME: &str = "initial-variant";
pub const ENDPOINT_INSTANCE_TYPE: &str = "ml.t2.medium";
pub const ENDPOINT_INSTANCE_COUNT: u32 = 1;

pub fn model_data_url(bucket: &str, training_job_name: &str) -> String {
    format!("s3://{}/{}/output/model.tar.gz", bucket, training_job_name)
}

pub fn deployment_names(config: &StageConfig, now: DateTime<Utc>) -> DeploymentRecord {
    let endpoint_name = resource_name(&config.name_prefix, now, config.name_suffix);
    DeploymentRecord {
        inference_image: config.image.clone(),
        model_name: format!("model-{}", endpoint_name),
        endpoint_config_name: format!("endpoint-config-{}", endpoint_name),
        endpoint_name,
    }
}

/// Deployment stage: hosts a finished training job's model behind an endpoint.
pub struct Deployer {
    clients: Clients,
    clock: fn() -> DateTime<Utc>,
}

impl Deployer {
    pub fn new(clients: Clients) -> Self {
        Self { clients, clock: Utc::now }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    async fn record_training_summary(&self, config: &StageConfig, training_job_name: &str) -> PipelineResult<()> {
        let description = self.clients.platform.describe_training_job(training_job_name)
            .await
            .with_context(|| format!("Failed to describe training job {}", training_job_name))
            .map_err(PipelineError::platform)?;
        info!("Training job {} finished with status {}", training_job_name, description.status);

        self.clients.metadata
            .update_item(&config.metadata_table, training_job_name, training_summary_updates(&description))
            .await
            .with_context(|| format!("Failed to record training summary for {}", training_job_name))
            .map_err(PipelineError::storage)
    }

    async fn create_endpoint(&self, config: &StageConfig, training_job_name: &str, names: &DeploymentRecord) -> PipelineResult<Option<String>> {
        let platform = &self.clients.platform;

        let model = ModelRequest {
            model_name: names.model_name.clone(),
            execution_role_arn: config.role_arn.clone(),
            primary_container: ContainerDefinition {
                image: names.inference_image.clone(),
                model_data_url: model_data_url(&config.dest_bucket, training_job_name),
            },
        };
        platform.create_model(&model)
            .await
            .with_context(|| format!("Failed to create model {}", model.model_name))
            .map_err(PipelineError::platform)?
            .ok_or_else(|| PipelineError::PlatformRequestRejected(format!("Model {} not created", model.model_name)))?;

        let endpoint_config = EndpointConfigRequest {
            endpoint_config_name: names.endpoint_config_name.clone(),
            production_variants: vec![ProductionVariant {
                variant_name: VARIANT_NAME.to_string(),
                model_name: names.model_name.clone(),
                initial_instance_count: ENDPOINT_INSTANCE_COUNT,
                instance_type: ENDPOINT_INSTANCE_TYPE.to_string(),
            }],
        };
        platform.create_endpoint_config(&endpoint_config)
            .await
            .with_context(|| format!("Failed to create endpoint config {}", names.endpoint_config_name))
            .map_err(PipelineError::platform)?
            .ok_or_else(|| {
                PipelineError::PlatformRequestRejected(format!("Endpoint config {} not created", names.endpoint_config_name))
            })?;

        let endpoint = EndpointRequest {
            endpoint_name: names.endpoint_name.clone(),
            endpoint_config_name: names.endpoint_config_name.clone(),
        };
        platform.create_endpoint(&endpoint)
            .await
            .with_context(|| format!("Failed to create endpoint {}", names.endpoint_name))
            .map_err(PipelineError::platform)
    }
}

#[async_trait]
impl StageDriver for Deployer {
    async fn submit(&self, config: &StageConfig, data: &StageData) -> PipelineResult<Outcome> {
        let session = ArtifactSession::open(self.clients.sessions.as_ref(), &data.artifact_credentials)?;
        let training_job_name = fetch_training_job_name(&session, data.input_location()?).await?;
        info!("Deploying model from training job {}", training_job_name);

        self.record_training_summary(config, &training_job_name).await?;

        let names = deployment_names(config, (self.clock)());
        let endpoint_arn = self.create_endpoint(config, &training_job_name, &names).await?;

        // Written even when the endpoint call came back empty, so the attempt is on record.
        self.clients.metadata.update_item(&config.metadata_table, &training_job_name, names.updates())
            .await
            .with_context(|| format!("Failed to record deployment for {}", training_job_name))
            .map_err(PipelineError::storage)?;

        match endpoint_arn {
            Some(arn) => {
                info!("Endpoint {} created as {}", names.endpoint_name, arn);
                Ok(Outcome::Continue {
                    token: ContinuationToken::new(names.endpoint_name),
                    summary: format!("Endpoint {} is being created", arn),
                })
            }
            None => {
                warn!("Endpoint {} returned no identifier", names.endpoint_name);
                Err(PipelineError::PlatformRequestRejected("Endpoint not Created".to_string()))
            }
        }
    }

    async fn poll(&self, token: &ContinuationToken) -> PipelineResult<Outcome> {
        poll::<EndpointStatus, _>(token, self.clients.platform.describe_endpoint(token.as_str())).await
    }
}

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct S3DataSource {
    pub s3_data_type: String,
    pub s3_uri: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DataSource {
    pub s3_data_source: S3DataSource,
}

/// One input channel of a training job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Channel {
    pub channel_name: String,
    pub data_source: DataSource,
}

impl Channel {
    pub fn s3_prefix(name: &str, uri: String) -> Self {
        Self {
            channel_name: name.to_string(),
            data_source: DataSource {
                s3_data_source: S3DataSource { s3_data_type: "S3Prefix".to_string(), s3_uri: uri },
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AlgorithmSpecification {
    pub training_image: String,
    pub training_input_mode: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceConfig {
    pub instance_type: String,
    pub instance_count: u32,
    #[serde(rename = "VolumeSizeInGB")]
    pub volume_size_gb: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct OutputDataConfig {
    pub s3_output_path: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StoppingCondition {
    pub max_runtime_in_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TrainingJobRequest {
    pub training_job_name: String,
    pub hyper_parameters: BTreeMap<String, String>,
    pub algorithm_specification: AlgorithmSpecification,
    pub role_arn: String,
    pub input_data_config: Vec<Channel>,
    pub resource_config: ResourceConfig,
    pub output_data_config: OutputDataConfig,
    pub stopping_condition: StoppingCondition,
}

/// What the platform reports about an existing training job.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingJobDescription {
    pub status: String,
    pub creation_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerDefinition {
    pub image: String,
    pub model_data_url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ModelRequest {
    pub model_name: String,
    pub execution_role_arn: String,
    pub primary_container: ContainerDefinition,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ProductionVariant {
    pub variant_name: String,
    pub model_name: String,
    pub initial_instance_count: u32,
    pub instance_type: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointConfigRequest {
    pub endpoint_config_name: String,
    pub production_variants: Vec<ProductionVariant>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointRequest {
    pub endpoint_name: String,
    pub endpoint_config_name: String,
}

/// The job-execution platform. Creation calls return the new resource's
/// identifier, or `None` when the platform answered without one.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait JobPlatform: Send + Sync {
    async fn create_training_job(&self, request: &TrainingJobRequest) -> Result<Option<String>>;

    async fn describe_training_job(&self, name: &str) -> Result<TrainingJobDescription>;

    async fn create_model(&self, request: &ModelRequest) -> Result<Option<String>>;

    async fn create_endpoint_config(&self, request: &EndpointConfigRequest) -> Result<Option<String>>;

    async fn create_endpoint(&self, request: &EndpointRequest) -> Result<Option<String>>;

    async fn describe_endpoint(&self, name: &str) -> Result<String>;
}

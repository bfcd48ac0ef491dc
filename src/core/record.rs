use std::collections::BTreeMap;
use crate::adapters::metadata::{AttributeValue, FieldUpdate, Item, KEY_ATTRIBUTE};
use crate::adapters::platform::{ResourceConfig, TrainingJobDescription};

/// The audit record written once when a training job is submitted.
///
/// The manifest and hyperparameters only ever travel through `create_item`;
/// no update built in this crate names those attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_name: String,
    pub source_commit: String,
    pub resource_config: ResourceConfig,
    pub training_image: String,
    pub input_bucket: String,
    pub input_manifest: BTreeMap<String, String>,
    pub hyperparameters: BTreeMap<String, String>,
}

impl JobRecord {
    pub fn create_item(&self) -> Item {
        BTreeMap::from([
            (KEY_ATTRIBUTE.to_string(), AttributeValue::string(&self.job_name)),
            ("instance_type".to_string(), AttributeValue::string(&self.resource_config.instance_type)),
            ("instance_count".to_string(), AttributeValue::number(self.resource_config.instance_count)),
            ("volume_size_gb".to_string(), AttributeValue::number(self.resource_config.volume_size_gb)),
            ("source_commit".to_string(), AttributeValue::string(&self.source_commit)),
            ("training_image".to_string(), AttributeValue::string(&self.training_image)),
            ("input_bucket".to_string(), AttributeValue::string(&self.input_bucket)),
            ("input_manifest".to_string(), AttributeValue::string_map(&self.input_manifest)),
            ("hyperparameters".to_string(), AttributeValue::string_map(&self.hyperparameters)),
        ])
    }
}

/// Final training state as read back from the platform by the deployment stage.
pub fn training_summary_updates(description: &TrainingJobDescription) -> Vec<FieldUpdate> {
    let mut updates = vec![FieldUpdate::set("job_status", AttributeValue::string(&description.status))];
    if let Some(created) = description.creation_time {
        updates.push(FieldUpdate::set_once("job_creation_time", AttributeValue::string(created.to_rfc3339())));
    }
    if let Some(ended) = description.end_time {
        updates.push(FieldUpdate::set_once("job_end_time", AttributeValue::string(ended.to_rfc3339())));
    }
    updates
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRecord {
    pub inference_image: String,
    pub model_name: String,
    pub endpoint_config_name: String,
    pub endpoint_name: String,
}

impl DeploymentRecord {
    pub fn updates(&self) -> Vec<FieldUpdate> {
        vec![
            FieldUpdate::set("inference_image", AttributeValue::string(&self.inference_image)),
            FieldUpdate::set("model_name", AttributeValue::string(&self.model_name)),
            FieldUpdate::set("endpoint_config_name", AttributeValue::string(&self.endpoint_config_name)),
            FieldUpdate::set("endpoint_name", AttributeValue::string(&self.endpoint_name)),
        ]
    }
}

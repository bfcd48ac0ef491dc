use anyhow::Context;
use std::collections::BTreeMap;
use log::{info, debug, warn};
use crate::adapters::platform::Channel;
use crate::adapters::storage::ObjectStore;
use crate::core::error::{PipelineError, PipelineResult};

pub const CHANNELS: [&str; 3] = ["training", "testing", "validation"];
pub const INPUT_PREFIX: &str = "input/";
pub const DATA_PREFIX: &str = "input/data/";

/// The inputs bound to one job at submission time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputManifest {
    pub channels: Vec<Channel>,
    pub versions: BTreeMap<String, String>,
}

impl InputManifest {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

pub struct ManifestResolver<'a> {
    store: &'a dyn ObjectStore,
    bucket: &'a str,
    data_uri: &'a str,
}

impl<'a> ManifestResolver<'a> {
    pub fn new(store: &'a dyn ObjectStore, bucket: &'a str, data_uri: &'a str) -> Self {
        Self { store, bucket, data_uri }
    }

    pub async fn resolve(&self) -> PipelineResult<InputManifest> {
        let channels = self.channels().await?;
        let versions = self.versions().await?;
        if channels.is_empty() {
            warn!("No non-empty input channels under s3://{}/{}", self.bucket, DATA_PREFIX);
        }
        info!("Resolved {} channels and {} object versions", channels.len(), versions.len());
        Ok(InputManifest { channels, versions })
    }

    async fn channels(&self) -> PipelineResult<Vec<Channel>> {
        let mut channels = Vec::new();
        for name in CHANNELS {
            let prefix = format!("{}{}/", DATA_PREFIX, name);
            let objects = self.store.list_objects(self.bucket, &prefix)
                .await
                .with_context(|| format!("Failed to list objects under {}", prefix))
                .map_err(PipelineError::storage)?;

            let non_empty = objects.iter().filter(|o| o.size > 0).count();
            debug!("Channel {} has {} of {} non-empty objects", name, non_empty, objects.len());
            if non_empty > 0 {
                channels.push(Channel::s3_prefix(name, format!("{}{}/", self.data_uri, name)));
            }
        }
        Ok(channels)
    }

    async fn versions(&self) -> PipelineResult<BTreeMap<String, String>> {
        let versions = self.store.list_object_versions(self.bucket, INPUT_PREFIX)
            .await
            .context("Failed to list input object versions")
            .map_err(PipelineError::storage)?;

        Ok(versions
            .into_iter()
            .filter(|v| v.is_latest && v.size > 0)
            .map(|v| (v.key, v.version_id))
            .collect())
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use log::debug;

#[cfg(test)]
use mockall::automock;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectVersion {
    pub key: String,
    pub version_id: String,
    pub size: u64,
    pub is_latest: bool,
}

/// Delegated credentials handed to a single invocation by the pipeline.
#[derive(Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl fmt::Debug for ArtifactCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>>;

    async fn list_object_versions(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectVersion>>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    async fn download_to_local(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let body = self.get_object(bucket, key).await?;
        debug!("Writing {} bytes of s3://{}/{} to {:?}", body.len(), bucket, key, path);
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("Failed to write object to {:?}", path))
    }
}

/// Builds object store handles that act with a caller's delegated credentials.
#[cfg_attr(test, automock)]
pub trait SessionProvider: Send + Sync {
    fn open_store(&self, credentials: &ArtifactCredentials) -> Result<Box<dyn ObjectStore>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_hides_secrets() {
        let credentials = ArtifactCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "very-secret".to_string(),
            session_token: "token-value".to_string(),
        };
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("token-value"));
    }

    struct SingleObject;

    #[async_trait]
    impl ObjectStore for SingleObject {
        async fn list_objects(&self, _bucket: &str, _prefix: &str) -> Result<Vec<ObjectSummary>> {
            Ok(Vec::new())
        }

        async fn list_object_versions(&self, _bucket: &str, _prefix: &str) -> Result<Vec<ObjectVersion>> {
            Ok(Vec::new())
        }

        async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
            assert_eq!((bucket, key), ("artifacts", "run/1.zip"));
            Ok(b"payload".to_vec())
        }

        async fn put_object(&self, _bucket: &str, _key: &str, _body: Vec<u8>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn download_to_local_writes_object_body() {
        let store = SingleObject;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.zip");
        store.download_to_local("artifacts", "run/1.zip", &path).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    }
}

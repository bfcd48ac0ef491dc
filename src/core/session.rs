use anyhow::Context;
use log::debug;
use crate::adapters::storage::{ArtifactCredentials, ObjectStore, SessionProvider};
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::invocation::S3Location;

/// Artifact store access under one invocation's delegated credentials.
///
/// Opened from the credentials in the event and dropped with the invocation;
/// it is neither `Clone` nor cached anywhere.
pub struct ArtifactSession {
    store: Box<dyn ObjectStore>,
}

impl ArtifactSession {
    pub fn open(provider: &dyn SessionProvider, credentials: &ArtifactCredentials) -> PipelineResult<Self> {
        debug!("Opening artifact session for access key {}", credentials.access_key_id);
        let store = provider.open_store(credentials)
            .context("Failed to open artifact session")
            .map_err(PipelineError::storage)?;
        Ok(Self { store })
    }

    pub async fn read(&self, location: &S3Location) -> PipelineResult<Vec<u8>> {
        self.store.get_object(&location.bucket_name, &location.object_key)
            .await
            .with_context(|| format!("Failed to download artifact s3://{}/{}", location.bucket_name, location.object_key))
            .map_err(PipelineError::storage)
    }

    pub async fn write(&self, location: &S3Location, body: Vec<u8>) -> PipelineResult<()> {
        self.store.put_object(&location.bucket_name, &location.object_key, body)
            .await
            .with_context(|| format!("Failed to upload artifact s3://{}/{}", location.bucket_name, location.object_key))
            .map_err(PipelineError::storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::{MockObjectStore, MockSessionProvider};

    fn credentials() -> ArtifactCredentials {
        ArtifactCredentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
        }
    }

    #[tokio::test]
    async fn reads_through_the_delegated_store() {
        let mut store = MockObjectStore::new();
        store.expect_get_object()
            .withf(|bucket, key| bucket == "artifacts" && key == "pipeline/in.zip")
            .times(1)
            .returning(|_, _| Ok(vec![1, 2, 3]));
        let mut provider = MockSessionProvider::new();
        provider.expect_open_store()
            .withf(|c| c.session_token == "token")
            .return_once(move |_| Ok(Box::new(store) as Box<dyn ObjectStore>));

        let session = ArtifactSession::open(&provider, &credentials()).unwrap();
        let location = S3Location { bucket_name: "artifacts".to_string(), object_key: "pipeline/in.zip".to_string() };

        assert_eq!(session.read(&location).await.unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn open_failures_are_credential_failures() {
        let mut provider = MockSessionProvider::new();
        provider.expect_open_store()
            .returning(|_| Err(anyhow::anyhow!("expired token")));

        let err = ArtifactSession::open(&provider, &credentials()).err().unwrap();

        assert!(matches!(err, PipelineError::CredentialOrStorage(_)));
    }
}

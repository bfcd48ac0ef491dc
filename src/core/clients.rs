use std::sync::Arc;
use crate::adapters::metadata::MetadataStore;
use crate::adapters::platform::JobPlatform;
use crate::adapters::storage::{ObjectStore, SessionProvider};

/// Handles to every external collaborator a driver talks to.
///
/// `store` acts with the invocation's own role; artifact reads and writes go
/// through a session opened from `sessions` instead.
#[derive(Clone)]
pub struct Clients {
    pub store: Arc<dyn ObjectStore>,
    pub sessions: Arc<dyn SessionProvider>,
    pub platform: Arc<dyn JobPlatform>,
    pub metadata: Arc<dyn MetadataStore>,
}

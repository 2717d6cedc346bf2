use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Where artifact bytes come from. Each call carries its own timeout and a
/// failed call never affects concurrent ones.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn download_artifact(&self, url: &str) -> Result<Bytes>;
}

use async_trait::async_trait;

use cdn_client::{CdnClient, CdnError, ReleaseEntry};

#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    /// Return the release document, newest entry first.
    /// The install pipeline and update check read version, hash and assets
    /// from the first entry.
    async fn release_meta(&self) -> Result<Vec<ReleaseEntry>, CdnError>;
}

#[async_trait]
impl ReleaseFeed for CdnClient {
    async fn release_meta(&self) -> Result<Vec<ReleaseEntry>, CdnError> {
        self.fetch_release_meta().await
    }
}

// * Sample Fetcher - the seam between the sampling loop and whatever reads the page

use async_trait::async_trait;
use std::sync::Arc;

use crate::network::errors::FetchError;

/// Raw, unparsed text of one fetch. Lives for a single cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    pub download: String,
    pub upload: String,
}

impl RawSample {
    pub fn new(download: impl Into<String>, upload: impl Into<String>) -> Self {
        Self {
            download: download.into(),
            upload: upload.into(),
        }
    }
}

/// Produces one [`RawSample`] per call. Implementations may block for as long as the
/// page takes; the caller imposes no timeout.
#[async_trait]
pub trait SampleFetcher: Send + Sync {
    async fn fetch_raw_sample(&self) -> Result<RawSample, FetchError>;
}

#[async_trait]
impl<T: SampleFetcher + ?Sized> SampleFetcher for Arc<T> {
    async fn fetch_raw_sample(&self) -> Result<RawSample, FetchError> {
        (**self).fetch_raw_sample().await
    }
}

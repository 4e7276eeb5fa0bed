use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("report upload failed: {0}")]
pub struct ReportError(pub String);

/// Destination for rendered analytics reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Stores a markdown report under `key` and returns its location.
    async fn put_report(&self, key: &str, markdown: String) -> Result<String, ReportError>;
}

pub struct S3ReportSink {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ReportSink {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ReportSink for S3ReportSink {
    async fn put_report(&self, key: &str, markdown: String) -> Result<String, ReportError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(markdown.into_bytes()))
            .content_type("text/markdown")
            .send()
            .await
            .map_err(|e| ReportError(e.to_string()))?;

        let location = format!("s3://{}/{}", self.bucket, key);
        info!("Uploaded analytics report to {location}");
        Ok(location)
    }
}

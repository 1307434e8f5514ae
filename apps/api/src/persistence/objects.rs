use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Datelike, Utc};
use tracing::info;

use super::StoreError;
use crate::metrics;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError>;

    fn public_url(&self, key: &str) -> String;
}

/// Date-partitioned key: `YYYY/MM/DD/<file name>`.
pub fn object_key(at: DateTime<Utc>, file_name: &str) -> String {
    format!(
        "{}/{:02}/{:02}/{}",
        at.year(),
        at.month(),
        at.day(),
        file_name
    )
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base: &str) -> Self {
        Self {
            client,
            bucket,
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
        let size = body.len();
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send();
        metrics::object_storage("upload", put)
            .await
            .map_err(|e| StoreError::Object(format!("put_object {key} failed: {e}")))?;
        info!("Uploaded {key} ({size} bytes) to bucket {}", self.bucket);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base, self.bucket, key)
    }
}

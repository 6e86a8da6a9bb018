use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::info;

use crate::config::S3Settings;
use crate::storage::{DocumentHandle, DocumentStore, StoreError};

/// S3 / MinIO-backed store. One object per handle under `documents/`.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Constructs a client configured for MinIO (local) or AWS (production).
    pub async fn connect(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "aligner-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&settings.endpoint)
            .load()
            .await;

        Self::new(Client::new(&s3_config), settings.bucket.clone())
    }
}

#[async_trait]
impl DocumentStore for S3Store {
    async fn put(&self, blob: Bytes, content_type: &str) -> Result<DocumentHandle, StoreError> {
        let handle = DocumentHandle::generate();
        let key = handle.object_key();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(blob))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 upload failed: {e}")))?;

        info!("Uploaded document to s3://{}/{}", self.bucket, key);
        Ok(handle)
    }

    async fn get(&self, handle: &DocumentHandle) -> Result<Bytes, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(handle.object_key())
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::NotFound(handle.clone())
                } else {
                    StoreError::Backend(format!("S3 download failed: {e}"))
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 body read failed: {e}")))?;
        Ok(body.into_bytes())
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}

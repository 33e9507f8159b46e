use std::fmt;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info, warn};

use super::{ObjectInfo, ObjectStore};
use crate::error::StorageError;

/// Connection settings for an S3-compatible bucket.
#[derive(Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Full endpoint URL including scheme, for MinIO and friends. `None`
    /// targets AWS proper.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("force_path_style", &self.force_path_style)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from settings, falling back to the default AWS
    /// credential chain when no static keys are given.
    pub async fn connect(settings: &S3Settings) -> Result<Self, StorageError> {
        if settings.bucket.trim().is_empty() {
            return Err(StorageError::InvalidConfig(
                "bucket name must not be empty".to_string(),
            ));
        }

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        match (&settings.access_key_id, &settings.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                builder = builder.credentials_provider(Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "cueline-static",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(StorageError::InvalidConfig(
                    "access key id and secret access key must be set together"
                        .to_string(),
                ));
            }
        }
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }
        if settings.force_path_style {
            builder = builder.force_path_style(true);
        }

        info!(
            bucket = %settings.bucket,
            endpoint = settings.endpoint.as_deref().unwrap_or("aws"),
            "created object store client"
        );

        Ok(Self::new(Client::from_conf(builder.build()), &settings.bucket))
    }
}

fn to_utc(value: Option<&aws_sdk_s3::primitives::DateTime>) -> Option<DateTime<Utc>> {
    value.and_then(|ts| DateTime::from_timestamp(ts.secs(), ts.subsec_nanos()))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn list_objects<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, Result<ObjectInfo, StorageError>> {
        try_stream! {
            let mut continuation: Option<String> = None;
            loop {
                let mut request = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(prefix)
                    .set_continuation_token(continuation.take());
                if !recursive {
                    request = request.delimiter("/");
                }

                let page = request.send().await.map_err(|err| {
                    StorageError::backend("list_objects_v2", DisplayErrorContext(&err))
                })?;
                debug!(prefix, objects = page.contents().len(), "listed page");

                for object in page.contents() {
                    let Some(key) = object.key() else {
                        continue;
                    };
                    let Some(last_modified) = to_utc(object.last_modified()) else {
                        warn!(key, "object has no usable last-modified time; skipping");
                        continue;
                    };
                    yield ObjectInfo {
                        key: key.to_string(),
                        last_modified,
                    };
                }

                match page.next_continuation_token() {
                    Some(token) if page.is_truncated().unwrap_or(false) => {
                        continuation = Some(token.to_string());
                    }
                    _ => break,
                }
            }
        }
        .boxed()
    }

    async fn object_exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::backend(
                        "head_object",
                        DisplayErrorContext(&err),
                    ))
                }
            }
        }
    }

    async fn presigned_url(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let config =
            PresigningConfig::expires_in(ttl).map_err(|err| StorageError::Presign {
                key: key.to_string(),
                message: err.to_string(),
            })?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|err| StorageError::Presign {
                key: key.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })?;
        Ok(presigned.uri().to_string())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => {
                let body = output
                    .body
                    .collect()
                    .await
                    .map_err(|err| StorageError::backend("get_object", err))?;
                Ok(Some(body.into_bytes().to_vec()))
            }
            Err(err) => {
                let err = err.into_service_error();
                if err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(StorageError::backend(
                        "get_object",
                        DisplayErrorContext(&err),
                    ))
                }
            }
        }
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| {
                StorageError::backend("put_object", DisplayErrorContext(&err))
            })?;
        debug!(key, size, "wrote object");
        Ok(())
    }
}

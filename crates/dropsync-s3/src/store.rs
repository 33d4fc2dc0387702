//! S3DestinationStore - IDestinationStore implementation for Amazon S3
//!
//! ## Design Notes
//!
//! - Upload content arrives as a stream of unknown length. It is spooled to
//!   a temporary file first so that S3 receives an exact `Content-Length`
//!   and the body can be re-read if the SDK retries.
//! - Objects above the multipart threshold are sent as a multipart upload
//!   whose parts are read straight from the spooled file. A failed or
//!   cancelled multipart upload is aborted so no orphaned parts are billed.
//! - `head` treats 404 / `NotFound` / `NoSuchKey` as "absent", every other
//!   failure as an error.

use std::path::Path;

use anyhow::Result;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::{ByteStream, DateTime as AwsDateTime, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use dropsync_core::config::DestinationConfig;
use dropsync_core::domain::{DestinationObjectMeta, KeyPrefix, ProvenanceMetadata};
use dropsync_core::ports::{ContentStream, IDestinationStore};

use crate::content_type::content_type_for;
use crate::S3StoreError;

const MIB: u64 = 1024 * 1024;

/// S3 allows at most this many parts per multipart upload
const MAX_PARTS: u64 = 10_000;

// ============================================================================
// S3Settings
// ============================================================================

/// Connection and transfer settings for [`S3DestinationStore`]
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Objects above this many bytes use multipart upload
    pub multipart_threshold: u64,
    /// Bytes per multipart part
    pub part_size: u64,
}

impl S3Settings {
    /// Builds settings from the `destination` configuration section
    pub fn from_config(config: &DestinationConfig) -> Self {
        Self {
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint_url: config.endpoint_url.clone(),
            force_path_style: config.force_path_style,
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
            multipart_threshold: config.multipart_threshold_mb * MIB,
            part_size: config.part_size_mb * MIB,
        }
    }
}

// ============================================================================
// S3DestinationStore
// ============================================================================

/// Amazon S3 implementation of [`IDestinationStore`]
pub struct S3DestinationStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    multipart_threshold: u64,
    part_size: u64,
}

impl S3DestinationStore {
    /// Builds an SDK client from the default provider chain plus `settings`
    ///
    /// Static credentials, region and endpoint in `settings` take precedence
    /// over whatever the environment provides.
    pub async fn connect(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }

        if let (Some(access_key), Some(secret_key)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            let creds = Credentials::new(access_key, secret_key, None, None, "dropsync-config");
            loader = loader.credentials_provider(creds);
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.force_path_style);
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        info!(
            bucket = %settings.bucket,
            region = ?sdk_config.region().map(|r| r.to_string()),
            endpoint = ?settings.endpoint_url,
            explicit_creds = settings.access_key_id.is_some(),
            "S3 destination initialized"
        );

        let client = aws_sdk_s3::Client::from_conf(builder.build());
        Self::from_client(client, &settings.bucket)
            .with_multipart(settings.multipart_threshold, settings.part_size)
    }

    /// Wraps an already configured SDK client
    pub fn from_client(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            multipart_threshold: 100 * MIB,
            part_size: 16 * MIB,
        }
    }

    /// Sets the multipart threshold and part size, in bytes
    pub fn with_multipart(mut self, threshold: u64, part_size: u64) -> Self {
        self.multipart_threshold = threshold;
        self.part_size = part_size.max(1);
        self
    }

    async fn head_object(&self, key: &str) -> Result<Option<DestinationObjectMeta>, S3StoreError> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => Ok(Some(object_meta(
                key,
                output.last_modified(),
                output.content_length(),
            ))),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(S3StoreError::request("HeadObject", key, err)),
        }
    }

    async fn put_object(
        &self,
        key: &str,
        content: ContentStream,
        provenance: &ProvenanceMetadata,
    ) -> Result<(), S3StoreError> {
        let spool = tempfile::NamedTempFile::new().map_err(|e| S3StoreError::spool(key, e))?;
        let size = spool_to_file(content, spool.path())
            .await
            .map_err(|e| S3StoreError::spool(key, e))?;

        let content_type = content_type_for(key);
        debug!(key, size, content_type = %content_type, "Content spooled");

        if size > self.multipart_threshold {
            self.put_multipart(key, spool.path(), size, &content_type, provenance)
                .await
        } else {
            self.put_single(key, spool.path(), &content_type, provenance)
                .await
        }
    }

    async fn put_single(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
        provenance: &ProvenanceMetadata,
    ) -> Result<(), S3StoreError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| S3StoreError::spool(key, std::io::Error::other(e)))?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body);
        for (name, value) in provenance.to_pairs() {
            request = request.metadata(name, value);
        }

        request
            .send()
            .await
            .map_err(|e| S3StoreError::request("PutObject", key, e))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        path: &Path,
        size: u64,
        content_type: &str,
        provenance: &ProvenanceMetadata,
    ) -> Result<(), S3StoreError> {
        let mut create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type);
        for (name, value) in provenance.to_pairs() {
            create = create.metadata(name, value);
        }

        let created = create
            .send()
            .await
            .map_err(|e| S3StoreError::request("CreateMultipartUpload", key, e))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| S3StoreError::InvalidResponse {
                operation: "CreateMultipartUpload",
                key: key.to_string(),
                message: "missing UploadId".to_string(),
            })?
            .to_string();

        let parts = plan_parts(size, self.part_size);
        info!(key, size, parts = parts.len(), "Starting multipart upload");

        let mut guard = AbortGuard::new(&self.client, &self.bucket, key, &upload_id);

        let completed = match self.upload_parts(key, path, &upload_id, &parts).await {
            Ok(completed) => completed,
            Err(err) => {
                warn!(key, upload_id = %upload_id, error = %err, "Aborting multipart upload");
                guard.abort().await;
                return Err(err);
            }
        };

        let result = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await;

        match result {
            Ok(_) => {
                guard.disarm();
                Ok(())
            }
            Err(err) => {
                let err = S3StoreError::request("CompleteMultipartUpload", key, err);
                warn!(key, upload_id = %upload_id, error = %err, "Aborting multipart upload");
                guard.abort().await;
                Err(err)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        path: &Path,
        upload_id: &str,
        parts: &[(u64, u64)],
    ) -> Result<Vec<CompletedPart>, S3StoreError> {
        let mut completed = Vec::with_capacity(parts.len());

        for (index, &(offset, length)) in parts.iter().enumerate() {
            let part_number = (index + 1) as i32;
            let body = ByteStream::read_from()
                .path(path)
                .offset(offset)
                .length(Length::Exact(length))
                .build()
                .await
                .map_err(|e| S3StoreError::spool(key, std::io::Error::other(e)))?;

            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(|e| S3StoreError::request("UploadPart", key, e))?;

            debug!(key, part_number, length, "Uploaded part");
            completed.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
        }

        Ok(completed)
    }

    async fn list_all_keys(&self, prefix: &KeyPrefix) -> Result<Vec<String>, S3StoreError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;
        let mut page_count: u32 = 0;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if !prefix.is_empty() {
                request = request.prefix(prefix.as_str());
            }
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request
                .send()
                .await
                .map_err(|e| S3StoreError::request("ListObjectsV2", prefix.as_str(), e))?;
            page_count += 1;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(str::to_string);
                if continuation_token.is_none() {
                    return Err(S3StoreError::InvalidResponse {
                        operation: "ListObjectsV2",
                        key: prefix.as_str().to_string(),
                        message: "truncated page without a continuation token".to_string(),
                    });
                }
            } else {
                break;
            }
        }

        debug!(prefix = %prefix, keys = keys.len(), pages = page_count, "Listed destination keys");
        Ok(keys)
    }

    async fn delete_object(&self, key: &str) -> Result<(), S3StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| S3StoreError::request("DeleteObject", key, e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IDestinationStore for S3DestinationStore {
    async fn head(&self, key: &str) -> Result<Option<DestinationObjectMeta>> {
        Ok(self.head_object(key).await?)
    }

    async fn put(
        &self,
        key: &str,
        content: ContentStream,
        provenance: &ProvenanceMetadata,
    ) -> Result<()> {
        Ok(self.put_object(key, content, provenance).await?)
    }

    async fn list_keys(&self, prefix: &KeyPrefix) -> Result<Vec<String>> {
        Ok(self.list_all_keys(prefix).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Ok(self.delete_object(key).await?)
    }
}

// ============================================================================
// AbortGuard
// ============================================================================

/// Aborts a multipart upload that has not completed
///
/// Dropping an armed guard (the `put` future was cancelled mid-upload)
/// spawns the abort on the current runtime, since the owning future can no
/// longer await it.
struct AbortGuard {
    client: aws_sdk_s3::Client,
    bucket: String,
    key: String,
    upload_id: String,
    armed: bool,
}

impl AbortGuard {
    fn new(client: &aws_sdk_s3::Client, bucket: &str, key: &str, upload_id: &str) -> Self {
        Self {
            client: client.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    async fn abort(mut self) {
        self.armed = false;
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .send()
            .await;
        if let Err(err) = result {
            warn!(
                key = %self.key,
                error = %aws_sdk_s3::error::DisplayErrorContext(err),
                "Abort failed; incomplete upload left behind"
            );
        }
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                key = %self.key,
                upload_id = %self.upload_id,
                "No runtime to abort multipart upload"
            );
            return;
        };

        warn!(
            key = %self.key,
            upload_id = %self.upload_id,
            "Multipart upload interrupted; aborting"
        );
        let request = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id);
        let key = std::mem::take(&mut self.key);
        runtime.spawn(async move {
            if let Err(err) = request.send().await {
                warn!(
                    key = %key,
                    error = %aws_sdk_s3::error::DisplayErrorContext(err),
                    "Abort failed; incomplete upload left behind"
                );
            }
        });
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Writes the whole stream to `path`, returning the byte count
async fn spool_to_file(mut content: ContentStream, path: &Path) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = content.try_next().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

fn is_not_found<E>(err: &SdkError<E, HttpResponse>) -> bool
where
    E: aws_sdk_s3::error::ProvideErrorMetadata,
{
    if let SdkError::ServiceError(service) = err {
        if matches!(service.err().code(), Some("NotFound" | "NoSuchKey")) {
            return true;
        }
    }
    err.raw_response()
        .map_or(false, |raw| raw.status().as_u16() == 404)
}

/// Converts HeadObject fields into port-level metadata
fn object_meta(
    key: &str,
    last_modified: Option<&AwsDateTime>,
    content_length: Option<i64>,
) -> DestinationObjectMeta {
    DestinationObjectMeta {
        key: key.to_string(),
        last_modified: last_modified
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
        size_bytes: content_length.and_then(|l| u64::try_from(l).ok()),
    }
}

/// Splits `size` bytes into `(offset, length)` parts
///
/// The part size grows if needed to stay within the S3 part limit. An empty
/// object still gets one empty part.
fn plan_parts(size: u64, part_size: u64) -> Vec<(u64, u64)> {
    let part_size = part_size.max(size.div_ceil(MAX_PARTS)).max(1);
    if size == 0 {
        return vec![(0, 0)];
    }

    let mut parts = Vec::with_capacity(size.div_ceil(part_size) as usize);
    let mut offset = 0;
    while offset < size {
        let length = part_size.min(size - offset);
        parts.push((offset, length));
        offset += length;
    }
    parts
}

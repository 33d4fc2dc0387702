//! Shared helpers for S3 adapter integration tests

use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use wiremock::{Match, MockServer, Request};

use dropsync_s3::store::S3DestinationStore;

pub const BUCKET: &str = "test-bucket";

/// Starts a mock server and returns a store pointed at it
///
/// Retries are disabled so a single error response fails the call.
pub async fn setup_s3_mock() -> (MockServer, S3DestinationStore) {
    let server = MockServer::start().await;

    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "test"))
        .endpoint_url(server.uri())
        .force_path_style(true)
        .retry_config(RetryConfig::disabled())
        .build();

    let store = S3DestinationStore::from_client(aws_sdk_s3::Client::from_conf(config), BUCKET);
    (server, store)
}

/// `/{bucket}/{key}` as seen by the mock server
pub fn object_path(key: &str) -> String {
    format!("/{BUCKET}/{key}")
}

/// Matches a request whose query string contains `name`, with or without a value
pub struct HasQueryKey(pub &'static str);

impl Match for HasQueryKey {
    fn matches(&self, request: &Request) -> bool {
        request.url.query_pairs().any(|(k, _)| k == self.0)
    }
}

/// A ListObjectsV2 response page
pub fn list_page(keys: &[&str], next_token: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|key| {
            format!(
                "<Contents><Key>{key}</Key>\
                 <LastModified>2025-01-01T00:00:00.000Z</LastModified>\
                 <ETag>&quot;d41d8cd98f00b204e9800998ecf8427e&quot;</ETag>\
                 <Size>3</Size><StorageClass>STANDARD</StorageClass></Contents>"
            )
        })
        .collect();

    let truncation = match next_token {
        Some(token) => format!(
            "<IsTruncated>true</IsTruncated><NextContinuationToken>{token}</NextContinuationToken>"
        ),
        None => "<IsTruncated>false</IsTruncated>".to_string(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>{BUCKET}</Name><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys>{truncation}{contents}</ListBucketResult>"#,
        keys.len()
    )
}

pub fn initiate_multipart(key: &str, upload_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<InitiateMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Bucket>{BUCKET}</Bucket><Key>{key}</Key><UploadId>{upload_id}</UploadId></InitiateMultipartUploadResult>"#
    )
}

pub fn complete_multipart(key: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<CompleteMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Location>http://localhost/{BUCKET}/{key}</Location><Bucket>{BUCKET}</Bucket><Key>{key}</Key><ETag>&quot;abc-3&quot;</ETag></CompleteMultipartUploadResult>"#
    )
}

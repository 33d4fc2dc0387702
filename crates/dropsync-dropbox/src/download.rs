//! Streaming file downloads
//!
//! `POST /2/files/download` on the content host. The path goes in the
//! `Dropbox-API-Arg` header and the response body is the raw file content,
//! handed back as a stream without buffering.

use std::io;

use futures_util::TryStreamExt;
use tracing::debug;

use dropsync_core::ports::ContentStream;

use crate::client::{api_arg_header, DropboxClient, API_ARG_HEADER};
use crate::DropboxError;

const DOWNLOAD_PATH: &str = "/2/files/download";

/// Opens the file at `absolute_path` for streaming
///
/// # Errors
///
/// Returns [`DropboxError::NotFound`] when the path does not exist. Errors
/// while reading the body surface later as `io::Error`s from the stream.
pub async fn download(
    client: &DropboxClient,
    absolute_path: &str,
) -> Result<ContentStream, DropboxError> {
    let arg = api_arg_header(&serde_json::json!({ "path": absolute_path }));
    debug!(path = absolute_path, "Starting download");

    let response = client
        .send_with_retry(DOWNLOAD_PATH, || {
            client
                .content_request(DOWNLOAD_PATH)
                .header(API_ARG_HEADER, arg.as_str())
        })
        .await?;

    let stream = response.bytes_stream().map_err(io::Error::other);
    Ok(Box::pin(stream))
}

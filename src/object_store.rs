use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use bytes::Bytes;
use tracing::debug;

/// Result of a conditional object read.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Full object content. `validator` is the backend's ETag, if it sent one.
    Fresh {
        body: Bytes,
        validator: Option<String>,
    },
    /// The object still matches the validator that was presented.
    NotModified,
    NotFound,
    Failed(BackendError),
}

/// Any backend failure other than a missing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::error::Error for BackendError {}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Read access to the objects of one bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetches `key`. When `if_none_match` is set the backend answers
    /// `NotModified` instead of sending content whose validator still equals it.
    async fn get_object(&self, key: &str, if_none_match: Option<&str>) -> FetchOutcome;
}

/// [`ObjectStore`] backed by the AWS SDK.
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

/// Request paths carry a leading `/` that is not part of the object key.
pub fn object_key(key: &str) -> &str {
    key.strip_prefix('/').unwrap_or(key)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, key: &str, if_none_match: Option<&str>) -> FetchOutcome {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key(key))
            .set_if_none_match(if_none_match.map(str::to_owned));

        let output = match request.send().await {
            Ok(output) => output,
            Err(err) => return classify_error(err),
        };

        let validator = output.e_tag().map(str::to_owned);

        match output.body.collect().await {
            Ok(data) => {
                let body = data.into_bytes();
                debug!(bucket = %self.bucket, key = %key, size = body.len(), validator = ?validator, "fetched object");
                FetchOutcome::Fresh { body, validator }
            }
            Err(err) => FetchOutcome::Failed(BackendError::new(format!(
                "unable to read body of {key}: {err}"
            ))),
        }
    }
}

/// S3 reports "not modified" as a 304 response, which the SDK surfaces as an
/// error, and a missing object as the `NoSuchKey` service error.
fn classify_error(err: SdkError<GetObjectError, HttpResponse>) -> FetchOutcome {
    if err.raw_response().map(|response| response.status().as_u16()) == Some(304) {
        return FetchOutcome::NotModified;
    }

    if let SdkError::ServiceError(service_error) = &err {
        if service_error.err().is_no_such_key() {
            return FetchOutcome::NotFound;
        }
    }

    FetchOutcome::Failed(BackendError::new(DisplayErrorContext(&err).to_string()))
}

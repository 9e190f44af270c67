//! S3 store implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from qs-core.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_types::error::display::DisplayErrorContext;
use tokio::io::AsyncReadExt;

use qs_core::{
    ByteReader, Error, ListEntry, ListPage, ObjectStore, Profile, Result, UploadResult,
};

/// Metadata key the caller-supplied object name is stored under
const NAME_METADATA_KEY: &str = "name";

/// S3-compatible store scoped to one bucket
pub struct S3Store {
    inner: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Create a new store from a profile
    pub async fn new(profile: &Profile) -> Result<Self> {
        profile.validate()?;

        let credentials = aws_credential_types::Credentials::new(
            profile.access_key.clone(),
            profile.secret_key.clone(),
            None, // session token
            None, // expiry
            "qs-static-credentials",
        );

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(profile.region.clone()))
            .endpoint_url(&profile.endpoint)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(profile.path_style)
            .build();

        tracing::debug!(
            profile = %profile.name,
            endpoint = %profile.endpoint,
            bucket = %profile.bucket,
            "Created S3 store"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: profile.bucket.clone(),
        })
    }
}

/// Storage class name to numeric tag
pub fn type_tag(storage_class: Option<&str>) -> i32 {
    match storage_class {
        Some("STANDARD_IA") => 1,
        Some("GLACIER") => 2,
        Some("DEEP_ARCHIVE") => 3,
        _ => 0,
    }
}

/// `Range` header value for reads starting at `offset`
pub fn range_header(offset: u64) -> Option<String> {
    (offset > 0).then(|| format!("bytes={offset}-"))
}

/// Map an SDK error message onto a qs-core error
pub fn classify_error(message: String, key: &str) -> Error {
    if message.contains("NotFound") || message.contains("NoSuchKey") {
        Error::NotFound(key.to_string())
    } else if message.contains("NoSuchBucket") {
        Error::NotFound(format!("bucket for key '{key}'"))
    } else if message.contains("AccessDenied")
        || message.contains("InvalidAccessKeyId")
        || message.contains("SignatureDoesNotMatch")
    {
        Error::Auth(message)
    } else {
        Error::Network(message)
    }
}

fn sdk_error<E: std::error::Error>(err: E, key: &str) -> Error {
    classify_error(DisplayErrorContext(&err).to_string(), key)
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(
        &self,
        prefix: &str,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<ListPage> {
        let response = self
            .inner
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(i32::try_from(page_size).unwrap_or(i32::MAX))
            .set_continuation_token(cursor)
            .send()
            .await
            .map_err(|e| sdk_error(e, prefix))?;

        let entries = response
            .contents()
            .iter()
            .map(|object| ListEntry {
                key: object.key().unwrap_or_default().to_string(),
                hash: object.e_tag().unwrap_or_default().trim_matches('"').to_string(),
                size: object.size().unwrap_or(0),
                put_time: object.last_modified().map(|t| t.secs()).unwrap_or(0),
                // ListObjectsV2 does not report content types
                mime_type: String::new(),
                type_tag: type_tag(object.storage_class().map(|sc| sc.as_str())),
            })
            .collect();

        Ok(ListPage {
            entries,
            next_cursor: response.next_continuation_token().map(str::to_string),
            has_more: response.is_truncated().unwrap_or(false),
        })
    }

    async fn put(&self, key: &str, name: &str, mut body: ByteReader, size: u64) -> Result<UploadResult> {
        let mut data = Vec::with_capacity(size as usize);
        body.read_to_end(&mut data).await?;

        let content_type = mime_guess::from_path(key).first_or_octet_stream();

        let response = self
            .inner
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type.essence_str())
            .metadata(NAME_METADATA_KEY, name)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| sdk_error(e, key))?;

        Ok(UploadResult {
            key: key.to_string(),
            hash: response.e_tag().unwrap_or_default().trim_matches('"').to_string(),
            size: size as i64,
            bucket: self.bucket.clone(),
            name: name.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(e, key))?;

        Ok(())
    }

    async fn get(&self, key: &str, offset: u64) -> Result<ByteReader> {
        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range_header(offset))
            .send()
            .await;

        match response {
            Ok(output) => Ok(Box::pin(output.body.into_async_read())),
            Err(e) => {
                let message = DisplayErrorContext(&e).to_string();
                // Reading from at or past the end yields nothing
                if message.contains("InvalidRange") {
                    return Ok(Box::pin(tokio::io::empty()));
                }
                Err(classify_error(message, key))
            }
        }
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        let presigning =
            PresigningConfig::expires_in(expires_in).map_err(|e| Error::General(e.to_string()))?;

        let request = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| sdk_error(e, key))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tag() {
        assert_eq!(type_tag(Some("STANDARD")), 0);
        assert_eq!(type_tag(Some("STANDARD_IA")), 1);
        assert_eq!(type_tag(Some("GLACIER")), 2);
        assert_eq!(type_tag(Some("DEEP_ARCHIVE")), 3);
        assert_eq!(type_tag(Some("REDUCED_REDUNDANCY")), 0);
        assert_eq!(type_tag(None), 0);
    }

    #[test]
    fn test_range_header() {
        assert_eq!(range_header(0), None);
        assert_eq!(range_header(512).as_deref(), Some("bytes=512-"));
    }

    #[test]
    fn test_classify_error() {
        assert!(matches!(
            classify_error("NoSuchKey: The specified key does not exist.".into(), "k"),
            Error::NotFound(k) if k == "k"
        ));
        assert!(matches!(
            classify_error("AccessDenied: Access Denied".into(), "k"),
            Error::Auth(_)
        ));
        assert!(matches!(
            classify_error("dispatch failure: connection refused".into(), "k"),
            Error::Network(_)
        ));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_profile() {
        let mut profile = Profile::new("bad", "http://localhost:9000", "ak", "sk", "bkt");
        profile.endpoint = "ftp://localhost".into();
        assert!(S3Store::new(&profile).await.is_err());
    }

    #[tokio::test]
    async fn test_new_scopes_bucket() {
        let profile = Profile::new("local", "http://127.0.0.1:9000", "ak", "sk", "media");
        let store = S3Store::new(&profile).await.unwrap();
        assert_eq!(store.bucket(), "media");
    }
}

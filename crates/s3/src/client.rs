//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from s3kv-core.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::DateTime;
use aws_sdk_s3::types::{CommonPrefix, MetadataDirective, Object, StorageClass};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};

use s3kv_core::traits::{
    CopyObjectOptions, GetObjectOptions, ListObjectsOptions, PutObjectOptions,
    RemoveObjectOptions, StatObjectOptions,
};
use s3kv_core::{
    ByteReader, ConnectionSettings, Error, ObjectInfo, ObjectReader, ObjectStore, Result,
};

use crate::body::streaming_body;

/// Largest page ListObjectsV2 returns
const MAX_PAGE_SIZE: usize = 1000;

/// S3 client wrapper
#[derive(Clone)]
pub struct S3Client {
    inner: Arc<aws_sdk_s3::Client>,
}

impl S3Client {
    /// Create a new S3 client for an S3-compatible endpoint
    pub async fn new(settings: &ConnectionSettings) -> Result<Self> {
        let endpoint = settings.endpoint_url()?;

        let credentials = aws_credential_types::Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "s3kv-static-credentials",
        );

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(settings.region.clone()))
            .endpoint_url(endpoint.as_str().trim_end_matches('/'))
            .load()
            .await;

        // S3-compatible servers rarely support virtual-hosted buckets or trailing checksums
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .request_checksum_calculation(
                aws_sdk_s3::config::RequestChecksumCalculation::WhenRequired,
            )
            .build();

        tracing::debug!(endpoint = %endpoint, region = %settings.region, "created S3 client");

        Ok(Self {
            inner: Arc::new(aws_sdk_s3::Client::from_conf(s3_config)),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ErrorKind {
    MissingBucket,
    NotFound,
    AlreadyExists,
    Other,
}

fn classify(code: Option<&str>, status: Option<u16>) -> ErrorKind {
    // HEAD responses carry no code, so a missing bucket there still reads as a missing key
    match (code, status) {
        (Some("NoSuchBucket"), _) => ErrorKind::MissingBucket,
        (Some("NoSuchKey" | "NotFound"), _) | (_, Some(404)) => ErrorKind::NotFound,
        (Some("PreconditionFailed"), _) | (_, Some(412)) => ErrorKind::AlreadyExists,
        _ => ErrorKind::Other,
    }
}

/// Map an SDK error for `key` onto the core error kinds
fn map_sdk_error<E>(key: &str, err: SdkError<E>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.as_service_error().and_then(|e| e.code());
    let status = err.raw_response().map(|r| r.status().as_u16());

    match classify(code, status) {
        ErrorKind::MissingBucket => {
            Error::Config(format!("bucket does not exist: {}", DisplayErrorContext(&err)))
        }
        ErrorKind::NotFound => Error::NotFound(key.to_string()),
        ErrorKind::AlreadyExists => Error::AlreadyExists(key.to_string()),
        ErrorKind::Other => Error::Backend(format!("{key}: {}", DisplayErrorContext(&err))),
    }
}

fn timestamp(value: Option<&DateTime>) -> Option<jiff::Timestamp> {
    value.and_then(|t| jiff::Timestamp::from_second(t.secs()).ok())
}

fn etag(value: Option<&str>) -> Option<String> {
    value.map(|e| e.trim_matches('"').to_string())
}

/// One ListObjectsV2 page as ObjectInfo, prefixes and objects merged in key order
fn page_entries(prefixes: &[CommonPrefix], contents: &[Object]) -> Vec<ObjectInfo> {
    let mut items: Vec<ObjectInfo> = prefixes
        .iter()
        .filter_map(|p| p.prefix())
        .map(ObjectInfo::dir)
        .collect();

    for object in contents {
        let mut info = ObjectInfo::file(object.key().unwrap_or_default(), object.size().unwrap_or(0));
        info.last_modified = timestamp(object.last_modified());
        info.etag = etag(object.e_tag());
        info.storage_class = object.storage_class().map(|sc| sc.as_str().to_string());
        items.push(info);
    }

    items.sort_by(|a, b| a.key.cmp(&b.key));
    items
}

struct PageRequest {
    client: Arc<aws_sdk_s3::Client>,
    bucket: String,
    options: ListObjectsOptions,
}

impl PageRequest {
    /// Fetch one page, returning its entries and the token for the next one
    async fn fetch(&self, token: Option<String>) -> Result<(Vec<ObjectInfo>, Option<String>)> {
        let page_size = self
            .options
            .max_keys
            .map_or(MAX_PAGE_SIZE, |max| max.clamp(1, MAX_PAGE_SIZE));

        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.options.prefix)
            .max_keys(page_size as i32)
            .set_start_after(self.options.start_after.clone())
            .set_continuation_token(token);

        if !self.options.recursive {
            request = request.delimiter("/");
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_sdk_error(&self.options.prefix, e))?;

        let items = page_entries(response.common_prefixes(), response.contents());
        let next = match response.is_truncated() {
            Some(true) => response.next_continuation_token().map(str::to_string),
            _ => None,
        };
        Ok((items, next))
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        reader: ByteReader,
        size: u64,
        options: &PutObjectOptions,
    ) -> Result<()> {
        let (body, pump) = streaming_body(reader, size);

        let mut request = self
            .inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(size as i64)
            .body(body)
            .set_content_type(options.content_type.clone());

        if let Some(sc) = &options.storage_class {
            request = request.storage_class(StorageClass::from(sc.as_str()));
        }
        if !options.metadata.is_empty() {
            request = request.set_metadata(Some(options.metadata.clone()));
        }
        if options.no_overwrite {
            request = request.if_none_match("*");
        }

        let result = request.send().await;
        pump.abort();
        result.map_err(|e| map_sdk_error(key, e))?;

        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        options: &GetObjectOptions,
    ) -> Result<ObjectReader> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_range(options.range_header())
            .set_version_id(options.version_id.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(key, e))?;

        let mut info = ObjectInfo::file(key, response.content_length().unwrap_or(0));
        info.last_modified = timestamp(response.last_modified());
        info.etag = etag(response.e_tag());
        info.content_type = response.content_type().map(str::to_string);
        info.storage_class = response.storage_class().map(|sc| sc.as_str().to_string());

        let reader: ByteReader = Box::pin(response.body.into_async_read());
        Ok(ObjectReader::new(info, reader))
    }

    async fn stat_object(
        &self,
        bucket: &str,
        key: &str,
        options: &StatObjectOptions,
    ) -> Result<ObjectInfo> {
        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(options.version_id.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(key, e))?;

        let mut info = ObjectInfo::file(key, response.content_length().unwrap_or(0));
        info.last_modified = timestamp(response.last_modified());
        info.etag = etag(response.e_tag());
        info.content_type = response.content_type().map(str::to_string);
        info.storage_class = response.storage_class().map(|sc| sc.as_str().to_string());

        Ok(info)
    }

    async fn remove_object(
        &self,
        bucket: &str,
        key: &str,
        options: &RemoveObjectOptions,
    ) -> Result<()> {
        let result = self
            .inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(options.version_id.clone())
            .send()
            .await;

        match result.map_err(|e| map_sdk_error(key, e)) {
            Ok(_) | Err(Error::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn list_objects(
        &self,
        bucket: &str,
        options: &ListObjectsOptions,
    ) -> BoxStream<'static, Result<ObjectInfo>> {
        let request = Arc::new(PageRequest {
            client: self.inner.clone(),
            bucket: bucket.to_string(),
            options: options.clone(),
        });

        // None: done, Some(None): first page, Some(Some(token)): next page
        stream::try_unfold(Some(None), move |state: Option<Option<String>>| {
            let request = request.clone();
            async move {
                let Some(token) = state else {
                    return Ok(None);
                };
                request
                    .fetch(token)
                    .await
                    .map(|(items, next)| Some((items, next.map(Some))))
            }
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    async fn copy_object(
        &self,
        bucket: &str,
        source: &str,
        destination: &str,
        options: &CopyObjectOptions,
    ) -> Result<()> {
        let copy_source = format!("{bucket}/{}", urlencoding::encode(source));

        let mut request = self
            .inner
            .copy_object()
            .copy_source(copy_source)
            .bucket(bucket)
            .key(destination);

        if let Some(ct) = &options.content_type {
            request = request
                .content_type(ct)
                .metadata_directive(MetadataDirective::Replace);
        }

        request
            .send()
            .await
            .map_err(|e| map_sdk_error(source, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(Some("NoSuchKey"), Some(404)), ErrorKind::NotFound);
        assert_eq!(classify(None, Some(404)), ErrorKind::NotFound);
        assert_eq!(classify(Some("NotFound"), None), ErrorKind::NotFound);
        assert_eq!(
            classify(Some("PreconditionFailed"), Some(412)),
            ErrorKind::AlreadyExists
        );
        assert_eq!(classify(Some("AccessDenied"), Some(403)), ErrorKind::Other);
        assert_eq!(classify(None, None), ErrorKind::Other);
        assert_eq!(
            classify(Some("NoSuchBucket"), Some(404)),
            ErrorKind::MissingBucket
        );
    }

    #[test]
    fn test_page_entries_merge_in_key_order() {
        let prefixes = vec![
            CommonPrefix::builder().prefix("a/2/").build(),
            CommonPrefix::builder().prefix("a/4/").build(),
        ];
        let contents = vec![
            Object::builder().key("a/1").size(3).e_tag("\"abc\"").build(),
            Object::builder().key("a/3").size(0).build(),
        ];

        let items = page_entries(&prefixes, &contents);
        let keys: Vec<_> = items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["a/1", "a/2/", "a/3", "a/4/"]);

        assert!(items[1].is_dir);
        assert_eq!(items[0].size_bytes, Some(3));
        assert_eq!(items[0].etag.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_new_client_from_settings() {
        let settings = s3kv_core::ConnectionConfig {
            access_key: Some("minioadmin".into()),
            secret_key: Some("minioadmin".into()),
            endpoint: Some("localhost:9000".into()),
            secure: Some(false),
            ..Default::default()
        }
        .into_settings()
        .unwrap();

        assert!(S3Client::new(&settings).await.is_ok());
    }
}

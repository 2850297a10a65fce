//! s3kv-s3: aws-sdk-s3 backend for s3kv
//!
//! This crate implements the ObjectStore trait from s3kv-core on top of aws-sdk-s3 and
//! provides the connection entry points. It is the only crate that directly depends on
//! the AWS SDK.

mod body;
pub mod client;

use std::sync::Arc;

use s3kv_core::{ConnectionConfig, ConnectionSettings, Result, Store, transfer};

pub use client::S3Client;

/// Connect to the configured endpoint and open a Store on its bucket
pub async fn connect(settings: &ConnectionSettings) -> Result<Store> {
    let client = S3Client::new(settings).await?;
    tracing::debug!(bucket = %settings.bucket, "opened store");
    Ok(Store::new(Arc::new(client), settings.bucket.clone()))
}

/// Connect with explicit credentials; `bucket` defaults to [`s3kv_core::DEFAULT_BUCKET`]
pub async fn connect_with(
    access_key: &str,
    secret_key: &str,
    endpoint: &str,
    secure: bool,
    bucket: Option<&str>,
) -> Result<Store> {
    let settings = ConnectionConfig {
        access_key: Some(access_key.to_string()),
        secret_key: Some(secret_key.to_string()),
        endpoint: Some(endpoint.to_string()),
        secure: Some(secure),
        bucket: bucket.map(str::to_string),
        region: None,
    }
    .into_settings()?;

    connect(&settings).await
}

/// Copy `args[0]` to `args[1]`, connecting to `settings` only if an `s3:` key is involved
pub async fn copy<S: AsRef<str>>(settings: &ConnectionSettings, args: &[S]) -> Result<u64> {
    transfer(args, || connect(settings)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unreachable_settings() -> ConnectionSettings {
        ConnectionConfig {
            access_key: Some("key".into()),
            secret_key: Some("secret".into()),
            endpoint: Some("127.0.0.1:1".into()),
            secure: Some(false),
            ..Default::default()
        }
        .into_settings()
        .unwrap()
    }

    #[tokio::test]
    async fn test_local_copy_does_not_touch_endpoint() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("in.bin");
        let dst = dir.path().join("out.bin");
        std::fs::write(&src, [1u8, 2, 3]).unwrap();

        let args = [
            src.to_string_lossy().to_string(),
            dst.to_string_lossy().to_string(),
        ];
        let n = copy(&unreachable_settings(), &args).await.unwrap();

        assert_eq!(n, 3);
        assert_eq!(std::fs::read(&dst).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_connect_with_rejects_missing_endpoint() {
        let err = connect_with("key", "secret", "", true, None).await.unwrap_err();
        assert!(matches!(err, s3kv_core::Error::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_with_default_bucket() {
        let store = connect_with("key", "secret", "127.0.0.1:1", false, None)
            .await
            .unwrap();
        assert_eq!(store.bucket(), s3kv_core::DEFAULT_BUCKET);
    }
}

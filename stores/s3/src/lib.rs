use anyhow::Context;
use bytes::Bytes;
use s3::{Bucket, Region, creds::Credentials, error::S3Error};
use sharenote_core::StorageBackend;
use sharenote_core::store::{ObjectMetadata, StorageError, StoreResult, directory_prefix};

fn default_region() -> String {
    "auto".to_owned()
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct S3StoreConfig {
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub bucket_name: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct S3Store {
    bucket: Box<Bucket>,
}

impl S3Store {
    pub fn create(config: S3StoreConfig) -> anyhow::Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .context("invalid S3 credentials")?;
        let bucket = Bucket::new(
            &config.bucket_name,
            Region::Custom {
                endpoint: config.endpoint,
                region: config.region,
            },
            credentials,
        )
        .with_context(|| format!("failed to open bucket {}", config.bucket_name))?
        .with_path_style();
        Ok(Self { bucket })
    }
}

/// Transport failures and 5xx answers are worth retrying; any other HTTP
/// answer is the backend refusing the request.
fn classify(key: &str, err: S3Error) -> StorageError {
    match err {
        S3Error::HttpFailWithBody(code, body) if code < 500 => {
            StorageError::rejected(key, format!("http status {code}: {body}"))
        }
        other => StorageError::transient(other),
    }
}

#[async_trait::async_trait]
impl StorageBackend for S3Store {
    async fn probe(&self, key: &str) -> StoreResult<Option<String>> {
        match self.bucket.head_object(key).await {
            Ok((_, 200)) => Ok(Some(key.to_owned())),
            Ok((_, 404)) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(None),
            Ok((_, code)) => Err(StorageError::transient(anyhow::anyhow!(
                "unexpected http status code {code} probing {key}"
            ))),
            Err(e) => Err(classify(key, e)),
        }
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StoreResult<String> {
        let mut bucket = *self.bucket.clone();
        for (name, value) in metadata {
            bucket.add_header(&format!("x-amz-meta-{name}"), value);
        }

        let res = bucket
            .put_object_with_content_type(key, &bytes, content_type)
            .await
            .map_err(|e| classify(key, e))?;
        match res.status_code() {
            200 => Ok(key.to_owned()),
            code if code >= 500 => Err(StorageError::transient(anyhow::anyhow!(
                "http status {code} storing {key}"
            ))),
            code => Err(StorageError::rejected(
                key,
                format!("unexpected http status code {code}"),
            )),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match self.bucket.delete_object(key).await {
            Ok(_) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(classify(key, e)),
        }
    }

    async fn delete_directory(&self, prefix: &str) -> StoreResult<()> {
        let prefix = directory_prefix(prefix);
        let results = self
            .bucket
            .list(prefix.clone(), None)
            .await
            .map_err(|e| classify(&prefix, e))?;
        let keys: Vec<String> = results
            .into_iter()
            .flat_map(|res| res.contents)
            .map(|obj| obj.key)
            .collect();

        tracing::debug!("s3 store: deleting {} objects under {prefix}", keys.len());
        for key in keys {
            self.delete(&key).await?;
        }
        Ok(())
    }
}

//! S3 store
//!
//! Keys follow `<prefix>/docs/<archivoID>.json` and
//! `<prefix>/users/<usuarioID>.json`. Record locations expose the s3://
//! URI, a public HTTP URL, and a short-lived presigned GET.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use shared::{DocType, ExtractRecord, StorageLocation, UserIndex};

use crate::config::S3Config;
use crate::error::{AppError, AppResult};
use crate::storage::{new_id, now_ts, DocumentStore};

const PRESIGN_EXPIRY: Duration = Duration::from_secs(300);

pub struct S3Store {
    client: S3Client,
    bucket: String,
    region: String,
    prefix: String,
    public_url_base: String,
}

impl S3Store {
    pub async fn new(config: &S3Config) -> AppResult<Self> {
        if config.bucket.is_empty() {
            return Err(AppError::Configuration(
                "storage.s3.bucket is required for the s3 backend".into(),
            ));
        }
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        let client = S3Client::new(&aws_config);
        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            prefix: config.prefix.trim_matches('/').to_string(),
            public_url_base: config.public_url_base.trim_end_matches('/').to_string(),
        })
    }

    fn base_prefix(&self) -> &str {
        if self.prefix.is_empty() {
            "ocr"
        } else {
            &self.prefix
        }
    }

    fn doc_key(&self, archivo_id: &str) -> String {
        format!("{}/docs/{archivo_id}.json", self.base_prefix())
    }

    fn user_key(&self, usuario_id: &str) -> String {
        format!("{}/users/{usuario_id}.json", self.base_prefix())
    }

    fn s3_uri(&self, key: &str) -> String {
        format!("s3://{}/{key}", self.bucket)
    }

    fn http_url(&self, key: &str) -> String {
        if self.public_url_base.is_empty() {
            format!(
                "https://{}.s3.{}.amazonaws.com/{key}",
                self.bucket, self.region
            )
        } else {
            format!("{}/{key}", self.public_url_base)
        }
    }

    async fn put_json<T: serde::Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let body = serde_json::to_vec_pretty(value)
            .map_err(|e| AppError::Internal(format!("serialize record: {e}")))?;
        let bytes = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json; charset=utf-8")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 PUT {key}: {e}")))?;
        tracing::info!(bucket = %self.bucket, key = %key, bytes, "S3 PUT ok");
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    tracing::warn!(bucket = %self.bucket, key = %key, "S3 GET miss");
                    return Ok(None);
                }
                return Err(AppError::Storage(format!("S3 GET {key}: {service_err}")));
            }
        };
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("S3 GET body {key}: {e}")))?
            .into_bytes();
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Storage(format!("parse {key}: {e}")))?;
        Ok(Some(value))
    }

    async fn presign_get(&self, key: &str) -> Option<String> {
        let presigning = PresigningConfig::expires_in(PRESIGN_EXPIRY).ok()?;
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
        {
            Ok(req) => Some(req.uri().to_string()),
            Err(e) => {
                tracing::error!(bucket = %self.bucket, key = %key, "S3 presign error: {e}");
                None
            }
        }
    }

    async fn load_user_index(&self, usuario_id: &str) -> AppResult<UserIndex> {
        Ok(self
            .get_json(&self.user_key(usuario_id))
            .await?
            .unwrap_or_else(|| UserIndex::new(usuario_id)))
    }
}

#[async_trait]
impl DocumentStore for S3Store {
    async fn save(&self, record: &mut ExtractRecord) -> AppResult<String> {
        let archivo_id = record.archivo_id.clone().unwrap_or_else(new_id);
        record.archivo_id = Some(archivo_id.clone());
        record.ts = Some(now_ts());

        let key = self.doc_key(&archivo_id);
        self.put_json(&key, record).await?;

        let mut idx = self.load_user_index(&record.usuario_id).await?;
        idx.upsert(record.tipo_documento, &archivo_id, record.ts.unwrap_or(0.0));
        self.put_json(&self.user_key(&record.usuario_id), &idx)
            .await?;

        tracing::info!(archivo_id = %archivo_id, uri = %self.s3_uri(&key), "record saved");
        Ok(archivo_id)
    }

    async fn load(&self, archivo_id: &str) -> AppResult<Option<ExtractRecord>> {
        self.get_json(&self.doc_key(archivo_id)).await
    }

    async fn load_latest_by_user(
        &self,
        usuario_id: &str,
        tipo_documento: DocType,
    ) -> AppResult<Option<ExtractRecord>> {
        let idx = self.load_user_index(usuario_id).await?;
        let Some(entry) = idx.latest(tipo_documento) else {
            return Ok(None);
        };
        self.load(&entry.archivo_id).await
    }

    async fn list_by_user(&self, usuario_id: &str) -> AppResult<UserIndex> {
        self.load_user_index(usuario_id).await
    }

    async fn doc_location(&self, archivo_id: &str) -> Option<StorageLocation> {
        let key = self.doc_key(archivo_id);
        Some(StorageLocation {
            bucket: self.bucket.clone(),
            key: key.clone(),
            s3_uri: self.s3_uri(&key),
            http_url: self.http_url(&key),
            presigned_url: self.presign_get(&key).await,
        })
    }
}

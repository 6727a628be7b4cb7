//! Document record storage
//!
//! Extraction records and per-user indexes are JSON documents. The store
//! keeps them under `docs/<archivoID>.json` and `users/<usuarioID>.json`,
//! either on the local filesystem or in S3.

use async_trait::async_trait;

use shared::{DocType, ExtractRecord, StorageLocation, UserIndex};

use crate::error::AppResult;

pub mod local;
pub mod s3;

pub use local::LocalStore;
pub use s3::S3Store;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a record, assigning `archivoID` and `ts` and updating the
    /// user index. Returns the assigned id.
    async fn save(&self, record: &mut ExtractRecord) -> AppResult<String>;

    async fn load(&self, archivo_id: &str) -> AppResult<Option<ExtractRecord>>;

    /// Latest saved record of a type for a user.
    async fn load_latest_by_user(
        &self,
        usuario_id: &str,
        tipo_documento: DocType,
    ) -> AppResult<Option<ExtractRecord>>;

    async fn list_by_user(&self, usuario_id: &str) -> AppResult<UserIndex>;

    /// Location metadata for a saved record. Local storage has no
    /// addressable location.
    async fn doc_location(&self, archivo_id: &str) -> Option<StorageLocation>;
}

/// Fresh record id: `ocr_<utc timestamp>_<6 hex>`.
pub fn new_id() -> String {
    let ts = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let rand: u32 = rand::random::<u32>() & 0xff_ffff;
    format!("ocr_{ts}_{rand:06x}")
}

/// Seconds since the epoch with sub-second precision.
pub fn now_ts() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

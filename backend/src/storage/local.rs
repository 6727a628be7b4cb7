//! Local filesystem store
//!
//! Mirrors the container layout: records under `<root>/ocr/docs/`, user
//! indexes under `<root>/users/`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use shared::{DocType, ExtractRecord, StorageLocation, UserIndex};

use crate::error::{AppError, AppResult};
use crate::storage::{new_id, now_ts, DocumentStore};

pub struct LocalStore {
    docs_dir: PathBuf,
    users_dir: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            docs_dir: root.join("ocr").join("docs"),
            users_dir: root.join("users"),
        }
    }

    fn doc_path(&self, archivo_id: &str) -> PathBuf {
        self.docs_dir.join(format!("{archivo_id}.json"))
    }

    fn user_path(&self, usuario_id: &str) -> PathBuf {
        self.users_dir.join(format!("{usuario_id}.json"))
    }

    async fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| AppError::Internal(format!("serialize record: {e}")))?;
        fs::write(path, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("write {}: {e}", path.display())))?;
        Ok(())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &Path,
    ) -> AppResult<Option<T>> {
        match fs::read(path).await {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| AppError::Storage(format!("parse {}: {e}", path.display())))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("read {}: {e}", path.display()))),
        }
    }

    async fn load_user_index(&self, usuario_id: &str) -> AppResult<UserIndex> {
        Ok(self
            .read_json(&self.user_path(usuario_id))
            .await?
            .unwrap_or_else(|| UserIndex::new(usuario_id)))
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn save(&self, record: &mut ExtractRecord) -> AppResult<String> {
        let archivo_id = record.archivo_id.clone().unwrap_or_else(new_id);
        record.archivo_id = Some(archivo_id.clone());
        record.ts = Some(now_ts());

        self.write_json(&self.doc_path(&archivo_id), record).await?;

        let mut idx = self.load_user_index(&record.usuario_id).await?;
        idx.upsert(record.tipo_documento, &archivo_id, record.ts.unwrap_or(0.0));
        self.write_json(&self.user_path(&record.usuario_id), &idx)
            .await?;

        tracing::info!(archivo_id = %archivo_id, "record saved locally");
        Ok(archivo_id)
    }

    async fn load(&self, archivo_id: &str) -> AppResult<Option<ExtractRecord>> {
        self.read_json(&self.doc_path(archivo_id)).await
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

    async fn doc_location(&self, _archivo_id: &str) -> Option<StorageLocation> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(usuario: &str, tipo: DocType) -> ExtractRecord {
        let mut rec = ExtractRecord::new(usuario, tipo);
        rec.raw_text = "INSTITUTO NACIONAL ELECTORAL".into();
        rec.fields.insert("curp".into(), "GOMC920101HDFRRL09".into());
        rec
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let mut rec = record("u1", DocType::Ine);
        let id = store.save(&mut rec).await.unwrap();
        assert!(id.starts_with("ocr_"));
        assert!(rec.ts.is_some());

        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.usuario_id, "u1");
        assert_eq!(loaded.fields["curp"], "GOMC920101HDFRRL09");
        assert!(store.load("ocr_nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_by_user_follows_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let mut first = record("u1", DocType::Curp);
        store.save(&mut first).await.unwrap();
        let mut second = record("u1", DocType::Curp);
        second.raw_text = "segunda versión".into();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.save(&mut second).await.unwrap();

        let latest = store
            .load_latest_by_user("u1", DocType::Curp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.archivo_id, second.archivo_id);

        assert!(store
            .load_latest_by_user("u1", DocType::Acta)
            .await
            .unwrap()
            .is_none());

        let idx = store.list_by_user("u1").await.unwrap();
        assert_eq!(idx.docs["curp"].len(), 2);
    }

    #[tokio::test]
    async fn resave_keeps_id_and_updates_index_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let mut rec = record("u2", DocType::Acta);
        let id = store.save(&mut rec).await.unwrap();
        rec.fields.insert("nombres".into(), "JUAN".into());
        let id2 = store.save(&mut rec).await.unwrap();
        assert_eq!(id, id2);

        let idx = store.list_by_user("u2").await.unwrap();
        assert_eq!(idx.docs["acta"].len(), 1);
    }
}

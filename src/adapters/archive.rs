use crate::domain::model::ArchiveRecord;
use crate::domain::ports::{Archiver, Storage};
use crate::utils::error::{FormError, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

pub const UNREAD_FILE: &str = "unread.json";

/// Stores each accepted submission as `entries/<id>.json` and keeps the
/// list of unread entry ids in `unread.json`.
pub struct JsonArchiver<S: Storage> {
    storage: S,
    // 序列化 unread.json 的讀改寫
    unread_lock: Mutex<()>,
}

impl<S: Storage> JsonArchiver<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            unread_lock: Mutex::new(()),
        }
    }

    pub fn entry_path(id: &str) -> String {
        format!("entries/{}.json", id)
    }

    async fn read_unread(&self) -> Result<Vec<String>> {
        match self.storage.read_file(UNREAD_FILE).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(FormError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn write_unread(&self, ids: &[String]) -> Result<()> {
        let data = serde_json::to_vec(ids)?;
        self.storage.write_file(UNREAD_FILE, &data).await
    }

    pub async fn unread(&self) -> Result<Vec<String>> {
        let _guard = self.unread_lock.lock().await;
        self.read_unread().await
    }

    pub async fn unread_count(&self) -> Result<usize> {
        Ok(self.unread().await?.len())
    }

    /// 使用者開啟記錄後從未讀清單移除
    pub async fn mark_read(&self, id: &str) -> Result<bool> {
        let _guard = self.unread_lock.lock().await;
        let mut ids = self.read_unread().await?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() == before {
            return Ok(false);
        }
        self.write_unread(&ids).await?;
        Ok(true)
    }

    pub async fn load(&self, id: &str) -> Result<ArchiveRecord> {
        let data = self.storage.read_file(&Self::entry_path(id)).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[async_trait]
impl<S: Storage> Archiver for JsonArchiver<S> {
    async fn archive(&self, record: &ArchiveRecord) -> Result<String> {
        let data = serde_json::to_vec_pretty(record)?;
        self.storage
            .write_file(&Self::entry_path(&record.id), &data)
            .await?;

        let _guard = self.unread_lock.lock().await;
        let mut ids = self.read_unread().await?;
        if !ids.contains(&record.id) {
            ids.push(record.id.clone());
            self.write_unread(&ids).await?;
        }

        tracing::debug!(
            "🗄️ Entry {} stored, {} unread entr{}",
            record.id,
            ids.len(),
            if ids.len() == 1 { "y" } else { "ies" }
        );
        Ok(record.id.clone())
    }
}

use crate::domain::model::{
    ArchiveRecord, FormConfig, GateResult, NotificationDraft, Submission,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 依 form id 取得已解析的表單設定
pub trait ConfigStore: Send + Sync {
    fn get(&self, form_id: &str) -> Option<FormConfig>;
}

/// A check that may stop a submission before anything is sent.
#[async_trait]
pub trait Gate: Send + Sync {
    fn name(&self) -> &'static str;

    /// 此 gate 需要從欄位中移除（但自己仍會讀取）的保留鍵
    fn reserved_fields(&self, _form: &FormConfig) -> Vec<String> {
        Vec::new()
    }

    async fn evaluate(&self, submission: &Submission, form: &FormConfig) -> GateResult;
}

pub trait NonceVerifier: Send + Sync {
    fn verify(&self, token: &str, form_id: &str) -> bool;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, draft: &NotificationDraft) -> Result<()>;
}

#[async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for Box<T> {
    async fn send(&self, draft: &NotificationDraft) -> Result<()> {
        (**self).send(draft).await
    }
}

#[async_trait]
pub trait Archiver: Send + Sync {
    /// 回傳記錄的 id
    async fn archive(&self, record: &ArchiveRecord) -> Result<String>;
}

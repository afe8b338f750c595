use crate::utils::error::{FormError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use url::Url;

/// 單一欄位的值；重複的 checkbox 會變成有序列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Multiple(Vec<String>),
}

impl FieldValue {
    pub fn joined(&self, separator: &str) -> String {
        match self {
            FieldValue::Single(value) => value.clone(),
            FieldValue::Multiple(values) => values.join(separator),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Single(value) => value.is_empty(),
            FieldValue::Multiple(values) => values.iter().all(String::is_empty),
        }
    }

    pub(crate) fn push(&mut self, value: String) {
        match self {
            FieldValue::Single(existing) => {
                let first = std::mem::take(existing);
                *self = FieldValue::Multiple(vec![first, value]);
            }
            FieldValue::Multiple(values) => values.push(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedField {
    pub id: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionMeta {
    pub form_id: String,
    pub referer: Option<Url>,
    pub submitted_at: DateTime<Utc>,
    /// 表單渲染時間（保留欄位 `timestamp`），用於 honeypot 的時間檢查
    pub rendered_at: Option<DateTime<Utc>>,
    pub client_ip: String,
    pub authenticated: bool,
}

/// One extracted form post. Built once by the extractor and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Submission {
    fields: Vec<SubmittedField>,
    reserved: HashMap<String, String>,
    meta: SubmissionMeta,
}

impl Submission {
    pub fn new(
        fields: Vec<SubmittedField>,
        reserved: HashMap<String, String>,
        meta: SubmissionMeta,
    ) -> Self {
        Self {
            fields,
            reserved,
            meta,
        }
    }

    pub fn fields(&self) -> &[SubmittedField] {
        &self.fields
    }

    pub fn field(&self, id: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.id == id).map(|f| &f.value)
    }

    /// 被抽離的保留欄位（nonce、honeypot、captcha token 等），僅供 gate 讀取
    pub fn reserved(&self, key: &str) -> Option<&str> {
        self.reserved.get(key).map(String::as_str)
    }

    pub fn meta(&self) -> &SubmissionMeta {
        &self.meta
    }

    pub fn referer_str(&self) -> &str {
        self.meta.referer.as_ref().map(Url::as_str).unwrap_or("")
    }
}

/// Raw key/value pairs exactly as posted, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFormData {
    pairs: Vec<(String, String)>,
}

impl RawFormData {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// 解析 `application/x-www-form-urlencoded` 的請求內容
    pub fn from_urlencoded(body: &str) -> Self {
        Self {
            pairs: url::form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    /// 非同步送出時的 JSON 物件：值可以是字串、數字、布林或字串陣列
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| FormError::PayloadError {
            message: "expected a JSON object".to_string(),
        })?;

        let mut pairs = Vec::new();
        for (key, value) in object {
            match value {
                serde_json::Value::Array(items) => {
                    for item in items {
                        pairs.push((format!("{}[]", key), json_scalar(key, item)?));
                    }
                }
                other => pairs.push((key.clone(), json_scalar(key, other)?)),
            }
        }

        Ok(Self { pairs })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

fn json_scalar(key: &str, value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        _ => Err(FormError::PayloadError {
            message: format!("unsupported value for field '{}'", key),
        }),
    }
}

/// 請求層提供的資訊：來源位址、代理標頭、是否為已登入使用者
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub remote_addr: Option<String>,
    pub x_real_ip: Option<String>,
    pub x_forwarded_for: Option<String>,
    pub authenticated: bool,
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(received_at: DateTime<Utc>) -> Self {
        Self {
            remote_addr: None,
            x_real_ip: None,
            x_forwarded_for: None,
            authenticated: false,
            received_at,
        }
    }

    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    pub fn authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    /// Client IP: `X-Real-IP`, else the first `X-Forwarded-For` hop, else the socket address.
    pub fn client_ip(&self) -> String {
        if let Some(ip) = self.x_real_ip.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return ip.to_string();
        }

        if let Some(forwarded) = &self.x_forwarded_for {
            // 代理鏈：client, proxy1, proxy2，只取第一個且必須是合法 IP
            let first = forwarded.split(',').next().unwrap_or("").trim();
            return match first.parse::<IpAddr>() {
                Ok(ip) => ip.to_string(),
                Err(_) => String::new(),
            };
        }

        self.remote_addr
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMethod {
    Get,
    #[default]
    Post,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoneypotSettings {
    #[serde(default)]
    pub enabled: bool,
    /// 最短填寫秒數；未設定則不做時間檢查
    #[serde(default)]
    pub time_check: Option<u64>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub show_label: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub site_key: String,
    #[serde(default)]
    pub secret_key: String,
}

impl CaptchaSettings {
    pub fn has_keys(&self) -> bool {
        !self.site_key.trim().is_empty() && !self.secret_key.trim().is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.has_keys()
    }
}

/// What the visitor sees after an accepted submission. Exactly one is active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PostSubmission {
    #[default]
    Summary,
    Message(String),
    Redirect(Url),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    AuthorName,
    AuthorEmail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub autocomplete: Option<String>,
}

impl FieldSchema {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            autocomplete: None,
        }
    }

    pub fn with_autocomplete(mut self, autocomplete: impl Into<String>) -> Self {
        self.autocomplete = Some(autocomplete.into());
        self
    }

    pub fn role(&self) -> Option<FieldRole> {
        match self.autocomplete.as_deref()? {
            "given-name" | "name" => Some(FieldRole::AuthorName),
            "username" | "email" => Some(FieldRole::AuthorEmail),
            _ => None,
        }
    }
}

pub const UNLABELED: &str = "Unlabeled";

#[derive(Debug, Clone, PartialEq)]
pub struct FormConfig {
    pub id: String,
    pub title: String,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub method: FormMethod,
    pub honeypot: HoneypotSettings,
    pub captcha: CaptchaSettings,
    pub post_submission: PostSubmission,
    pub fields: Vec<FieldSchema>,
    /// 表單內容的雜湊；有設定時送出的 `hash` 欄位必須相符
    pub content_hash: Option<String>,
    pub is_async: bool,
    pub send_email: bool,
}

impl FormConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            recipients: Vec::new(),
            subject: None,
            method: FormMethod::Post,
            honeypot: HoneypotSettings::default(),
            captcha: CaptchaSettings::default(),
            post_submission: PostSubmission::Summary,
            fields: Vec::new(),
            content_hash: None,
            is_async: false,
            send_email: true,
        }
    }

    pub fn nonce_field(&self) -> String {
        format!("_wpnonce-{}", self.id)
    }

    pub fn honeypot_field(&self) -> String {
        format!("hp-{}", self.id)
    }

    pub fn label_for(&self, field_id: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.id == field_id)
            .map(|f| f.label.as_str())
            .filter(|label| !label.trim().is_empty())
            .unwrap_or(UNLABELED)
    }

    pub fn field_with_role(&self, role: FieldRole) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.role() == Some(role))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub name: String,
    pub base_url: Url,
    pub admin_email: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

pub fn default_date_format() -> String {
    "%B %-d, %Y at %-I:%M %P".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub gate: String,
    pub reason: String,
    /// `None` 代表靜默拒絕（授權失敗），不回傳任何內容
    pub user_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResult {
    Pass,
    Reject(Rejection),
}

impl GateResult {
    pub fn silent(gate: &str, reason: impl Into<String>) -> Self {
        GateResult::Reject(Rejection {
            gate: gate.to_string(),
            reason: reason.into(),
            user_message: None,
        })
    }

    pub fn reject(gate: &str, reason: impl Into<String>, user_message: impl Into<String>) -> Self {
        GateResult::Reject(Rejection {
            gate: gate.to_string(),
            reason: reason.into(),
            user_message: Some(user_message.into()),
        })
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, GateResult::Pass)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub reply_to: Option<Mailbox>,
}

/// 送出流程回傳給傳輸層的結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// CSRF 驗證失敗：不回傳內容
    Unauthorized,
    Content(String),
    /// 停止後續處理並導向
    Redirect(Url),
}

impl Outcome {
    pub fn content(&self) -> Option<&str> {
        match self {
            Outcome::Content(html) => Some(html),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Outcome::Unauthorized)
    }

    /// JSON envelope used by the background-request transport.
    pub fn to_async_json(&self) -> serde_json::Value {
        match self {
            Outcome::Unauthorized => serde_json::json!({ "success": false, "data": null }),
            Outcome::Content(html) => serde_json::json!({ "success": true, "data": html }),
            Outcome::Redirect(url) => {
                serde_json::json!({ "success": true, "data": { "redirect": url.as_str() } })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: String,
    pub form_id: String,
    pub subject: String,
    pub author: String,
    pub author_email: String,
    pub message: String,
    pub fields: Vec<SubmittedField>,
    pub ip_address: String,
    pub submitted_at: DateTime<Utc>,
    pub referer: String,
    pub authenticated: bool,
    pub notified: bool,
}

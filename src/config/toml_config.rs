use crate::adapters::{HttpRelaySink, JsonArchiver, OutboxSink};
use crate::config::cli::LocalStorage;
use crate::core::gates::captcha::{DEFAULT_TIMEOUT_SECS, DEFAULT_VERIFY_URL};
use crate::core::gates::nonce::DEFAULT_NONCE_LIFETIME_SECS;
use crate::core::gates::{CaptchaGate, GateChain, HashNonceVerifier, NonceGate};
use crate::core::ConfigStore;
use crate::domain::model::{
    CaptchaSettings, FieldSchema, FormConfig, FormMethod, HoneypotSettings, PostSubmission,
    SiteSettings,
};
use crate::domain::ports::{Archiver, NotificationSink};
use crate::utils::error::{FormError, Result};
use crate::utils::validation::{
    validate_email, validate_non_empty_string, validate_path, validate_range, validate_url,
    Validate,
};
use chrono::format::{Item, StrftimeItems};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// 最短填寫時間的上限（一天）
pub const MAX_TIME_CHECK_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormsConfig {
    pub site: SiteSettings,
    #[serde(default)]
    pub nonce: NonceConfig,
    #[serde(default)]
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub forms: Vec<FormRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NonceConfig {
    #[serde(default)]
    pub secret: String,
    pub action: Option<String>,
    pub lifetime_seconds: Option<u64>,
}

/// 全站共用的驗證服務設定與金鑰；各表單只決定是否啟用
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptchaConfig {
    pub verify_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub site_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    #[default]
    Outbox,
    Relay,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub kind: NotifierKind,
    pub endpoint: Option<String>,
    pub outbox_path: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub enabled: bool,
    pub path: Option<String>,
}

/// 單一表單在 TOML 中的原始設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormRecord {
    pub id: String,
    pub title: Option<String>,
    pub recipients: Option<Vec<String>>,
    pub subject: Option<String>,
    pub method: Option<FormMethod>,
    /// "summary" | "message" | "redirect"
    pub post_submission: Option<String>,
    pub message: Option<String>,
    pub redirect: Option<String>,
    pub honeypot: Option<HoneypotSettings>,
    pub captcha: Option<bool>,
    pub fields: Option<Vec<FieldSchema>>,
    pub content_hash: Option<String>,
    pub is_async: Option<bool>,
    pub send_email: Option<bool>,
}

impl FormsConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(FormError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| FormError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RECAPTCHA_SECRET})，找不到的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        static ENV_RE: OnceLock<Regex> = OnceLock::new();
        let re = ENV_RE
            .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static env pattern is valid"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    fn captcha_keys(&self) -> (String, String) {
        (
            self.captcha.site_key.clone().unwrap_or_default(),
            self.captcha.secret_key.clone().unwrap_or_default(),
        )
    }

    /// Resolves one raw record into a validated [`FormConfig`].
    pub fn resolve_form(&self, record: &FormRecord) -> Result<FormConfig> {
        let field = |name: &str| format!("forms.{}.{}", record.id, name);

        validate_non_empty_string("forms.id", &record.id)?;

        let post_submission = match record.post_submission.as_deref().unwrap_or("summary") {
            "summary" => PostSubmission::Summary,
            "message" => {
                let message = record.message.clone().unwrap_or_default();
                validate_non_empty_string(&field("message"), &message)?;
                PostSubmission::Message(message)
            }
            "redirect" => {
                let target = record.redirect.as_deref().ok_or_else(|| {
                    FormError::MissingConfigError {
                        field: field("redirect"),
                    }
                })?;
                PostSubmission::Redirect(validate_url(&field("redirect"), target)?)
            }
            other => {
                return Err(FormError::InvalidConfigValueError {
                    field: field("post_submission"),
                    value: other.to_string(),
                    reason: "Expected one of: summary, message, redirect".to_string(),
                })
            }
        };

        let recipients = record.recipients.clone().unwrap_or_default();
        for recipient in &recipients {
            validate_email(&field("recipients"), recipient)?;
        }

        let captcha_enabled = record.captcha.unwrap_or(false);
        let (site_key, secret_key) = self.captcha_keys();
        let captcha = CaptchaSettings {
            enabled: captcha_enabled,
            site_key,
            secret_key,
        };
        if captcha_enabled && !captcha.has_keys() {
            return Err(FormError::MissingConfigError {
                field: "captcha.site_key / captcha.secret_key".to_string(),
            });
        }

        let honeypot = record.honeypot.clone().unwrap_or_default();
        if let Some(secs) = honeypot.time_check {
            validate_range(&field("honeypot.time_check"), secs, 0, MAX_TIME_CHECK_SECS)?;
        }

        let fields = record.fields.clone().unwrap_or_default();
        let mut seen = HashSet::new();
        for schema in &fields {
            if !seen.insert(schema.id.as_str()) {
                return Err(FormError::InvalidConfigValueError {
                    field: field("fields"),
                    value: schema.id.clone(),
                    reason: "Duplicate field id".to_string(),
                });
            }
        }

        Ok(FormConfig {
            id: record.id.clone(),
            title: record.title.clone().unwrap_or_default(),
            recipients,
            subject: record.subject.clone(),
            method: record.method.unwrap_or_default(),
            honeypot,
            captcha,
            post_submission,
            fields,
            content_hash: record.content_hash.clone(),
            is_async: record.is_async.unwrap_or(false),
            send_email: record.send_email.unwrap_or(true),
        })
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_url("site.base_url", self.site.base_url.as_str())?;
        validate_email("site.admin_email", &self.site.admin_email)?;
        if StrftimeItems::new(&self.site.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(FormError::InvalidConfigValueError {
                field: "site.date_format".to_string(),
                value: self.site.date_format.clone(),
                reason: "Invalid strftime format".to_string(),
            });
        }

        validate_non_empty_string("nonce.secret", &self.nonce.secret)?;
        if self.nonce.secret.starts_with("${") {
            return Err(FormError::MissingConfigError {
                field: format!("nonce.secret (unresolved {})", self.nonce.secret),
            });
        }

        if let Some(url) = &self.captcha.verify_url {
            validate_url("captcha.verify_url", url)?;
        }
        if let Some(timeout) = self.captcha.timeout_seconds {
            validate_range("captcha.timeout_seconds", timeout, 1, 120)?;
        }

        match self.notifier.kind {
            NotifierKind::Relay => {
                let endpoint = self.notifier.endpoint.as_deref().unwrap_or("");
                validate_url("notifier.endpoint", endpoint)?;
            }
            NotifierKind::Outbox => {
                validate_path("notifier.outbox_path", &self.outbox_path())?;
            }
        }

        if self.archive.enabled {
            validate_path("archive.path", &self.archive_path())?;
        }

        let mut ids = HashSet::new();
        for record in &self.forms {
            if !ids.insert(record.id.as_str()) {
                return Err(FormError::InvalidConfigValueError {
                    field: "forms.id".to_string(),
                    value: record.id.clone(),
                    reason: "Duplicate form id".to_string(),
                });
            }
            self.resolve_form(record)?;
        }

        Ok(())
    }

    pub fn outbox_path(&self) -> String {
        self.notifier
            .outbox_path
            .clone()
            .unwrap_or_else(|| "./mail".to_string())
    }

    pub fn archive_path(&self) -> String {
        self.archive
            .path
            .clone()
            .unwrap_or_else(|| "./entries".to_string())
    }

    pub fn nonce_verifier(&self) -> HashNonceVerifier {
        let mut verifier = HashNonceVerifier::new(self.nonce.secret.clone())
            .with_lifetime(self.nonce.lifetime_seconds.unwrap_or(DEFAULT_NONCE_LIFETIME_SECS));
        if let Some(action) = &self.nonce.action {
            verifier = verifier.with_action(action.clone());
        }
        verifier
    }

    pub fn captcha_gate(&self) -> CaptchaGate {
        CaptchaGate::new(
            self.captcha
                .verify_url
                .clone()
                .unwrap_or_else(|| DEFAULT_VERIFY_URL.to_string()),
            Duration::from_secs(self.captcha.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        )
    }

    pub fn gate_chain(&self) -> GateChain {
        GateChain::standard(NonceGate::new(self.nonce_verifier()), self.captcha_gate())
    }

    pub fn notification_sink(&self) -> Box<dyn NotificationSink> {
        match self.notifier.kind {
            NotifierKind::Relay => {
                let timeout = Duration::from_secs(self.notifier.timeout_seconds.unwrap_or(10));
                let sink = HttpRelaySink::new(
                    self.notifier.endpoint.clone().unwrap_or_default(),
                    timeout,
                )
                .with_headers(self.notifier.headers.clone().unwrap_or_default());
                Box::new(sink)
            }
            NotifierKind::Outbox => Box::new(OutboxSink::new(LocalStorage::new(self.outbox_path()))),
        }
    }

    pub fn archiver(&self) -> Option<Arc<dyn Archiver>> {
        if !self.archive.enabled {
            return None;
        }
        Some(Arc::new(JsonArchiver::new(LocalStorage::new(self.archive_path()))))
    }
}

impl ConfigStore for FormsConfig {
    fn get(&self, form_id: &str) -> Option<FormConfig> {
        let record = self.forms.iter().find(|r| r.id == form_id)?;
        match self.resolve_form(record) {
            Ok(form) => Some(form),
            Err(e) => {
                tracing::warn!("⚠️ Form '{}' has an invalid configuration: {}", form_id, e);
                None
            }
        }
    }
}

impl Validate for FormsConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

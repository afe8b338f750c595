use crate::core::responder::rejection_block;
use crate::domain::model::{FormConfig, GateResult, Submission};
use crate::domain::ports::Gate;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const CAPTCHA_RESPONSE_FIELD: &str = "g-recaptcha-response";

pub const CAPTCHA_HEADING: &str = "Are you a human being?";
pub const CAPTCHA_MESSAGE: &str = "We apologize for the confusion, but we can’t quite tell if you’re a person or a script. Please don’t take this personally. Next time, click the captcha box, and we’ll get out of your hair. Contact the site administrator if you feel this was an error.";

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// reCAPTCHA v2 style verification over HTTP GET.
///
/// Anything other than an explicit `"success": true` rejects: transport
/// errors, timeouts, non-2xx statuses and unparseable bodies included.
/// There are no retries.
pub struct CaptchaGate {
    client: Client,
    verify_url: String,
    timeout: Duration,
}

impl CaptchaGate {
    pub fn new(verify_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            verify_url: verify_url.into(),
            timeout,
        }
    }

    pub async fn verify(&self, secret: &str, token: &str, remote_ip: &str) -> Result<bool> {
        tracing::debug!("🤖 Verifying captcha token against {}", self.verify_url);

        let response = self
            .client
            .get(&self.verify_url)
            .query(&[("secret", secret), ("response", token), ("remoteip", remote_ip)])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let verdict: SiteVerifyResponse = response.json().await?;
        if !verdict.success && !verdict.error_codes.is_empty() {
            tracing::debug!("🤖 Captcha verification errors: {:?}", verdict.error_codes);
        }

        Ok(verdict.success)
    }
}

impl Default for CaptchaGate {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFY_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

#[async_trait]
impl Gate for CaptchaGate {
    fn name(&self) -> &'static str {
        "captcha"
    }

    fn reserved_fields(&self, form: &FormConfig) -> Vec<String> {
        if form.captcha.is_active() {
            vec![CAPTCHA_RESPONSE_FIELD.to_string()]
        } else {
            Vec::new()
        }
    }

    async fn evaluate(&self, submission: &Submission, form: &FormConfig) -> GateResult {
        if !form.captcha.is_active() {
            return GateResult::Pass;
        }

        let token = submission.reserved(CAPTCHA_RESPONSE_FIELD).unwrap_or("");
        let verdict = self
            .verify(&form.captcha.secret_key, token, &submission.meta().client_ip)
            .await;

        let reason = match verdict {
            Ok(true) => return GateResult::Pass,
            Ok(false) => "verification service returned an unsuccessful verdict".to_string(),
            Err(e) => {
                // 無法確認就視同失敗
                tracing::warn!("⚠️ Captcha verification unavailable: {}", e);
                format!("verification service unavailable: {}", e)
            }
        };

        GateResult::reject(
            self.name(),
            reason,
            rejection_block(CAPTCHA_HEADING, submission.referer_str(), CAPTCHA_MESSAGE),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_field_only_when_active() {
        let gate = CaptchaGate::default();
        let mut form = FormConfig::new("f1");
        assert!(gate.reserved_fields(&form).is_empty());

        form.captcha.enabled = true;
        // 缺少金鑰時不啟用
        assert!(gate.reserved_fields(&form).is_empty());

        form.captcha.site_key = "site".into();
        form.captcha.secret_key = "secret".into();
        assert_eq!(gate.reserved_fields(&form), vec![CAPTCHA_RESPONSE_FIELD]);
    }

    #[test]
    fn test_verdict_parsing_defaults_to_failure() {
        let verdict: SiteVerifyResponse = serde_json::from_str("{}").unwrap();
        assert!(!verdict.success);

        let verdict: SiteVerifyResponse =
            serde_json::from_str(r#"{"success": false, "error-codes": ["timeout-or-duplicate"]}"#)
                .unwrap();
        assert_eq!(verdict.error_codes, vec!["timeout-or-duplicate"]);
    }
}

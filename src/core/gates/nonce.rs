use crate::domain::model::{FormConfig, GateResult, Submission};
use crate::domain::ports::{Gate, NonceVerifier};
use crate::core::extractor::HASH_FIELD;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub const DEFAULT_NONCE_ACTION: &str = "flash_form_submit";
pub const DEFAULT_NONCE_LIFETIME_SECS: u64 = 24 * 60 * 60;
const TOKEN_LEN: usize = 10;

/// 固定時間比較，避免以回應時間推測雜湊內容
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Rotating per-form tokens.
///
/// The tick advances every half lifetime; a token stays valid for the tick it
/// was issued in and the one after it.
#[derive(Debug, Clone)]
pub struct HashNonceVerifier {
    secret: String,
    action: String,
    lifetime_secs: u64,
}

impl HashNonceVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            action: DEFAULT_NONCE_ACTION.to_string(),
            lifetime_secs: DEFAULT_NONCE_LIFETIME_SECS,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn with_lifetime(mut self, lifetime_secs: u64) -> Self {
        self.lifetime_secs = lifetime_secs.max(2);
        self
    }

    fn tick(&self, at: DateTime<Utc>) -> i64 {
        let half = (self.lifetime_secs / 2) as i64;
        let now = at.timestamp();
        // ceil(now / half)
        now.div_euclid(half) + i64::from(now.rem_euclid(half) != 0)
    }

    fn token_for_tick(&self, tick: i64, form_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}|{}|{}|{}", tick, self.action, form_id, self.secret));
        let digest = hex::encode(hasher.finalize());
        digest[..TOKEN_LEN].to_string()
    }

    pub fn issue(&self, form_id: &str) -> String {
        self.issue_at(form_id, Utc::now())
    }

    pub fn issue_at(&self, form_id: &str, at: DateTime<Utc>) -> String {
        self.token_for_tick(self.tick(at), form_id)
    }

    pub fn verify_at(&self, token: &str, form_id: &str, at: DateTime<Utc>) -> bool {
        if token.is_empty() {
            return false;
        }

        let tick = self.tick(at);
        // 兩個都要算，讓比較次數與結果無關
        let current = constant_time_eq(
            token.as_bytes(),
            self.token_for_tick(tick, form_id).as_bytes(),
        );
        let previous = constant_time_eq(
            token.as_bytes(),
            self.token_for_tick(tick - 1, form_id).as_bytes(),
        );
        current | previous
    }
}

impl NonceVerifier for HashNonceVerifier {
    fn verify(&self, token: &str, form_id: &str) -> bool {
        self.verify_at(token, form_id, Utc::now())
    }
}

/// CSRF check. Any failure is a silent rejection.
pub struct NonceGate<V: NonceVerifier> {
    verifier: V,
}

impl<V: NonceVerifier> NonceGate<V> {
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl<V: NonceVerifier> Gate for NonceGate<V> {
    fn name(&self) -> &'static str {
        "nonce"
    }

    async fn evaluate(&self, submission: &Submission, form: &FormConfig) -> GateResult {
        let token = submission.reserved(&form.nonce_field()).unwrap_or("");
        if token.is_empty() {
            return GateResult::silent(self.name(), "missing nonce token");
        }

        if !self.verifier.verify(token, &form.id) {
            return GateResult::silent(self.name(), "invalid or expired nonce token");
        }

        if let Some(expected) = &form.content_hash {
            let provided = submission.reserved(HASH_FIELD).unwrap_or("");
            if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
                return GateResult::silent(self.name(), "content hash mismatch");
            }
        }

        GateResult::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::SubmissionMeta;
    use chrono::TimeZone;
    use std::collections::HashMap;

    const HALF_DAY: i64 = 12 * 60 * 60;

    fn submission(reserved: &[(&str, &str)]) -> Submission {
        Submission::new(
            Vec::new(),
            reserved
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            SubmissionMeta {
                form_id: "f1".into(),
                referer: None,
                submitted_at: Utc::now(),
                rendered_at: None,
                client_ip: String::new(),
                authenticated: false,
            },
        )
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_token_rotation_window() {
        let verifier = HashNonceVerifier::new("s3cret");
        let now = Utc.timestamp_opt(100 * HALF_DAY, 0).unwrap();

        let fresh = verifier.issue_at("f1", now);
        assert_eq!(fresh.len(), TOKEN_LEN);
        assert!(verifier.verify_at(&fresh, "f1", now));

        let thirteen_hours_old = verifier.issue_at("f1", now - chrono::Duration::hours(13));
        assert!(verifier.verify_at(&thirteen_hours_old, "f1", now));

        let expired = verifier.issue_at("f1", now - chrono::Duration::hours(25));
        assert!(!verifier.verify_at(&expired, "f1", now));
    }

    #[test]
    fn test_token_is_bound_to_form_and_secret() {
        let verifier = HashNonceVerifier::new("s3cret");
        let now = Utc::now();
        let token = verifier.issue_at("f1", now);

        assert!(!verifier.verify_at(&token, "f2", now));
        assert!(!HashNonceVerifier::new("other").verify_at(&token, "f1", now));
        assert!(!verifier.verify_at("", "f1", now));
    }

    #[tokio::test]
    async fn test_gate_rejects_silently() {
        let verifier = HashNonceVerifier::new("s3cret");
        let token = verifier.issue("f1");
        let gate = NonceGate::new(verifier);
        let form = FormConfig::new("f1");

        let missing = gate.evaluate(&submission(&[]), &form).await;
        assert!(matches!(missing, GateResult::Reject(ref r) if r.user_message.is_none()));

        let bad = gate
            .evaluate(&submission(&[("_wpnonce-f1", "0000000000")]), &form)
            .await;
        assert!(matches!(bad, GateResult::Reject(ref r) if r.user_message.is_none()));

        let good = gate
            .evaluate(&submission(&[("_wpnonce-f1", token.as_str())]), &form)
            .await;
        assert!(good.is_pass());
    }

    #[tokio::test]
    async fn test_gate_checks_content_hash() {
        let verifier = HashNonceVerifier::new("s3cret");
        let token = verifier.issue("f1");
        let gate = NonceGate::new(verifier);
        let mut form = FormConfig::new("f1");
        form.content_hash = Some("c0ffee".to_string());

        let mismatch = gate
            .evaluate(
                &submission(&[("_wpnonce-f1", token.as_str()), ("hash", "decaf")]),
                &form,
            )
            .await;
        assert!(matches!(mismatch, GateResult::Reject(ref r) if r.reason.contains("hash")));

        let matching = gate
            .evaluate(
                &submission(&[("_wpnonce-f1", token.as_str()), ("hash", "c0ffee")]),
                &form,
            )
            .await;
        assert!(matching.is_pass());
    }
}

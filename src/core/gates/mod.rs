pub mod captcha;
pub mod honeypot;
pub mod nonce;

pub use captcha::CaptchaGate;
pub use honeypot::HoneypotGate;
pub use nonce::{HashNonceVerifier, NonceGate};

use crate::domain::model::{FormConfig, GateResult, Submission};
use crate::domain::ports::Gate;

/// Ordered gates; the first rejection wins and nothing after it runs.
#[derive(Default)]
pub struct GateChain {
    gates: Vec<Box<dyn Gate>>,
}

impl GateChain {
    pub fn new() -> Self {
        Self { gates: Vec::new() }
    }

    /// 標準順序：nonce → honeypot → captcha
    pub fn standard<V>(nonce: NonceGate<V>, captcha: CaptchaGate) -> Self
    where
        V: crate::domain::ports::NonceVerifier + 'static,
    {
        Self::new()
            .with_gate(nonce)
            .with_gate(HoneypotGate)
            .with_gate(captcha)
    }

    pub fn with_gate(mut self, gate: impl Gate + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn reserved_fields(&self, form: &FormConfig) -> Vec<String> {
        self.gates
            .iter()
            .flat_map(|g| g.reserved_fields(form))
            .collect()
    }

    pub async fn evaluate(&self, submission: &Submission, form: &FormConfig) -> GateResult {
        for gate in &self.gates {
            let result = gate.evaluate(submission, form).await;
            match &result {
                GateResult::Pass => {
                    tracing::debug!("🛡️ Gate '{}' passed for form '{}'", gate.name(), form.id);
                }
                GateResult::Reject(rejection) => {
                    tracing::info!(
                        "🚫 Gate '{}' rejected submission to form '{}': {}",
                        gate.name(),
                        form.id,
                        rejection.reason
                    );
                    return result;
                }
            }
        }

        GateResult::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::SubmissionMeta;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingGate {
        name: &'static str,
        verdict: GateResult,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Gate for CountingGate {
        fn name(&self) -> &'static str {
            self.name
        }

        fn reserved_fields(&self, form: &FormConfig) -> Vec<String> {
            vec![format!("{}-{}", self.name, form.id)]
        }

        async fn evaluate(&self, _submission: &Submission, _form: &FormConfig) -> GateResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    fn submission() -> Submission {
        Submission::new(
            Vec::new(),
            HashMap::new(),
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

    #[tokio::test]
    async fn test_first_rejection_short_circuits() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let third = Arc::new(AtomicUsize::new(0));

        let chain = GateChain::new()
            .with_gate(CountingGate {
                name: "a",
                verdict: GateResult::Pass,
                calls: first.clone(),
            })
            .with_gate(CountingGate {
                name: "b",
                verdict: GateResult::reject("b", "nope", "go away"),
                calls: second.clone(),
            })
            .with_gate(CountingGate {
                name: "c",
                verdict: GateResult::Pass,
                calls: third.clone(),
            });

        let form = FormConfig::new("f1");
        let result = chain.evaluate(&submission(), &form).await;

        assert!(matches!(result, GateResult::Reject(ref r) if r.gate == "b"));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 0);
        assert_eq!(chain.names(), vec!["a", "b", "c"]);
        assert_eq!(chain.reserved_fields(&form), vec!["a-f1", "b-f1", "c-f1"]);
    }

    #[tokio::test]
    async fn test_empty_chain_passes() {
        let chain = GateChain::new();
        assert!(chain.is_empty());
        assert!(chain.evaluate(&submission(), &FormConfig::new("f1")).await.is_pass());
    }
}

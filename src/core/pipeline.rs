use crate::core::extractor::extract;
use crate::core::gates::GateChain;
use crate::core::notifier::Notifier;
use crate::core::responder::{respond, wrap};
use crate::domain::model::{
    ArchiveRecord, FieldRole, FormConfig, GateResult, NotificationDraft, Outcome, RawFormData,
    RequestContext, SiteSettings, Submission,
};
use crate::domain::ports::{Archiver, ConfigStore, NotificationSink};
use crate::utils::error::FormError;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Gate chain → notifier → archiver → responder for one submission at a time.
///
/// Holds no per-request state, so one instance can be shared across tasks.
pub struct SubmissionPipeline<N: NotificationSink> {
    site: SiteSettings,
    gates: GateChain,
    notifier: Notifier<N>,
    archiver: Option<Arc<dyn Archiver>>,
}

impl<N: NotificationSink> SubmissionPipeline<N> {
    pub fn new(site: SiteSettings, gates: GateChain, sink: N) -> Self {
        Self {
            site,
            gates,
            notifier: Notifier::new(sink),
            archiver: None,
        }
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    pub fn site(&self) -> &SiteSettings {
        &self.site
    }

    pub fn notifier(&self) -> &Notifier<N> {
        &self.notifier
    }

    /// 非同步送出：先以 form id 查詢設定，找不到就當成未授權
    pub async fn process_by_id<C: ConfigStore>(
        &self,
        store: &C,
        form_id: &str,
        ctx: &RequestContext,
        raw: &RawFormData,
    ) -> Outcome {
        match store.get(form_id) {
            Some(form) => self.process(&form, ctx, raw).await,
            None => {
                let err = FormError::UnknownFormError {
                    form_id: form_id.to_string(),
                };
                tracing::warn!("❓ Submission ignored: {}", err.user_friendly_message());
                tracing::warn!("💡 Suggestion: {}", err.recovery_suggestion());
                Outcome::Unauthorized
            }
        }
    }

    pub async fn process(
        &self,
        form: &FormConfig,
        ctx: &RequestContext,
        raw: &RawFormData,
    ) -> Outcome {
        let gate_reserved = self.gates.reserved_fields(form);
        let submission = extract(form, &self.site, ctx, raw, &gate_reserved);

        if let GateResult::Reject(rejection) = self.gates.evaluate(&submission, form).await {
            return match rejection.user_message {
                None => {
                    tracing::info!(
                        "🔒 Unauthorized submission to form '{}' dropped ({})",
                        form.id,
                        rejection.reason
                    );
                    Outcome::Unauthorized
                }
                Some(message) => Outcome::Content(wrap(&message)),
            };
        }

        let draft = self.notifier.compose(form, &self.site, &submission);
        let notified = if form.send_email {
            self.notifier.dispatch(&draft).await
        } else {
            tracing::debug!("📭 E-mail disabled for form '{}'", form.id);
            false
        };

        self.archive(form, &submission, &draft, notified).await;

        let outcome = respond(form, &submission);
        match &outcome {
            Outcome::Redirect(url) => {
                tracing::info!("✅ Form '{}' accepted, redirecting to {}", form.id, url)
            }
            _ => tracing::info!("✅ Form '{}' accepted", form.id),
        }
        outcome
    }

    async fn archive(
        &self,
        form: &FormConfig,
        submission: &Submission,
        draft: &NotificationDraft,
        notified: bool,
    ) {
        let Some(archiver) = &self.archiver else {
            return;
        };

        let record = build_archive_record(form, submission, draft, notified);
        match archiver.archive(&record).await {
            Ok(id) => tracing::debug!("🗄️ Submission archived as {}", id),
            Err(e) => tracing::warn!("⚠️ Failed to archive submission to '{}': {}", form.id, e),
        }
    }
}

fn role_value(form: &FormConfig, submission: &Submission, role: FieldRole) -> String {
    form.field_with_role(role)
        .and_then(|schema| submission.field(&schema.id))
        .map(|value| value.joined(", "))
        .unwrap_or_default()
}

/// 以 form id、作者與送出時間產生穩定的記錄 id
pub fn record_id(form_id: &str, author: &str, submission: &Submission) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}",
        form_id,
        author,
        submission.meta().submitted_at.to_rfc3339()
    ));
    hex::encode(hasher.finalize())[..32].to_string()
}

pub fn build_archive_record(
    form: &FormConfig,
    submission: &Submission,
    draft: &NotificationDraft,
    notified: bool,
) -> ArchiveRecord {
    let meta = submission.meta();
    let author = role_value(form, submission, FieldRole::AuthorName);
    let author_email = role_value(form, submission, FieldRole::AuthorEmail);

    ArchiveRecord {
        id: record_id(&form.id, &author, submission),
        form_id: form.id.clone(),
        subject: draft.subject.clone(),
        author,
        author_email,
        message: draft.html_body.clone(),
        fields: submission.fields().to_vec(),
        ip_address: meta.client_ip.clone(),
        submitted_at: meta.submitted_at,
        referer: submission.referer_str().to_string(),
        authenticated: meta.authenticated,
        notified,
    }
}

use crate::domain::model::{
    FieldRole, FieldValue, FormConfig, Mailbox, NotificationDraft, SiteSettings, Submission,
};
use crate::domain::ports::NotificationSink;
use crate::utils::html::{clean, escape, plain_text, wrap_in_html};
use crate::utils::validation::is_email;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;

pub const DEFAULT_SUBJECT: &str = "[{site}] {form}";

fn placeholder_re() -> &'static Regex {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"\{([A-Za-z0-9_\-]+)\}").expect("static placeholder pattern is valid")
    })
}

/// 依網站設定的格式輸出時間；格式字串無效時退回 RFC 3339
pub fn format_timestamp(at: DateTime<Utc>, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", at.format(format)).is_err() {
        return at.to_rfc3339();
    }
    out
}

/// Expands `{site}`, `{form}` and `{<field id>}` in the subject; unknown placeholders stay as-is.
pub fn render_subject(form: &FormConfig, site: &SiteSettings, submission: &Submission) -> String {
    let template = form.subject.as_deref().unwrap_or(DEFAULT_SUBJECT);
    let form_title = if form.title.trim().is_empty() {
        form.id.as_str()
    } else {
        form.title.as_str()
    };

    placeholder_re()
        .replace_all(template, |caps: &regex::Captures| {
            let key = &caps[1];
            match key {
                "site" => site.name.clone(),
                "form" => form_title.to_string(),
                _ => submission
                    .field(key)
                    .map(|v| v.joined(", "))
                    .unwrap_or_else(|| caps[0].to_string()),
            }
        })
        .into_owned()
}

pub fn recipients(form: &FormConfig, site: &SiteSettings) -> Vec<String> {
    let to: Vec<String> = form
        .recipients
        .iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();

    if to.is_empty() {
        vec![site.admin_email.clone()]
    } else {
        to
    }
}

fn single_value<'a>(submission: &'a Submission, form: &FormConfig, role: FieldRole) -> Option<&'a str> {
    let schema = form.field_with_role(role)?;
    match submission.field(&schema.id)? {
        FieldValue::Single(value) => Some(value.trim()),
        FieldValue::Multiple(values) => values.first().map(|v| v.trim()),
    }
}

fn reply_to(form: &FormConfig, submission: &Submission) -> Option<Mailbox> {
    let email = single_value(submission, form, FieldRole::AuthorEmail).filter(|e| is_email(e))?;
    let name = single_value(submission, form, FieldRole::AuthorName)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    Some(Mailbox {
        name,
        email: email.to_string(),
    })
}

pub fn html_body(form: &FormConfig, site: &SiteSettings, submission: &Submission) -> String {
    let meta = submission.meta();
    let mut body = String::new();

    for field in submission.fields() {
        body.push_str(&format!(
            "<b>{}</b>: {}<br />",
            clean(form.label_for(&field.id)),
            clean(&field.value.joined(", "))
        ));
    }

    body.push_str("<br />");
    body.push_str("<hr />");
    body.push_str(&format!(
        "Time: {}<br />",
        escape(&format_timestamp(meta.submitted_at, &site.date_format))
    ));
    body.push_str(&format!("IP Address: {}<br />", escape(&meta.client_ip)));
    body.push_str(&format!(
        "Contact Form URL: {}<br />",
        escape(submission.referer_str())
    ));

    if meta.authenticated {
        body.push_str(&format!(
            "<p>Sent by a verified \"{}\" user.</p>",
            escape(&site.name)
        ));
    } else {
        body.push_str("<p>Sent by an unverified visitor to your site.</p>");
    }

    wrap_in_html(&body)
}

/// Builds notification drafts and hands them to a [`NotificationSink`].
pub struct Notifier<N: NotificationSink> {
    sink: N,
}

impl<N: NotificationSink> Notifier<N> {
    pub fn new(sink: N) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    pub fn compose(
        &self,
        form: &FormConfig,
        site: &SiteSettings,
        submission: &Submission,
    ) -> NotificationDraft {
        let html = html_body(form, site, submission);
        let text = plain_text(&html);

        NotificationDraft {
            to: recipients(form, site),
            subject: render_subject(form, site, submission),
            html_body: html,
            text_body: text,
            reply_to: reply_to(form, submission),
        }
    }

    /// Best-effort send. Failures are logged and reported as `false`.
    pub async fn dispatch(&self, draft: &NotificationDraft) -> bool {
        match self.sink.send(draft).await {
            Ok(()) => {
                tracing::info!(
                    "📧 Notification '{}' sent to {} recipient(s)",
                    draft.subject,
                    draft.to.len()
                );
                true
            }
            Err(e) => {
                tracing::warn!("⚠️ Notification '{}' could not be sent: {}", draft.subject, e);
                tracing::warn!("💡 Suggestion: {}", e.recovery_suggestion());
                false
            }
        }
    }
}

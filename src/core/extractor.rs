use crate::domain::model::{
    FieldValue, FormConfig, RawFormData, RequestContext, SiteSettings, Submission,
    SubmissionMeta, SubmittedField,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use url::Url;

/// 框架保留的欄位：不會出現在通知信或摘要中
pub const RESERVED_FIELDS: [&str; 6] = [
    "_wp_http_referer",
    "action",
    "form_id",
    "post_id",
    "hash",
    "timestamp",
];

pub const REFERER_FIELD: &str = "_wp_http_referer";
pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const HASH_FIELD: &str = "hash";

/// Builds a [`Submission`] from raw posted pairs.
///
/// Reserved keys (the framework set, the form's nonce field and whatever the
/// registered gates declare) are moved aside; `name[]` and repeated keys are
/// collected into ordered lists; everything else passes through untouched.
pub fn extract(
    form: &FormConfig,
    site: &SiteSettings,
    ctx: &RequestContext,
    raw: &RawFormData,
    gate_reserved: &[String],
) -> Submission {
    let mut reserved_keys: HashSet<String> =
        RESERVED_FIELDS.iter().map(|k| k.to_string()).collect();
    reserved_keys.insert(form.nonce_field());
    reserved_keys.extend(gate_reserved.iter().cloned());

    let mut fields: Vec<SubmittedField> = Vec::new();
    let mut reserved: HashMap<String, String> = HashMap::new();

    for (key, value) in raw.pairs() {
        if reserved_keys.contains(key) {
            reserved.insert(key.clone(), value.clone());
            continue;
        }

        let (id, is_list) = match key.strip_suffix("[]") {
            Some(bare) => (bare, true),
            None => (key.as_str(), false),
        };

        match fields.iter_mut().find(|f| f.id == id) {
            Some(existing) => existing.value.push(value.clone()),
            None => {
                let value = if is_list {
                    FieldValue::Multiple(vec![value.clone()])
                } else {
                    FieldValue::Single(value.clone())
                };
                fields.push(SubmittedField {
                    id: id.to_string(),
                    value,
                });
            }
        }
    }

    let referer = reserved
        .get(REFERER_FIELD)
        .and_then(|r| resolve_referer(&site.base_url, r));
    let rendered_at = reserved
        .get(TIMESTAMP_FIELD)
        .and_then(|t| parse_unix_timestamp(t));

    tracing::debug!(
        "🧾 Extracted {} field(s) and {} reserved key(s) for form '{}'",
        fields.len(),
        reserved.len(),
        form.id
    );

    Submission::new(
        fields,
        reserved,
        SubmissionMeta {
            form_id: form.id.clone(),
            referer,
            submitted_at: ctx.received_at,
            rendered_at,
            client_ip: ctx.client_ip(),
            authenticated: ctx.authenticated,
        },
    )
}

/// 相對路徑以網站 base URL 解析；絕對網址只接受 http(s)
pub fn resolve_referer(base: &Url, referer: &str) -> Option<Url> {
    let referer = referer.trim();
    if referer.is_empty() {
        return None;
    }

    match Url::parse(referer) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
        Ok(_) => None,
        Err(_) => base.join(referer).ok(),
    }
}

pub fn parse_unix_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = value.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

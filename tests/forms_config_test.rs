use chrono::Utc;
use flash_form::utils::validation::Validate;
use flash_form::{
    FormsConfig, JsonArchiver, LocalStorage, NotificationDraft, Outcome, RawFormData,
    RequestContext, SubmissionPipeline,
};
use std::path::Path;
use tempfile::TempDir;

fn write_config(temp_dir: &TempDir) -> String {
    let root = temp_dir.path().to_str().unwrap();
    let content = format!(
        r#"
[site]
name = "Example"
base_url = "https://example.com/"
admin_email = "admin@example.com"

[nonce]
secret = "toml-secret"

[notifier]
kind = "outbox"
outbox_path = "{root}/mail"

[archive]
enabled = true
path = "{root}/archive"

[[forms]]
id = "contact-1"
title = "Contact"
recipients = ["team@example.com"]
subject = "[{{site}}] {{form}} from {{name}}"
post_submission = "message"
message = "Thanks!\n\nWe will reply soon."

[forms.honeypot]
enabled = true

[[forms.fields]]
id = "name"
label = "Name"
autocomplete = "name"

[[forms.fields]]
id = "email"
label = "Email"
autocomplete = "email"

[[forms]]
id = "newsletter"
post_submission = "redirect"
redirect = "https://example.com/subscribed"
"#
    );

    let path = temp_dir.path().join("forms.toml");
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

fn json_files(dir: &Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().map(|x| x == "json").unwrap_or(false))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_toml_config_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let config = FormsConfig::from_file(write_config(&temp_dir)).unwrap();
    config.validate().unwrap();

    let mut pipeline = SubmissionPipeline::new(
        config.site.clone(),
        config.gate_chain(),
        config.notification_sink(),
    );
    pipeline = pipeline.with_archiver(config.archiver().expect("archive enabled"));

    let token = config.nonce_verifier().issue("contact-1");
    let raw = RawFormData::from_urlencoded(&format!(
        "_wpnonce-contact-1={}&_wp_http_referer=%2Fcontact%2F&hp-contact-1=&name=Ada+Lovelace&email=ada%40example.com",
        token
    ));
    let ctx = RequestContext::new(Utc::now()).with_remote_addr("192.0.2.10");

    let outcome = pipeline
        .process_by_id(&config, "contact-1", &ctx, &raw)
        .await;

    assert_eq!(
        outcome,
        Outcome::Content(
            "<div class=\"flash-form__submission\"><p>Thanks!</p>\n<p>We will reply soon.</p>\n</div>"
                .to_string()
        )
    );

    // 通知寫入 outbox
    let outbox = json_files(&temp_dir.path().join("mail").join("outbox"));
    assert_eq!(outbox.len(), 1);
    let draft: NotificationDraft =
        serde_json::from_slice(&std::fs::read(&outbox[0]).unwrap()).unwrap();
    assert_eq!(draft.to, vec!["team@example.com"]);
    assert_eq!(draft.subject, "[Example] Contact from Ada Lovelace");
    let reply_to = draft.reply_to.expect("reply-to from autocomplete roles");
    assert_eq!(reply_to.email, "ada@example.com");
    assert_eq!(reply_to.name.as_deref(), Some("Ada Lovelace"));
    assert!(draft.text_body.contains("IP Address: 192.0.2.10"));
    assert!(!draft.html_body.contains("hp-contact-1"));

    // 記錄寫入 archive，且列為未讀
    let archiver = JsonArchiver::new(LocalStorage::new(config.archive_path()));
    let unread = archiver.unread().await.unwrap();
    assert_eq!(unread.len(), 1);
    let record = archiver.load(&unread[0]).await.unwrap();
    assert_eq!(record.form_id, "contact-1");
    assert_eq!(record.author, "Ada Lovelace");
    assert_eq!(record.author_email, "ada@example.com");
    assert_eq!(record.referer, "https://example.com/contact/");
    assert!(record.notified);
}

#[tokio::test]
async fn test_unknown_form_id_is_unauthorized() {
    let temp_dir = TempDir::new().unwrap();
    let config = FormsConfig::from_file(write_config(&temp_dir)).unwrap();
    let pipeline = SubmissionPipeline::new(
        config.site.clone(),
        config.gate_chain(),
        config.notification_sink(),
    );

    let token = config.nonce_verifier().issue("missing");
    let raw = RawFormData::from_pairs([("_wpnonce-missing", token.as_str())]);
    let ctx = RequestContext::new(Utc::now());

    let outcome = pipeline.process_by_id(&config, "missing", &ctx, &raw).await;

    assert!(outcome.is_unauthorized());
    assert!(json_files(&temp_dir.path().join("mail").join("outbox")).is_empty());
}

#[tokio::test]
async fn test_redirect_form_async_envelope() {
    let temp_dir = TempDir::new().unwrap();
    let config = FormsConfig::from_file(write_config(&temp_dir)).unwrap();
    let pipeline = SubmissionPipeline::new(
        config.site.clone(),
        config.gate_chain(),
        config.notification_sink(),
    );

    let token = config.nonce_verifier().issue("newsletter");
    let raw = RawFormData::from_pairs([
        ("_wpnonce-newsletter", token.as_str()),
        ("email", "ada@example.com"),
    ]);
    let ctx = RequestContext::new(Utc::now());

    let outcome = pipeline
        .process_by_id(&config, "newsletter", &ctx, &raw)
        .await;

    assert_eq!(
        outcome.to_async_json(),
        serde_json::json!({
            "success": true,
            "data": { "redirect": "https://example.com/subscribed" }
        })
    );
    // 導向前仍會寄出通知
    assert_eq!(
        json_files(&temp_dir.path().join("mail").join("outbox")).len(),
        1
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = FormsConfig::from_toml_str(
        r#"
[site]
name = "Example"
base_url = "https://example.com/"
admin_email = "admin@example.com"

[nonce]
secret = "s"

[[forms]]
id = "broken"
post_submission = "redirect"
"#,
    )
    .unwrap();

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("forms.broken.redirect"));
}

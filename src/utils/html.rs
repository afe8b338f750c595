//! Small HTML helpers for notification bodies and submission feedback.

use regex::Regex;
use std::sync::OnceLock;

fn tag_re() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static tag pattern is valid"))
}

fn script_style_re() -> &'static Regex {
    static SCRIPT_RE: OnceLock<Regex> = OnceLock::new();
    SCRIPT_RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>")
            .expect("static script/style pattern is valid")
    })
}

fn paragraph_split_re() -> &'static Regex {
    static PARA_RE: OnceLock<Regex> = OnceLock::new();
    PARA_RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("static paragraph pattern is valid"))
}

/// 轉義 HTML 特殊字元
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// 清理欄位的 label / value：轉義標記、方括號轉實體、換行轉 `<br />`
pub fn clean(value: &str) -> String {
    escape(value)
        .replace('[', "&#91;")
        .replace(']', "&#93;")
        .replace("\r\n", "\n")
        .replace('\n', "<br />\n")
}

/// 移除所有標籤（包含 script/style 的內容）
pub fn strip_tags(html: &str) -> String {
    let without_scripts = script_style_re().replace_all(html, "");
    tag_re().replace_all(&without_scripts, "").into_owned()
}

/// Derives the plain-text alternative of an HTML e-mail body.
///
/// `<p>` keeps an extra line break above it, `<br>` becomes a newline and
/// `<hr>` becomes a `----` marker line before the remaining markup is stripped.
pub fn plain_text(html: &str) -> String {
    let text = html
        .replace("<p>", "<p><br />")
        .replace("<br />", "\n")
        .replace("<br/>", "\n")
        .replace("<br>", "\n")
        .replace("<hr />", "----\n")
        .replace("<hr/>", "----\n")
        .replace("<hr>", "----\n");

    strip_tags(&text).trim().to_string()
}

/// Turns blank-line separated text into `<p>` blocks; single newlines become `<br />`.
pub fn autop(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::new();

    for block in paragraph_split_re().split(normalized.trim()) {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        let lines: Vec<&str> = block.lines().map(str::trim_end).collect();
        out.push_str("<p>");
        out.push_str(&lines.join("<br />\n"));
        out.push_str("</p>\n");
    }

    out
}

/// 若內容尚未包在 `<html>` 中，補上最小的 HTML 文件外殼
pub fn wrap_in_html(body: &str) -> String {
    if body.contains("<html") {
        return body.to_string();
    }

    format!(
        "<!doctype html>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<body>\n{}\n</body>\n</html>",
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_escapes_markup_and_brackets() {
        assert_eq!(
            clean("<b>[shortcode]</b>"),
            "&lt;b&gt;&#91;shortcode&#93;&lt;/b&gt;"
        );
        assert_eq!(clean("line one\nline two"), "line one<br />\nline two");
    }

    #[test]
    fn test_plain_text_conversion() {
        let html = "<b>Name</b>: Ada<br /><br /><hr />Time: now<br /><p>Sent by an unverified visitor to your site.</p>";
        let text = plain_text(html);
        assert_eq!(
            text,
            "Name: Ada\n\n----\nTime: now\n\nSent by an unverified visitor to your site."
        );
    }

    #[test]
    fn test_plain_text_is_pure() {
        let html = wrap_in_html("<b>Message</b>: Hi<br /><hr /><p>x</p>");
        assert_eq!(plain_text(&html), plain_text(&html));
    }

    #[test]
    fn test_strip_tags_drops_script_content() {
        assert_eq!(strip_tags("a<script>alert(1)</script>b<i>c</i>"), "abc");
    }

    #[test]
    fn test_autop() {
        assert_eq!(
            autop("Thanks!\n\nWe will be in touch.\nBye"),
            "<p>Thanks!</p>\n<p>We will be in touch.<br />\nBye</p>\n"
        );
        assert_eq!(autop("   "), "");
    }

    #[test]
    fn test_wrap_in_html_is_skipped_for_documents() {
        let doc = "<html><body>x</body></html>";
        assert_eq!(wrap_in_html(doc), doc);
        assert!(wrap_in_html("x").starts_with("<!doctype html>"));
    }
}

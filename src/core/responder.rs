use crate::domain::model::{FormConfig, Outcome, PostSubmission, Submission};
use crate::utils::html::{autop, clean, escape};

pub const SUBMISSION_CLASS: &str = "flash-form__submission";
pub const SUMMARY_HEADING: &str = "Message sent!";

/// `<h3>` heading with a "(go back)" link to the originating page.
pub fn heading(text: &str, referer: &str) -> String {
    format!(
        "<h3>{} <a href=\"{}\">(go back)</a></h3>",
        escape(text),
        escape(referer)
    )
}

pub fn rejection_block(heading_text: &str, referer: &str, message: &str) -> String {
    format!(
        "{}<blockquote><p>{}</p></blockquote>",
        heading(heading_text, referer),
        escape(message)
    )
}

/// 所有回饋內容都包在同一個容器中
pub fn wrap(inner: &str) -> String {
    format!("<div class=\"{}\">{}</div>", SUBMISSION_CLASS, inner)
}

pub fn summary(form: &FormConfig, submission: &Submission) -> String {
    let mut html = format!(
        "{}<blockquote><ul>",
        heading(SUMMARY_HEADING, submission.referer_str())
    );

    for field in submission.fields() {
        html.push_str(&format!(
            "<li><label>{}:&nbsp;</label><span>{}</span></li>",
            clean(form.label_for(&field.id)),
            clean(&field.value.joined(","))
        ));
    }

    html.push_str("</ul></blockquote>");
    html
}

/// Resolves the single configured post-submission outcome for an accepted submission.
pub fn respond(form: &FormConfig, submission: &Submission) -> Outcome {
    match &form.post_submission {
        PostSubmission::Redirect(url) => Outcome::Redirect(url.clone()),
        PostSubmission::Message(text) => Outcome::Content(wrap(&autop(text))),
        PostSubmission::Summary => Outcome::Content(wrap(&summary(form, submission))),
    }
}

use crate::core::responder::rejection_block;
use crate::domain::model::{FormConfig, FormMethod, GateResult, Submission};
use crate::domain::ports::Gate;
use async_trait::async_trait;
use chrono::TimeDelta;

pub const TIME_CHECK_FIELD: &str = "time_check";

pub const HONEYPOT_HEADING: &str = "Something is stuck in the honey!";
pub const HONEYPOT_MESSAGE: &str = "You filled out a form field that was created to stop spammers. Please go back and try again or contact the site administrator if you feel this was an error.";

/// Decoy-field and minimum-fill-time trap. Only runs for enabled `post` forms.
pub struct HoneypotGate;

impl HoneypotGate {
    pub fn is_active(form: &FormConfig) -> bool {
        form.honeypot.enabled && form.method == FormMethod::Post
    }

    fn time_check(form: &FormConfig) -> Option<u64> {
        form.honeypot.time_check.filter(|secs| *secs > 0)
    }
}

#[async_trait]
impl Gate for HoneypotGate {
    fn name(&self) -> &'static str {
        "honeypot"
    }

    fn reserved_fields(&self, form: &FormConfig) -> Vec<String> {
        if !form.honeypot.enabled {
            return Vec::new();
        }

        let mut fields = vec![form.honeypot_field()];
        if Self::time_check(form).is_some() {
            fields.push(TIME_CHECK_FIELD.to_string());
        }
        fields
    }

    async fn evaluate(&self, submission: &Submission, form: &FormConfig) -> GateResult {
        if !Self::is_active(form) {
            return GateResult::Pass;
        }

        let reject = |reason: String| {
            GateResult::reject(
                self.name(),
                reason,
                rejection_block(HONEYPOT_HEADING, submission.referer_str(), HONEYPOT_MESSAGE),
            )
        };

        let decoy = submission.reserved(&form.honeypot_field()).unwrap_or("");
        if !decoy.is_empty() {
            return reject("decoy field was filled in".to_string());
        }

        if let Some(secs) = Self::time_check(form) {
            let meta = submission.meta();
            let Some(rendered_at) = meta.rendered_at else {
                return reject("render timestamp missing for time check".to_string());
            };

            // 溢位（時間戳記或門檻過大）一律視為失敗
            let earliest = i64::try_from(secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .and_then(|delta| rendered_at.checked_add_signed(delta));
            let Some(earliest) = earliest else {
                return reject(format!("render timestamp out of range for a {}s check", secs));
            };
            if earliest > meta.submitted_at {
                return reject(format!(
                    "submitted {}s after render, minimum is {}s",
                    (meta.submitted_at - rendered_at).num_seconds(),
                    secs
                ));
            }
        }

        GateResult::Pass
    }
}

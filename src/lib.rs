pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{HttpRelaySink, JsonArchiver, OutboxSink};
pub use config::{cli::LocalStorage, toml_config::FormsConfig};
pub use core::gates::{CaptchaGate, GateChain, HashNonceVerifier, HoneypotGate, NonceGate};
pub use core::pipeline::SubmissionPipeline;
pub use domain::model::{
    FieldSchema, FieldValue, FormConfig, NotificationDraft, Outcome, PostSubmission, RawFormData,
    RequestContext, SiteSettings, Submission,
};
pub use utils::error::{FormError, Result};

pub mod extractor;
pub mod gates;
pub mod notifier;
pub mod pipeline;
pub mod responder;

pub use crate::domain::model::{FormConfig, Outcome, RawFormData, RequestContext, Submission};
pub use crate::domain::ports::{Archiver, ConfigStore, Gate, NotificationSink, Storage};
pub use crate::utils::error::Result;

// Adapters layer: concrete implementations of the domain ports (mail delivery, archive).

pub mod archive;
pub mod mail;

pub use archive::JsonArchiver;
pub use mail::{HttpRelaySink, OutboxSink};

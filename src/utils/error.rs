use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Unknown form: {form_id}")]
    UnknownFormError { form_id: String },

    #[error("Notification dispatch failed: {message}")]
    NotificationError { message: String },

    #[error("Archive error: {message}")]
    ArchiveError { message: String },

    #[error("Payload error: {message}")]
    PayloadError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Storage,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FormError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FormError::HttpError(_) | FormError::NotificationError { .. } => ErrorCategory::Network,
            FormError::ConfigValidationError { .. }
            | FormError::InvalidConfigValueError { .. }
            | FormError::MissingConfigError { .. }
            | FormError::UnknownFormError { .. } => ErrorCategory::Configuration,
            FormError::IoError(_) | FormError::ArchiveError { .. } => ErrorCategory::Storage,
            FormError::SerializationError(_) | FormError::PayloadError { .. } => ErrorCategory::Input,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 通知與歸檔都是盡力而為，不影響使用者看到的結果
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Storage => ErrorSeverity::Medium,
            ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            FormError::HttpError(_) => "Could not reach a remote service".to_string(),
            FormError::IoError(e) => format!("File access failed: {}", e),
            FormError::UnknownFormError { form_id } => {
                format!("No form with id '{}' is configured", form_id)
            }
            FormError::PayloadError { message } => format!("Submitted payload is invalid: {}", message),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check the relay/verification endpoint and network connectivity",
            ErrorCategory::Configuration => "Check the forms TOML file and required environment variables",
            ErrorCategory::Storage => "Check that the output directories exist and are writable",
            ErrorCategory::Input => "Make sure the payload is a JSON object of string or string-array values",
        }
    }
}

pub type Result<T> = std::result::Result<T, FormError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] mongodb::error::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Embedding request failed after {attempts} attempts: {message}")]
    EmbeddingError { attempts: u32, message: String },

    #[error("Store error: {message}")]
    StoreError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Storage,
    Configuration,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) | EtlError::EmbeddingError { .. } => ErrorCategory::Network,
            EtlError::DatabaseError(_) | EtlError::StoreError { .. } => ErrorCategory::Storage,
            EtlError::TomlError(_)
            | EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. } => ErrorCategory::Data,
            EtlError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Whether retrying the same operation later can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Storage
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check network connectivity and the SCJN/OpenAI endpoints, then retry"
            }
            ErrorCategory::Storage => "Check MONGO_URI and that the MongoDB server is reachable",
            ErrorCategory::Configuration => {
                "Review the configuration file, environment variables and CLI flags"
            }
            ErrorCategory::Data => "Inspect the upstream payload; the record may be malformed",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::MissingConfigError { field } => {
                format!("Required setting '{}' is not configured", field)
            }
            EtlError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            EtlError::DatabaseError(_) => "Could not talk to the database".to_string(),
            EtlError::ApiError(_) => "An upstream HTTP request failed".to_string(),
            other => other.to_string(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        EtlError::StoreError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

//! Error types for hearth operations.
//!
//! Store failures propagate to the caller. Lost conditional writes are
//! reported as [`HearthError::ConditionFailed`] so trackers can recognise and
//! swallow them. Classification failures are reported but callers degrade them
//! to an empty result.

use thiserror::Error;

/// Result type alias for hearth operations.
pub type HearthResult<T> = Result<T, HearthError>;

/// Main error type for all hearth operations.
#[derive(Error, Debug)]
pub enum HearthError {
    /// Unexpected persistent store failure.
    #[error("Store error: {message}")]
    Store {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A conditional write lost against a concurrent writer.
    #[error("Condition failed for {partition}/{sort}")]
    ConditionFailed { partition: String, sort: String },

    /// Classification collaborator failed or returned unusable output.
    #[error("Classification error: {message}")]
    Classification { message: String, code: ErrorCode },

    /// A required collaborator or setting is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation { message: String, code: ErrorCode },

    /// Stored or received data could not be parsed.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// Outbound send failed.
    #[error("Send error: {message}")]
    Send { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Store (STORE_xxx)
    StoreConnectionFailed,
    StoreOperationFailed,
    StoreConditionFailed,

    // Classification (CLS_xxx)
    ClsCollaboratorFailed,
    ClsInvalidResponse,

    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseInvalidRecord,

    // Send (SEND_xxx)
    SendFailed,

    // Configuration
    Configuration,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::StoreConnectionFailed => "STORE_001",
            ErrorCode::StoreOperationFailed => "STORE_002",
            ErrorCode::StoreConditionFailed => "STORE_003",
            ErrorCode::ClsCollaboratorFailed => "CLS_001",
            ErrorCode::ClsInvalidResponse => "CLS_002",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseInvalidRecord => "PARSE_002",
            ErrorCode::SendFailed => "SEND_001",
            ErrorCode::Configuration => "CFG_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl HearthError {
    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            code: ErrorCode::StoreOperationFailed,
            source: None,
        }
    }

    /// Create a store error wrapping an underlying driver error.
    pub fn store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Store {
            message: message.into(),
            code: ErrorCode::StoreOperationFailed,
            source: Some(Box::new(source)),
        }
    }

    /// Create a condition-failed error for the given key.
    pub fn condition_failed(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self::ConditionFailed {
            partition: partition.into(),
            sort: sort.into(),
        }
    }

    /// Create a classification error.
    pub fn classification(message: impl Into<String>) -> Self {
        Self::Classification {
            message: message.into(),
            code: ErrorCode::ClsCollaboratorFailed,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidRecord,
        }
    }

    /// Create a send error.
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
            code: ErrorCode::SendFailed,
        }
    }

    /// Create a configuration error for a missing collaborator.
    pub fn missing_collaborator(name: &str) -> Self {
        Self::Configuration(format!("required collaborator '{}' is not configured", name))
    }

    /// Whether this error is a lost conditional write.
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::ConditionFailed { .. })
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Store { code, .. } => *code,
            Self::ConditionFailed { .. } => ErrorCode::StoreConditionFailed,
            Self::Classification { code, .. } => *code,
            Self::Configuration(_) => ErrorCode::Configuration,
            Self::Validation { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Send { code, .. } => *code,
            Self::Serialization(_) => ErrorCode::ParseInvalidJson,
            _ => ErrorCode::Internal,
        }
    }
}

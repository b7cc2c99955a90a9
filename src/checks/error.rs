//! Error types for readiness checks

use serde::Serialize;
use strum::Display;

/// Boxed transport error carried by connectivity failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for a single readiness check
pub type CheckResult<T> = std::result::Result<T, CheckError>;

/// Code reported when a backend is reachable but not usable
pub const COMPONENT_START_ERR_CODE: u32 = 6000;

/// Code reported when the deployment configuration is wrong
pub const CONFIG_ERR_CODE: u32 = 6001;

/// Taxonomy of check failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required field missing or invalid, independent of network state
    Configuration,
    /// Transport-level failure reaching a backend
    Connectivity,
    /// An operation did not complete within its bound
    Timeout,
    /// Backend reachable but offline or missing a required resource
    ResourceState,
}

impl ErrorKind {
    /// Stable machine-readable code
    pub fn as_code(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::Connectivity => "CONNECTIVITY_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ResourceState => "RESOURCE_STATE_ERROR",
        }
    }
}

/// Errors that can occur while verifying a backend
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Configuration error
    #[error("Config file is incorrect: {0}")]
    Configuration(String),

    /// Transport failure
    #[error("{source};{context}")]
    Connectivity {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Credentials were presented and rejected
    #[error("authentication failed: {source};{context}")]
    Authentication {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Timeout error
    #[error("timeout waiting for {operation};{context}")]
    Timeout { operation: String, context: String },

    /// Backend reported itself unhealthy
    #[error("ComponentStartErr: {0}")]
    ComponentStart(String),

    /// Required topic absent from the broker
    #[error("ComponentStartErr: Kafka doesn't contain topic: {topic};{context}")]
    MissingTopic { topic: String, context: String },
}

impl CheckError {
    /// Wrap a transport error with its address context
    pub fn connectivity(source: impl Into<BoxError>, context: impl Into<String>) -> Self {
        CheckError::Connectivity {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Timeout for the named operation
    pub fn timeout(operation: impl Into<String>, context: impl Into<String>) -> Self {
        CheckError::Timeout {
            operation: operation.into(),
            context: context.into(),
        }
    }

    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckError::Configuration(_) => ErrorKind::Configuration,
            CheckError::Connectivity { .. } | CheckError::Authentication { .. } => {
                ErrorKind::Connectivity
            }
            CheckError::Timeout { .. } => ErrorKind::Timeout,
            CheckError::ComponentStart(_) | CheckError::MissingTopic { .. } => {
                ErrorKind::ResourceState
            }
        }
    }

    /// Numeric code for errors the platform assigns one to
    pub fn code(&self) -> Option<u32> {
        match self.kind() {
            ErrorKind::Configuration => Some(CONFIG_ERR_CODE),
            ErrorKind::ResourceState => Some(COMPONENT_START_ERR_CODE),
            _ => None,
        }
    }

    /// Diagnostic context attached to the error, if any
    pub fn context(&self) -> Option<&str> {
        match self {
            CheckError::Connectivity { context, .. }
            | CheckError::Authentication { context, .. }
            | CheckError::Timeout { context, .. }
            | CheckError::MissingTopic { context, .. } => Some(context),
            CheckError::Configuration(_) | CheckError::ComponentStart(_) => None,
        }
    }
}

//! Error types for the provisioning core.

use std::fmt;

/// Categorised error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionErrorKind {
    /// Named object absent in the search scope
    NotFound,
    /// Bare name matched several objects and the policy rejects that
    Ambiguous,
    /// Inventory path is malformed or escapes the datacenter scope
    InvalidPath,
    /// Target network is not a distributed virtual port group
    UnsupportedNetworkKind,
    /// Port group has no owning distributed switch in its config
    MissingSwitchAssociation,
    /// Clone task could not be started
    SubmissionFailed,
    /// Clone task started but vCenter reported failure
    OperationFailed,
    /// Clone task succeeded but the result is not a single VM reference
    UnexpectedResultShape,
    /// Network / HTTP failure talking to vCenter
    TransportError,
    /// Caller aborted (signal or deadline) before a terminal state
    Cancelled,
    /// Authentication failed (401)
    AuthenticationError,
    /// Permission denied (403)
    AccessDenied,
    /// HTTP / API error with status code
    ApiError(u16),
    /// JSON parse / deserialization error
    ParseError,
    /// Missing or invalid configuration
    ConfigError,
}

/// Crate error type carrying a kind + human-readable message.
#[derive(Debug, Clone)]
pub struct ProvisionError {
    pub kind: ProvisionErrorKind,
    pub message: String,
    /// Workflow step that failed (e.g. "resolve cluster").
    pub step: Option<String>,
    /// Fault detail supplied by vCenter, when there was one.
    pub platform_detail: Option<String>,
}

impl ProvisionError {
    pub fn new(kind: ProvisionErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            step: None,
            platform_detail: None,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::NotFound, msg)
    }

    pub fn ambiguous(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::Ambiguous, msg)
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::InvalidPath, msg)
    }

    pub fn unsupported_network(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::UnsupportedNetworkKind, msg)
    }

    pub fn missing_switch(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::MissingSwitchAssociation, msg)
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::SubmissionFailed, msg)
    }

    pub fn operation(msg: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            platform_detail: detail,
            ..Self::new(ProvisionErrorKind::OperationFailed, msg)
        }
    }

    pub fn unexpected_result(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::UnexpectedResultShape, msg)
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::TransportError, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::Cancelled, msg)
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::AuthenticationError, msg)
    }

    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::ApiError(status), msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::ParseError, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ProvisionErrorKind::ConfigError, msg)
    }

    /// Attach the workflow step, keeping an already recorded one.
    pub fn during(mut self, step: impl Into<String>) -> Self {
        if self.step.is_none() {
            self.step = Some(step.into());
        }
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ProvisionErrorKind::Cancelled
    }
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Some(ref step) => write!(f, "[{:?}] {}: {}", self.kind, step, self.message)?,
            None => write!(f, "[{:?}] {}", self.kind, self.message)?,
        }
        if let Some(ref detail) = self.platform_detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ProvisionError {}

impl From<reqwest::Error> for ProvisionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::transport(format!("HTTP timeout: {e}"))
        } else if e.is_connect() {
            Self::transport(format!("Connection failed: {e}"))
        } else {
            Self::transport(format!("HTTP error: {e}"))
        }
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {e}"))
    }
}

/// Convenience alias.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

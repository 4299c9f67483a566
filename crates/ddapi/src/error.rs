//! Error types for Datadog API calls.
//!
//! Errors carry a category so callers can print a hint next to the message.
//! Nothing here retries; a failed call is reported once and the run stops.

use reconcile::ResourceKind;
use std::fmt;

/// Result type alias for API calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of API errors, used for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS or TLS failure, or a 5xx reply.
    Network,
    /// The object does not exist (404).
    NotFound,
    /// Missing or rejected credentials (401/403).
    Auth,
    /// The reply was not the JSON we expected.
    Format,
    /// Everything else, usually a 4xx validation failure.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Object not found",
            Self::Auth => "Authentication failed",
            Self::Format => "Unexpected response format",
            Self::Other => "Request rejected",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your connection and DATADOG_SITE, then try again",
            Self::NotFound => "The object may have been deleted in the UI",
            Self::Auth => "Check DATADOG_API_KEY and DATADOG_APP_KEY",
            Self::Format => "The API may have changed; check for a newer kennel",
            Self::Other => "Check the error details for the rejected attribute",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the Datadog API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed or returned a non-success status.
    #[error("HTTP request failed: {message}")]
    HttpError {
        /// Error message, including the response body when there is one.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The reply could not be read as the expected JSON shape.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// An API or application key is not set.
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(&'static str),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
        }
    }

    /// HTTP status of the failed call, if it got that far.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => *status,
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError { status, .. } => match status {
                None => ErrorCategory::Network,
                Some(401 | 403) => ErrorCategory::Auth,
                Some(404) => ErrorCategory::NotFound,
                Some(code) if *code >= 500 => ErrorCategory::Network,
                Some(_) => ErrorCategory::Other,
            },
            Self::InvalidResponse(_) => ErrorCategory::Format,
            Self::MissingCredentials(_) => ErrorCategory::Auth,
        }
    }

    /// Convert into the engine's error, naming the operation and endpoint.
    ///
    /// The subject is left empty; the executor fills in the tracking id.
    pub fn into_engine(self, operation: &str, kind: ResourceKind, id: Option<&str>) -> reconcile::Error {
        let status = self.status();
        reconcile::Error::api(
            operation,
            kind.api_resource(),
            id.unwrap_or_default(),
            self.to_string(),
            status,
        )
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::HttpError {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::HttpError {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_categories() {
        assert_eq!(Error::http("x", None).category(), ErrorCategory::Network);
        assert_eq!(Error::http("x", Some(403)).category(), ErrorCategory::Auth);
        assert_eq!(Error::http("x", Some(404)).category(), ErrorCategory::NotFound);
        assert_eq!(Error::http("x", Some(502)).category(), ErrorCategory::Network);
        assert_eq!(Error::http("x", Some(400)).category(), ErrorCategory::Other);
    }

    #[test]
    fn test_other_categories() {
        assert_eq!(
            Error::InvalidResponse("eof".into()).category(),
            ErrorCategory::Format
        );
        assert_eq!(
            Error::MissingCredentials("DATADOG_API_KEY").category(),
            ErrorCategory::Auth
        );
    }

    #[test]
    fn test_category_text_is_present() {
        for category in [
            ErrorCategory::Network,
            ErrorCategory::NotFound,
            ErrorCategory::Auth,
            ErrorCategory::Format,
            ErrorCategory::Other,
        ] {
            assert!(!category.description().is_empty());
            assert!(!category.advice().is_empty());
        }
        assert!(ErrorCategory::Auth.to_string().contains("Authentication"));
    }

    #[test]
    fn test_into_engine_keeps_status() {
        let err = Error::http("HTTP 400: name is required", Some(400));
        let engine = err.into_engine("create", ResourceKind::Monitor, None);
        assert!(engine.is_api());
        assert!(matches!(
            engine,
            reconcile::Error::Api { status: Some(400), .. }
        ));
        assert!(engine.to_string().contains("name is required"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }
}

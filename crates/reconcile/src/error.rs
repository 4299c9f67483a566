//! Error types for the reconcile crate
//!
//! Every variant is fatal for the run. The only soft outcome in the engine is a
//! deferred reference (see [`crate::resolve::Resolution`]), which is control
//! flow and never an error.

use thiserror::Error;

/// Errors that can occur while planning or executing a reconciliation
#[derive(Error, Debug)]
pub enum Error {
    /// Two declared resources share a tracking id or an explicit provider id
    #[error("{key} is declared twice: by {first} and by {second}")]
    DuplicateTrackingId {
        key: String,
        first: String,
        second: String,
    },

    /// A reference points at something that is neither being created nor present remotely
    #[error(
        "{referrer} Unable to find {target_type} {reference}\n\
         This is either because it doesn't exist, and isn't being created by the current run;\n\
         or it does exist, but is being deleted."
    )]
    UnresolvableReference {
        referrer: String,
        target_type: String,
        reference: String,
    },

    /// Operations that can only resolve once another operation of the same group ran first
    #[error(
        "{referrer} {target_type} {reference} was referenced but is also created by the current run.\n\
         It could not be created because of a circular dependency. Try creating only some of the resources."
    )]
    CircularDependency {
        referrer: String,
        target_type: String,
        reference: String,
    },

    /// A declared resource pins a provider id that no longer exists
    #[error(
        "Unable to find existing {api_resource} with id {id} (declared by {tracking_id})\n\
         If the {api_resource} was deleted, remove the `id` line."
    )]
    StaleExplicitId {
        api_resource: String,
        tracking_id: String,
        id: String,
    },

    /// The tracking field already carries a marker, usually a copy-pasted resource
    #[error("{tracking_id} Remove \"-- {marker}\" line from {field} to copy a resource")]
    DoubleTracking {
        tracking_id: String,
        marker: String,
        field: String,
    },

    /// Stripping a marker from a field that has none
    #[error("did not find tracking id in {field}: {value:?}")]
    MissingTrackingMarker { field: String, value: String },

    /// String does not follow the `project:kennel_id` grammar
    #[error("invalid tracking id {0:?}, expected project:kennel_id")]
    InvalidTrackingId(String),

    /// A declared resource failed structural validation
    #[error("{tracking_id} {message}")]
    Validation {
        tracking_id: String,
        message: String,
    },

    /// An object downloaded from the provider lacks a field the engine depends on
    #[error("{api_resource} object is missing field {field}")]
    MissingField { api_resource: String, field: String },

    /// Normalization and diffing disagree about whether two trees differ
    #[error("empty diff detected for {0}: normalized payloads differ but no diff entries were produced")]
    EmptyDiff(String),

    /// The provider API rejected an operation
    #[error("{operation} {api_resource} {subject} failed: {message}")]
    Api {
        operation: String,
        api_resource: String,
        subject: String,
        message: String,
        status: Option<u16>,
    },
}

impl Error {
    /// Build a provider API error
    pub fn api(
        operation: impl Into<String>,
        api_resource: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        Self::Api {
            operation: operation.into(),
            api_resource: api_resource.into(),
            subject: subject.into(),
            message: message.into(),
            status,
        }
    }

    /// Attach the resource being operated on to a provider error.
    ///
    /// API clients only know the endpoint; the executor knows which tracking id
    /// the call was made for.
    pub fn with_subject(self, subject: &str) -> Self {
        match self {
            Self::Api {
                operation,
                api_resource,
                message,
                status,
                ..
            } => Self::Api {
                operation,
                api_resource,
                subject: subject.to_string(),
                message,
                status,
            },
            other => other,
        }
    }

    /// Whether this error came from the provider API
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }
}

/// Result type for reconcile operations
pub type Result<T> = std::result::Result<T, Error>;

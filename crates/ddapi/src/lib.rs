//! # ddapi
//!
//! Blocking Datadog API client used by kennel.
//!
//! [`DatadogClient`] implements [`reconcile::Api`] on top of `ureq`. It
//! authenticates with an API key and an application key, unwraps the
//! per-endpoint reply envelopes, and turns every non-success status into a
//! [`reconcile::Error::Api`] that quotes the response body.
//!
//! ```no_run
//! use ddapi::DatadogClient;
//! use reconcile::{Api, ResourceKind};
//!
//! let client = DatadogClient::new("datadoghq.com", "api-key", "app-key")?;
//! for slo in client.list(ResourceKind::Slo)? {
//!     println!("{}", slo["name"]);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod error;

pub use client::{DEFAULT_SITE, DatadogClient};
pub use error::{Error, ErrorCategory, Result};

//! # Reconcile
//!
//! Reconciliation engine for monitoring-as-code.
//!
//! Declared monitors, dashboards, SLOs and synthetic tests are compared with
//! what the provider currently has, and the differences are turned into an
//! ordered plan of creates, updates and deletes.
//!
//! ## Core Concepts
//!
//! - **Tracking id**: `project:kennel_id`, embedded as a marker line in a
//!   free-text field of every managed remote object ([`tracking`])
//! - **Resource**: a declared object with its built payload ([`Resource`])
//! - **Actual**: a downloaded remote object ([`Actual`])
//! - **IdMap**: tracking id to provider id, or NEW for objects created later
//!   in the run ([`IdMap`])
//! - **Plan**: creates, updates with their diffs, deletes ([`Plan`])
//!
//! ## Example
//!
//! ```
//! use reconcile::api::MockApi;
//! use reconcile::{NoProgress, PlanOptions, Resource, ResourceKind, download, execute, plan};
//! use serde_json::json;
//!
//! let api = MockApi::new();
//! let cpu = Resource::build(
//!     ResourceKind::Monitor,
//!     "team",
//!     "cpu",
//!     json!({"name": "CPU high", "type": "metric alert", "query": "avg(last_5m):avg:system.cpu.user{*} > 90"}),
//!     None,
//!     "projects/team.toml",
//! )?;
//!
//! let actuals = download(&api, &ResourceKind::ALL)?;
//! let mut planned = plan(&api, vec![cpu], actuals, &PlanOptions::default())?;
//! assert_eq!(planned.plan.creates.len(), 1);
//!
//! let changes = execute(planned.plan, &mut planned.id_map, &api, &mut NoProgress)?;
//! assert_eq!(changes.len(), 1);
//! # Ok::<(), reconcile::Error>(())
//! ```

pub mod actual;
pub mod api;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod filter;
pub mod id_map;
pub mod kind;
pub mod normalize;
pub mod plan;
pub mod planner;
pub mod resolve;
pub mod resource;
pub mod tracking;
pub mod tree;

use rayon::prelude::*;

// Re-export main types at crate root
pub use actual::Actual;
pub use api::Api;
pub use context::{NoProgress, ProgressCallback};
pub use diff::{DiffEntry, DiffOp};
pub use error::{Error, Result};
pub use executor::execute;
pub use filter::Filter;
pub use id_map::{IdMap, ProviderId};
pub use kind::ResourceKind;
pub use plan::{Change, ChangeType, Plan, PlanSummary};
pub use planner::{PlanOptions, Planned, plan};
pub use resource::Resource;
pub use tracking::TrackingId;

/// Download every object of `kinds`, one list call per kind in parallel.
///
/// Planning needs the complete picture, so this returns only after every
/// list call finished; the first failure wins.
pub fn download(api: &dyn Api, kinds: &[ResourceKind]) -> Result<Vec<Actual>> {
    let lists: Vec<Result<Vec<Actual>>> = kinds
        .par_iter()
        .map(|&kind| {
            let objects = api.list(kind)?;
            log::debug!("downloaded {} {kind} objects", objects.len());
            objects
                .into_iter()
                .map(|payload| Actual::from_api(kind, payload))
                .collect()
        })
        .collect();

    let mut actuals = Vec::new();
    for list in lists {
        actuals.extend(list?);
    }
    Ok(actuals)
}

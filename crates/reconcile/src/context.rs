//! Callbacks for reporting execution progress
//!
//! The engine does not print; callers that want output implement
//! [`ProgressCallback`].

use crate::plan::Change;

/// Progress updates while a plan executes
pub trait ProgressCallback {
    /// Called right before the API call for `change`
    fn on_change_start(&mut self, change: &Change);

    /// Called after the API call succeeded; creates carry their new id
    fn on_change_complete(&mut self, change: &Change);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_change_start(&mut self, _change: &Change) {}
    fn on_change_complete(&mut self, _change: &Change) {}
}

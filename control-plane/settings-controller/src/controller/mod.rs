pub mod children;
pub mod conditions;
pub mod reconcile;
pub mod widget;

#[cfg(test)]
mod conditions_tests;

use std::sync::Arc;

use crate::config::SettingsConfig;
use crate::scope::ScopeFilter;
use crate::store::{Store, StoreError};

pub use reconcile::reconcile;

#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// What the delivery layer should do with the key after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left to do until the next change notification.
    Continue,
    /// Run another pass soon; a prerequisite was just created.
    Requeue,
}

#[derive(Clone)]
pub struct ControllerContext {
    pub store: Arc<dyn Store>,
    pub settings: Arc<SettingsConfig>,
    pub scope_filter: Option<ScopeFilter>,
}

impl ControllerContext {
    pub fn new(
        store: Arc<dyn Store>,
        settings: Arc<SettingsConfig>,
        scope_filter: Option<ScopeFilter>,
    ) -> Self {
        Self {
            store,
            settings,
            scope_filter,
        }
    }
}

//! Options for the reaper.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::hook::PreDeleteHook;
use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHECK_INTERVAL, DEFAULT_NAMESPACE, LEGACY_BATCH_SIZE,
    LEGACY_CHECK_INTERVAL,
};

/// Reaper options.
///
/// Zero or empty values are replaced by defaults when the reaper starts.
#[derive(Clone)]
pub struct ReaperOptions {
    namespace: String,
    batch_size: usize,
    check_interval: Duration,
    pre_delete: Option<Arc<dyn PreDeleteHook>>,
}

impl Default for ReaperOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            check_interval: DEFAULT_CHECK_INTERVAL,
            pre_delete: None,
        }
    }
}

impl fmt::Debug for ReaperOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaperOptions")
            .field("namespace", &self.namespace)
            .field("batch_size", &self.batch_size)
            .field("check_interval", &self.check_interval)
            .field("pre_delete", &self.pre_delete.is_some())
            .finish()
    }
}

impl ReaperOptions {
    /// Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options matching the first-generation reaper: small batches, 1 s ticks.
    pub fn legacy() -> Self {
        Self {
            batch_size: LEGACY_BATCH_SIZE,
            check_interval: LEGACY_CHECK_INTERVAL,
            ..Self::default()
        }
    }

    /// Set the namespace to sweep.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the maximum number of records examined per batch.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the interval between two batches.
    #[must_use]
    pub const fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Register a hook called before each deletion.
    #[must_use]
    pub fn with_pre_delete(mut self, hook: impl PreDeleteHook) -> Self {
        self.pre_delete = Some(Arc::new(hook));
        self
    }

    /// Replaces zero or empty settings with their defaults.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.namespace.is_empty() {
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        if self.check_interval.is_zero() {
            self.check_interval = DEFAULT_CHECK_INTERVAL;
        }
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub const fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub const fn has_pre_delete(&self) -> bool {
        self.pre_delete.is_some()
    }

    pub(crate) fn pre_delete(&self) -> Option<&dyn PreDeleteHook> {
        self.pre_delete.as_deref()
    }
}

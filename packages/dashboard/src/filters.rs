//! Filter state reading.
//!
//! A page registers which control feeds which filter. Reading resolves
//! every registered control; a missing control means the page markup and
//! the page definition disagree, which is a configuration bug rather than
//! something to recover from.

use crash_stats_dashboard_models::{FilterName, FilterSet};
use thiserror::Error;

use crate::surface::Document;

/// A registered control is missing from the page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Control '{control_id}' for filter '{filter}' not found on the page")]
pub struct ConfigurationError {
    /// The filter the control feeds.
    pub filter: FilterName,
    /// DOM id of the missing control.
    pub control_id: String,
}

/// Maps filter names to the controls holding their values.
#[derive(Debug, Clone, Default)]
pub struct FilterReader {
    bindings: Vec<(FilterName, &'static str)>,
}

impl FilterReader {
    /// Creates a reader with no bindings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Registers `control_id` as the source of `filter`. Re-registering a
    /// filter replaces its control.
    #[must_use]
    pub fn bind(mut self, filter: FilterName, control_id: &'static str) -> Self {
        self.bindings.retain(|(name, _)| *name != filter);
        self.bindings.push((filter, control_id));
        self
    }

    /// Returns the control ids this reader depends on.
    pub fn control_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.bindings.iter().map(|(_, id)| *id)
    }

    /// Reads the current value of every bound control.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] for the first bound control that does
    /// not exist on the page.
    pub fn read(&self, document: &dyn Document) -> Result<FilterSet, ConfigurationError> {
        let mut filters = FilterSet::new();
        for (filter, control_id) in &self.bindings {
            let value = document
                .control_value(control_id)
                .ok_or_else(|| ConfigurationError {
                    filter: *filter,
                    control_id: (*control_id).to_string(),
                })?;
            filters.insert(*filter, value);
        }
        Ok(filters)
    }
}

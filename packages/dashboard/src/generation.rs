//! Per-surface request generations.
//!
//! Refresh cycles are never cancelled, so a slow response from an older
//! cycle can arrive after a newer one has already rendered. Each fetch
//! takes a [`Generation`] for the surface it will render; the response is
//! only applied if that generation is still the latest issued for the
//! surface.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// A token identifying one request for one surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    surface: String,
    value: u64,
}

impl Generation {
    /// Surface this generation was issued for.
    #[must_use]
    pub fn surface(&self) -> &str {
        &self.surface
    }

    /// Sequence number, starting at 1 for each surface.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }
}

/// Issues monotonically increasing generations per surface.
#[derive(Debug, Default)]
pub struct Generations {
    latest: Mutex<BTreeMap<String, u64>>,
}

impl Generations {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next generation for `surface`, superseding all earlier
    /// ones.
    pub fn issue(&self, surface: &str) -> Generation {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let value = latest.entry(surface.to_string()).or_insert(0);
        *value += 1;
        Generation {
            surface: surface.to_string(),
            value: *value,
        }
    }

    /// Returns `true` if `generation` is the latest issued for its surface.
    #[must_use]
    pub fn is_current(&self, generation: &Generation) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&generation.surface)
            .is_some_and(|latest| *latest == generation.value)
    }
}

//! Stoplight schedule for an intersection
//!
//! A stoplight cycles through an ordered list of inbound edge sets. Each set
//! is green for `duration` global ticks, followed by `delay` ticks during
//! which every inbound edge is red. After the delay the next set in the
//! pattern becomes green.

use serde::{Deserialize, Serialize};

use super::types::EdgeId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stoplight {
    pub pattern: Vec<Vec<EdgeId>>,
    pub duration: u32,
    pub delay: u32,
}

impl Stoplight {
    pub fn new(pattern: Vec<Vec<EdgeId>>, duration: u32, delay: u32) -> Self {
        Self {
            pattern,
            duration,
            delay,
        }
    }

    /// Inbound edges that may release cars during `global_tick`.
    /// Empty while the light is between phases.
    pub fn open_edges(&self, global_tick: u64) -> &[EdgeId] {
        let cycle = u64::from(self.duration) + u64::from(self.delay);
        if cycle == 0 || self.pattern.is_empty() {
            return &[];
        }
        if global_tick % cycle >= u64::from(self.duration) {
            return &[];
        }
        let phase = (global_tick / cycle) % self.pattern.len() as u64;
        &self.pattern[phase as usize]
    }

    pub fn is_open(&self, edge: EdgeId, global_tick: u64) -> bool {
        self.open_edges(global_tick).contains(&edge)
    }
}

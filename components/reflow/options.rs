/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Configuration of the reflow engine.

use std::time::Duration;

use app_units::Au;
use serde::{Deserialize, Serialize};

/// Settings that stay fixed for the lifetime of a [`crate::ReflowDriver`].
/// Lengths are in CSS pixels.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ReflowOptions {
    /// Size of the initial containing block.
    pub viewport_width: i32,
    pub viewport_height: i32,

    /// How long a pass may run before it suspends. `None` runs every pass to
    /// completion.
    pub max_reflow_time_ms: Option<u64>,

    /// Number of boxes between two reads of the clock.
    pub yield_check_interval: u32,

    /// After this many consecutive suspensions the time budget doubles, so
    /// that a large document still makes progress.
    pub yield_increase_rate: u32,

    /// Upper bound on the passes one call runs while shrink-to-fit boxes
    /// and tables converge.
    pub max_passes_per_reflow: u32,

    /// Content is fragmented into pages or columns. Blocks never reuse
    /// their previous children verbatim.
    pub paged: bool,

    /// Lay out the whole tree on every pass.
    pub nonincremental_layout: bool,

    /// Fail the given allocation point of every pass. For testing the
    /// recovery path.
    pub simulate_allocation_failure_after: Option<u32>,
}

impl Default for ReflowOptions {
    fn default() -> Self {
        ReflowOptions {
            viewport_width: 800,
            viewport_height: 600,
            max_reflow_time_ms: None,
            yield_check_interval: 32,
            yield_increase_rate: 20,
            max_passes_per_reflow: 4,
            paged: false,
            nonincremental_layout: false,
            simulate_allocation_failure_after: None,
        }
    }
}

impl ReflowOptions {
    pub fn viewport_size(&self) -> (Au, Au) {
        (
            Au::from_px(self.viewport_width.max(0)),
            Au::from_px(self.viewport_height.max(0)),
        )
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.max_reflow_time_ms.map(Duration::from_millis)
    }
}

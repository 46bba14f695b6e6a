/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! State threaded through every layout call of a pass.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use app_units::Au;
use log::{debug, warn};

use crate::ReflowError;
use crate::box_tree::BoxTree;
use crate::dom::{Document, NodeId};
use crate::incremental::DamageList;
use crate::options::ReflowOptions;
use crate::style::ResolvedStyle;
use crate::table::{AutoTableSizer, TableSizer};

/// Source of elapsed time for the suspension budget.
pub trait ReflowClock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Monotonic time since the first call.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl ReflowClock for SystemClock {
    fn now(&self) -> Duration {
        static START: OnceLock<Instant> = OnceLock::new();
        START.get_or_init(Instant::now).elapsed()
    }
}

static AUTO_TABLE_SIZER: AutoTableSizer = AutoTableSizer;
static SYSTEM_CLOCK: SystemClock = SystemClock;

/// Collaborators a pass calls out to.
#[derive(Clone, Copy)]
pub struct ReflowServices<'a> {
    pub table_sizer: &'a dyn TableSizer,
    pub clock: &'a dyn ReflowClock,
}

impl<'a> ReflowServices<'a> {
    pub fn new(table_sizer: &'a dyn TableSizer, clock: &'a dyn ReflowClock) -> Self {
        ReflowServices { table_sizer, clock }
    }

    pub fn with_clock(clock: &'a dyn ReflowClock) -> Self {
        ReflowServices {
            table_sizer: &AUTO_TABLE_SIZER,
            clock,
        }
    }
}

impl Default for ReflowServices<'static> {
    fn default() -> Self {
        ReflowServices {
            table_sizer: &AUTO_TABLE_SIZER,
            clock: &SYSTEM_CLOCK,
        }
    }
}

/// Where a suspended pass picks up: the container whose walk stopped, the
/// child it had not started yet, and the position on the current line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResumeCursor {
    pub parent: NodeId,
    pub next_child: Option<NodeId>,
    pub start_position: Au,
}

/// Bookkeeping of one pass that outlives a suspension.
#[derive(Debug, Default)]
pub(crate) struct PassState {
    pub pass_id: u32,
    pub cursor: Option<ResumeCursor>,
    /// Boxes whose painted geometry changed; resolved into damage once the
    /// pass completes.
    pub damaged: Vec<NodeId>,
    pub damage: DamageList,
    /// Boxes that need another pass, for example because their
    /// shrink-to-fit width changed.
    pub relayout: Vec<NodeId>,
    pub stop_before: Option<NodeId>,
    pub allocations: u32,
}

#[derive(Debug)]
struct Budget {
    limit: Option<Duration>,
    slice_start: Duration,
    check_interval: u32,
    since_check: u32,
    /// Boxes started in this slice.
    progress: u32,
    /// Layout that must run to completion, like absolutely positioned boxes
    /// laid out while their containing block finishes.
    suppressed: u32,
}

pub(crate) struct ReflowContext<'a> {
    pub document: &'a Document,
    pub boxes: &'a mut BoxTree,
    pub services: ReflowServices<'a>,
    pub options: &'a ReflowOptions,
    pub pass: &'a mut PassState,
    budget: Budget,
}

impl<'a> ReflowContext<'a> {
    pub fn new(
        document: &'a Document,
        boxes: &'a mut BoxTree,
        services: ReflowServices<'a>,
        options: &'a ReflowOptions,
        pass: &'a mut PassState,
        limit: Option<Duration>,
    ) -> Self {
        let slice_start = services.clock.now();
        ReflowContext {
            document,
            boxes,
            services,
            options,
            pass,
            budget: Budget {
                limit,
                slice_start,
                check_interval: options.yield_check_interval.max(1),
                since_check: 0,
                progress: 0,
                suppressed: 0,
            },
        }
    }

    pub fn style(&self, node: NodeId) -> &'a ResolvedStyle {
        self.document.style(node)
    }

    /// Count an allocation; fails when fault injection says so.
    pub fn allocation_point(&mut self) -> Result<(), ReflowError> {
        self.pass.allocations += 1;
        match self.options.simulate_allocation_failure_after {
            Some(limit) if self.pass.allocations > limit => {
                warn!("Simulated allocation failure at point {}", self.pass.allocations);
                Err(ReflowError::OutOfMemory)
            },
            _ => Ok(()),
        }
    }

    pub fn note_progress(&mut self) {
        self.budget.progress += 1;
    }

    /// Whether the walk should suspend before starting another child.
    /// Every slice lays out at least one box.
    pub fn should_yield(&mut self) -> bool {
        if self.budget.suppressed > 0 || self.budget.progress == 0 {
            return false;
        }
        let Some(limit) = self.budget.limit else {
            return false;
        };
        self.budget.since_check += 1;
        if self.budget.since_check < self.budget.check_interval {
            return false;
        }
        self.budget.since_check = 0;
        let elapsed = self
            .services
            .clock
            .now()
            .saturating_sub(self.budget.slice_start);
        elapsed >= limit
    }

    pub fn suspend_at(&mut self, parent: NodeId, next_child: Option<NodeId>, start_position: Au) {
        let cursor = ResumeCursor {
            parent,
            next_child,
            start_position,
        };
        debug!("Suspending reflow at {:?}", cursor);
        self.pass.cursor = Some(cursor);
    }

    /// The cursor, if the walk of `parent` is the one to resume.
    pub fn take_cursor_for(&mut self, parent: NodeId) -> Option<ResumeCursor> {
        match self.pass.cursor {
            Some(cursor) if cursor.parent == parent => self.pass.cursor.take(),
            _ => None,
        }
    }

    pub fn suppress_yield(&mut self) {
        self.budget.suppressed += 1;
    }

    pub fn allow_yield(&mut self) {
        self.budget.suppressed = self.budget.suppressed.saturating_sub(1);
    }

    pub fn is_yield_suppressed(&self) -> bool {
        self.budget.suppressed > 0
    }

    pub fn note_damaged(&mut self, node: NodeId) -> Result<(), ReflowError> {
        self.allocation_point()?;
        self.pass.damaged.try_reserve(1)?;
        self.pass.damaged.push(node);
        Ok(())
    }

    pub fn request_another_pass(&mut self, node: NodeId) -> Result<(), ReflowError> {
        if self.pass.relayout.contains(&node) {
            return Ok(());
        }
        debug!("{:?} needs another pass", node);
        self.pass.relayout.try_reserve(1)?;
        self.pass.relayout.push(node);
        Ok(())
    }
}

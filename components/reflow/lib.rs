/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! Incremental reflow.
//!
//! Computes the position, size and visual overflow of the boxes of a styled
//! element tree. Only elements marked dirty are laid out again; everything
//! else is reused verbatim. A pass can run against a time budget, suspend
//! at a child boundary and resume there on the next call.
//!
//! Every box is laid out in two phases. `layout` sizes and positions the
//! box and walks its children; `finish` computes the final height, reports
//! damage and hands margins, overflow and width ranges to the parent. Work
//! that has to survive a suspension lives in a per-box scratch record that
//! exists exactly between those two calls.

mod bounding_box;
mod box_tree;
mod context;
mod dom;
mod driver;
mod flow;
mod geom;
mod incremental;
mod margin;
mod options;
mod positioned;
mod query;
mod reflow_state;
mod sizing;
mod stacking;
mod style;
mod table;

use std::collections::TryReserveError;

pub use bounding_box::{AbsoluteBoundingBox, RelativeBoundingBox};
pub use box_tree::{BoxCapabilities, BoxKind, LayoutBox};
pub use context::{ReflowClock, ReflowServices, ResumeCursor, SystemClock};
pub use dom::{Document, NodeId, RemovedSubtree, WordFragment};
pub use driver::{ReflowDriver, ReflowOutcome};
pub use flow::float::{Clear, EdgeLock, FloatEntry, FloatRegistry, FloatSide, PlacementInfo};
pub use geom::{AuExt, Sides};
pub use incremental::{DamageList, DirtyState};
pub use margin::{BlockMargins, CollapsibleMargin, VerticalMargin};
pub use options::ReflowOptions;
pub use query::{FloatGeometry, LayoutQuery};
pub use sizing::ContentSizes;
pub use stacking::{StackingContext, StackingEntry};
pub use style::{
    BoxSizing, Display, Float, LengthPercentage, Margin, Overflow, Position, ResolvedStyle, Size,
};
pub use table::{AutoTableSizer, ColumnWidths, TableSizer};
use thiserror::Error;

/// How far a call to `layout` got.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LayoutStatus {
    /// The box is laid out; `finish` may run.
    Continue,
    /// The element a partial pass was asked to stop at has been reached.
    Stop,
    /// The time budget ran out. The box keeps its scratch record and
    /// continues on the next pass.
    Yield,
    /// The first formatted line of the enclosing block is complete. The
    /// block switches to its regular line height and lays out the same
    /// descendant again, continuing where it stopped.
    EndFirstLine,
}

/// The only hard failure of a pass.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum ReflowError {
    #[error("out of memory during reflow")]
    OutOfMemory,
}

impl From<TryReserveError> for ReflowError {
    fn from(_: TryReserveError) -> Self {
        ReflowError::OutOfMemory
    }
}

/// Why geometry could not be handed out.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum QueryError {
    /// A pass is suspended; intermediate geometry is not coherent.
    #[error("a reflow is in progress")]
    ReflowInProgress,
    /// The last pass was abandoned after a failure and nothing has replaced
    /// its partial results yet.
    #[error("layout is out of date")]
    LayoutOutOfDate,
    #[error("{0:?} has no layout box")]
    NoLayoutBox(NodeId),
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Per-box scratch records.
//!
//! A [`ReflowState`] is created when a container positions a child and is
//! dropped by that child's `finish`. Everything a box needs to continue a
//! suspended child walk lives here rather than on the call stack.

use app_units::Au;
use euclid::num::Zero;
use smallvec::SmallVec;

use crate::bounding_box::{AbsoluteBoundingBox, RelativeBoundingBox};
use crate::box_tree::StaticPosition;
use crate::dom::NodeId;
use crate::incremental::DirtyState;
use crate::margin::VerticalMargin;
use crate::sizing::ContentSizes;
use crate::table::ColumnWidths;

/// Geometry of the box before this pass touched it.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BoxSnapshot {
    pub existed: bool,
    pub dirty: DirtyState,
    pub x: Au,
    pub y: Au,
    pub width: Au,
    pub height: Au,
    pub bounding_box: RelativeBoundingBox,
}

impl BoxSnapshot {
    pub fn geometry_differs(&self, x: Au, y: Au, width: Au, height: Au, bounding_box: &RelativeBoundingBox) -> bool {
        self.x != x ||
            self.y != y ||
            self.width != width ||
            self.height != height ||
            self.bounding_box != *bounding_box
    }
}

/// The line being filled, in the coordinates of its block container.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct LineState {
    pub active: bool,
    pub y: Au,
    /// The band left free by floats.
    pub left: Au,
    pub width: Au,
    /// Advance from `left` of the next item.
    pub used: Au,
    pub height: Au,
    pub items: u32,
    /// Whether the line may break before the next item.
    pub can_break: bool,
    /// Collapsible space after the last item; dropped when the line ends.
    pub trailing_space: Au,
    /// Start edges of inline boxes opened while no line was active.
    pub pending_advance: Au,
    pub line_count: u32,
    /// The block has a first-line height and its first line has not ended.
    pub on_first_line: bool,
    /// Max-content width of the current unbreakable run of lines.
    pub run: Au,
}

/// Extent of laid out fragments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct FragmentBounds {
    pub left: Au,
    pub top: Au,
    pub right: Au,
    pub bottom: Au,
}

impl FragmentBounds {
    pub fn new(x: Au, y: Au, width: Au, height: Au) -> Self {
        FragmentBounds {
            left: x,
            top: y,
            right: x + width,
            bottom: y + height,
        }
    }

    pub fn add(bounds: &mut Option<FragmentBounds>, other: FragmentBounds) {
        *bounds = Some(match *bounds {
            None => other,
            Some(existing) => FragmentBounds {
                left: existing.left.min(other.left),
                top: existing.top.min(other.top),
                right: existing.right.max(other.right),
                bottom: existing.bottom.max(other.bottom),
            },
        });
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct TextState {
    pub next_word: usize,
    pub bounds: Option<FragmentBounds>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct InlineState {
    /// The block container whose lines this box sits on.
    pub frame: NodeId,
    pub start_x: Au,
    pub start_y: Au,
    /// Border boxes of the children, in frame coordinates.
    pub bounds: Option<FragmentBounds>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct TableState {
    /// Used column widths for this pass.
    pub columns: SmallVec<[Au; 8]>,
    /// Column constraints reported by the cells of this pass.
    pub constraints: SmallVec<[ColumnWidths; 8]>,
}

#[derive(Clone, Debug)]
pub(crate) struct RowState {
    pub table: NodeId,
    pub column: usize,
    pub x: Au,
    pub height: Au,
    pub cells: SmallVec<[NodeId; 8]>,
}

/// Containing block of an absolutely positioned box, resolved when the
/// containing block finishes. Coordinates are relative to the padding box of
/// the containing block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct AbsposState {
    pub width: Au,
    pub height: Au,
    pub static_x: Au,
    pub static_y: Au,
    /// Resolved horizontal position of the border box.
    pub x: Au,
    /// Offset of the parent's border box.
    pub parent_x: Au,
    pub parent_y: Au,
}

#[derive(Debug)]
pub(crate) struct ReflowState {
    pub before: BoxSnapshot,

    /// The child the walk continues with; `None` once every child is done.
    pub next_child: Option<NodeId>,

    /// Formatting context root, and the offset of this box's border box
    /// in it.
    pub bfc_root: NodeId,
    pub bfc_x: Au,
    pub bfc_y: Au,

    /// Content box, relative to the border box.
    pub content_x: Au,
    pub content_top: Au,
    pub content_width: Au,
    /// Height of the content box when it does not depend on the content.
    pub definite_height: Option<Au>,
    /// Where the next in-flow block goes.
    pub content_y: Au,

    /// The margin this box was positioned with, including margins from
    /// above that collapsed with its own.
    pub top_margin: VerticalMargin,
    /// Own top margin and the children's margins that collapsed through it.
    pub own_top_margin: VerticalMargin,
    pub top_collapsed_into_parent: bool,
    /// Trailing margins not yet resolved into a position.
    pub pending_margin: VerticalMargin,
    pub collapse_top_with_children: bool,
    pub collapse_bottom_with_children: bool,
    /// Unspecified margins at the top of the content collapse away.
    pub ignore_default_margins: bool,
    pub has_in_flow_content: bool,

    pub lines: LineState,

    /// Static position of a float, in formatting context coordinates.
    pub float_static_y: Au,

    pub content_sizes: ContentSizes,
    pub has_descendant_floats: bool,

    /// Overflow of in-flow and floating children, in this box's frame.
    pub children_bounds: AbsoluteBoundingBox,
    /// Overflow of absolutely positioned descendants, in this box's frame.
    pub positioned_bounds: AbsoluteBoundingBox,
    /// Overflow of fixed positioned descendants. Painted, never scrolled.
    pub fixed_bounds: AbsoluteBoundingBox,
    /// Absolutely positioned descendants waiting for this box to finish.
    pub pending_abspos: SmallVec<[(NodeId, StaticPosition); 4]>,
    /// List items among the children placed so far.
    pub list_counter: u32,

    pub text: Option<TextState>,
    pub inline: Option<InlineState>,
    pub table: Option<TableState>,
    pub row: Option<RowState>,
    pub abspos: Option<AbsposState>,
}

impl ReflowState {
    pub fn new(before: BoxSnapshot, bfc_root: NodeId) -> Self {
        ReflowState {
            before,
            next_child: None,
            bfc_root,
            bfc_x: Au::zero(),
            bfc_y: Au::zero(),
            content_x: Au::zero(),
            content_top: Au::zero(),
            content_width: Au::zero(),
            definite_height: None,
            content_y: Au::zero(),
            top_margin: VerticalMargin::default(),
            own_top_margin: VerticalMargin::default(),
            top_collapsed_into_parent: false,
            pending_margin: VerticalMargin::default(),
            collapse_top_with_children: false,
            collapse_bottom_with_children: false,
            ignore_default_margins: false,
            has_in_flow_content: false,
            lines: LineState {
                can_break: true,
                ..Default::default()
            },
            float_static_y: Au::zero(),
            content_sizes: ContentSizes::zero(),
            has_descendant_floats: false,
            children_bounds: AbsoluteBoundingBox::default(),
            positioned_bounds: AbsoluteBoundingBox::default(),
            fixed_bounds: AbsoluteBoundingBox::default(),
            pending_abspos: SmallVec::new(),
            list_counter: 0,
            text: None,
            inline: None,
            table: None,
            row: None,
            abspos: None,
        }
    }
}

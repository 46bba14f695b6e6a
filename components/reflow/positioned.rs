/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Absolutely positioned boxes.
//!
//! An absolutely positioned box is skipped by the walk of its parent, which
//! only records where the box would have been in normal flow. The box waits
//! in a queue on its containing block and is laid out when that block
//! finishes and its size is final. Fixed positioned boxes use the viewport
//! and queue on the root.

use app_units::Au;
use euclid::num::Zero;
use log::{debug, trace};

use crate::box_tree::{BoxCapabilities, BoxKind, StaticPosition};
use crate::context::ReflowContext;
use crate::dom::NodeId;
use crate::flow::{self, Placement, bounds_in_parent, frame_of, resolve_edges, skip_branch, start_box};
use crate::reflow_state::AbsposState;
use crate::style::{Margin, Position, Size};
use crate::{LayoutStatus, ReflowError};

/// The containing block of an absolutely positioned `node`: the nearest
/// positioned block ancestor, or the root.
pub(crate) fn containing_block(ctx: &ReflowContext, node: NodeId) -> NodeId {
    let document = ctx.document;
    let root = document.root();
    if document.style(node).position == Position::Fixed {
        return root;
    }
    document
        .ancestors(node)
        .find(|ancestor| {
            ctx.boxes.get(*ancestor).is_some_and(|layout_box| {
                layout_box.is(BoxCapabilities::POSITIONED) && layout_box.kind != BoxKind::Inline
            })
        })
        .unwrap_or(root)
}

pub(crate) fn push_pending(
    ctx: &mut ReflowContext,
    containing_block: NodeId,
    node: NodeId,
    static_position: StaticPosition,
) -> Result<(), ReflowError> {
    ctx.allocation_point()?;
    trace!("{:?} waits for {:?}", node, containing_block);
    ctx.boxes
        .state_mut(containing_block)
        .pending_abspos
        .push((node, static_position));
    Ok(())
}

/// Record the static position of `child` and queue it on its containing
/// block.
pub(crate) fn defer(ctx: &mut ReflowContext, parent: NodeId, child: NodeId) -> Result<(), ReflowError> {
    let frame = frame_of(ctx, parent);
    let state = ctx.boxes.state(frame);
    let (x, y) = match state.lines.active {
        true => (state.lines.left + state.lines.used, state.lines.y),
        false => (
            state.content_x,
            state.content_y + state.pending_margin.resolved_height(),
        ),
    };
    let containing_block = containing_block(ctx, child);
    if !ctx.boxes.has_state(containing_block) {
        debug!("Containing block of {:?} is not being laid out", child);
        return Ok(());
    }
    push_pending(ctx, containing_block, child, StaticPosition { frame, x, y })
}

/// Lay out the boxes queued on `containing_block`, which has its final size.
pub(crate) fn layout_pending(ctx: &mut ReflowContext, containing_block: NodeId) -> Result<(), ReflowError> {
    let pending = std::mem::take(&mut ctx.boxes.state_mut(containing_block).pending_abspos);
    if pending.is_empty() {
        return Ok(());
    }

    ctx.suppress_yield();
    let mut result = Ok(());
    for (node, static_position) in pending {
        result = layout_absolute(ctx, containing_block, node, static_position);
        if result.is_err() {
            break;
        }
    }
    ctx.allow_yield();
    result
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum AbsoluteBoxOffsets {
    StaticStart { start: Au },
    Start { start: Au },
    End { end: Au },
    Both { start: Au, end: Au },
}

impl AbsoluteBoxOffsets {
    fn new(static_start: Au, start: Option<Au>, end: Option<Au>) -> Self {
        match (start, end) {
            (None, None) => AbsoluteBoxOffsets::StaticStart {
                start: static_start,
            },
            (Some(start), None) => AbsoluteBoxOffsets::Start { start },
            (None, Some(end)) => AbsoluteBoxOffsets::End { end },
            (Some(start), Some(end)) => AbsoluteBoxOffsets::Both { start, end },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Anchor {
    Start(Au),
    End(Au),
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct AxisSolution {
    anchor: Anchor,
    /// Border box size, unless it depends on the content.
    size: Option<Au>,
    margin_start: Au,
    margin_end: Au,
}

impl AxisSolution {
    /// Start of the border box for a border box of `size`.
    fn position(&self, containing_size: Au, size: Au) -> Au {
        match self.anchor {
            Anchor::Start(start) => start + self.margin_start,
            Anchor::End(end) => containing_size - end - self.margin_end - size,
        }
    }

    /// Room for a shrink-to-fit border box.
    fn available(&self, containing_size: Au) -> Au {
        let offset = match self.anchor {
            Anchor::Start(start) => start,
            Anchor::End(end) => end,
        };
        containing_size - offset - self.margin_start - self.margin_end
    }
}

/// Resolve one axis. `None` margins are auto. With both offsets given, an
/// auto size stretches and auto margins share what a definite size leaves.
fn solve_axis(
    containing_size: Au,
    computed_margin_start: Option<Au>,
    computed_margin_end: Option<Au>,
    solve_margins: impl FnOnce(Au) -> (Au, Au),
    box_offsets: AbsoluteBoxOffsets,
    size: Option<Au>,
) -> AxisSolution {
    let mut margin_start = computed_margin_start.unwrap_or_else(Au::zero);
    let mut margin_end = computed_margin_end.unwrap_or_else(Au::zero);
    match box_offsets {
        AbsoluteBoxOffsets::StaticStart { start } | AbsoluteBoxOffsets::Start { start } => AxisSolution {
            anchor: Anchor::Start(start),
            size,
            margin_start,
            margin_end,
        },
        AbsoluteBoxOffsets::End { end } => AxisSolution {
            anchor: Anchor::End(end),
            size,
            margin_start,
            margin_end,
        },
        AbsoluteBoxOffsets::Both { start, end } => {
            let size = match size {
                Some(size) => {
                    let margins = containing_size - start - end - size;
                    match (computed_margin_start, computed_margin_end) {
                        (None, None) => (margin_start, margin_end) = solve_margins(margins),
                        (None, Some(other)) => margin_start = margins - other,
                        (Some(other), None) => margin_end = margins - other,
                        (Some(_), Some(_)) => {},
                    }
                    size
                },
                None => containing_size - start - end - margin_start - margin_end,
            };
            AxisSolution {
                anchor: Anchor::Start(start),
                size: Some(size),
                margin_start,
                margin_end,
            }
        },
    }
}

fn computed_margin(margin: &Margin, containing_width: Au) -> Option<Au> {
    match margin.value {
        Size::Auto => None,
        _ => Some(margin.resolve(containing_width)),
    }
}

fn layout_absolute(
    ctx: &mut ReflowContext,
    containing_block: NodeId,
    node: NodeId,
    static_position: StaticPosition,
) -> Result<(), ReflowError> {
    let document = ctx.document;
    let style = ctx.style(node);
    let Some(parent) = document.parent(node) else {
        return Ok(());
    };
    let fixed = style.position == Position::Fixed;

    // Everything below is relative to the padding box of the containing
    // block, or to the viewport.
    let cb_box = &ctx.boxes[containing_block];
    let (origin_x, origin_y, cb_width, cb_height) = if fixed || !cb_box.is(BoxCapabilities::POSITIONED) {
        let (width, height) = ctx.options.viewport_size();
        (-cb_box.x, -cb_box.y, width, height)
    } else {
        let (width, height) = cb_box.padding_box_size();
        (cb_box.border.left, cb_box.border.top, width, height)
    };
    let (frame_x, frame_y) = ctx.boxes.offset_from(document, static_position.frame, containing_block);
    let (parent_x, parent_y) = ctx.boxes.offset_from(document, parent, containing_block);

    resolve_edges(ctx, node, cb_width);
    let layout_box = &ctx.boxes[node];
    let pb_vertical = layout_box.border.vertical() + layout_box.padding.vertical();

    // Horizontal axis.
    let width_cb = Some(cb_width);
    let offsets = AbsoluteBoxOffsets::new(
        frame_x + static_position.x - origin_x,
        style.inset.left.resolve(width_cb),
        style.inset.right.resolve(width_cb),
    );
    let margin_left = computed_margin(&style.margin.left, cb_width);
    let margin_right = computed_margin(&style.margin.right, cb_width);
    let split = |margins: Au| match margins >= Au::zero() {
        true => (margins / 2, margins - margins / 2),
        false => (Au::zero(), margins),
    };
    let specified_width = style
        .width
        .resolve(width_cb)
        .map(|_| flow::border_box_width(ctx, node, cb_width, cb_width));
    let horizontal = solve_axis(cb_width, margin_left, margin_right, split, offsets, specified_width);
    let width = match horizontal.size {
        Some(size) if style.width.is_auto() => flow::constrain_width(ctx, node, cb_width, size),
        Some(size) => size,
        None => flow::border_box_width(ctx, node, cb_width, horizontal.available(cb_width)),
    };
    let horizontal = solve_axis(cb_width, margin_left, margin_right, split, offsets, Some(width));
    let x = horizontal.position(cb_width, width);

    // The vertical position waits for the height; only a stretched or
    // specified height is needed now.
    let height_cb = Some(cb_height);
    let vertical = solve_axis(
        cb_height,
        computed_margin(&style.margin.top, cb_width),
        computed_margin(&style.margin.bottom, cb_width),
        |margins| (margins / 2, margins - margins / 2),
        AbsoluteBoxOffsets::new(Au::zero(), style.inset.top.resolve(height_cb), style.inset.bottom.resolve(height_cb)),
        flow::definite_height(ctx, node, height_cb).map(|height| height + pb_vertical),
    );
    let definite_height = vertical.size.map(|size| (size - pb_vertical).max(Au::zero()));

    let abspos = AbsposState {
        width: cb_width,
        height: cb_height,
        static_x: frame_x + static_position.x - origin_x,
        static_y: frame_y + static_position.y - origin_y,
        x,
        parent_x: parent_x - origin_x,
        parent_y: parent_y - origin_y,
    };
    let layout_box = &ctx.boxes[node];
    let reuse = layout_box.flow.laid_out_in_pass != 0 &&
        !document.dirty(node).is_dirty() &&
        layout_box.width == width &&
        layout_box.flow.containing_block == Some(abspos) &&
        !ctx.options.paged;

    if reuse {
        trace!("Reusing absolutely positioned {:?}", node);
        skip_branch(ctx, None, node)?;
    } else {
        let layout_box = &mut ctx.boxes[node];
        layout_box.margin.left = horizontal.margin_start;
        layout_box.margin.right = horizontal.margin_end;
        start_box(
            ctx,
            node,
            Placement {
                x: Au::zero(),
                y: Au::zero(),
                width,
                containing_width: cb_width,
                bfc_root: node,
                bfc_x: Au::zero(),
                bfc_y: Au::zero(),
                definite_height,
            },
        )?;
        ctx.boxes.state_mut(node).abspos = Some(abspos);
        let status = flow::layout(ctx, node)?;
        if status != LayoutStatus::Continue {
            debug!("Absolutely positioned {:?} ended with {:?}", node, status);
        }
    }

    let layout_box = &mut ctx.boxes[node];
    layout_box.flow.containing_block = Some(abspos);
    layout_box.flow.static_position = Some(static_position);

    let mut bounds = bounds_in_parent(layout_box);
    bounds.translate(parent_x, parent_y);
    let state = ctx.boxes.state_mut(containing_block);
    match fixed {
        true => state.fixed_bounds.union_with(&bounds),
        false => state.positioned_bounds.union_with(&bounds),
    }
    Ok(())
}

/// Resolve the vertical position of an absolutely positioned box once its
/// height is known.
pub(crate) fn place(ctx: &mut ReflowContext, node: NodeId) {
    let Some(abspos) = ctx.boxes.state(node).abspos else {
        return;
    };
    let style = ctx.style(node);
    let height_cb = Some(abspos.height);
    let height = ctx.boxes[node].height;
    let vertical = solve_axis(
        abspos.height,
        computed_margin(&style.margin.top, abspos.width),
        computed_margin(&style.margin.bottom, abspos.width),
        |margins| (margins / 2, margins - margins / 2),
        AbsoluteBoxOffsets::new(
            abspos.static_y,
            style.inset.top.resolve(height_cb),
            style.inset.bottom.resolve(height_cb),
        ),
        Some(height),
    );
    let y = vertical.position(abspos.height, height);

    let layout_box = &mut ctx.boxes[node];
    layout_box.margin.top = vertical.margin_start;
    layout_box.margin.bottom = vertical.margin_end;
    layout_box.x = abspos.x - abspos.parent_x;
    layout_box.y = y - abspos.parent_y;
    trace!("Placing {:?} at {:?}", node, (layout_box.x, layout_box.y));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(value: i32) -> Au {
        Au::from_px(value)
    }

    fn split(margins: Au) -> (Au, Au) {
        (margins / 2, margins - margins / 2)
    }

    #[test]
    fn both_offsets_stretch_an_auto_size() {
        let solution = solve_axis(
            px(400),
            Some(px(10)),
            Some(px(20)),
            split,
            AbsoluteBoxOffsets::new(px(0), Some(px(30)), Some(px(40))),
            None,
        );
        assert_eq!(solution.size, Some(px(300)));
        assert_eq!(solution.position(px(400), px(300)), px(40));
    }

    #[test]
    fn auto_margins_center_a_definite_size() {
        let solution = solve_axis(
            px(400),
            None,
            None,
            split,
            AbsoluteBoxOffsets::new(px(0), Some(px(0)), Some(px(0))),
            Some(px(100)),
        );
        assert_eq!(solution.margin_start, px(150));
        assert_eq!(solution.margin_end, px(150));
        assert_eq!(solution.position(px(400), px(100)), px(150));
    }

    #[test]
    fn end_offset_anchors_to_the_far_edge() {
        let solution = solve_axis(
            px(400),
            Some(px(5)),
            Some(px(5)),
            split,
            AbsoluteBoxOffsets::new(px(70), None, Some(px(20))),
            None,
        );
        assert_eq!(solution.anchor, Anchor::End(px(20)));
        assert_eq!(solution.available(px(400)), px(370));
        assert_eq!(solution.position(px(400), px(100)), px(275));
    }

    #[test]
    fn no_offsets_use_the_static_position() {
        let solution = solve_axis(
            px(400),
            Some(px(5)),
            None,
            split,
            AbsoluteBoxOffsets::new(px(70), None, None),
            Some(px(50)),
        );
        assert_eq!(solution.position(px(400), px(50)), px(75));
    }
}

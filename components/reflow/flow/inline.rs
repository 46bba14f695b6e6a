/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Line layout.
//!
//! Inline-level content of a block container goes onto lines owned by that
//! block, its *frame*. The frame's [`LineState`] tracks the line being
//! filled; words and atomic inlines are appended to it until one does not
//! fit, at which point the line closes and a new one opens below. Lines
//! avoid the floats of the formatting context.
//!
//! Fragment positions are computed in the frame's coordinates. An inline
//! box rebases its children onto itself once it knows its own position.
//!
//! [`LineState`]: crate::reflow_state::LineState

use app_units::{Au, MAX_AU};
use euclid::num::Zero;
use log::{debug, trace};

use crate::LayoutStatus;
use crate::ReflowError;
use crate::bounding_box::RelativeBoundingBox;
use crate::box_tree::{BoxCapabilities, BoxKind};
use crate::context::ReflowContext;
use crate::dom::NodeId;
use crate::flow::float::EdgeLock;
use crate::flow::{
    ChildStart, Placement, border_box_width, bounds_in_parent, collapse_into_top, complete, frame_of,
    outer_sizes, resolve_edges, start_box,
};
use crate::reflow_state::{FragmentBounds, InlineState, LineState, TextState};
use crate::sizing::ContentSizes;

fn fits(lines: &LineState, width: Au) -> bool {
    !(lines.items > 0 && lines.can_break && lines.used + width > lines.width)
}

fn line_height(ctx: &ReflowContext, frame: NodeId) -> Au {
    let style = ctx.style(frame);
    match (ctx.boxes.state(frame).lines.on_first_line, style.first_line_height) {
        (true, Some(height)) => height,
        _ => style.line_height,
    }
}

/// Open a line in `frame` unless one is active, at the first position
/// where `min_width` is free of floats.
fn ensure_line(ctx: &mut ReflowContext, frame: NodeId, min_width: Au) -> Result<(), ReflowError> {
    if ctx.boxes.state(frame).lines.active {
        return Ok(());
    }

    // Margins above the first line resolve now.
    let state = ctx.boxes.state(frame);
    let pending = state.pending_margin;
    if state.collapse_top_with_children && !state.has_in_flow_content {
        collapse_into_top(ctx, frame, &pending)?;
    } else {
        ctx.boxes.state_mut(frame).content_y += pending.resolved_height();
    }
    let height = line_height(ctx, frame);

    let state = ctx.boxes.state(frame);
    let (bfc_x, bfc_y) = (state.bfc_x, state.bfc_y);
    let mut y = bfc_y + state.content_y;
    let mut x = bfc_x + state.content_x;
    let mut width = state.content_width;
    if let Some(registry) = ctx.boxes.registry(state.bfc_root) {
        registry.get_space(&mut y, &mut x, &mut width, min_width, height, EdgeLock::Unlocked);
    }

    let state = ctx.boxes.state_mut(frame);
    state.pending_margin.reset();
    state.has_in_flow_content = true;
    let lines = &mut state.lines;
    lines.active = true;
    lines.y = y - bfc_y;
    lines.left = x - bfc_x;
    lines.width = width;
    lines.used = lines.pending_advance;
    lines.pending_advance = Au::zero();
    lines.height = height;
    lines.items = 0;
    lines.can_break = true;
    lines.trailing_space = Au::zero();
    trace!("Line {} of {:?} at {:?}", lines.line_count, frame, lines.y);
    Ok(())
}

/// End the active line of `frame`, if any, and move the content position
/// below it.
pub(crate) fn close_line(ctx: &mut ReflowContext, frame: NodeId) {
    let state = ctx.boxes.state_mut(frame);
    if !state.lines.active {
        return;
    }
    let lines = &mut state.lines;
    lines.active = false;
    lines.line_count += 1;
    lines.on_first_line = false;
    state.content_y = lines.y + lines.height;
}

/// The first line of `frame` is complete: close it so the next one uses the
/// regular line height.
pub(crate) fn end_first_line(ctx: &mut ReflowContext, frame: NodeId) -> Result<(), ReflowError> {
    debug!("First line of {:?} ends", frame);
    close_line(ctx, frame);
    Ok(())
}

/// A float was placed next to the active line. If nothing is on the line
/// yet it moves to the space left beside the float.
pub(crate) fn refresh_line(ctx: &mut ReflowContext, frame: NodeId) {
    let state = ctx.boxes.state(frame);
    if !state.lines.active || state.lines.items > 0 {
        return;
    }
    let (bfc_x, bfc_y) = (state.bfc_x, state.bfc_y);
    let mut y = bfc_y + state.lines.y;
    let mut x = bfc_x + state.content_x;
    let mut width = state.content_width;
    let height = state.lines.height;
    let Some(registry) = ctx.boxes.registry(state.bfc_root) else {
        return;
    };
    registry.get_space(&mut y, &mut x, &mut width, Au::zero(), height, EdgeLock::Unlocked);

    let lines = &mut ctx.boxes.state_mut(frame).lines;
    lines.y = y - bfc_y;
    lines.left = x - bfc_x;
    lines.width = width;
}

/// The current unbreakable run of inline content ends; its width, plus
/// whatever floats beside it take, counts toward the max-content width of
/// `frame`.
pub(crate) fn commit_run(ctx: &mut ReflowContext, frame: NodeId) {
    let state = ctx.boxes.state(frame);
    let run = state.lines.run;
    if run <= Au::zero() {
        return;
    }
    let mut min_y = state.bfc_y + state.content_y;
    let height = state.lines.height;
    let (left, right) = match ctx.boxes.registry(state.bfc_root) {
        Some(registry) => registry.get_floats_max_width(&mut min_y, height, run, Au::zero(), Au::zero(), MAX_AU),
        None => (Au::zero(), Au::zero()),
    };

    let state = ctx.boxes.state_mut(frame);
    state.content_sizes.max_assign(ContentSizes {
        min_content: Au::zero(),
        max_content: run + left + right,
    });
    state.lines.run = Au::zero();
}

pub(crate) fn begin_inline_level(
    ctx: &mut ReflowContext,
    parent: NodeId,
    child: NodeId,
) -> Result<ChildStart, ReflowError> {
    let frame = frame_of(ctx, parent);
    let (containing_width, bfc_root, bfc_x, bfc_y, line_x, line_y) = {
        let state = ctx.boxes.state(frame);
        let (line_x, line_y) = match state.lines.active {
            true => (state.lines.left + state.lines.used, state.lines.y),
            false => (state.content_x + state.lines.pending_advance, state.content_y),
        };
        (
            state.content_width,
            state.bfc_root,
            state.bfc_x,
            state.bfc_y,
            line_x,
            line_y,
        )
    };
    let mut placement = Placement {
        x: Au::zero(),
        y: Au::zero(),
        width: Au::zero(),
        containing_width,
        bfc_root,
        bfc_x,
        bfc_y,
        definite_height: None,
    };

    let kind = ctx.boxes[child].kind;
    match kind {
        BoxKind::Text => {
            start_box(ctx, child, placement)?;
            ctx.boxes.state_mut(child).text = Some(TextState {
                next_word: 0,
                bounds: None,
            });
        },
        BoxKind::Inline => {
            resolve_edges(ctx, child, containing_width);
            let layout_box = &ctx.boxes[child];
            let lead = layout_box.margin.left + layout_box.border.left + layout_box.padding.left;
            let lines = &mut ctx.boxes.state_mut(frame).lines;
            match lines.active {
                true => lines.used += lead,
                false => lines.pending_advance += lead,
            }
            lines.run += lead;
            start_box(ctx, child, placement)?;
            ctx.boxes.state_mut(child).inline = Some(InlineState {
                frame,
                start_x: line_x,
                start_y: line_y,
                bounds: None,
            });
        },
        _ => {
            // Atomic inline: sized like a float, placed on a line once its
            // height is known.
            resolve_edges(ctx, child, containing_width);
            let margin = ctx.boxes[child].margin;
            placement.width = border_box_width(ctx, child, containing_width, containing_width - margin.horizontal());
            start_box(ctx, child, placement)?;
        },
    }
    Ok(ChildStart::Started)
}

/// Put the words of a text node onto lines, continuing after the last word
/// placed. Returns [`LayoutStatus::EndFirstLine`] when the first line of
/// the frame fills up.
pub(crate) fn layout_text(ctx: &mut ReflowContext, node: NodeId) -> Result<LayoutStatus, ReflowError> {
    let document = ctx.document;
    let Some(parent) = document.parent(node) else {
        return Ok(LayoutStatus::Continue);
    };
    let frame = frame_of(ctx, parent);
    let words = document.words(node).unwrap_or(&[]);
    let Some(mut text) = ctx.boxes.state(node).text else {
        return Ok(LayoutStatus::Continue);
    };

    while let Some(word) = words.get(text.next_word) {
        ensure_line(ctx, frame, word.width)?;
        let lines = ctx.boxes.state(frame).lines;
        if !fits(&lines, word.width) {
            if lines.on_first_line {
                ctx.boxes.state_mut(node).text = Some(text);
                return Ok(LayoutStatus::EndFirstLine);
            }
            close_line(ctx, frame);
            continue;
        }

        let fragment = FragmentBounds::new(lines.left + lines.used, lines.y, word.width, lines.height);
        FragmentBounds::add(&mut text.bounds, fragment);
        let state = ctx.boxes.state_mut(frame);
        state.content_sizes.min_content = state.content_sizes.min_content.max(word.width);
        let lines = &mut state.lines;
        lines.used += word.width + word.space_after;
        lines.run += word.width + word.space_after;
        lines.trailing_space = word.space_after;
        lines.items += 1;
        lines.can_break = word.can_break_after;
        text.next_word += 1;

        if word.forced_break_after {
            commit_run(ctx, frame);
            close_line(ctx, frame);
        }
    }

    ctx.boxes.state_mut(node).text = Some(text);
    Ok(LayoutStatus::Continue)
}

pub(crate) fn finish_text(ctx: &mut ReflowContext, node: NodeId) -> Result<(), ReflowError> {
    let bounds = ctx.boxes.state(node).text.and_then(|text| text.bounds);
    let (x, y, width, height) = match bounds {
        Some(bounds) => (
            bounds.left,
            bounds.top,
            bounds.right - bounds.left,
            bounds.bottom - bounds.top,
        ),
        None => {
            // No words: an empty box where the next word would have gone.
            let frame = ctx
                .document
                .parent(node)
                .map_or(node, |parent| frame_of(ctx, parent));
            let state = ctx.boxes.state(frame);
            match state.lines.active {
                true => (state.lines.left + state.lines.used, state.lines.y, Au::zero(), Au::zero()),
                false => (state.content_x, state.content_y, Au::zero(), Au::zero()),
            }
        },
    };
    let layout_box = &mut ctx.boxes[node];
    layout_box.x = x;
    layout_box.y = y;
    layout_box.width = width;
    layout_box.height = height;
    layout_box.bounding_box = RelativeBoundingBox::default();
    complete(ctx, node)
}

/// Close an inline box: add its trailing edge to the line, derive its
/// border box from its fragments and rebase its children onto it.
pub(crate) fn finish_inline(ctx: &mut ReflowContext, node: NodeId) -> Result<(), ReflowError> {
    let document = ctx.document;
    let Some(inline) = ctx.boxes.state(node).inline else {
        return complete(ctx, node);
    };
    let layout_box = &ctx.boxes[node];
    let (margin, border, padding) = (layout_box.margin, layout_box.border, layout_box.padding);
    let trail = margin.right + border.right + padding.right;

    let lines = &mut ctx.boxes.state_mut(inline.frame).lines;
    match lines.active {
        true => lines.used += trail,
        false => lines.pending_advance += trail,
    }
    lines.run += trail;

    let x = inline.start_x + margin.left;
    let leading = border.left + padding.left;
    let (right, top, bottom) = match inline.bounds {
        Some(bounds) => (bounds.right, bounds.top, bounds.bottom),
        None => (x + leading, inline.start_y, inline.start_y),
    };
    let y = top - border.top - padding.top;
    let width = (right + padding.right + border.right - x).max(leading + padding.right + border.right);
    let height = bottom - top + border.vertical() + padding.vertical();

    for &child in document.children(node) {
        let Some(child_box) = ctx.boxes.get_mut(child) else {
            continue;
        };
        if child_box.is(BoxCapabilities::ABSOLUTELY_POSITIONED) {
            continue;
        }
        child_box.x -= x;
        child_box.y -= y;
    }

    let mut children_bounds = ctx.boxes.state(node).children_bounds;
    children_bounds.translate(-x, -y);
    let mut bounding_box = RelativeBoundingBox::default();
    bounding_box.union_with(&children_bounds, width, height, false);

    let layout_box = &mut ctx.boxes[node];
    layout_box.x = x;
    layout_box.y = y;
    layout_box.width = width;
    layout_box.height = height;
    layout_box.bounding_box = bounding_box;
    trace!("Inline {:?} spans {:?}", node, (x, y, width, height));
    complete(ctx, node)
}

/// Put a finished atomic inline onto a line of its frame.
pub(crate) fn place_atomic(ctx: &mut ReflowContext, node: NodeId) -> Result<(), ReflowError> {
    let document = ctx.document;
    let Some(parent) = document.parent(node) else {
        return Ok(());
    };
    let frame = frame_of(ctx, parent);
    let style = ctx.style(node);
    let layout_box = &ctx.boxes[node];
    let margin = layout_box.margin;
    let outer_width = layout_box.width + margin.horizontal();
    let outer_height = layout_box.height + margin.vertical();
    let outer = outer_sizes(style, layout_box, ctx.boxes.state(node).content_sizes);

    ensure_line(ctx, frame, outer_width)?;
    if !fits(&ctx.boxes.state(frame).lines, outer_width) {
        close_line(ctx, frame);
        ensure_line(ctx, frame, outer_width)?;
    }

    let state = ctx.boxes.state_mut(frame);
    state.content_sizes.min_content = state.content_sizes.min_content.max(outer.min_content);
    let lines = &mut state.lines;
    let (x, y) = (lines.left + lines.used, lines.y);
    lines.used += outer_width;
    lines.run += outer.max_content;
    lines.height = lines.height.max(outer_height);
    lines.items += 1;
    lines.can_break = true;
    lines.trailing_space = Au::zero();

    let layout_box = &mut ctx.boxes[node];
    layout_box.x = x + margin.left;
    layout_box.y = y + margin.top;
    Ok(())
}

/// Hand a finished inline-level child to its container.
pub(crate) fn after_inline_level(ctx: &mut ReflowContext, parent: NodeId, child: NodeId) {
    let child_box = &ctx.boxes[child];
    let bounds = bounds_in_parent(child_box);
    let fragment = FragmentBounds::new(child_box.x, child_box.y, child_box.width, child_box.height);
    let is_empty_text = child_box.kind == BoxKind::Text && child_box.width == Au::zero();

    let state = ctx.boxes.state_mut(parent);
    state.children_bounds.union_with(&bounds);
    if let Some(inline) = state.inline.as_mut() {
        if !is_empty_text {
            FragmentBounds::add(&mut inline.bounds, fragment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_first_item_always_fits() {
        let mut lines = LineState {
            width: Au::from_px(50),
            can_break: true,
            ..Default::default()
        };
        assert!(fits(&lines, Au::from_px(80)));

        lines.items = 1;
        lines.used = Au::from_px(30);
        assert!(fits(&lines, Au::from_px(20)));
        assert!(!fits(&lines, Au::from_px(21)));

        lines.can_break = false;
        assert!(fits(&lines, Au::from_px(21)));
    }
}

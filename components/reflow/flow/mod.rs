/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Block formatting.
//!
//! A container walks its children in document order. Each child is either
//! reused verbatim, when nothing it depends on changed, or sized and
//! positioned here and then laid out recursively. Block-level children stack
//! vertically with their margins collapsing; inline-level children go onto
//! lines (see [`inline`]); floats are placed through the float registry of
//! the formatting context (see [`float`]).
//!
//! The walk keeps everything it needs in the scratch records of the boxes
//! it is inside of, so that a suspended pass resumes by walking down the
//! chain of boxes that still have a record.

pub(crate) mod float;
pub(crate) mod inline;

use app_units::{Au, MAX_AU};
use euclid::num::Zero;
use log::{debug, trace};

use crate::bounding_box::{AbsoluteBoundingBox, RelativeBoundingBox};
use crate::box_tree::{BoxCapabilities, BoxKind, LayoutBox};
use crate::context::ReflowContext;
use crate::dom::NodeId;
use crate::flow::float::{Clear, EdgeLock, FloatEntry, FloatSide, PlacementInfo};
use crate::geom::AuExt;
use crate::margin::{BlockMargins, VerticalMargin};
use crate::reflow_state::{BoxSnapshot, ReflowState};
use crate::sizing::ContentSizes;
use crate::style::{BoxSizing, Overflow, Position, ResolvedStyle};
use crate::{LayoutStatus, ReflowError, positioned, table};

/// What happened to a child when its container reached it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ChildStart {
    /// The child has a scratch record and its children need walking.
    Started,
    /// Nothing more to do for now: the child was reused, deferred, or
    /// generates no box.
    Done,
}

/// Where a container puts a child, in the container's frame.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Placement {
    pub x: Au,
    pub y: Au,
    pub width: Au,
    pub containing_width: Au,
    /// Formatting context the child takes part in, and the child's border
    /// box origin in it.
    pub bfc_root: NodeId,
    pub bfc_x: Au,
    pub bfc_y: Au,
    /// Height of the content box, when it does not depend on the content.
    pub definite_height: Option<Au>,
}

/// Lay out `node`, whose container already sized and positioned it, and
/// finish it once every child is done. Resumes a walk that suspended inside
/// the subtree.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(name = "flow::layout", skip_all, level = "trace")
)]
pub(crate) fn layout(ctx: &mut ReflowContext, node: NodeId) -> Result<LayoutStatus, ReflowError> {
    let status = match ctx.boxes[node].kind {
        BoxKind::Text => inline::layout_text(ctx, node)?,
        _ => layout_children(ctx, node)?,
    };
    if status != LayoutStatus::Continue {
        return Ok(status);
    }
    finish(ctx, node)
}

fn layout_children(ctx: &mut ReflowContext, node: NodeId) -> Result<LayoutStatus, ReflowError> {
    if let Some(cursor) = ctx.take_cursor_for(node) {
        debug!("Resuming {:?} before {:?}", node, cursor.next_child);
    }

    while let Some(child) = ctx.boxes.state(node).next_child {
        let status = if ctx.boxes.has_state(child) {
            layout(ctx, child)?
        } else {
            if !ctx.is_yield_suppressed() {
                if ctx.should_yield() {
                    let frame = frame_of(ctx, node);
                    let position = ctx.boxes.state(frame).lines.used;
                    ctx.suspend_at(node, Some(child), position);
                    return Ok(LayoutStatus::Yield);
                }
                if ctx.pass.stop_before == Some(child) {
                    debug!("Stopping before {:?}", child);
                    return Ok(LayoutStatus::Stop);
                }
            }
            ctx.note_progress();
            match begin_child(ctx, node, child)? {
                ChildStart::Started => layout(ctx, child)?,
                ChildStart::Done => LayoutStatus::Continue,
            }
        };

        match status {
            LayoutStatus::Continue => {
                let next = ctx.document.next_sibling(child);
                ctx.boxes.state_mut(node).next_child = next;
            },
            LayoutStatus::EndFirstLine if is_on_first_line(ctx, node) => {
                // The child keeps its record and picks up where it stopped.
                inline::end_first_line(ctx, node)?;
            },
            status => return Ok(status),
        }
    }
    Ok(LayoutStatus::Continue)
}

fn is_on_first_line(ctx: &ReflowContext, node: NodeId) -> bool {
    ctx.boxes[node].kind != BoxKind::Inline && ctx.boxes.state(node).lines.on_first_line
}

/// The block container whose lines the children of `node` go on.
pub(crate) fn frame_of(ctx: &ReflowContext, node: NodeId) -> NodeId {
    match ctx.boxes.get(node).and_then(|layout_box| layout_box.reflow_state.as_ref()) {
        Some(ReflowState {
            inline: Some(inline),
            ..
        }) => inline.frame,
        _ => node,
    }
}

fn begin_child(ctx: &mut ReflowContext, parent: NodeId, child: NodeId) -> Result<ChildStart, ReflowError> {
    let Some(kind) = prepare_child(ctx, parent, child)? else {
        return Ok(ChildStart::Done);
    };
    let capabilities = ctx.boxes[child].capabilities;
    let parent_kind = ctx.boxes[parent].kind;

    if capabilities.contains(BoxCapabilities::ABSOLUTELY_POSITIONED) {
        positioned::defer(ctx, parent, child)?;
        return Ok(ChildStart::Done);
    }
    if parent_kind == BoxKind::TableRow {
        return table::begin_cell(ctx, parent, child);
    }
    if matches!(kind, BoxKind::TableRowGroup | BoxKind::TableRow) {
        return table::begin_row_like(ctx, parent, child);
    }
    if capabilities.contains(BoxCapabilities::FLOATING) {
        return begin_float(ctx, parent, child);
    }
    if capabilities.contains(BoxCapabilities::INLINE_LEVEL) {
        return inline::begin_inline_level(ctx, parent, child);
    }
    place_block_child(ctx, parent, child)
}

/// Make sure `child` has a box of the kind its style asks for. Returns
/// `None` if it generates no box.
fn prepare_child(
    ctx: &mut ReflowContext,
    parent: NodeId,
    child: NodeId,
) -> Result<Option<BoxKind>, ReflowError> {
    let document = ctx.document;
    let kind = BoxKind::for_element(document, child);
    let capabilities = kind.map(|kind| BoxCapabilities::for_element(document, child, kind));
    let dirty = document.dirty(child);

    if let Some(existing) = ctx.boxes.get(child) {
        let old_capabilities = existing.capabilities;
        let stale = dirty.needs_rebuild() ||
            kind != Some(existing.kind) ||
            capabilities != Some(old_capabilities);
        if stale {
            trace!("Dropping the {:?} box of {:?}", existing.kind, child);
            let removed_float = remove_boxes(ctx, child)?;
            if removed_float {
                let bfc_root = ctx.boxes.state(frame_of(ctx, parent)).bfc_root;
                if let Some(registry) = ctx.boxes.registry_mut(bfc_root) {
                    registry.enable_full_bfc_reflow();
                }
            }

            // The sibling may have to join or leave an anonymous block
            // together with this child.
            let was_inline = old_capabilities.contains(BoxCapabilities::INLINE_LEVEL);
            let is_inline = capabilities.is_some_and(|caps| caps.contains(BoxCapabilities::INLINE_LEVEL));
            if dirty.needs_rebuild() && was_inline != is_inline {
                if let Some(sibling) = document.next_sibling(child) {
                    document.mark_rebuild(sibling);
                }
            }
        }
    }

    let (Some(kind), Some(capabilities)) = (kind, capabilities) else {
        document.mark_clean(child);
        return Ok(None);
    };
    if !ctx.boxes.contains(child) {
        ctx.allocation_point()?;
        trace!("Creating a {:?} box for {:?}", kind, child);
        ctx.boxes.insert(child, LayoutBox::new(kind, capabilities))?;
    }
    Ok(Some(kind))
}

/// Drop the boxes of a subtree, damaging the area they painted. Returns
/// whether one of them was a float.
pub(crate) fn remove_boxes(ctx: &mut ReflowContext, node: NodeId) -> Result<bool, ReflowError> {
    let document = ctx.document;
    let mut removed_float = false;
    let mut stack = Vec::new();
    stack.try_reserve(8)?;
    stack.push(node);
    while let Some(current) = stack.pop() {
        if let Some(layout_box) = ctx.boxes.remove(current) {
            removed_float |= layout_box.is(BoxCapabilities::FLOATING);
            if let Some(bounds) = layout_box.flow.doc_bounds {
                ctx.pass.damage.add(bounds)?;
            }
        }
        let children = document.children(current);
        stack.try_reserve(children.len())?;
        stack.extend(children.iter().copied());
    }
    Ok(removed_float)
}

/// Margins, borders and padding of `node`, resolved against the width of
/// its containing block.
pub(crate) fn resolve_edges(ctx: &mut ReflowContext, node: NodeId, containing_width: Au) {
    let style = ctx.style(node);
    let layout_box = &mut ctx.boxes[node];
    layout_box.margin = style.margin(containing_width);
    layout_box.border = style.border;
    layout_box.padding = style.padding(containing_width);
}

pub(crate) fn shrinks_to_fit(layout_box: &LayoutBox) -> bool {
    layout_box.capabilities.intersects(
        BoxCapabilities::FLOATING |
            BoxCapabilities::ABSOLUTELY_POSITIONED |
            BoxCapabilities::ATOMIC_INLINE,
    )
}

/// Used width of the border box of `node`, given the room `available` for
/// it in a containing block of `containing_width`.
pub(crate) fn border_box_width(ctx: &ReflowContext, node: NodeId, containing_width: Au, available: Au) -> Au {
    let style = ctx.style(node);
    let layout_box = &ctx.boxes[node];
    let pb = layout_box.border.horizontal() + layout_box.padding.horizontal();
    let width = match style.width.resolve(Some(containing_width)) {
        Some(width) => to_border_box(style, width, pb),
        None if layout_box.kind == BoxKind::Table => table::auto_width(ctx, node, available - pb) + pb,
        None if shrinks_to_fit(layout_box) => {
            layout_box.flow.content_sizes.shrink_to_fit(available - pb) + pb
        },
        None => available,
    };
    constrain_width(ctx, node, containing_width, width)
}

fn to_border_box(style: &ResolvedStyle, size: Au, pb: Au) -> Au {
    match style.box_sizing {
        BoxSizing::ContentBox => size + pb,
        BoxSizing::BorderBox => size.max(pb),
    }
}

/// Apply `min-width` and `max-width` to a border box width.
pub(crate) fn constrain_width(ctx: &ReflowContext, node: NodeId, containing_width: Au, width: Au) -> Au {
    let style = ctx.style(node);
    let layout_box = &ctx.boxes[node];
    let pb = layout_box.border.horizontal() + layout_box.padding.horizontal();
    let containing = Some(containing_width);
    let max = style
        .max_width
        .resolve(containing)
        .map(|max| to_border_box(style, max, pb))
        .unwrap_or(MAX_AU);
    let min = style
        .min_width
        .resolve(containing)
        .map(|min| to_border_box(style, min, pb))
        .unwrap_or_else(Au::zero);
    width.min(max).max(min).max(pb)
}

/// Height of the content box when it is fixed by style.
pub(crate) fn definite_height(ctx: &ReflowContext, node: NodeId, containing_height: Option<Au>) -> Option<Au> {
    let style = ctx.style(node);
    let layout_box = &ctx.boxes[node];
    let pb = layout_box.border.vertical() + layout_box.padding.vertical();
    style
        .height
        .resolve(containing_height)
        .map(|height| match style.box_sizing {
            BoxSizing::ContentBox => height,
            BoxSizing::BorderBox => (height - pb).max(Au::zero()),
        })
}

fn clamp_content_height(style: &ResolvedStyle, height: Au, pb: Au, containing_height: Option<Au>) -> Au {
    let to_content_box = |size: Au| match style.box_sizing {
        BoxSizing::ContentBox => size,
        BoxSizing::BorderBox => (size - pb).max(Au::zero()),
    };
    let max = style
        .max_height
        .resolve(containing_height)
        .map(to_content_box)
        .unwrap_or(MAX_AU);
    let min = style
        .min_height
        .resolve(containing_height)
        .map(to_content_box)
        .unwrap_or_else(Au::zero);
    height.min(max).max(min).max(Au::zero())
}

/// Whether a partial pass has to reach an element inside `node`.
pub(crate) fn contains_stop_target(ctx: &ReflowContext, node: NodeId) -> bool {
    ctx.pass
        .stop_before
        .is_some_and(|target| ctx.document.is_inclusive_ancestor(node, target))
}

/// Give `node` a scratch record and put it where its container wants it.
pub(crate) fn start_box(ctx: &mut ReflowContext, node: NodeId, placement: Placement) -> Result<(), ReflowError> {
    ctx.allocation_point()?;
    let document = ctx.document;
    let style = ctx.style(node);
    let dirty = document.dirty(node);
    let layout_box = &mut ctx.boxes[node];

    let before = BoxSnapshot {
        existed: layout_box.flow.laid_out_in_pass != 0,
        dirty,
        x: layout_box.x,
        y: layout_box.y,
        width: layout_box.width,
        height: layout_box.height,
        bounding_box: layout_box.bounding_box,
    };
    let is_formatting_context_root = layout_box.is(BoxCapabilities::FORMATTING_CONTEXT_ROOT);
    let mut state = if is_formatting_context_root {
        ReflowState::new(before, node)
    } else {
        let mut state = ReflowState::new(before, placement.bfc_root);
        state.bfc_x = placement.bfc_x;
        state.bfc_y = placement.bfc_y;
        state
    };

    let border = layout_box.border;
    let padding = layout_box.padding;
    state.next_child = document.children(node).first().copied();
    state.content_x = border.left + padding.left;
    state.content_top = border.top + padding.top;
    state.content_y = state.content_top;
    state.content_width = (placement.width - border.horizontal() - padding.horizontal()).max(Au::zero());
    state.definite_height = placement.definite_height;

    let collapses_with_children = layout_box.kind == BoxKind::Block && !is_formatting_context_root;
    state.collapse_top_with_children =
        collapses_with_children && border.top == Au::zero() && padding.top == Au::zero();
    state.collapse_bottom_with_children = collapses_with_children &&
        border.bottom == Au::zero() &&
        padding.bottom == Au::zero() &&
        style.height.is_auto() &&
        style.min_height.is_auto();
    state.ignore_default_margins = layout_box.kind == BoxKind::TableCell;
    state.lines.on_first_line = style.first_line_height.is_some();

    layout_box.x = placement.x;
    layout_box.y = placement.y;
    layout_box.width = placement.width;
    layout_box.flow.containing_width = placement.containing_width;
    if let Some(registry) = layout_box.float_registry.as_mut() {
        registry.restart(document)?;
    }
    if let Some(stacking) = layout_box.stacking.as_mut() {
        stacking.restart();
    }
    layout_box.reflow_state = Some(state);
    trace!("Laying out {:?} at {:?}", node, (placement.x, placement.y));
    Ok(())
}

/// The root box is sized by the viewport. Returns whether the root
/// generates a box at all.
pub(crate) fn start_root(ctx: &mut ReflowContext) -> Result<bool, ReflowError> {
    let document = ctx.document;
    let root = document.root();
    let Some(kind) = BoxKind::for_element(document, root) else {
        remove_boxes(ctx, root)?;
        document.mark_clean(root);
        return Ok(false);
    };
    let capabilities = BoxCapabilities::for_element(document, root, kind);
    let stale = ctx
        .boxes
        .get(root)
        .is_some_and(|layout_box| document.dirty(root).needs_rebuild() || layout_box.capabilities != capabilities);
    if stale {
        remove_boxes(ctx, root)?;
    }
    if !ctx.boxes.contains(root) {
        ctx.allocation_point()?;
        ctx.boxes.insert(root, LayoutBox::new(kind, capabilities))?;
    }

    let (viewport_width, viewport_height) = ctx.options.viewport_size();
    resolve_edges(ctx, root, viewport_width);
    let margin = ctx.boxes[root].margin;
    let width = border_box_width(ctx, root, viewport_width, viewport_width - margin.horizontal());
    let definite_height = definite_height(ctx, root, Some(viewport_height));
    start_box(
        ctx,
        root,
        Placement {
            x: margin.left,
            y: margin.top,
            width,
            containing_width: viewport_width,
            bfc_root: root,
            bfc_x: Au::zero(),
            bfc_y: Au::zero(),
            definite_height,
        },
    )?;
    Ok(true)
}

fn own_margins(style: &ResolvedStyle, containing_width: Au) -> BlockMargins {
    BlockMargins {
        top: style.margin.top.collapsible(containing_width),
        bottom: style.margin.bottom.collapsible(containing_width),
    }
}

/// Offset of a relatively positioned box from its place in the flow.
fn relative_offset(style: &ResolvedStyle, containing_width: Au, containing_height: Option<Au>) -> (Au, Au) {
    if style.position != Position::Relative {
        return (Au::zero(), Au::zero());
    }
    let width = Some(containing_width);
    let dx = match (style.inset.left.resolve(width), style.inset.right.resolve(width)) {
        (Some(left), _) => left,
        (None, Some(right)) => -right,
        (None, None) => Au::zero(),
    };
    let dy = match (
        style.inset.top.resolve(containing_height),
        style.inset.bottom.resolve(containing_height),
    ) {
        (Some(top), _) => top,
        (None, Some(bottom)) => -bottom,
        (None, None) => Au::zero(),
    };
    (dx, dy)
}

/// Position a block-level child below the content placed so far and decide
/// whether its previous layout can be kept.
fn place_block_child(ctx: &mut ReflowContext, parent: NodeId, child: NodeId) -> Result<ChildStart, ReflowError> {
    inline::close_line(ctx, parent);
    inline::commit_run(ctx, parent);

    let document = ctx.document;
    let style = ctx.style(child);
    let (containing_width, content_x, containing_height) = {
        let state = ctx.boxes.state(parent);
        (state.content_width, state.content_x, state.definite_height)
    };
    resolve_edges(ctx, child, containing_width);
    let margin = ctx.boxes[child].margin;
    let mut width = border_box_width(ctx, child, containing_width, containing_width - margin.horizontal());
    let mut x = content_x + margin.left;
    if !style.width.is_auto() && style.margin.left.value.is_auto() && style.margin.right.value.is_auto() {
        x = content_x + ((containing_width - width) / 2).max(Au::zero());
    }

    let dirty = document.dirty(child);
    let reuse_candidate = ctx.boxes[child].flow.laid_out_in_pass != 0 && !dirty.is_dirty();

    // Collapse the child's top margin with whatever is pending above it.
    let (mut accumulated, ignore_default) = {
        let state = ctx.boxes.state(parent);
        (
            state.pending_margin,
            state.ignore_default_margins && !state.has_in_flow_content,
        )
    };
    let own_top = if reuse_candidate {
        ctx.boxes[child].flow.collapsed_top
    } else {
        let mut own_top = VerticalMargin::default();
        own_top.collapse_with_top_margin(&own_margins(style, containing_width), ignore_default);
        own_top
    };
    accumulated.collapse(&own_top);

    let (bfc_root, parent_bfc_y) = {
        let state = ctx.boxes.state(parent);
        (state.bfc_root, state.bfc_y)
    };
    let clearance = Clear::from(style.clear);
    let float_bottom = ctx
        .boxes
        .registry(bfc_root)
        .and_then(|registry| registry.find_lowest_bottom(clearance))
        .map(|bottom| bottom.saturating_sub(parent_bfc_y));
    let (collapse_top, has_content, content_y) = {
        let state = ctx.boxes.state(parent);
        (
            state.collapse_top_with_children,
            state.has_in_flow_content,
            state.content_y,
        )
    };
    let hypothetical_y = content_y + accumulated.resolved_height();

    let (mut y, collapsed_into_parent) = match float_bottom {
        Some(bottom) if bottom > hypothetical_y => {
            trace!("{:?} clears floats down to {:?}", child, bottom);
            (bottom, false)
        },
        _ if collapse_top && !has_content => {
            collapse_into_top(ctx, parent, &accumulated)?;
            (content_y, true)
        },
        _ => (hypothetical_y, false),
    };
    ctx.boxes.state_mut(parent).pending_margin.reset();

    let (parent_bfc_x, parent_bfc_y) = {
        let state = ctx.boxes.state(parent);
        (state.bfc_x, state.bfc_y)
    };

    // A new formatting context does not overlap floats.
    let child_box = &ctx.boxes[child];
    if child_box.is(BoxCapabilities::FORMATTING_CONTEXT_ROOT) {
        if let Some(registry) = ctx.boxes.registry(bfc_root).filter(|registry| !registry.floats().is_empty()) {
            let pb = child_box.border.horizontal() + child_box.padding.horizontal();
            let min_width = match style.width.is_auto() {
                true => child_box.flow.content_sizes.min_content + pb + margin.horizontal(),
                false => width + margin.horizontal(),
            };
            let mut band_y = parent_bfc_y + y;
            let mut band_x = parent_bfc_x + content_x;
            let mut band_width = containing_width;
            registry.get_space(
                &mut band_y,
                &mut band_x,
                &mut band_width,
                min_width,
                child_box.height,
                EdgeLock::Unlocked,
            );
            y = band_y - parent_bfc_y;
            x = band_x - parent_bfc_x + margin.left;
            if style.width.is_auto() && child_box.kind != BoxKind::Table {
                width = (band_width - margin.horizontal()).max(pb);
            }
        }
    }

    let bfc_x = parent_bfc_x + x;
    let bfc_y = parent_bfc_y + y;
    let list_number = if ctx.boxes[child].is(BoxCapabilities::LIST_ITEM) {
        let state = ctx.boxes.state_mut(parent);
        state.list_counter += 1;
        Some(state.list_counter)
    } else {
        None
    };

    let registry = ctx.boxes.registry(bfc_root);
    let full_bfc_reflow = registry.is_some_and(|registry| registry.is_full_bfc_reflow());
    let has_floats = registry.is_some_and(|registry| !registry.floats().is_empty() || registry.has_pending_floats());
    let child_box = &ctx.boxes[child];
    let moved = child_box.flow.bfc_x != bfc_x || child_box.flow.bfc_y != bfc_y;
    let reuse = reuse_candidate &&
        child_box.width == width &&
        child_box.flow.containing_width == containing_width &&
        !full_bfc_reflow &&
        !ctx.options.paged &&
        child_box.flow.list_number == list_number &&
        !(moved && (child_box.flow.has_descendant_floats || has_floats)) &&
        !contains_stop_target(ctx, child);

    let child_box = &mut ctx.boxes[child];
    child_box.flow.bfc_x = bfc_x;
    child_box.flow.bfc_y = bfc_y;
    child_box.flow.incoming_margin = accumulated;
    child_box.flow.list_number = list_number;

    if reuse {
        trace!("Reusing {:?}", child);
        let (dx, dy) = child_box.flow.relative_offset;
        let moved_in_parent = child_box.x != x + dx || child_box.y != y + dy;
        child_box.x = x + dx;
        child_box.y = y + dy;
        if moved_in_parent {
            ctx.note_damaged(child)?;
        }
        skip_branch(ctx, Some(bfc_root), child)?;
        propagate(ctx, child)?;
        return Ok(ChildStart::Done);
    }

    let definite_height = definite_height(ctx, child, containing_height);
    start_box(
        ctx,
        child,
        Placement {
            x,
            y,
            width,
            containing_width,
            bfc_root,
            bfc_x,
            bfc_y,
            definite_height,
        },
    )?;
    let state = ctx.boxes.state_mut(child);
    state.top_margin = accumulated;
    state.own_top_margin = own_top;
    state.top_collapsed_into_parent = collapsed_into_parent;
    if ctx.boxes[child].kind == BoxKind::Table {
        table::begin_table(ctx, child);
    }
    Ok(ChildStart::Started)
}

/// Fold `margin` into the top margin of `node`, which has no in-flow
/// content yet, climbing through the ancestors it already collapsed with.
/// The topmost box whose margin grew moves down, together with the floats
/// placed inside it.
pub(crate) fn collapse_into_top(ctx: &mut ReflowContext, node: NodeId, margin: &VerticalMargin) -> Result<(), ReflowError> {
    let document = ctx.document;
    let mut top = node;
    let shift = loop {
        let state = ctx.boxes.state_mut(top);
        state.own_top_margin.collapse(margin);
        let old = state.top_margin.resolved_height();
        state.top_margin.collapse(margin);
        let shift = state.top_margin.resolved_height() - old;
        if !state.top_collapsed_into_parent {
            break shift;
        }
        match document.parent(top) {
            Some(parent) if ctx.boxes.has_state(parent) => top = parent,
            _ => break shift,
        }
    };
    if shift == Au::zero() {
        return Ok(());
    }

    trace!("Collapsing margin moves {:?} by {:?}", top, shift);
    ctx.boxes[top].y += shift;
    let mut current = node;
    loop {
        ctx.boxes[current].flow.bfc_y += shift;
        ctx.boxes.state_mut(current).bfc_y += shift;
        if current == top {
            break;
        }
        match document.parent(current) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    let bfc_root = ctx.boxes.state(top).bfc_root;
    if let Some(registry) = ctx.boxes.registry_mut(bfc_root) {
        registry.translate_floats_in(document, top, shift);
    }
    Ok(())
}

/// Bring a subtree that is reused without layout back into the bookkeeping
/// of this pass: its floats into the float registry, its positioned boxes
/// into their stacking contexts, and its absolutely positioned boxes with an
/// outside containing block into that block's queue.
pub(crate) fn skip_branch(ctx: &mut ReflowContext, bfc_root: Option<NodeId>, node: NodeId) -> Result<(), ReflowError> {
    let document = ctx.document;
    if let Some(registry) = bfc_root.and_then(|root| ctx.boxes.registry_mut(root)) {
        registry.skip_element(document, node)?;
    }

    let mut stack = Vec::new();
    stack.try_reserve(8)?;
    stack.push(node);
    while let Some(current) = stack.pop() {
        let Some(layout_box) = ctx.boxes.get(current) else {
            continue;
        };
        let capabilities = layout_box.capabilities;
        let static_position = layout_box.flow.static_position;
        if current != node && capabilities.contains(BoxCapabilities::ABSOLUTELY_POSITIONED) {
            let containing_block = positioned::containing_block(ctx, current);
            if let (true, Some(static_position)) = (ctx.boxes.has_state(containing_block), static_position) {
                positioned::push_pending(ctx, containing_block, current, static_position)?;
            }
        }
        if capabilities.contains(BoxCapabilities::POSITIONED) {
            register_stacking(ctx, current)?;
        }
        let children = document.children(current);
        stack.try_reserve(children.len())?;
        stack.extend(children.iter().rev().copied());
    }
    Ok(())
}

/// Enter a positioned box into the nearest enclosing stacking context that
/// is being rebuilt in this pass.
fn register_stacking(ctx: &mut ReflowContext, node: NodeId) -> Result<(), ReflowError> {
    let document = ctx.document;
    let z_index = document.style(node).z_index.unwrap_or(0);
    for ancestor in document.ancestors(node) {
        let Some(stacking) = ctx.boxes.get(ancestor).and_then(|layout_box| layout_box.stacking.as_ref()) else {
            continue;
        };
        if stacking.is_in_reflow() {
            ctx.allocation_point()?;
            if let Some(stacking) = ctx.boxes[ancestor].stacking.as_mut() {
                stacking.register(node, z_index)?;
            }
        }
        return Ok(());
    }
    Ok(())
}

fn begin_float(ctx: &mut ReflowContext, parent: NodeId, child: NodeId) -> Result<ChildStart, ReflowError> {
    let frame = frame_of(ctx, parent);
    let (containing_width, content_x, bfc_root, frame_bfc_x, frame_bfc_y, static_y, containing_height) = {
        let state = ctx.boxes.state(frame);
        let lines = &state.lines;
        // A float met in the middle of a line goes below that line.
        let static_y = match (lines.active, lines.items) {
            (true, 0) => lines.y,
            (true, _) => lines.y + lines.height,
            (false, _) => state.content_y + state.pending_margin.resolved_height(),
        };
        (
            state.content_width,
            state.content_x,
            state.bfc_root,
            state.bfc_x,
            state.bfc_y,
            static_y,
            state.definite_height,
        )
    };
    resolve_edges(ctx, child, containing_width);
    let margin = ctx.boxes[child].margin;
    let width = border_box_width(ctx, child, containing_width, containing_width - margin.horizontal());
    let static_bfc_x = frame_bfc_x + content_x;
    let static_bfc_y = frame_bfc_y + static_y;

    let document = ctx.document;
    let registry = ctx.boxes.registry(bfc_root);
    let full_bfc_reflow = registry.is_some_and(|registry| registry.is_full_bfc_reflow());
    let child_box = &ctx.boxes[child];
    let reuse = child_box.flow.laid_out_in_pass != 0 &&
        !document.dirty(child).is_dirty() &&
        child_box.width == width &&
        child_box.flow.containing_width == containing_width &&
        child_box.flow.bfc_x == static_bfc_x &&
        child_box.flow.bfc_y == static_bfc_y &&
        !full_bfc_reflow &&
        !ctx.options.paged &&
        !contains_stop_target(ctx, child);

    if reuse {
        trace!("Reusing float {:?}", child);
        skip_branch(ctx, Some(bfc_root), child)?;
        let entry = ctx
            .boxes
            .registry(bfc_root)
            .and_then(|registry| registry.entry(child))
            .map(|entry| (entry.x, entry.y));
        if let Some((entry_x, entry_y)) = entry {
            let child_box = &mut ctx.boxes[child];
            child_box.x = entry_x - frame_bfc_x + margin.left;
            child_box.y = entry_y - frame_bfc_y + margin.top;
        }
        propagate(ctx, child)?;
        return Ok(ChildStart::Done);
    }

    let child_box = &mut ctx.boxes[child];
    child_box.flow.bfc_x = static_bfc_x;
    child_box.flow.bfc_y = static_bfc_y;
    let definite_height = definite_height(ctx, child, containing_height);
    start_box(
        ctx,
        child,
        Placement {
            x: Au::zero(),
            y: Au::zero(),
            width,
            containing_width,
            bfc_root,
            bfc_x: static_bfc_x,
            bfc_y: static_bfc_y,
            definite_height,
        },
    )?;
    ctx.boxes.state_mut(child).float_static_y = static_bfc_y;
    Ok(ChildStart::Started)
}

/// Place a float whose size is now known and enter it into the float
/// registry of its formatting context.
fn place_float(ctx: &mut ReflowContext, node: NodeId) -> Result<(), ReflowError> {
    let document = ctx.document;
    let style = ctx.style(node);
    let Some(parent) = document.parent(node) else {
        return Ok(());
    };
    let frame = frame_of(ctx, parent);
    let (bfc_root, cb_x, cb_width, frame_bfc_x, frame_bfc_y) = {
        let state = ctx.boxes.state(frame);
        (
            state.bfc_root,
            state.bfc_x + state.content_x,
            state.content_width,
            state.bfc_x,
            state.bfc_y,
        )
    };
    let static_y = ctx.boxes.state(node).float_static_y;
    let max_width = ctx.boxes.state(node).content_sizes.max_content;
    let Some(side) = FloatSide::from_style(style.float) else {
        return Ok(());
    };

    let layout_box = &ctx.boxes[node];
    let margin = layout_box.margin;
    let pb = layout_box.border.horizontal() + layout_box.padding.horizontal();
    let info = PlacementInfo {
        width: layout_box.width + margin.horizontal(),
        height: layout_box.height + margin.vertical(),
        side,
        clear: Clear::from(style.clear),
    };
    let Some(registry) = ctx.boxes.registry(bfc_root) else {
        return Ok(());
    };
    let (x, y) = registry.place_float(&info, static_y, cb_x, cb_width);
    let min_y = registry.place_float_min(info.clear, static_y);

    let mut entry = FloatEntry::new(node, side, x, y, info.width, info.height);
    entry.min_y = min_y;
    entry.max_width = match style.width.is_auto() {
        true => max_width + pb + margin.horizontal(),
        false => info.width,
    };
    trace!("Placing float {:?} at {:?}", node, (x, y));
    ctx.allocation_point()?;
    if let Some(registry) = ctx.boxes.registry_mut(bfc_root) {
        registry.add_float(document, entry)?;
    }

    let layout_box = &mut ctx.boxes[node];
    layout_box.x = x - frame_bfc_x + margin.left;
    layout_box.y = y - frame_bfc_y + margin.top;
    Ok(())
}

/// The second phase: compute the final geometry of a finished box and
/// hand its results to its container.
pub(crate) fn finish(ctx: &mut ReflowContext, node: NodeId) -> Result<LayoutStatus, ReflowError> {
    match ctx.boxes[node].kind {
        BoxKind::Text => inline::finish_text(ctx, node)?,
        BoxKind::Inline => inline::finish_inline(ctx, node)?,
        _ => finish_container(ctx, node)?,
    }
    Ok(LayoutStatus::Continue)
}

fn finish_container(ctx: &mut ReflowContext, node: NodeId) -> Result<(), ReflowError> {
    inline::close_line(ctx, node);
    inline::commit_run(ctx, node);

    let document = ctx.document;
    let style = ctx.style(node);
    let containing_width = ctx.boxes[node].flow.containing_width;
    let containing_height = match document.parent(node) {
        Some(parent) if ctx.boxes.has_state(parent) => ctx.boxes.state(parent).definite_height,
        _ => None,
    };

    // Height.
    let layout_box = &ctx.boxes[node];
    let kind = layout_box.kind;
    let capabilities = layout_box.capabilities;
    let pb = layout_box.border.vertical() + layout_box.padding.vertical();
    let state = ctx.boxes.state(node);
    let mut content_bottom = state.content_y;
    let trailing_margin_inside = !state.collapse_bottom_with_children &&
        (state.has_in_flow_content || !state.collapse_top_with_children);
    if trailing_margin_inside {
        content_bottom += state.pending_margin.resolved_height();
    }
    if let Some(ref row) = state.row {
        content_bottom = state.content_top + row.height;
    }
    if let Some(lowest) = layout_box
        .float_registry
        .as_ref()
        .and_then(|registry| registry.find_lowest_bottom(Clear::Both))
    {
        content_bottom = content_bottom.max(lowest);
    }
    let content_height = state
        .definite_height
        .unwrap_or((content_bottom - state.content_top).max(Au::zero()));
    let height = clamp_content_height(style, content_height, pb, containing_height) + pb;

    // Margins leaving through the bottom.
    let mut collapsed_bottom = VerticalMargin::default();
    collapsed_bottom.collapse_with_bottom_margin(&own_margins(style, containing_width), false);
    let collapses_through = state.collapse_top_with_children &&
        state.collapse_bottom_with_children &&
        !state.has_in_flow_content &&
        height == Au::zero();
    if collapses_through || (state.collapse_bottom_with_children && state.has_in_flow_content) {
        collapsed_bottom.collapse(&state.pending_margin);
    }

    let layout_box = &mut ctx.boxes[node];
    layout_box.height = height;
    layout_box.flow.collapsed_bottom = collapsed_bottom;
    layout_box.flow.collapses_through = collapses_through;
    layout_box.flow.natural_height = height;

    // Kind-specific placement.
    if capabilities.contains(BoxCapabilities::FLOATING) {
        place_float(ctx, node)?;
    } else if capabilities.contains(BoxCapabilities::ATOMIC_INLINE) {
        inline::place_atomic(ctx, node)?;
    } else if capabilities.contains(BoxCapabilities::ABSOLUTELY_POSITIONED) {
        positioned::place(ctx, node);
    }
    if kind == BoxKind::TableRow {
        table::stretch_cells(ctx, node);
    }
    let offset = match capabilities.contains(BoxCapabilities::BLOCK_LEVEL) {
        true => relative_offset(style, containing_width, containing_height),
        false => (Au::zero(), Au::zero()),
    };
    let layout_box = &mut ctx.boxes[node];
    layout_box.x += offset.0;
    layout_box.y += offset.1;
    layout_box.flow.relative_offset = offset;

    positioned::layout_pending(ctx, node)?;

    // Overflow.
    let layout_box = &ctx.boxes[node];
    let (width, height) = (layout_box.width, layout_box.height);
    let state = ctx.boxes.state(node);
    let mut bounding_box = RelativeBoundingBox::default();
    bounding_box.union_with(&state.children_bounds, width, height, false);
    bounding_box.union_with(&state.positioned_bounds, width, height, false);
    if style.overflow != Overflow::Visible {
        bounding_box.clip_painted();
    }
    bounding_box.union_with(&state.fixed_bounds, width, height, true);

    if kind == BoxKind::Table {
        table::finish_table(ctx, node)?;
    }

    let layout_box = &mut ctx.boxes[node];
    layout_box.bounding_box = bounding_box;
    if let Some(registry) = layout_box.float_registry.as_mut() {
        registry.finish_layout();
    }
    if let Some(stacking) = layout_box.stacking.as_mut() {
        stacking.finish(document);
    }
    complete(ctx, node)
}

/// Width range of the margin box, as the container sees it.
pub(crate) fn outer_sizes(style: &ResolvedStyle, layout_box: &LayoutBox, content: ContentSizes) -> ContentSizes {
    let pb = layout_box.border.horizontal() + layout_box.padding.horizontal();
    let mut sizes = match style.width.resolve(None) {
        Some(width) => ContentSizes::exact(to_border_box(style, width, pb)),
        None => content.add(pb),
    };
    if let Some(max) = style.max_width.resolve(None) {
        let max = to_border_box(style, max, pb);
        sizes.min_content = sizes.min_content.min(max);
        sizes.max_content = sizes.max_content.min(max);
    }
    if let Some(min) = style.min_width.resolve(None) {
        sizes.max_assign(ContentSizes::exact(to_border_box(style, min, pb)));
    }
    sizes.add(style.nonpercent_horizontal_margin())
}

/// Common tail of every finish: report damage, remember what the next pass
/// needs, and hand the box's contribution to its container.
pub(crate) fn complete(ctx: &mut ReflowContext, node: NodeId) -> Result<(), ReflowError> {
    let document = ctx.document;
    let style = ctx.style(node);
    let pass_id = ctx.pass.pass_id;
    let layout_box = &mut ctx.boxes[node];
    let Some(state) = layout_box.reflow_state.take() else {
        return Ok(());
    };

    let damaged = !state.before.existed ||
        state.before.geometry_differs(
            layout_box.x,
            layout_box.y,
            layout_box.width,
            layout_box.height,
            &layout_box.bounding_box,
        ) ||
        (layout_box.kind == BoxKind::Text && state.before.dirty.is_dirty());
    let sizes_changed = layout_box.flow.content_sizes != state.content_sizes;
    let needs_another_pass = style.width.is_auto() && shrinks_to_fit(layout_box) && sizes_changed;
    let is_formatting_context_root = layout_box.is(BoxCapabilities::FORMATTING_CONTEXT_ROOT);
    let positioned = layout_box.is(BoxCapabilities::POSITIONED);

    let outer = outer_sizes(style, layout_box, state.content_sizes);
    let flow = &mut layout_box.flow;
    flow.laid_out_in_pass = pass_id;
    flow.content_sizes = state.content_sizes;
    flow.outer_sizes = outer;
    flow.collapsed_top = state.own_top_margin;
    flow.has_descendant_floats = state.has_descendant_floats && !is_formatting_context_root;

    if damaged {
        ctx.note_damaged(node)?;
    }
    if needs_another_pass {
        ctx.request_another_pass(node)?;
    }
    if positioned {
        register_stacking(ctx, node)?;
    }
    propagate(ctx, node)?;
    document.mark_clean(node);
    Ok(())
}

/// Hand a finished or reused child's results to its container.
pub(crate) fn propagate(ctx: &mut ReflowContext, child: NodeId) -> Result<(), ReflowError> {
    let Some(parent) = ctx.document.parent(child) else {
        return Ok(());
    };
    if !ctx.boxes.has_state(parent) {
        return Ok(());
    }
    let child_box = &ctx.boxes[child];
    let kind = child_box.kind;
    let capabilities = child_box.capabilities;
    if capabilities.contains(BoxCapabilities::ABSOLUTELY_POSITIONED) {
        // The containing block collects it.
        return Ok(());
    }
    if ctx.boxes[parent].kind == BoxKind::TableRow {
        return table::after_cell(ctx, parent, child);
    }
    if matches!(kind, BoxKind::TableRowGroup | BoxKind::TableRow) {
        table::after_row_like(ctx, parent, child);
        return Ok(());
    }
    if capabilities.contains(BoxCapabilities::FLOATING) {
        after_float(ctx, parent, child);
        return Ok(());
    }
    if capabilities.contains(BoxCapabilities::INLINE_LEVEL) {
        inline::after_inline_level(ctx, parent, child);
        return Ok(());
    }
    after_block_child(ctx, parent, child);
    Ok(())
}

/// Overflow of `node` in the frame of its parent.
pub(crate) fn bounds_in_parent(layout_box: &LayoutBox) -> AbsoluteBoundingBox {
    let mut bounds = AbsoluteBoundingBox::from_relative(&layout_box.bounding_box, layout_box.width, layout_box.height);
    bounds.translate(layout_box.x, layout_box.y);
    bounds
}

fn after_block_child(ctx: &mut ReflowContext, parent: NodeId, child: NodeId) {
    let child_box = &ctx.boxes[child];
    let (_, flow_y) = child_box.flow_position();
    let bottom = flow_y + child_box.height;
    let bounds = bounds_in_parent(child_box);
    let flow = &child_box.flow;
    let collapses_through = flow.collapses_through;
    let incoming = flow.incoming_margin;
    let collapsed_bottom = flow.collapsed_bottom;
    let has_floats = flow.has_descendant_floats;
    let mut outer = flow.outer_sizes;
    let mut min_y = flow.bfc_y;
    let min_height = child_box.height;

    let bfc_root = ctx.boxes.state(parent).bfc_root;
    if let Some(registry) = ctx.boxes.registry(bfc_root) {
        let (left, right) =
            registry.get_floats_max_width(&mut min_y, min_height, outer.max_content, Au::zero(), Au::zero(), MAX_AU);
        outer.max_content += left + right;
    }

    let state = ctx.boxes.state_mut(parent);
    if collapses_through {
        let mut pending = incoming;
        pending.collapse(&collapsed_bottom);
        state.pending_margin = pending;
    } else {
        state.content_y = bottom;
        state.pending_margin = collapsed_bottom;
        state.has_in_flow_content = true;
    }
    state.content_sizes.max_assign(outer);
    state.children_bounds.union_with(&bounds);
    state.has_descendant_floats |= has_floats;
}

fn after_float(ctx: &mut ReflowContext, parent: NodeId, child: NodeId) {
    let frame = frame_of(ctx, parent);
    let child_box = &ctx.boxes[child];
    let bounds = bounds_in_parent(child_box);
    let outer = child_box.flow.outer_sizes;

    let state = ctx.boxes.state_mut(parent);
    state.children_bounds.union_with(&bounds);
    let state = ctx.boxes.state_mut(frame);
    state.has_descendant_floats = true;
    state.content_sizes.max_assign(outer);
    inline::refresh_line(ctx, frame);
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Float layout.
//!
//! Every box that establishes a block formatting context owns a
//! [`FloatRegistry`]: the floats placed in that context, in document order,
//! with coordinates relative to the context root. Content that comes later
//! in the document asks the registry for space with
//! [`FloatRegistry::get_space`].
//!
//! A pass does not rebuild the registry from scratch. [`FloatRegistry::restart`]
//! moves every known float to a pending list; floats move back when they are
//! laid out again ([`FloatRegistry::add_float`]) or when the subtree holding
//! them is reused verbatim ([`FloatRegistry::skip_element`]). At any point
//! of a pass the registered floats are therefore exactly those that precede
//! the content being laid out.
//!
//! See CSS 2.1 § 9.5.1: <https://www.w3.org/TR/CSS2/visuren.html#float-position>

use std::cell::Cell;
use std::cmp::Ordering;

use app_units::{Au, MAX_AU, MIN_AU};
use euclid::num::Zero;
use log::trace;

use crate::ReflowError;
use crate::dom::{Document, NodeId};
use crate::geom::AuExt;
use crate::style::{Clear as StyleClear, Float as StyleFloat};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FloatSide {
    Left,
    Right,
}

impl FloatSide {
    pub fn from_style(float: StyleFloat) -> Option<FloatSide> {
        match float {
            StyleFloat::None => None,
            StyleFloat::Left => Some(FloatSide::Left),
            StyleFloat::Right => Some(FloatSide::Right),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Clear {
    #[default]
    None,
    Left,
    Right,
    Both,
}

impl From<StyleClear> for Clear {
    fn from(clear: StyleClear) -> Self {
        match clear {
            StyleClear::None => Clear::None,
            StyleClear::Left => Clear::Left,
            StyleClear::Right => Clear::Right,
            StyleClear::Both => Clear::Both,
        }
    }
}

/// Which edges of a band [`FloatRegistry::get_space`] may move.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum EdgeLock {
    /// Floats narrow the band from either side and push it down when it
    /// gets too narrow.
    #[default]
    Unlocked,
    /// The left edge stays put; a left float reaching past it pushes the
    /// band down.
    LeftFixed,
    /// The right edge stays put; a right float reaching past it pushes the
    /// band down.
    RightFixed,
    /// The band never moves down. Floats still narrow it, possibly to zero.
    WidthIrrelevant,
}

/// Running totals over a float and every float before it in the registry.
#[derive(Clone, Copy, Debug, PartialEq)]
struct FloatCache {
    left_bottom: Au,
    right_bottom: Au,
    left_min_bottom: Au,
    right_min_bottom: Au,
    highest_left_accumulated_max_width: Au,
    highest_right_accumulated_max_width: Au,
}

impl Default for FloatCache {
    fn default() -> Self {
        FloatCache {
            left_bottom: MIN_AU,
            right_bottom: MIN_AU,
            left_min_bottom: MIN_AU,
            right_min_bottom: MIN_AU,
            highest_left_accumulated_max_width: Au::zero(),
            highest_right_accumulated_max_width: Au::zero(),
        }
    }
}

impl FloatCache {
    fn including(mut self, entry: &FloatEntry) -> Self {
        let accumulated = entry.accumulated_max_width();
        match entry.side {
            FloatSide::Left => {
                self.left_bottom = self.left_bottom.max(entry.bottom());
                self.left_min_bottom = self.left_min_bottom.max(entry.min_bottom());
                self.highest_left_accumulated_max_width =
                    self.highest_left_accumulated_max_width.max(accumulated);
            },
            FloatSide::Right => {
                self.right_bottom = self.right_bottom.max(entry.bottom());
                self.right_min_bottom = self.right_min_bottom.max(entry.min_bottom());
                self.highest_right_accumulated_max_width =
                    self.highest_right_accumulated_max_width.max(accumulated);
            },
        }
        self
    }
}

/// A float as its formatting context sees it. The entry refers to the
/// float's box through its element; the box itself lives in the box tree.
#[derive(Clone, Debug)]
pub struct FloatEntry {
    pub node: NodeId,
    pub side: FloatSide,
    /// The margin box, relative to the formatting context root.
    pub x: Au,
    pub y: Au,
    pub width: Au,
    pub height: Au,
    /// Vertical position and height the float would have if every line
    /// before and inside it got its maximum width.
    pub min_y: Au,
    pub min_height: Au,
    /// Max-content width of the margin box.
    pub max_width: Au,
    /// Largest accumulated max width of earlier floats on the same side
    /// that this float would sit next to.
    pub prev_accumulated_max_width: Au,
    cache: Cell<FloatCache>,
}

impl FloatEntry {
    pub fn new(node: NodeId, side: FloatSide, x: Au, y: Au, width: Au, height: Au) -> Self {
        // Negative margins can make the margin box negative; such a float
        // takes up no space.
        let width = width.max(Au::zero());
        let height = height.max(Au::zero());
        FloatEntry {
            node,
            side,
            x,
            y,
            width,
            height,
            min_y: y,
            min_height: height,
            max_width: width,
            prev_accumulated_max_width: Au::zero(),
            cache: Cell::new(FloatCache::default()),
        }
    }

    pub fn bottom(&self) -> Au {
        self.y.saturating_add(self.height)
    }

    pub fn min_bottom(&self) -> Au {
        self.min_y.saturating_add(self.min_height)
    }

    pub fn right(&self) -> Au {
        self.x.saturating_add(self.width)
    }

    pub fn accumulated_max_width(&self) -> Au {
        self.prev_accumulated_max_width.saturating_add(self.max_width)
    }

    fn overlaps(&self, y: Au, height: Au) -> bool {
        vertical_overlap(self.y, self.bottom(), y, height)
    }

    fn overlaps_min(&self, min_y: Au, min_height: Au) -> bool {
        vertical_overlap(self.min_y, self.min_bottom(), min_y, min_height)
    }

    fn same_placement(&self, other: &FloatEntry) -> bool {
        self.side == other.side &&
            self.x == other.x &&
            self.y == other.y &&
            self.width == other.width &&
            self.height == other.height
    }
}

/// Whether `[top, bottom)` intersects the band starting at `y`. A band of
/// zero height is the single line at `y`.
fn vertical_overlap(top: Au, bottom: Au, y: Au, height: Au) -> bool {
    if bottom <= top {
        return false;
    }
    if height <= Au::zero() {
        return top <= y && y < bottom;
    }
    top < y.saturating_add(height) && bottom > y
}

/// Size and constraints of a float about to be placed.
#[derive(Clone, Copy, Debug)]
pub struct PlacementInfo {
    pub width: Au,
    pub height: Au,
    pub side: FloatSide,
    pub clear: Clear,
}

#[derive(Debug, Default)]
struct RegistryReflowState {
    pending: Vec<FloatEntry>,
    full_bfc_reflow: bool,
}

#[derive(Debug, Default)]
pub struct FloatRegistry {
    /// Registered floats, in document order.
    floats: Vec<FloatEntry>,
    /// Present while a pass lays out the owning box.
    reflow_state: Option<RegistryReflowState>,
    /// Number of leading entries whose cache is up to date.
    valid_cache_len: Cell<usize>,
}

impl FloatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a pass. Floats whose element left the document or stopped
    /// floating are forgotten, which forces later content of the context to
    /// be laid out again.
    pub fn restart(&mut self, document: &Document) -> Result<(), ReflowError> {
        if self.reflow_state.is_some() {
            self.abort(document);
        }

        let mut pending = Vec::new();
        pending.try_reserve(self.floats.len())?;
        let mut full_bfc_reflow = false;
        for entry in self.floats.drain(..) {
            let node = entry.node;
            if document.is_connected(node) && document.style(node).is_floating() {
                pending.push(entry);
            } else {
                trace!("Float {:?} is gone", node);
                full_bfc_reflow = true;
            }
        }
        self.valid_cache_len.set(0);
        self.reflow_state = Some(RegistryReflowState {
            pending,
            full_bfc_reflow,
        });
        Ok(())
    }

    /// End a pass. Floats that were neither laid out nor skipped are
    /// dropped.
    pub fn finish_layout(&mut self) {
        if let Some(state) = self.reflow_state.take() {
            for entry in state.pending {
                trace!("Dropping float {:?}", entry.node);
            }
        }
    }

    /// Give up on a pass, keeping every float the registry knew about.
    pub fn abort(&mut self, document: &Document) {
        if let Some(state) = self.reflow_state.take() {
            self.floats.extend(state.pending);
            self.floats
                .sort_by(|a, b| document.compare_tree_order(a.node, b.node));
            self.valid_cache_len.set(0);
        }
    }

    pub fn is_in_reflow(&self) -> bool {
        self.reflow_state.is_some()
    }

    pub fn enable_full_bfc_reflow(&mut self) {
        if let Some(state) = self.reflow_state.as_mut() {
            state.full_bfc_reflow = true;
        }
    }

    /// Whether some float of this pass changed, so that every later block
    /// in the context has to lay out its children again.
    pub fn is_full_bfc_reflow(&self) -> bool {
        self.reflow_state
            .as_ref()
            .is_some_and(|state| state.full_bfc_reflow)
    }

    pub fn has_pending_floats(&self) -> bool {
        self.reflow_state
            .as_ref()
            .is_some_and(|state| !state.pending.is_empty())
    }

    pub fn floats(&self) -> &[FloatEntry] {
        &self.floats
    }

    pub fn last_float(&self) -> Option<&FloatEntry> {
        self.floats.last()
    }

    pub fn entry(&self, node: NodeId) -> Option<&FloatEntry> {
        self.floats.iter().find(|entry| entry.node == node)
    }

    /// Register a laid out float, replacing any earlier entry of the same
    /// element.
    pub fn add_float(&mut self, document: &Document, mut entry: FloatEntry) -> Result<(), ReflowError> {
        self.floats.try_reserve(1)?;

        let previous = self.take_pending(entry.node).or_else(|| {
            let index = self.floats.iter().position(|f| f.node == entry.node)?;
            self.invalidate_from(index);
            Some(self.floats.remove(index))
        });
        match previous {
            Some(ref previous) if previous.same_placement(&entry) => {},
            _ => {
                trace!("Float {:?} moved, full formatting context reflow", entry.node);
                self.enable_full_bfc_reflow();
            },
        }

        entry.prev_accumulated_max_width = self
            .floats
            .iter()
            .filter(|other| other.side == entry.side && other.overlaps_min(entry.min_y, entry.min_height))
            .map(FloatEntry::accumulated_max_width)
            .max()
            .unwrap_or_else(Au::zero);

        let index = self
            .floats
            .partition_point(|other| document.compare_tree_order(other.node, entry.node) == Ordering::Less);
        self.floats.insert(index, entry);
        self.invalidate_from(index);
        Ok(())
    }

    fn take_pending(&mut self, node: NodeId) -> Option<FloatEntry> {
        let state = self.reflow_state.as_mut()?;
        let index = state.pending.iter().position(|entry| entry.node == node)?;
        Some(state.pending.remove(index))
    }

    /// A subtree is reused without layout: its floats go back where they
    /// were.
    pub fn skip_element(&mut self, document: &Document, element: NodeId) -> Result<(), ReflowError> {
        let Some(state) = self.reflow_state.as_mut() else {
            return Ok(());
        };
        let count = state
            .pending
            .iter()
            .filter(|entry| document.is_inclusive_ancestor(element, entry.node))
            .count();
        if count == 0 {
            return Ok(());
        }
        self.floats.try_reserve(count)?;

        let mut skipped = Vec::new();
        skipped.try_reserve(count)?;
        let mut index = 0;
        while index < state.pending.len() {
            if document.is_inclusive_ancestor(element, state.pending[index].node) {
                skipped.push(state.pending.remove(index));
            } else {
                index += 1;
            }
        }
        for entry in skipped {
            let index = self
                .floats
                .partition_point(|other| document.compare_tree_order(other.node, entry.node) == Ordering::Less);
            self.floats.insert(index, entry);
            self.invalidate_from(index);
        }
        Ok(())
    }

    /// Move the registered floats inside `element` down by `delta`, after
    /// the element itself moved because of a collapsing margin.
    pub fn translate_floats_in(&mut self, document: &Document, element: NodeId, delta: Au) {
        if delta == Au::zero() {
            return;
        }
        let mut first_changed = None;
        for (index, entry) in self.floats.iter_mut().enumerate() {
            if document.is_inclusive_ancestor(element, entry.node) {
                entry.y = entry.y.saturating_add(delta);
                entry.min_y = entry.min_y.saturating_add(delta);
                first_changed.get_or_insert(index);
            }
        }
        if let Some(index) = first_changed {
            self.invalidate_from(index);
        }
    }

    fn invalidate_from(&self, index: usize) {
        self.valid_cache_len
            .set(self.valid_cache_len.get().min(index));
    }

    /// Bring the running totals up to date and return those of the last
    /// float.
    fn totals(&self) -> Option<FloatCache> {
        let valid = self.valid_cache_len.get().min(self.floats.len());
        let mut running = match valid {
            0 => FloatCache::default(),
            _ => self.floats[valid - 1].cache.get(),
        };
        for entry in &self.floats[valid..] {
            running = running.including(entry);
            entry.cache.set(running);
        }
        self.valid_cache_len.set(self.floats.len());
        self.floats.last().map(|entry| entry.cache.get())
    }

    /// Lowest bottom margin edge of the floats that `clear` applies to.
    pub fn find_lowest_bottom(&self, clear: Clear) -> Option<Au> {
        let totals = self.totals()?;
        lowest(clear, totals.left_bottom, totals.right_bottom)
    }

    /// Like [`Self::find_lowest_bottom`], for floats positioned as if every
    /// line had its maximum width.
    pub fn find_lowest_min_bottom(&self, clear: Clear) -> Option<Au> {
        let totals = self.totals()?;
        lowest(clear, totals.left_min_bottom, totals.right_min_bottom)
    }

    /// Find room for content.
    ///
    /// The candidate band starts at (`bfc_x`, `bfc_y`) and is `width` wide.
    /// On return the three values describe the band that was found: the
    /// lowest position at or below `bfc_y`, as reached by stepping over float
    /// bottoms, where at least `min_width` is free over `min_height`, as
    /// permitted by `lock`. Returns the height available in that band before
    /// the next float gets in the way.
    pub fn get_space(
        &self,
        bfc_y: &mut Au,
        bfc_x: &mut Au,
        width: &mut Au,
        min_width: Au,
        min_height: Au,
        lock: EdgeLock,
    ) -> Au {
        self.find_space(bfc_y, bfc_x, width, min_width, min_height, lock).0
    }

    /// [`Self::get_space`], also returning how many times the floats were
    /// scanned.
    pub(crate) fn find_space(
        &self,
        bfc_y: &mut Au,
        bfc_x: &mut Au,
        width: &mut Au,
        min_width: Au,
        min_height: Au,
        lock: EdgeLock,
    ) -> (Au, usize) {
        let origin_left = *bfc_x;
        let origin_right = bfc_x.saturating_add(*width);
        let mut y = *bfc_y;
        let mut scans = 0;

        loop {
            scans += 1;
            let mut left = origin_left;
            let mut right = origin_right;
            let mut advance_to = None;

            for float in self.floats.iter().rev() {
                if !float.overlaps(y, min_height) {
                    continue;
                }
                match float.side {
                    FloatSide::Left if float.right() > left => {
                        if lock == EdgeLock::LeftFixed {
                            advance_to = Some(float.bottom());
                            break;
                        }
                        left = float.right();
                    },
                    FloatSide::Right if float.x < right => {
                        if lock == EdgeLock::RightFixed {
                            advance_to = Some(float.bottom());
                            break;
                        }
                        right = float.x;
                    },
                    _ => continue,
                }
                if lock != EdgeLock::WidthIrrelevant && right.saturating_sub(left) < min_width {
                    advance_to = Some(float.bottom());
                    break;
                }
            }

            match advance_to {
                Some(bottom) if bottom > y => y = bottom,
                _ => {
                    *bfc_y = y;
                    *bfc_x = left;
                    *width = right.saturating_sub(left).max(Au::zero());
                    return (self.height_to_next_float(y, left, right), scans);
                },
            }
        }
    }

    /// Distance from `y` down to the first float that starts below `y` and
    /// reaches into `[left, right)`.
    fn height_to_next_float(&self, y: Au, left: Au, right: Au) -> Au {
        self.floats
            .iter()
            .filter(|float| float.y > y && float.height > Au::zero())
            .filter(|float| float.x < right && float.right() > left)
            .map(|float| float.y.saturating_sub(y))
            .min()
            .unwrap_or(MAX_AU)
    }

    /// Width-range counterpart of [`Self::get_space`].
    ///
    /// Returns how much of the left and right side floats could take from
    /// content of `max_width` sitting at `bfc_min_y` for `min_height`, in
    /// the worst case. When the floats and the content cannot fit side by
    /// side in `container_width`, the content moves below the float that
    /// broke the fit, and `bfc_min_y` is updated.
    #[allow(clippy::too_many_arguments)]
    pub fn get_floats_max_width(
        &self,
        bfc_min_y: &mut Au,
        min_height: Au,
        max_width: Au,
        left_edge_min_distance: Au,
        right_edge_min_distance: Au,
        container_width: Au,
    ) -> (Au, Au) {
        match self.totals() {
            Some(totals)
                if totals.highest_left_accumulated_max_width > Au::zero() ||
                    totals.highest_right_accumulated_max_width > Au::zero() => {},
            _ => return (Au::zero(), Au::zero()),
        }

        loop {
            let mut left = Au::zero();
            let mut right = Au::zero();
            let mut advance_to = None;

            for float in self.floats.iter().rev() {
                if !float.overlaps_min(*bfc_min_y, min_height) {
                    continue;
                }
                let accumulated = float.accumulated_max_width();
                match float.side {
                    FloatSide::Left => {
                        left = left.max(accumulated.saturating_sub(left_edge_min_distance));
                    },
                    FloatSide::Right => {
                        right = right.max(accumulated.saturating_sub(right_edge_min_distance));
                    },
                }
                let needed = left
                    .max(Au::zero())
                    .saturating_add(max_width)
                    .saturating_add(right.max(Au::zero()));
                if !container_width.is_unbounded() && needed > container_width {
                    advance_to = Some(float.min_bottom());
                    break;
                }
            }

            match advance_to {
                Some(bottom) if bottom > *bfc_min_y => *bfc_min_y = bottom,
                _ => return (left.max(Au::zero()), right.max(Au::zero())),
            }
        }
    }

    /// Where a float goes: not above `static_y` or any earlier float, below
    /// the floats it clears, and in the first band wide enough for it.
    /// Returns the top left corner of its margin box.
    pub fn place_float(&self, info: &PlacementInfo, static_y: Au, cb_x: Au, cb_width: Au) -> (Au, Au) {
        let mut y = static_y;
        // CSS 2.1 § 9.5.1 rule 6.
        if let Some(last) = self.floats.last() {
            y = y.max(last.y);
        }
        if let Some(bottom) = self.find_lowest_bottom(info.clear) {
            y = y.max(bottom);
        }

        let mut x = cb_x;
        let mut width = cb_width;
        self.get_space(
            &mut y,
            &mut x,
            &mut width,
            info.width.max(Au::zero()),
            info.height.max(Au::zero()),
            EdgeLock::Unlocked,
        );

        let x = match info.side {
            FloatSide::Left => x,
            FloatSide::Right => x.saturating_add(width).saturating_sub(info.width),
        };
        (x, y)
    }

    /// The vertical position a float would get in the width-range
    /// calculation.
    pub fn place_float_min(&self, clear: Clear, static_min_y: Au) -> Au {
        let mut min_y = static_min_y;
        if let Some(last) = self.floats.last() {
            min_y = min_y.max(last.min_y);
        }
        if let Some(bottom) = self.find_lowest_min_bottom(clear) {
            min_y = min_y.max(bottom);
        }
        min_y
    }
}

fn lowest(clear: Clear, left: Au, right: Au) -> Option<Au> {
    let bottom = match clear {
        Clear::None => return None,
        Clear::Left => left,
        Clear::Right => right,
        Clear::Both => left.max(right),
    };
    (bottom != MIN_AU).then_some(bottom)
}

#[cfg(test)]
mod tests {
    use quickcheck::{Arbitrary, Gen, quickcheck};

    use super::*;
    use crate::style::ResolvedStyle;

    fn px(value: i32) -> Au {
        Au::from_px(value)
    }

    /// A document whose root has `count` floating children.
    fn document_with_floats(count: usize) -> (Document, Vec<NodeId>) {
        let mut document = Document::new(ResolvedStyle::default());
        let root = document.root();
        let nodes = (0..count)
            .map(|_| {
                let node = document.create_element(ResolvedStyle {
                    float: StyleFloat::Left,
                    ..Default::default()
                });
                document.append_child(root, node);
                node
            })
            .collect();
        (document, nodes)
    }

    fn scenario_a() -> (Document, FloatRegistry) {
        let (document, nodes) = document_with_floats(2);
        let mut registry = FloatRegistry::new();
        registry
            .add_float(
                &document,
                FloatEntry::new(nodes[0], FloatSide::Left, px(0), px(0), px(100), px(50)),
            )
            .unwrap();
        registry
            .add_float(
                &document,
                FloatEntry::new(nodes[1], FloatSide::Right, px(320), px(0), px(80), px(30)),
            )
            .unwrap();
        (document, registry)
    }

    #[test]
    fn narrow_band_moves_below_both_floats() {
        let (_, registry) = scenario_a();
        let (mut y, mut x, mut width) = (px(0), px(0), px(400));
        let (height, scans) =
            registry.find_space(&mut y, &mut x, &mut width, px(250), px(50), EdgeLock::Unlocked);
        assert_eq!((x, y, width), (px(0), px(50), px(400)));
        assert_eq!(height, MAX_AU);
        assert!(scans <= 3);
    }

    #[test]
    fn band_narrows_between_floats_when_wide_enough() {
        let (_, registry) = scenario_a();
        let (mut y, mut x, mut width) = (px(0), px(0), px(400));
        let height =
            registry.get_space(&mut y, &mut x, &mut width, px(200), px(20), EdgeLock::Unlocked);
        assert_eq!((x, y, width), (px(100), px(0), px(220)));
        assert_eq!(height, MAX_AU);
    }

    #[test]
    fn locked_edges() {
        let (_, registry) = scenario_a();

        let (mut y, mut x, mut width) = (px(0), px(0), px(400));
        registry.get_space(&mut y, &mut x, &mut width, px(0), px(10), EdgeLock::LeftFixed);
        assert_eq!((x, y, width), (px(0), px(50), px(400)));

        let (mut y, mut x, mut width) = (px(0), px(0), px(400));
        registry.get_space(&mut y, &mut x, &mut width, px(0), px(10), EdgeLock::RightFixed);
        assert_eq!((x, y, width), (px(100), px(30), px(300)));

        let (mut y, mut x, mut width) = (px(0), px(0), px(400));
        registry.get_space(&mut y, &mut x, &mut width, px(1000), px(10), EdgeLock::WidthIrrelevant);
        assert_eq!((x, y, width), (px(100), px(0), px(220)));
    }

    #[test]
    fn height_to_next_obstruction() {
        let (document, nodes) = document_with_floats(1);
        let mut registry = FloatRegistry::new();
        registry
            .add_float(
                &document,
                FloatEntry::new(nodes[0], FloatSide::Left, px(0), px(100), px(50), px(20)),
            )
            .unwrap();
        let (mut y, mut x, mut width) = (px(10), px(0), px(400));
        let height =
            registry.get_space(&mut y, &mut x, &mut width, px(10), px(10), EdgeLock::Unlocked);
        assert_eq!(height, px(90));
        assert_eq!((x, width), (px(0), px(400)));
    }

    #[test]
    fn clearance_uses_running_totals() {
        let (_, registry) = scenario_a();
        assert_eq!(registry.find_lowest_bottom(Clear::Left), Some(px(50)));
        assert_eq!(registry.find_lowest_bottom(Clear::Right), Some(px(30)));
        assert_eq!(registry.find_lowest_bottom(Clear::Both), Some(px(50)));
        assert_eq!(registry.find_lowest_bottom(Clear::None), None);
        assert_eq!(FloatRegistry::new().find_lowest_bottom(Clear::Both), None);
    }

    #[test]
    fn restart_and_skip_restore_floats() {
        let (document, mut registry) = scenario_a();
        registry.restart(&document).unwrap();
        assert!(registry.floats().is_empty());
        assert!(registry.has_pending_floats());
        assert_eq!(registry.find_lowest_bottom(Clear::Both), None);

        registry.skip_element(&document, document.root()).unwrap();
        assert_eq!(registry.floats().len(), 2);
        assert!(!registry.has_pending_floats());
        assert!(!registry.is_full_bfc_reflow());
        assert_eq!(registry.find_lowest_bottom(Clear::Both), Some(px(50)));
        registry.finish_layout();
        assert!(!registry.is_in_reflow());
    }

    #[test]
    fn moved_float_forces_full_reflow() {
        let (document, mut registry) = scenario_a();
        let nodes: Vec<_> = registry.floats().iter().map(|entry| entry.node).collect();

        registry.restart(&document).unwrap();
        registry
            .add_float(
                &document,
                FloatEntry::new(nodes[0], FloatSide::Left, px(0), px(0), px(100), px(50)),
            )
            .unwrap();
        assert!(!registry.is_full_bfc_reflow());
        registry
            .add_float(
                &document,
                FloatEntry::new(nodes[1], FloatSide::Right, px(300), px(0), px(100), px(30)),
            )
            .unwrap();
        assert!(registry.is_full_bfc_reflow());
        registry.finish_layout();
        assert_eq!(registry.floats().len(), 2);
    }

    #[test]
    fn floats_stay_in_document_order() {
        let (document, nodes) = document_with_floats(3);
        let mut registry = FloatRegistry::new();
        for node in [nodes[2], nodes[0], nodes[1]] {
            registry
                .add_float(
                    &document,
                    FloatEntry::new(node, FloatSide::Left, px(0), px(0), px(10), px(10)),
                )
                .unwrap();
        }
        let order: Vec<_> = registry.floats().iter().map(|entry| entry.node).collect();
        assert_eq!(order, nodes);
        assert_eq!(registry.last_float().map(|entry| entry.node), Some(nodes[2]));
    }

    #[test]
    fn floats_that_stopped_floating_are_dropped_on_restart() {
        let (mut document, mut registry) = scenario_a();
        let node = registry.floats()[0].node;
        document.set_style(node, ResolvedStyle::default());
        registry.restart(&document).unwrap();
        assert!(registry.is_full_bfc_reflow());
        registry.skip_element(&document, document.root()).unwrap();
        assert_eq!(registry.floats().len(), 1);
    }

    #[test]
    fn place_float_respects_ceiling_and_clearance() {
        let (_, registry) = scenario_a();
        let info = PlacementInfo {
            width: px(100),
            height: px(10),
            side: FloatSide::Left,
            clear: Clear::None,
        };
        assert_eq!(registry.place_float(&info, px(0), px(0), px(400)), (px(100), px(0)));

        let cleared = PlacementInfo {
            clear: Clear::Left,
            ..info
        };
        assert_eq!(registry.place_float(&cleared, px(0), px(0), px(400)), (px(0), px(50)));

        let right = PlacementInfo {
            side: FloatSide::Right,
            ..info
        };
        assert_eq!(registry.place_float(&right, px(0), px(0), px(400)), (px(220), px(0)));
    }

    #[test]
    fn floats_max_width() {
        let (document, nodes) = document_with_floats(2);
        let mut registry = FloatRegistry::new();
        let mut first = FloatEntry::new(nodes[0], FloatSide::Left, px(0), px(0), px(100), px(50));
        first.max_width = px(150);
        registry.add_float(&document, first).unwrap();
        let mut second = FloatEntry::new(nodes[1], FloatSide::Left, px(100), px(0), px(60), px(20));
        second.max_width = px(60);
        registry.add_float(&document, second).unwrap();
        assert_eq!(registry.floats()[1].prev_accumulated_max_width, px(150));

        let mut min_y = px(0);
        let (left, right) =
            registry.get_floats_max_width(&mut min_y, px(10), px(100), px(0), px(0), MAX_AU);
        assert_eq!((left, right), (px(210), px(0)));
        assert_eq!(min_y, px(0));

        // Only the second float breaks the fit; next to the first one the
        // content still fits exactly.
        let mut min_y = px(0);
        let (left, _) =
            registry.get_floats_max_width(&mut min_y, px(10), px(100), px(0), px(0), px(250));
        assert_eq!(min_y, px(20));
        assert_eq!(left, px(150));

        let mut min_y = px(0);
        let (left, right) =
            registry.get_floats_max_width(&mut min_y, px(10), px(101), px(0), px(0), px(250));
        assert_eq!(min_y, px(50));
        assert_eq!((left, right), (px(0), px(0)));
    }

    #[test]
    fn unbounded_max_widths_saturate() {
        let (document, nodes) = document_with_floats(2);
        let mut registry = FloatRegistry::new();
        let mut first = FloatEntry::new(nodes[0], FloatSide::Left, px(0), px(0), px(100), px(50));
        first.max_width = MAX_AU;
        registry.add_float(&document, first).unwrap();
        let second = FloatEntry::new(nodes[1], FloatSide::Left, px(100), px(0), px(60), px(20));
        registry.add_float(&document, second).unwrap();
        assert_eq!(registry.floats()[1].accumulated_max_width(), MAX_AU);

        let mut min_y = px(0);
        let (left, _) =
            registry.get_floats_max_width(&mut min_y, px(10), px(10), px(0), px(0), MAX_AU);
        assert_eq!(left, MAX_AU);
        assert_eq!(min_y, px(0));

        let right = PlacementInfo {
            width: px(40),
            height: px(10),
            side: FloatSide::Right,
            clear: Clear::None,
        };
        let (x, y) = registry.place_float(&right, px(60), px(0), MAX_AU);
        assert_eq!((x, y), (MAX_AU, px(60)));
    }

    #[derive(Clone, Debug)]
    struct FloatInput {
        left: bool,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    }

    impl Arbitrary for FloatInput {
        fn arbitrary(g: &mut Gen) -> Self {
            FloatInput {
                left: bool::arbitrary(g),
                x: u16::arbitrary(g) % 400,
                y: u16::arbitrary(g) % 400,
                width: u16::arbitrary(g) % 200,
                height: u16::arbitrary(g) % 200,
            }
        }
    }

    #[derive(Clone, Debug)]
    struct Band {
        y: u16,
        width: u16,
        min_width: u16,
        min_height: u16,
    }

    impl Arbitrary for Band {
        fn arbitrary(g: &mut Gen) -> Self {
            Band {
                y: u16::arbitrary(g) % 400,
                width: u16::arbitrary(g) % 500,
                min_width: u16::arbitrary(g) % 500,
                min_height: u16::arbitrary(g) % 100,
            }
        }
    }

    fn registry_from(floats: &[FloatInput]) -> FloatRegistry {
        let (document, nodes) = document_with_floats(floats.len());
        let mut registry = FloatRegistry::new();
        for (input, node) in floats.iter().zip(nodes) {
            let side = if input.left {
                FloatSide::Left
            } else {
                FloatSide::Right
            };
            registry
                .add_float(
                    &document,
                    FloatEntry::new(
                        node,
                        side,
                        Au(input.x as i32),
                        Au(input.y as i32),
                        Au(input.width as i32),
                        Au(input.height as i32),
                    ),
                )
                .unwrap();
        }
        registry
    }

    fn resolve(registry: &FloatRegistry, band: &Band) -> (Au, Au, Au, Au, usize) {
        let (mut y, mut x, mut width) = (Au(band.y as i32), Au::zero(), Au(band.width as i32));
        let (height, scans) = registry.find_space(
            &mut y,
            &mut x,
            &mut width,
            Au(band.min_width as i32),
            Au(band.min_height as i32),
            EdgeLock::Unlocked,
        );
        (y, x, width, height, scans)
    }

    quickcheck! {
        fn get_space_is_idempotent(floats: Vec<FloatInput>, band: Band) -> bool {
            let registry = registry_from(&floats);
            let first = resolve(&registry, &band);
            let second = resolve(&registry, &band);
            first == second
        }

        fn get_space_terminates_quickly(floats: Vec<FloatInput>, band: Band) -> bool {
            let registry = registry_from(&floats);
            let (.., scans) = resolve(&registry, &band);
            scans <= floats.len() + 1
        }

        fn get_space_never_overlaps_floats(floats: Vec<FloatInput>, band: Band) -> bool {
            let registry = registry_from(&floats);
            let (y, x, width, _, _) = resolve(&registry, &band);
            if width == Au::zero() {
                return true;
            }
            let min_height = Au(band.min_height as i32);
            registry.floats().iter().all(|float| {
                !float.overlaps(y, min_height) ||
                    float.right() <= x ||
                    float.x >= x + width
            })
        }

        fn get_space_never_moves_up(floats: Vec<FloatInput>, band: Band) -> bool {
            let registry = registry_from(&floats);
            let (y, ..) = resolve(&registry, &band);
            y >= Au(band.y as i32)
        }
    }
}

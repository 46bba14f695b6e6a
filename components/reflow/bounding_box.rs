/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Visual overflow of boxes.
//!
//! A box stores its overflow as a [`RelativeBoundingBox`]: how far painted
//! content reaches beyond each edge of the box's own border box, plus how
//! far the scrollable content reaches to the right and bottom. Children
//! hand their overflow to their parent as an [`AbsoluteBoundingBox`]
//! expressed in the parent's frame.
//!
//! [`MIN_AU`] and [`MAX_AU`] mean "unbounded" in both forms. None of the
//! operations here can fail: empty and disjoint inputs resolve to explicit
//! zero-area rectangles.

use app_units::{Au, MAX_AU, MIN_AU};
use euclid::default::Rect;
use euclid::num::Zero;

use crate::geom::{AuExt, rect};

#[derive(Clone, Copy, Debug, Default)]
pub struct RelativeBoundingBox {
    pub left: Au,
    pub right: Au,
    pub top: Au,
    pub bottom: Au,
    pub content_right: Au,
    pub content_bottom: Au,
}

/// Only the painted extent takes part in comparisons.
impl PartialEq for RelativeBoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.left == other.left &&
            self.right == other.right &&
            self.top == other.top &&
            self.bottom == other.bottom
    }
}

impl RelativeBoundingBox {
    pub fn reset(&mut self, value: Au, content_value: Au) {
        self.left = value;
        self.right = value;
        self.top = value;
        self.bottom = value;
        self.content_right = content_value;
        self.content_bottom = content_value;
    }

    /// No overflow is claimed on any side.
    pub fn is_empty(&self) -> bool {
        self.left == Au::zero() &&
            self.right == Au::zero() &&
            self.top == Au::zero() &&
            self.bottom == Au::zero()
    }

    /// Widen this box to cover `other`, given in the frame of a box of
    /// `box_width` × `box_height`. With `skip_content` only the painted
    /// extent grows.
    pub fn union_with(
        &mut self,
        other: &AbsoluteBoundingBox,
        box_width: Au,
        box_height: Au,
        skip_content: bool,
    ) {
        if !other.is_empty() {
            self.left = self.left.max(-other.x);
            self.top = self.top.max(-other.y);
            self.right = self.right.max(
                other
                    .x
                    .saturating_add(other.width)
                    .saturating_sub(box_width),
            );
            self.bottom = self.bottom.max(
                other
                    .y
                    .saturating_add(other.height)
                    .saturating_sub(box_height),
            );
        }

        if skip_content {
            return;
        }
        if other.content_width > Au::zero() {
            self.content_right = self.content_right.max(
                other
                    .x
                    .saturating_add(other.content_width)
                    .saturating_sub(box_width),
            );
        }
        if other.content_height > Au::zero() {
            self.content_bottom = self.content_bottom.max(
                other
                    .y
                    .saturating_add(other.content_height)
                    .saturating_sub(box_height),
            );
        }
    }

    /// Drop the painted overflow while keeping the scrollable extent, for
    /// boxes that clip their content.
    pub fn clip_painted(&mut self) {
        self.left = self.left.min(Au::zero());
        self.right = self.right.min(Au::zero());
        self.top = self.top.min(Au::zero());
        self.bottom = self.bottom.min(Au::zero());
    }

    /// Give back overflow that is accounted for elsewhere. The result is
    /// clamped to `min_value` and never changes sign.
    pub fn reduce(&mut self, bottom: Au, right: Au, min_value: Au) {
        reduce_edge(&mut self.bottom, bottom, min_value);
        reduce_edge(&mut self.content_bottom, bottom, min_value);
        reduce_edge(&mut self.right, right, min_value);
        reduce_edge(&mut self.content_right, right, min_value);
    }

    pub fn left_is_infinite(&self) -> bool {
        self.left == MAX_AU
    }

    pub fn right_is_infinite(&self) -> bool {
        self.right == MAX_AU
    }

    pub fn top_is_infinite(&self) -> bool {
        self.top == MAX_AU
    }

    pub fn bottom_is_infinite(&self) -> bool {
        self.bottom == MAX_AU
    }

    pub fn total_width(&self, box_width: Au) -> Au {
        span(self.left, box_width, self.right)
    }

    pub fn total_height(&self, box_height: Au) -> Au {
        span(self.top, box_height, self.bottom)
    }

    pub fn total_content_width(&self, box_width: Au) -> Au {
        span(self.left, box_width, self.content_right)
    }

    pub fn total_content_height(&self, box_height: Au) -> Au {
        span(self.top, box_height, self.content_bottom)
    }
}

fn span(before: Au, size: Au, after: Au) -> Au {
    if before == MAX_AU || after == MAX_AU {
        return MAX_AU;
    }
    before.saturating_add(size).saturating_add(after)
}

fn reduce_edge(edge: &mut Au, amount: Au, min_value: Au) {
    if edge.is_unbounded() {
        return;
    }
    let reduced = edge.saturating_sub(amount).max(min_value).min(*edge);
    *edge = if *edge >= Au::zero() {
        reduced.max(Au::zero())
    } else {
        reduced.min(Au::zero())
    };
}

/// A resolved overflow rectangle. The content size is measured from `x`
/// and `y` like the painted size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AbsoluteBoundingBox {
    pub x: Au,
    pub y: Au,
    pub width: Au,
    pub height: Au,
    pub content_width: Au,
    pub content_height: Au,
}

impl AbsoluteBoundingBox {
    pub fn new(x: Au, y: Au, width: Au, height: Au) -> Self {
        let mut bounding_box = AbsoluteBoundingBox::default();
        bounding_box.set(x, y, width, height);
        bounding_box
    }

    /// Resolve `relative` for a box of `box_width` × `box_height` placed at
    /// the origin.
    pub fn from_relative(relative: &RelativeBoundingBox, box_width: Au, box_height: Au) -> Self {
        let x = if relative.left_is_infinite() {
            MIN_AU
        } else {
            -relative.left
        };
        let y = if relative.top_is_infinite() {
            MIN_AU
        } else {
            -relative.top
        };
        AbsoluteBoundingBox {
            x,
            y,
            width: relative.total_width(box_width),
            height: relative.total_height(box_height),
            content_width: relative.total_content_width(box_width),
            content_height: relative.total_content_height(box_height),
        }
    }

    pub fn set(&mut self, x: Au, y: Au, width: Au, height: Au) {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
        self.content_width = width;
        self.content_height = height;
    }

    pub fn set_content_size(&mut self, width: Au, height: Au) {
        self.content_width = width;
        self.content_height = height;
    }

    pub fn grow(&mut self, max_width: Au, max_height: Au) {
        self.width = self.width.max(max_width);
        self.height = self.height.max(max_height);
        self.content_width = self.content_width.max(max_width);
        self.content_height = self.content_height.max(max_height);
    }

    pub fn translate(&mut self, x: Au, y: Au) {
        self.x = self.x.saturating_add(x);
        self.y = self.y.saturating_add(y);
    }

    pub fn is_empty(&self) -> bool {
        self.width <= Au::zero() || self.height <= Au::zero()
    }

    pub fn union_with(&mut self, other: &AbsoluteBoundingBox) {
        if other.is_empty() && other.content_width <= Au::zero() {
            return;
        }
        if self.is_empty() && self.content_width <= Au::zero() {
            *self = *other;
            return;
        }

        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self
            .x
            .saturating_add(self.width)
            .max(other.x.saturating_add(other.width));
        let bottom = self
            .y
            .saturating_add(self.height)
            .max(other.y.saturating_add(other.height));
        let content_right = self
            .x
            .saturating_add(self.content_width)
            .max(other.x.saturating_add(other.content_width));
        let content_bottom = self
            .y
            .saturating_add(self.content_height)
            .max(other.y.saturating_add(other.content_height));

        self.x = left;
        self.y = top;
        self.width = right.saturating_sub(left);
        self.height = bottom.saturating_sub(top);
        self.content_width = content_right.saturating_sub(left);
        self.content_height = content_bottom.saturating_sub(top);
    }

    pub fn intersect_with(&mut self, other: &AbsoluteBoundingBox) {
        self.clip_to(
            other.x,
            other.y,
            other.x.saturating_add(other.width),
            other.y.saturating_add(other.height),
        );
    }

    /// Clip to the given edges; `MIN_AU`/`MAX_AU` leave a side unclipped. A
    /// rectangle that ends up inverted keeps its clipped origin and gets a
    /// zero size.
    pub fn clip_to(&mut self, left: Au, top: Au, right: Au, bottom: Au) {
        let new_left = self.x.max(left);
        let new_top = self.y.max(top);
        let new_right = self.x.saturating_add(self.width).min(right);
        let new_bottom = self.y.saturating_add(self.height).min(bottom);
        let content_right = self.x.saturating_add(self.content_width).min(right);
        let content_bottom = self.y.saturating_add(self.content_height).min(bottom);

        self.x = new_left;
        self.y = new_top;
        self.width = new_right.saturating_sub(new_left).max(Au::zero());
        self.height = new_bottom.saturating_sub(new_top).max(Au::zero());
        self.content_width = content_right.saturating_sub(new_left).max(Au::zero());
        self.content_height = content_bottom.saturating_sub(new_top).max(Au::zero());
    }

    pub fn intersects(&self, x: Au, y: Au) -> bool {
        x >= self.x &&
            y >= self.y &&
            x < self.x.saturating_add(self.width) &&
            y < self.y.saturating_add(self.height)
    }

    pub fn bounding_rect(&self) -> Rect<Au> {
        rect(self.x, self.y, self.width, self.height)
    }

    pub fn content_rect(&self) -> Rect<Au> {
        rect(self.x, self.y, self.content_width, self.content_height)
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::{Arbitrary, Gen, quickcheck};

    use super::*;

    fn px(value: i32) -> Au {
        Au::from_px(value)
    }

    #[test]
    fn zero_relative_box_claims_no_overflow() {
        let relative = RelativeBoundingBox::default();
        let absolute = AbsoluteBoundingBox::from_relative(&relative, px(100), px(50));
        assert_eq!(absolute, AbsoluteBoundingBox::new(px(0), px(0), px(100), px(50)));
        assert!(relative.is_empty());
    }

    #[test]
    fn clip_below_top_collapses_height() {
        let mut absolute = AbsoluteBoundingBox::new(px(0), px(0), px(100), px(100));
        absolute.clip_to(px(10), px(10), MAX_AU, px(5));
        assert_eq!(absolute.x, px(10));
        assert_eq!(absolute.y, px(10));
        assert_eq!(absolute.width, px(90));
        assert_eq!(absolute.height, px(0));
        assert_eq!(absolute.content_height, px(0));
    }

    #[test]
    fn disjoint_intersection_is_empty_at_the_clipped_origin() {
        let mut first = AbsoluteBoundingBox::new(px(0), px(0), px(10), px(10));
        first.intersect_with(&AbsoluteBoundingBox::new(px(20), px(30), px(5), px(5)));
        assert_eq!(first.x, px(20));
        assert_eq!(first.y, px(30));
        assert!(first.is_empty());
        assert_eq!(first.width, px(0));
    }

    #[test]
    fn union_grows_relative_edges() {
        let mut relative = RelativeBoundingBox::default();
        let child = AbsoluteBoundingBox::new(px(-5), px(10), px(120), px(60));
        relative.union_with(&child, px(100), px(50), false);
        assert_eq!(relative.left, px(5));
        assert_eq!(relative.top, px(0));
        assert_eq!(relative.right, px(15));
        assert_eq!(relative.bottom, px(20));
        assert_eq!(relative.content_right, px(15));
        assert_eq!(relative.total_width(px(100)), px(120));
    }

    #[test]
    fn skip_content_only_touches_painted_extent() {
        let mut relative = RelativeBoundingBox::default();
        let child = AbsoluteBoundingBox::new(px(0), px(0), px(300), px(10));
        relative.union_with(&child, px(100), px(50), true);
        assert_eq!(relative.right, px(200));
        assert_eq!(relative.content_right, px(0));
    }

    #[test]
    fn unbounded_children_saturate() {
        let mut relative = RelativeBoundingBox::default();
        let child = AbsoluteBoundingBox::new(px(0), px(0), MAX_AU, px(10));
        relative.union_with(&child, px(100), px(50), false);
        assert!(relative.right_is_infinite());
        assert_eq!(relative.total_width(px(100)), MAX_AU);

        let mut absolute = AbsoluteBoundingBox::new(MIN_AU, px(0), MAX_AU, px(10));
        absolute.translate(px(50), px(5));
        assert_eq!(absolute.x, MIN_AU);
        assert_eq!(absolute.y, px(5));
    }

    #[test]
    fn reduce_never_flips_sign() {
        let mut relative = RelativeBoundingBox::default();
        relative.bottom = px(30);
        relative.content_bottom = px(30);
        relative.right = px(8);
        relative.reduce(px(20), px(50), px(0));
        assert_eq!(relative.bottom, px(10));
        assert_eq!(relative.right, px(0));

        relative.reduce(px(5), px(0), px(7));
        assert_eq!(relative.bottom, px(7));
    }

    #[test]
    fn equality_ignores_content_extent() {
        let mut first = RelativeBoundingBox::default();
        let second = RelativeBoundingBox::default();
        first.content_right = px(40);
        assert_eq!(first, second);
    }

    #[test]
    fn grow_and_point_tests() {
        let mut absolute = AbsoluteBoundingBox::new(px(0), px(0), px(10), px(10));
        absolute.grow(px(40), px(5));
        assert_eq!(absolute.width, px(40));
        assert_eq!(absolute.height, px(10));
        assert!(absolute.intersects(px(39), px(9)));
        assert!(!absolute.intersects(px(40), px(9)));
    }

    #[derive(Clone, Debug)]
    struct SmallBox(AbsoluteBoundingBox);

    impl Arbitrary for SmallBox {
        fn arbitrary(g: &mut Gen) -> Self {
            let mut value = || i16::arbitrary(g) as i32 / 4;
            let (x, y) = (Au::from_px(value()), Au::from_px(value()));
            let width = Au::from_px(value().abs());
            let height = Au::from_px(value().abs());
            let mut bounding_box = AbsoluteBoundingBox::new(x, y, width, height);
            bounding_box.grow(width + Au::from_px(value().abs()), height);
            SmallBox(bounding_box)
        }
    }

    quickcheck! {
        fn union_with_self_is_a_no_op(input: SmallBox) -> bool {
            let mut bounding_box = input.0;
            bounding_box.union_with(&input.0);
            bounding_box == input.0
        }

        fn relative_union_with_own_resolution_is_a_no_op(left: u8, right: u8, top: u8, bottom: u8) -> bool {
            let mut relative = RelativeBoundingBox {
                left: Au::from_px(left as i32),
                right: Au::from_px(right as i32),
                top: Au::from_px(top as i32),
                bottom: Au::from_px(bottom as i32),
                content_right: Au::from_px(right as i32),
                content_bottom: Au::from_px(bottom as i32),
            };
            let before = relative;
            let resolved = AbsoluteBoundingBox::from_relative(&relative, px(100), px(50));
            relative.union_with(&resolved, px(100), px(50), false);
            relative == before &&
                relative.content_right == before.content_right &&
                relative.content_bottom == before.content_bottom
        }

        fn clip_to_is_idempotent(input: SmallBox, clip: SmallBox) -> bool {
            let (left, top) = (clip.0.x, clip.0.y);
            let (right, bottom) = (clip.0.x + clip.0.width, clip.0.y + clip.0.height);
            let mut once = input.0;
            once.clip_to(left, top, right, bottom);
            let mut twice = once;
            twice.clip_to(left, top, right, bottom);
            once == twice
        }

        fn union_is_commutative(first: SmallBox, second: SmallBox) -> bool {
            let mut a = first.0;
            a.union_with(&second.0);
            let mut b = second.0;
            b.union_with(&first.0);
            a.is_empty() && b.is_empty() || a == b
        }
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Coordinate helpers shared by the reflow engine.
//!
//! All geometry is expressed in [`Au`]. [`MIN_AU`] and [`MAX_AU`] double as
//! "unbounded" sentinels, so any arithmetic that may see them goes through
//! [`AuExt`], which keeps a sentinel operand sticky and clamps everything
//! else into the representable range.

use app_units::{Au, MAX_AU, MIN_AU};
use euclid::default::{Point2D, Rect, Size2D};
use euclid::num::Zero;

pub trait AuExt: Sized {
    fn saturating_add(self, other: Au) -> Au;
    fn saturating_sub(self, other: Au) -> Au;
    /// Whether this value is one of the two unbounded sentinels.
    fn is_unbounded(self) -> bool;
}

impl AuExt for Au {
    fn saturating_add(self, other: Au) -> Au {
        if self == MAX_AU || other == MAX_AU {
            return MAX_AU;
        }
        if self == MIN_AU || other == MIN_AU {
            return MIN_AU;
        }
        clamp(self.0.saturating_add(other.0))
    }

    fn saturating_sub(self, other: Au) -> Au {
        if self == MAX_AU || other == MIN_AU {
            return MAX_AU;
        }
        if self == MIN_AU || other == MAX_AU {
            return MIN_AU;
        }
        clamp(self.0.saturating_sub(other.0))
    }

    fn is_unbounded(self) -> bool {
        self == MAX_AU || self == MIN_AU
    }
}

fn clamp(value: i32) -> Au {
    Au(value.clamp(MIN_AU.0, MAX_AU.0))
}

/// A value for each physical side of a box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sides<T> {
    pub top: T,
    pub right: T,
    pub bottom: T,
    pub left: T,
}

impl<T: Copy> Sides<T> {
    pub fn all(value: T) -> Self {
        Sides {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    pub fn map<U>(&self, f: impl Fn(T) -> U) -> Sides<U> {
        Sides {
            top: f(self.top),
            right: f(self.right),
            bottom: f(self.bottom),
            left: f(self.left),
        }
    }
}

impl Sides<Au> {
    pub fn zero() -> Self {
        Self::all(Au::zero())
    }

    pub fn horizontal(&self) -> Au {
        self.left + self.right
    }

    pub fn vertical(&self) -> Au {
        self.top + self.bottom
    }

    pub fn add(&self, other: &Sides<Au>) -> Sides<Au> {
        Sides {
            top: self.top + other.top,
            right: self.right + other.right,
            bottom: self.bottom + other.bottom,
            left: self.left + other.left,
        }
    }
}

pub(crate) fn rect(x: Au, y: Au, width: Au, height: Au) -> Rect<Au> {
    Rect::new(Point2D::new(x, y), Size2D::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_sticky() {
        assert_eq!(MAX_AU.saturating_add(Au::from_px(10)), MAX_AU);
        assert_eq!(Au::from_px(10).saturating_sub(MAX_AU), MIN_AU);
        assert_eq!(MIN_AU.saturating_sub(Au::from_px(-10)), MIN_AU);
        assert!(MAX_AU.is_unbounded());
        assert!(!Au::from_px(3).is_unbounded());
    }

    #[test]
    fn finite_results_clamp_to_the_sentinels() {
        let big = Au(MAX_AU.0 - 1);
        assert_eq!(big.saturating_add(big), MAX_AU);
        let small = Au(MIN_AU.0 + 1);
        assert_eq!(small.saturating_sub(big), MIN_AU);
        assert_eq!(
            Au::from_px(5).saturating_add(Au::from_px(7)),
            Au::from_px(12)
        );
    }
}

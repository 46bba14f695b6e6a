/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Collapsible vertical margins.
//!
//! Adjoining vertical margins of block boxes merge instead of summing: the
//! result is the largest positive margin minus the most negative one. The
//! accumulator below is passed between siblings and from a box to its first
//! and last children while a pass walks the tree; it is not owned by any
//! box.
//!
//! Unspecified margins (the user-agent default margins of paragraphs and
//! the like) are tracked in a separate shadow so that they can collapse
//! away, for example at the top of a table cell, unless something larger
//! shows up. Non-percentage shadows mirror every field and are only read by
//! the width-range calculation, where percentages have nothing to resolve
//! against.

use app_units::{Au, MAX_AU};
use euclid::num::Zero;

/// One resolved vertical margin as seen by the collapsing code.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CollapsibleMargin {
    pub value: Au,
    pub is_percentage: bool,
    /// The margin was not specified by an author, it comes from the
    /// default style of the element.
    pub is_unspecified: bool,
}

impl CollapsibleMargin {
    pub fn specified(value: Au) -> Self {
        CollapsibleMargin {
            value,
            ..Default::default()
        }
    }

    pub fn unspecified(value: Au) -> Self {
        CollapsibleMargin {
            value,
            is_unspecified: true,
            ..Default::default()
        }
    }
}

/// The two vertical margins of a block box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockMargins {
    pub top: CollapsibleMargin,
    pub bottom: CollapsibleMargin,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VerticalMargin {
    pub max_positive: Au,
    pub max_negative: Au,
    pub max_default: Au,
    pub max_positive_nonpercent: Au,
    pub max_negative_nonpercent: Au,
    pub max_default_nonpercent: Au,
}

impl VerticalMargin {
    pub fn reset(&mut self) {
        *self = VerticalMargin::default();
    }

    /// Saturate the accumulator so that its height is zero and nothing
    /// collapsed into it afterwards can change that.
    pub fn ignore(&mut self) {
        self.max_positive = MAX_AU;
        self.max_negative = MAX_AU;
        self.max_default = Au::zero();
        self.max_positive_nonpercent = MAX_AU;
        self.max_negative_nonpercent = MAX_AU;
        self.max_default_nonpercent = Au::zero();
    }

    pub fn collapse_with_top_margin(&mut self, margins: &BlockMargins, ignore_default: bool) {
        self.fold(margins.top, ignore_default);
    }

    pub fn collapse_with_bottom_margin(&mut self, margins: &BlockMargins, ignore_default: bool) {
        self.fold(margins.bottom, ignore_default);
    }

    fn fold(&mut self, margin: CollapsibleMargin, ignore_default: bool) {
        let count_nonpercent = !margin.is_percentage;
        if margin.is_unspecified {
            if ignore_default {
                return;
            }
            self.max_default = self.max_default.max(margin.value);
            if count_nonpercent {
                self.max_default_nonpercent = self.max_default_nonpercent.max(margin.value);
            }
        } else if margin.value > Au::zero() {
            self.max_positive = self.max_positive.max(margin.value);
            if count_nonpercent {
                self.max_positive_nonpercent = self.max_positive_nonpercent.max(margin.value);
            }
        } else {
            self.max_negative = self.max_negative.max(-margin.value);
            if count_nonpercent {
                self.max_negative_nonpercent = self.max_negative_nonpercent.max(-margin.value);
            }
        }
    }

    /// Promote the default shadow into the positive maximum. Must run once
    /// before the collapsed value is read.
    pub fn apply_default_margin(&mut self) {
        self.max_positive = self.max_positive.max(self.max_default);
        self.max_positive_nonpercent = self
            .max_positive_nonpercent
            .max(self.max_default_nonpercent);
        self.max_default = Au::zero();
        self.max_default_nonpercent = Au::zero();
    }

    /// Merge `other` into this accumulator. Returns how far content placed
    /// against the old value has to move, as `(offset, offset_nonpercent)`.
    pub fn collapse(&mut self, other: &VerticalMargin) -> (Au, Au) {
        let old = self.height();
        let old_nonpercent = self.height_nonpercent();

        self.max_positive = self.max_positive.max(other.max_positive);
        self.max_negative = self.max_negative.max(other.max_negative);
        self.max_default = self.max_default.max(other.max_default);
        self.max_positive_nonpercent = self
            .max_positive_nonpercent
            .max(other.max_positive_nonpercent);
        self.max_negative_nonpercent = self
            .max_negative_nonpercent
            .max(other.max_negative_nonpercent);
        self.max_default_nonpercent = self
            .max_default_nonpercent
            .max(other.max_default_nonpercent);

        (
            self.height() - old,
            self.height_nonpercent() - old_nonpercent,
        )
    }

    /// The net collapsed margin.
    pub fn height(&self) -> Au {
        self.max_positive - self.max_negative
    }

    pub fn height_nonpercent(&self) -> Au {
        self.max_positive_nonpercent - self.max_negative_nonpercent
    }

    /// The net value with pending default margins applied, without
    /// consuming them.
    pub fn resolved_height(&self) -> Au {
        let mut resolved = *self;
        resolved.apply_default_margin();
        resolved.height()
    }

    pub fn resolved_height_nonpercent(&self) -> Au {
        let mut resolved = *self;
        resolved.apply_default_margin();
        resolved.height_nonpercent()
    }
}

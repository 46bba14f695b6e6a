/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Width ranges (min-content and max-content widths) of boxes.
//!
//! Ranges are gathered while boxes are laid out and kept on the box, so
//! that shrink-to-fit boxes can size themselves from the previous pass.

use app_units::Au;
use euclid::num::Zero;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContentSizes {
    pub min_content: Au,
    pub max_content: Au,
}

impl ContentSizes {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn exact(size: Au) -> Self {
        ContentSizes {
            min_content: size,
            max_content: size,
        }
    }

    pub fn max(&self, other: ContentSizes) -> Self {
        ContentSizes {
            min_content: self.min_content.max(other.min_content),
            max_content: self.max_content.max(other.max_content),
        }
    }

    pub fn max_assign(&mut self, other: ContentSizes) {
        *self = self.max(other);
    }

    pub fn add(&self, amount: Au) -> Self {
        ContentSizes {
            min_content: self.min_content + amount,
            max_content: self.max_content + amount,
        }
    }

    /// <https://drafts.csswg.org/css2/visudet.html#shrink-to-fit-float>
    pub fn shrink_to_fit(&self, available_size: Au) -> Au {
        available_size
            .max(self.min_content)
            .min(self.max_content)
            .max(Au::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrink_to_fit_clamps_to_the_range() {
        let sizes = ContentSizes {
            min_content: Au::from_px(40),
            max_content: Au::from_px(120),
        };
        assert_eq!(sizes.shrink_to_fit(Au::from_px(10)), Au::from_px(40));
        assert_eq!(sizes.shrink_to_fit(Au::from_px(80)), Au::from_px(80));
        assert_eq!(sizes.shrink_to_fit(Au::from_px(500)), Au::from_px(120));
    }
}

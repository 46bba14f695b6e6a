/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Dirtiness of elements and the damage a pass reports back.

use app_units::Au;
use euclid::default::Rect;
use euclid::num::Zero;

use crate::ReflowError;

/// How much work an element needs on the next pass. Ordered, so that
/// marking an element only ever escalates its state.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum DirtyState {
    #[default]
    Clean,
    /// Run size and position again, keeping the existing box.
    NeedsResize,
    /// Throw the box away and create a new one, because the kind of box the
    /// element needs may have changed.
    NeedsRebuild,
}

impl DirtyState {
    pub fn is_dirty(self) -> bool {
        self != DirtyState::Clean
    }

    pub fn needs_rebuild(self) -> bool {
        self == DirtyState::NeedsRebuild
    }
}

/// Rectangles, in document coordinates, whose painted content changed.
#[derive(Clone, Debug, Default)]
pub struct DamageList {
    rects: Vec<Rect<Au>>,
}

impl DamageList {
    pub(crate) fn add(&mut self, rect: Rect<Au>) -> Result<(), ReflowError> {
        if rect.size.width <= Au::zero() || rect.size.height <= Au::zero() {
            return Ok(());
        }
        if self.rects.last() == Some(&rect) {
            return Ok(());
        }
        self.rects.try_reserve(1)?;
        self.rects.push(rect);
        Ok(())
    }

    pub fn rects(&self) -> &[Rect<Au>] {
        &self.rects
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub(crate) fn take(&mut self) -> DamageList {
        std::mem::take(self)
    }

    /// Whether any damaged rectangle contains the given point.
    pub fn covers(&self, x: Au, y: Au) -> bool {
        self.rects.iter().any(|rect| {
            x >= rect.origin.x &&
                y >= rect.origin.y &&
                x < rect.origin.x + rect.size.width &&
                y < rect.origin.y + rect.size.height
        })
    }
}

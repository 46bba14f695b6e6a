/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Stacking participation.
//!
//! A box that roots a stacking context owns a [`StackingContext`] listing
//! the positioned descendants painted as part of it. Painting and hit
//! testing read the list through [`StackingContext::paint_order`]; layout
//! only keeps it current.

use std::cmp::Ordering;

use crate::ReflowError;
use crate::dom::{Document, NodeId};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StackingEntry {
    pub node: NodeId,
    /// `z-index: auto` participates as zero.
    pub z_index: i32,
}

#[derive(Debug, Default)]
pub struct StackingContext {
    entries: Vec<StackingEntry>,
    in_reflow: bool,
}

impl StackingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous participants. Every participant registers again
    /// during the pass, whether it is laid out or reused.
    pub fn restart(&mut self) {
        self.entries.clear();
        self.in_reflow = true;
    }

    pub fn register(&mut self, node: NodeId, z_index: i32) -> Result<(), ReflowError> {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.node == node) {
            entry.z_index = z_index;
            return Ok(());
        }
        self.entries.try_reserve(1)?;
        self.entries.push(StackingEntry { node, z_index });
        Ok(())
    }

    /// Sort into painting order: by z-index, then in tree order.
    pub fn finish(&mut self, document: &Document) {
        self.entries.sort_by(|a, b| match a.z_index.cmp(&b.z_index) {
            Ordering::Equal => document.compare_tree_order(a.node, b.node),
            other => other,
        });
        self.in_reflow = false;
    }

    pub fn is_in_reflow(&self) -> bool {
        self.in_reflow
    }

    pub fn paint_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().map(|entry| entry.node)
    }

    pub fn entries(&self) -> &[StackingEntry] {
        &self.entries
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Geometry queries against the last complete pass.
//!
//! A [`LayoutQuery`] is only handed out while no pass is suspended, so
//! everything it reports is coherent. Rectangles are in document
//! coordinates unless noted otherwise.

use app_units::Au;
use euclid::default::{Rect, Size2D};

use crate::QueryError;
use crate::bounding_box::AbsoluteBoundingBox;
use crate::box_tree::{BoxCapabilities, BoxKind, BoxTree, LayoutBox};
use crate::dom::{Document, NodeId};
use crate::flow::float::{Clear, FloatSide};
use crate::geom::rect;
use crate::style::Position;

/// Where a float ended up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatGeometry {
    pub node: NodeId,
    pub side: FloatSide,
    /// Relative to the border box of the formatting context root.
    pub margin_box: Rect<Au>,
}

pub struct LayoutQuery<'a> {
    document: &'a Document,
    boxes: &'a BoxTree,
}

impl<'a> LayoutQuery<'a> {
    pub(crate) fn new(document: &'a Document, boxes: &'a BoxTree) -> Self {
        LayoutQuery { document, boxes }
    }

    pub fn layout_box(&self, node: NodeId) -> Result<&'a LayoutBox, QueryError> {
        self.boxes.get(node).ok_or(QueryError::NoLayoutBox(node))
    }

    pub fn border_box(&self, node: NodeId) -> Result<Rect<Au>, QueryError> {
        let layout_box = self.layout_box(node)?;
        let (x, y) = self.boxes.document_position(self.document, node);
        Ok(rect(x, y, layout_box.width, layout_box.height))
    }

    pub fn margin_box(&self, node: NodeId) -> Result<Rect<Au>, QueryError> {
        let layout_box = self.layout_box(node)?;
        let border_box = self.border_box(node)?;
        let margin = layout_box.margin;
        Ok(rect(
            border_box.origin.x - margin.left,
            border_box.origin.y - margin.top,
            border_box.size.width + margin.horizontal(),
            border_box.size.height + margin.vertical(),
        ))
    }

    pub fn padding_box(&self, node: NodeId) -> Result<Rect<Au>, QueryError> {
        let layout_box = self.layout_box(node)?;
        let border_box = self.border_box(node)?;
        let border = layout_box.border;
        Ok(rect(
            border_box.origin.x + border.left,
            border_box.origin.y + border.top,
            border_box.size.width - border.horizontal(),
            border_box.size.height - border.vertical(),
        ))
    }

    pub fn content_box(&self, node: NodeId) -> Result<Rect<Au>, QueryError> {
        let layout_box = self.layout_box(node)?;
        let padding_box = self.padding_box(node)?;
        let padding = layout_box.padding;
        Ok(rect(
            padding_box.origin.x + padding.left,
            padding_box.origin.y + padding.top,
            padding_box.size.width - padding.horizontal(),
            padding_box.size.height - padding.vertical(),
        ))
    }

    /// The nearest ancestor that is positioned or a table part, or the root.
    pub fn offset_parent(&self, node: NodeId) -> Result<Option<NodeId>, QueryError> {
        let layout_box = self.layout_box(node)?;
        if node == self.document.root() || (layout_box.kind == BoxKind::AbsolutePositioned && self.is_fixed(node)) {
            return Ok(None);
        }
        let parent = self.document.ancestors(node).find(|ancestor| {
            self.boxes.get(*ancestor).is_some_and(|ancestor_box| {
                ancestor_box.is(BoxCapabilities::POSITIONED) ||
                    matches!(ancestor_box.kind, BoxKind::Table | BoxKind::TableCell)
            })
        });
        Ok(Some(parent.unwrap_or_else(|| self.document.root())))
    }

    /// Border box relative to the padding edge of the offset parent.
    pub fn offset_rect(&self, node: NodeId) -> Result<Rect<Au>, QueryError> {
        let border_box = self.border_box(node)?;
        let Some(parent) = self.offset_parent(node)? else {
            return Ok(border_box);
        };
        let origin = self.padding_box(parent)?.origin;
        Ok(rect(
            border_box.origin.x - origin.x,
            border_box.origin.y - origin.y,
            border_box.size.width,
            border_box.size.height,
        ))
    }

    /// Size of the scrollable content, measured from the border box origin.
    pub fn scroll_extent(&self, node: NodeId) -> Result<Size2D<Au>, QueryError> {
        let layout_box = self.layout_box(node)?;
        let bounds = &layout_box.bounding_box;
        Ok(Size2D::new(
            layout_box.width.max(bounds.total_content_width(layout_box.width) - bounds.left),
            layout_box.height.max(bounds.total_content_height(layout_box.height) - bounds.top),
        ))
    }

    /// Everything the box and its descendants paint.
    pub fn bounding_rect(&self, node: NodeId) -> Result<Rect<Au>, QueryError> {
        let layout_box = self.layout_box(node)?;
        let (x, y) = self.boxes.document_position(self.document, node);
        let mut bounds =
            AbsoluteBoundingBox::from_relative(&layout_box.bounding_box, layout_box.width, layout_box.height);
        bounds.translate(x, y);
        Ok(bounds.bounding_rect())
    }

    /// Lowest bottom edge of the floats of a formatting context that `clear`
    /// has to clear, relative to the border box of `bfc_root`.
    pub fn lowest_float_bottom(&self, bfc_root: NodeId, clear: Clear) -> Result<Option<Au>, QueryError> {
        self.layout_box(bfc_root)?;
        Ok(self
            .boxes
            .registry(bfc_root)
            .and_then(|registry| registry.find_lowest_bottom(clear)))
    }

    pub fn last_float(&self, bfc_root: NodeId) -> Result<Option<FloatGeometry>, QueryError> {
        self.layout_box(bfc_root)?;
        Ok(self
            .boxes
            .registry(bfc_root)
            .and_then(|registry| registry.last_float())
            .map(|entry| FloatGeometry {
                node: entry.node,
                side: entry.side,
                margin_box: rect(entry.x, entry.y, entry.width, entry.height),
            }))
    }

    /// Positioned descendants of a stacking root, back to front.
    pub fn paint_order(&self, stacking_root: NodeId) -> Result<Vec<NodeId>, QueryError> {
        let layout_box = self.layout_box(stacking_root)?;
        Ok(layout_box
            .stacking
            .as_ref()
            .map(|stacking| stacking.paint_order().collect())
            .unwrap_or_default())
    }

    fn is_fixed(&self, node: NodeId) -> bool {
        self.document.style(node).position == Position::Fixed
    }
}

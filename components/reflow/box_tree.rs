/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Layout boxes and the table that maps elements to them.
//!
//! The element tree does not own its boxes. [`BoxTree`] is a side table
//! indexed by [`NodeId`]; a box lives there from the pass that creates it
//! until its element leaves the tree, stops generating a box, or needs a
//! box of another kind.

use std::ops::{Index, IndexMut};

use app_units::Au;
use bitflags::bitflags;
use euclid::default::Rect;
use euclid::num::Zero;
use smallvec::SmallVec;

use crate::ReflowError;
use crate::bounding_box::RelativeBoundingBox;
use crate::dom::{Document, NodeId};
use crate::flow::float::FloatRegistry;
use crate::geom::Sides;
use crate::margin::VerticalMargin;
use crate::reflow_state::{AbsposState, ReflowState};
use crate::sizing::ContentSizes;
use crate::stacking::StackingContext;
use crate::style::{Display, Position};
use crate::table::ColumnWidths;

/// The role a box plays in layout. Behaviour that several kinds share is
/// described by [`BoxCapabilities`] instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BoxKind {
    Block,
    Float,
    AbsolutePositioned,
    Inline,
    Text,
    Table,
    TableRowGroup,
    TableRow,
    TableCell,
    TableCaption,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct BoxCapabilities: u16 {
        /// Stacks vertically in its container.
        const BLOCK_LEVEL = 1 << 0;
        /// Sits on lines.
        const INLINE_LEVEL = 1 << 1;
        const FLOATING = 1 << 2;
        const ABSOLUTELY_POSITIONED = 1 << 3;
        /// Anything but `position: static`; containing block of absolutely
        /// positioned descendants.
        const POSITIONED = 1 << 4;
        /// Owns a float registry; margins of its children do not collapse
        /// with its own.
        const FORMATTING_CONTEXT_ROOT = 1 << 5;
        /// Owns a stacking context.
        const STACKING_ROOT = 1 << 6;
        /// Lays out its children in lines and blocks.
        const BLOCK_CONTAINER = 1 << 7;
        const TABLE_PART = 1 << 8;
        /// A block sitting on a line as a single unit.
        const ATOMIC_INLINE = 1 << 9;
        const LIST_ITEM = 1 << 10;
    }
}

impl BoxKind {
    /// The kind of box `node` needs, if any.
    pub(crate) fn for_element(document: &Document, node: NodeId) -> Option<BoxKind> {
        let parent_display = document
            .parent(node)
            .map(|parent| document.style(parent).display);
        let in_table_part = matches!(
            parent_display,
            Some(Display::Table | Display::TableRowGroup | Display::TableRow)
        );

        if document.is_text(node) {
            // Text directly inside table structure is whitespace between
            // rows and cells.
            return (!in_table_part).then_some(BoxKind::Text);
        }

        let style = document.style(node);
        if node == document.root() {
            return (style.display != Display::None).then_some(BoxKind::Block);
        }
        let kind = match (style.display, parent_display) {
            (Display::None, _) => return None,
            (Display::TableRowGroup, Some(Display::Table)) => BoxKind::TableRowGroup,
            (Display::TableRow, Some(Display::Table | Display::TableRowGroup)) => {
                BoxKind::TableRow
            },
            (Display::TableCell, Some(Display::TableRow)) => BoxKind::TableCell,
            (Display::TableCaption, Some(Display::Table)) => BoxKind::TableCaption,
            (Display::Table, _) => BoxKind::Table,
            _ if style.is_absolutely_positioned() => BoxKind::AbsolutePositioned,
            _ if style.is_floating() => BoxKind::Float,
            (Display::Inline, _) if !in_table_part => BoxKind::Inline,
            _ => BoxKind::Block,
        };
        Some(kind)
    }

    pub fn is_table_part(self) -> bool {
        matches!(
            self,
            BoxKind::Table |
                BoxKind::TableRowGroup |
                BoxKind::TableRow |
                BoxKind::TableCell |
                BoxKind::TableCaption
        )
    }
}

impl BoxCapabilities {
    pub(crate) fn for_element(document: &Document, node: NodeId, kind: BoxKind) -> Self {
        let style = document.style(node);
        let is_root = node == document.root();
        let parent_is_inline = document
            .parent(node)
            .is_some_and(|parent| !document.is_text(parent) && document.style(parent).is_inline_level());

        let mut capabilities = match kind {
            BoxKind::Text => BoxCapabilities::INLINE_LEVEL,
            BoxKind::Inline => BoxCapabilities::INLINE_LEVEL,
            BoxKind::Float => {
                BoxCapabilities::FLOATING |
                    BoxCapabilities::BLOCK_CONTAINER |
                    BoxCapabilities::FORMATTING_CONTEXT_ROOT
            },
            BoxKind::AbsolutePositioned => {
                BoxCapabilities::ABSOLUTELY_POSITIONED |
                    BoxCapabilities::BLOCK_CONTAINER |
                    BoxCapabilities::FORMATTING_CONTEXT_ROOT
            },
            BoxKind::Block => BoxCapabilities::BLOCK_LEVEL | BoxCapabilities::BLOCK_CONTAINER,
            BoxKind::Table => {
                BoxCapabilities::BLOCK_LEVEL |
                    BoxCapabilities::TABLE_PART |
                    BoxCapabilities::FORMATTING_CONTEXT_ROOT
            },
            BoxKind::TableRowGroup | BoxKind::TableRow => {
                BoxCapabilities::BLOCK_LEVEL | BoxCapabilities::TABLE_PART
            },
            BoxKind::TableCell | BoxKind::TableCaption => {
                BoxCapabilities::BLOCK_LEVEL |
                    BoxCapabilities::TABLE_PART |
                    BoxCapabilities::BLOCK_CONTAINER |
                    BoxCapabilities::FORMATTING_CONTEXT_ROOT
            },
        };

        if parent_is_inline && !is_root && capabilities.contains(BoxCapabilities::BLOCK_LEVEL) {
            capabilities.remove(BoxCapabilities::BLOCK_LEVEL);
            capabilities |= BoxCapabilities::INLINE_LEVEL |
                BoxCapabilities::ATOMIC_INLINE |
                BoxCapabilities::FORMATTING_CONTEXT_ROOT;
        }
        if kind != BoxKind::Text {
            if style.establishes_formatting_context() && kind != BoxKind::Inline {
                capabilities |= BoxCapabilities::FORMATTING_CONTEXT_ROOT;
            }
            if style.position != Position::Static && !kind.is_table_part() {
                capabilities |= BoxCapabilities::POSITIONED;
            }
            if style.establishes_stacking_context() && kind != BoxKind::Inline {
                capabilities |= BoxCapabilities::STACKING_ROOT;
            }
            if style.display == Display::ListItem {
                capabilities |= BoxCapabilities::LIST_ITEM;
            }
        }
        if is_root {
            capabilities |= BoxCapabilities::FORMATTING_CONTEXT_ROOT |
                BoxCapabilities::STACKING_ROOT |
                BoxCapabilities::BLOCK_CONTAINER;
        }
        capabilities
    }
}

/// Where an absolutely positioned box would have been in normal flow, in
/// the coordinates of the block `frame`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct StaticPosition {
    pub frame: NodeId,
    pub x: Au,
    pub y: Au,
}

/// What a box remembers from its last pass so that it can be reused
/// without being laid out.
#[derive(Clone, Debug, Default)]
pub(crate) struct FlowInfo {
    /// The pass that last laid out this box; zero before the first one.
    pub laid_out_in_pass: u32,
    /// The accumulated margin the box was positioned with.
    pub incoming_margin: VerticalMargin,
    /// Own top margin plus the top margins of children collapsing through
    /// it.
    pub collapsed_top: VerticalMargin,
    /// Own bottom margin plus the trailing margin of its last child when
    /// the two adjoin.
    pub collapsed_bottom: VerticalMargin,
    /// Top and bottom margins adjoin: the box has no height and no in-flow
    /// content.
    pub collapses_through: bool,
    /// Width of the containing block in the last pass.
    pub containing_width: Au,
    /// Border box origin in the formatting context in the last pass. For
    /// floats, the static position instead.
    pub bfc_x: Au,
    pub bfc_y: Au,
    pub has_descendant_floats: bool,
    /// Width range of the content box.
    pub content_sizes: ContentSizes,
    /// Width range of the margin box, as the container sees it.
    pub outer_sizes: ContentSizes,
    pub list_number: Option<u32>,
    pub relative_offset: (Au, Au),
    pub static_position: Option<StaticPosition>,
    /// Containing block of an absolutely positioned box in the last pass,
    /// with the position it resolved to.
    pub containing_block: Option<AbsposState>,
    /// Painted extent in document coordinates as of the last pass.
    pub doc_bounds: Option<Rect<Au>>,
    /// Height of a table cell before its row stretched it.
    pub natural_height: Au,
    /// Column constraints of a table from its last pass.
    pub columns: SmallVec<[ColumnWidths; 8]>,
}

#[derive(Debug)]
pub struct LayoutBox {
    pub kind: BoxKind,
    pub capabilities: BoxCapabilities,
    /// Border box, relative to the border box of the parent.
    pub x: Au,
    pub y: Au,
    pub width: Au,
    pub height: Au,
    pub margin: Sides<Au>,
    pub border: Sides<Au>,
    pub padding: Sides<Au>,
    pub bounding_box: RelativeBoundingBox,
    pub(crate) float_registry: Option<FloatRegistry>,
    pub(crate) stacking: Option<StackingContext>,
    pub(crate) reflow_state: Option<ReflowState>,
    pub(crate) flow: FlowInfo,
}

impl LayoutBox {
    pub(crate) fn new(kind: BoxKind, capabilities: BoxCapabilities) -> Self {
        let float_registry = capabilities
            .contains(BoxCapabilities::FORMATTING_CONTEXT_ROOT)
            .then(FloatRegistry::new);
        let stacking = capabilities
            .contains(BoxCapabilities::STACKING_ROOT)
            .then(StackingContext::new);
        LayoutBox {
            kind,
            capabilities,
            x: Au::zero(),
            y: Au::zero(),
            width: Au::zero(),
            height: Au::zero(),
            margin: Sides::zero(),
            border: Sides::zero(),
            padding: Sides::zero(),
            bounding_box: RelativeBoundingBox::default(),
            float_registry,
            stacking,
            reflow_state: None,
            flow: FlowInfo::default(),
        }
    }

    pub fn is(&self, capability: BoxCapabilities) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn is_in_reflow(&self) -> bool {
        self.reflow_state.is_some()
    }

    pub(crate) fn padding_box_size(&self) -> (Au, Au) {
        (
            self.width - self.border.horizontal(),
            self.height - self.border.vertical(),
        )
    }

    /// The box's position without its relative offset.
    pub(crate) fn flow_position(&self) -> (Au, Au) {
        (
            self.x - self.flow.relative_offset.0,
            self.y - self.flow.relative_offset.1,
        )
    }
}

#[derive(Debug, Default)]
pub struct BoxTree {
    boxes: Vec<Option<LayoutBox>>,
}

impl BoxTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeId) -> Option<&LayoutBox> {
        self.boxes.get(node.index()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, node: NodeId) -> Option<&mut LayoutBox> {
        self.boxes.get_mut(node.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.get(node).is_some()
    }

    pub(crate) fn insert(&mut self, node: NodeId, layout_box: LayoutBox) -> Result<(), ReflowError> {
        let index = node.index();
        if index >= self.boxes.len() {
            self.boxes.try_reserve(index + 1 - self.boxes.len())?;
            self.boxes.resize_with(index + 1, || None);
        }
        self.boxes[index] = Some(layout_box);
        Ok(())
    }

    pub(crate) fn remove(&mut self, node: NodeId) -> Option<LayoutBox> {
        self.boxes.get_mut(node.index()).and_then(Option::take)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut LayoutBox)> + '_ {
        self.boxes
            .iter_mut()
            .enumerate()
            .filter_map(|(index, layout_box)| Some((NodeId::from_index(index), layout_box.as_mut()?)))
    }

    pub(crate) fn has_state(&self, node: NodeId) -> bool {
        self.get(node).is_some_and(LayoutBox::is_in_reflow)
    }

    /// The scratch record of a box between `layout` and `finish`.
    pub(crate) fn state(&self, node: NodeId) -> &ReflowState {
        match self[node].reflow_state {
            Some(ref state) => state,
            None => unreachable!("{:?} is not being laid out", node),
        }
    }

    pub(crate) fn state_mut(&mut self, node: NodeId) -> &mut ReflowState {
        match self[node].reflow_state {
            Some(ref mut state) => state,
            None => unreachable!("{:?} is not being laid out", node),
        }
    }

    pub(crate) fn registry(&self, node: NodeId) -> Option<&FloatRegistry> {
        self.get(node)?.float_registry.as_ref()
    }

    pub(crate) fn registry_mut(&mut self, node: NodeId) -> Option<&mut FloatRegistry> {
        self.get_mut(node)?.float_registry.as_mut()
    }

    /// Offset of the border box of `node` from the border box of
    /// `ancestor`, summing the positions of the boxes in between.
    pub(crate) fn offset_from(&self, document: &Document, node: NodeId, ancestor: NodeId) -> (Au, Au) {
        let mut x = Au::zero();
        let mut y = Au::zero();
        let mut current = node;
        while current != ancestor {
            let Some(layout_box) = self.get(current) else {
                break;
            };
            x += layout_box.x;
            y += layout_box.y;
            match document.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        (x, y)
    }

    /// Position of the border box of `node` in document coordinates.
    pub(crate) fn document_position(&self, document: &Document, node: NodeId) -> (Au, Au) {
        let mut x = Au::zero();
        let mut y = Au::zero();
        let mut current = Some(node);
        while let Some(node) = current {
            if let Some(layout_box) = self.get(node) {
                x += layout_box.x;
                y += layout_box.y;
            }
            current = document.parent(node);
        }
        (x, y)
    }
}

impl Index<NodeId> for BoxTree {
    type Output = LayoutBox;

    fn index(&self, node: NodeId) -> &LayoutBox {
        match self.get(node) {
            Some(layout_box) => layout_box,
            None => panic!("{:?} has no layout box", node),
        }
    }
}

impl IndexMut<NodeId> for BoxTree {
    fn index_mut(&mut self, node: NodeId) -> &mut LayoutBox {
        match self.get_mut(node) {
            Some(layout_box) => layout_box,
            None => panic!("{:?} has no layout box", node),
        }
    }
}

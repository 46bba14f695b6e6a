/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The element tree that layout runs over.
//!
//! Layout treats the tree as read-only except for the per-element dirty
//! state, which lives in a [`Cell`] so that a pass can mark elements clean
//! while only holding a shared reference to the document.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;

use app_units::Au;
use euclid::num::Zero;
use log::trace;
use smallvec::SmallVec;

use crate::incremental::DirtyState;
use crate::style::ResolvedStyle;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }
}

/// A shaped, unbreakable run of text, as produced by text shaping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WordFragment {
    pub width: Au,
    /// Width of the collapsible space following the word.
    pub space_after: Au,
    /// A line may end after this word.
    pub can_break_after: bool,
    /// A line must end after this word.
    pub forced_break_after: bool,
}

impl WordFragment {
    pub fn new(width: Au) -> Self {
        WordFragment {
            width,
            space_after: Au::zero(),
            can_break_after: true,
            forced_break_after: false,
        }
    }

    pub fn spaced(width: Au, space_after: Au) -> Self {
        WordFragment {
            space_after,
            ..WordFragment::new(width)
        }
    }

    pub fn line_break(width: Au) -> Self {
        WordFragment {
            forced_break_after: true,
            ..WordFragment::new(width)
        }
    }
}

#[derive(Debug)]
enum NodeData {
    Element,
    Text(Vec<WordFragment>),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    style: ResolvedStyle,
    data: NodeData,
    dirty: Cell<DirtyState>,
}

/// A subtree that left the document, remembered until the next pass so
/// that the area it painted can be damaged.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RemovedSubtree {
    pub node: NodeId,
    pub former_parent: NodeId,
}

#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    removed: RefCell<Vec<RemovedSubtree>>,
}

impl Document {
    pub fn new(root_style: ResolvedStyle) -> Self {
        let mut document = Document {
            nodes: Vec::new(),
            root: NodeId(0),
            removed: RefCell::new(Vec::new()),
        };
        document.root = document.push(root_style, NodeData::Element);
        document
    }

    fn push(&mut self, style: ResolvedStyle, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            style,
            data,
            dirty: Cell::new(DirtyState::NeedsResize),
        });
        id
    }

    fn node(&self, node: NodeId) -> &Node {
        &self.nodes[node.index()]
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a detached element.
    pub fn create_element(&mut self, style: ResolvedStyle) -> NodeId {
        self.push(style, NodeData::Element)
    }

    /// Create a detached text node with an inline style.
    pub fn create_text(&mut self, words: Vec<WordFragment>) -> NodeId {
        self.push(ResolvedStyle::inline(), NodeData::Text(words))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        self.mark_rebuild(child);
    }

    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        let index = self
            .node(parent)
            .children
            .iter()
            .position(|sibling| *sibling == reference)
            .unwrap_or(self.node(parent).children.len());
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.insert(index, child);
        self.mark_rebuild(child);
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(child).parent != Some(parent) {
            return;
        }
        self.detach(child);
        self.removed.get_mut().push(RemovedSubtree {
            node: child,
            former_parent: parent,
        });
        self.mark_dirty(parent);
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.index()].parent.take() {
            self.nodes[parent.index()]
                .children
                .retain(|sibling| *sibling != child);
            self.mark_dirty(parent);
        }
    }

    pub(crate) fn take_removed(&self) -> Vec<RemovedSubtree> {
        self.removed.take()
    }

    pub fn set_style(&mut self, node: NodeId, style: ResolvedStyle) {
        let rebuild = style.requires_rebuild_from(&self.node(node).style);
        self.nodes[node.index()].style = style;
        if rebuild {
            self.mark_rebuild(node);
        } else {
            self.mark_dirty(node);
        }
    }

    pub fn set_words(&mut self, node: NodeId, words: Vec<WordFragment>) {
        if let NodeData::Text(ref mut existing) = self.nodes[node.index()].data {
            *existing = words;
            self.mark_dirty(node);
        }
    }

    pub fn style(&self, node: NodeId) -> &ResolvedStyle {
        &self.node(node).style
    }

    pub fn words(&self, node: NodeId) -> Option<&[WordFragment]> {
        match self.node(node).data {
            NodeData::Text(ref words) => Some(words),
            NodeData::Element => None,
        }
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.node(node).data, NodeData::Text(_))
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|sibling| *sibling == node)?;
        siblings.get(index + 1).copied()
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|sibling| *sibling == node)?;
        index.checked_sub(1).map(|index| siblings[index])
    }

    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |current| self.parent(*current))
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|current| current == ancestor)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        node == self.root || self.ancestors(node).any(|current| current == self.root)
    }

    /// The child of `parent` that is an inclusive ancestor of `descendant`.
    pub fn child_containing(&self, parent: NodeId, descendant: NodeId) -> Option<NodeId> {
        let mut current = descendant;
        loop {
            let next = self.parent(current)?;
            if next == parent {
                return Some(current);
            }
            current = next;
        }
    }

    /// Compare two connected nodes in pre-order tree order.
    pub fn compare_tree_order(&self, first: NodeId, second: NodeId) -> Ordering {
        if first == second {
            return Ordering::Equal;
        }
        let chain = |node: NodeId| {
            let mut chain: SmallVec<[NodeId; 16]> = SmallVec::new();
            chain.push(node);
            chain.extend(self.ancestors(node));
            chain.reverse();
            chain
        };
        let (first_chain, second_chain) = (chain(first), chain(second));
        let common = first_chain
            .iter()
            .zip(second_chain.iter())
            .take_while(|(a, b)| a == b)
            .count();
        if common == 0 {
            // Disconnected trees have no meaningful order.
            return first.cmp(&second);
        }
        match (first_chain.get(common), second_chain.get(common)) {
            (None, _) => Ordering::Less,
            (_, None) => Ordering::Greater,
            (Some(a), Some(b)) => {
                let siblings = self.children(first_chain[common - 1]);
                let index = |node: &NodeId| siblings.iter().position(|sibling| sibling == node);
                index(a).cmp(&index(b))
            },
        }
    }

    pub fn dirty(&self, node: NodeId) -> DirtyState {
        self.node(node).dirty.get()
    }

    fn escalate(&self, node: NodeId, state: DirtyState) {
        let cell = &self.node(node).dirty;
        cell.set(cell.get().max(state));
    }

    fn mark_ancestors(&self, node: NodeId) {
        for ancestor in self.ancestors(node) {
            self.escalate(ancestor, DirtyState::NeedsResize);
        }
    }

    /// The element needs size and position recomputed.
    pub fn mark_dirty(&self, node: NodeId) {
        trace!("{:?} marked dirty", node);
        self.escalate(node, DirtyState::NeedsResize);
        self.mark_ancestors(node);
    }

    /// The element needs a new box.
    pub fn mark_rebuild(&self, node: NodeId) {
        trace!("{:?} marked for rebuild", node);
        self.escalate(node, DirtyState::NeedsRebuild);
        self.mark_ancestors(node);
    }

    /// Mark every element of the subtree dirty.
    pub fn mark_subtree_dirty(&self, node: NodeId) {
        let mut stack: Vec<NodeId> = vec![node];
        while let Some(current) = stack.pop() {
            self.escalate(current, DirtyState::NeedsResize);
            stack.extend(self.children(current).iter().copied());
        }
        self.mark_ancestors(node);
    }

    pub fn mark_clean(&self, node: NodeId) {
        self.node(node).dirty.set(DirtyState::Clean);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirtiness_propagates_to_ancestors() {
        let mut document = Document::new(ResolvedStyle::default());
        let root = document.root();
        let parent = document.create_element(ResolvedStyle::default());
        let child = document.create_element(ResolvedStyle::default());
        document.append_child(root, parent);
        document.append_child(parent, child);
        for node in [root, parent, child] {
            document.mark_clean(node);
        }

        document.mark_rebuild(child);
        assert_eq!(document.dirty(child), DirtyState::NeedsRebuild);
        assert_eq!(document.dirty(parent), DirtyState::NeedsResize);
        assert_eq!(document.dirty(root), DirtyState::NeedsResize);

        document.mark_dirty(child);
        assert_eq!(document.dirty(child), DirtyState::NeedsRebuild);
    }

    #[test]
    fn tree_order() {
        let mut document = Document::new(ResolvedStyle::default());
        let root = document.root();
        let a = document.create_element(ResolvedStyle::default());
        let b = document.create_element(ResolvedStyle::default());
        let a_child = document.create_element(ResolvedStyle::default());
        document.append_child(root, a);
        document.append_child(root, b);
        document.append_child(a, a_child);

        assert_eq!(document.compare_tree_order(a, b), Ordering::Less);
        assert_eq!(document.compare_tree_order(a_child, b), Ordering::Less);
        assert_eq!(document.compare_tree_order(a, a_child), Ordering::Less);
        assert_eq!(document.compare_tree_order(b, a_child), Ordering::Greater);
        assert_eq!(document.child_containing(root, a_child), Some(a));
        assert_eq!(document.next_sibling(a), Some(b));
        assert_eq!(document.previous_sibling(a), None);
    }

    #[test]
    fn style_changes_pick_the_dirty_level() {
        let mut document = Document::new(ResolvedStyle::default());
        let root = document.root();
        let child = document.create_element(ResolvedStyle::default());
        document.append_child(root, child);
        document.mark_clean(child);

        document.set_style(
            child,
            ResolvedStyle {
                line_height: Au::from_px(30),
                ..Default::default()
            },
        );
        assert_eq!(document.dirty(child), DirtyState::NeedsResize);

        document.set_style(child, ResolvedStyle::inline());
        assert_eq!(document.dirty(child), DirtyState::NeedsRebuild);
    }

    #[test]
    fn removed_subtrees_are_reported_once() {
        let mut document = Document::new(ResolvedStyle::default());
        let root = document.root();
        let child = document.create_element(ResolvedStyle::default());
        document.append_child(root, child);
        document.remove_child(root, child);

        assert!(format!("{:?}", document).contains("former_parent"));
        assert_eq!(
            document.take_removed(),
            vec![RemovedSubtree {
                node: child,
                former_parent: root,
            }]
        );
        assert!(document.take_removed().is_empty());
        assert!(!document.is_connected(child));
    }
}

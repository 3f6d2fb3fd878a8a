//! Document outline (bookmarks) as an indexable tree.
//!
//! Nodes live in one arena and refer to each other by [`NodeId`]; children
//! are owned through their parent's list, the parent link is a plain index.
//! Node 0 is the synthetic root: it has no title and is never navigable.

use crate::document::{DocumentService, OutlineRef, RenderBackend};
use std::cell::OnceCell;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// Address handed to list/tree widgets: a row under some parent, one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelIndex {
    pub row: usize,
    pub column: usize,
    pub node: NodeId,
}

#[derive(Debug)]
pub struct OutlineNode {
    title: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    bookmark: Option<OutlineRef>,
    destination: OnceCell<Option<usize>>,
}

impl OutlineNode {
    fn new(title: String, parent: Option<NodeId>, bookmark: Option<OutlineRef>) -> Self {
        Self {
            title,
            children: Vec::new(),
            parent,
            bookmark,
            destination: OnceCell::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

struct OutlineWalk<'d, B: RenderBackend + 'd> {
    service: &'d DocumentService<B>,
    max_depth: usize,
    visited: HashSet<B::Bookmark<'d>>,
}

#[derive(Debug)]
pub struct OutlineTree {
    nodes: Vec<OutlineNode>,
}

impl Default for OutlineTree {
    fn default() -> Self {
        Self {
            nodes: vec![OutlineNode::new(String::new(), None, None)],
        }
    }
}

impl OutlineTree {
    /// Mirrors the native outline of the service's current document.
    ///
    /// Each native entry is visited once while its handle is held. An entry
    /// met a second time (a looping sibling or child chain) ends that level,
    /// and entries nested deeper than `max_depth` are skipped.
    pub fn build<B: RenderBackend>(service: &DocumentService<B>, max_depth: usize) -> Self {
        let mut tree = Self::default();
        let mut walk = OutlineWalk {
            service,
            max_depth,
            visited: HashSet::new(),
        };
        if let Some(first) = service.outline_root() {
            tree.append_level(&mut walk, first, NodeId::ROOT, None, 1);
        }
        crate::debug_log!("[outline] built {} entries", tree.len());
        tree
    }

    fn append_level<'d, B: RenderBackend + 'd>(
        &mut self,
        walk: &mut OutlineWalk<'d, B>,
        first: B::Bookmark<'d>,
        parent: NodeId,
        native_parent: Option<&OutlineRef>,
        depth: usize,
    ) {
        if depth > walk.max_depth {
            crate::debug_log!(
                "[outline] depth limit {} reached, subtree skipped",
                walk.max_depth
            );
            return;
        }
        let service = walk.service;

        let mut next = Some(first);
        let mut row = 0;
        while let Some(bookmark) = next {
            if !walk.visited.insert(bookmark.clone()) {
                crate::debug_log!("[outline] loop at depth {}, rest of level skipped", depth);
                break;
            }

            let reference = match native_parent {
                Some(native_parent) => native_parent.child(row),
                None => OutlineRef::top_level(row),
            };
            let id = NodeId(self.nodes.len());
            self.nodes.push(OutlineNode::new(
                service.bookmark_title(&bookmark),
                Some(parent),
                Some(reference.clone()),
            ));
            self.nodes[parent.0].children.push(id);

            if let Some(child) = service.bookmark_first_child(&bookmark) {
                self.append_level(walk, child, id, Some(&reference), depth + 1);
            }
            next = service.bookmark_next_sibling(&bookmark);
            row += 1;
        }
    }

    /// Number of real entries, the synthetic root excluded.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node(&self, id: NodeId) -> Option<&OutlineNode> {
        self.nodes.get(id.0)
    }

    pub fn index(&self, row: usize, column: usize, parent: Option<ModelIndex>) -> Option<ModelIndex> {
        if column != 0 {
            return None;
        }
        let parent = parent.map(|index| index.node).unwrap_or(NodeId::ROOT);
        let node = *self.node(parent)?.children.get(row)?;
        Some(ModelIndex { row, column, node })
    }

    /// Index of the parent, `None` for top-level entries (their parent is
    /// the invisible root).
    pub fn parent(&self, index: ModelIndex) -> Option<ModelIndex> {
        let parent = self.node(index.node)?.parent?;
        if parent == NodeId::ROOT {
            return None;
        }
        let grandparent = self.node(parent)?.parent.unwrap_or(NodeId::ROOT);
        let row = self
            .node(grandparent)?
            .children
            .iter()
            .position(|child| *child == parent)?;
        Some(ModelIndex {
            row,
            column: 0,
            node: parent,
        })
    }

    pub fn row_count(&self, parent: Option<ModelIndex>) -> usize {
        let parent = parent.map(|index| index.node).unwrap_or(NodeId::ROOT);
        self.node(parent).map(|node| node.children.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        1
    }

    pub fn data(&self, index: ModelIndex) -> Option<&str> {
        if index.column != 0 || index.node == NodeId::ROOT {
            return None;
        }
        self.node(index.node).map(OutlineNode::title)
    }

    /// Zero-based page the entry points at, resolved on first use.
    pub fn page_index_for<B: RenderBackend>(
        &self,
        index: ModelIndex,
        service: &DocumentService<B>,
    ) -> Option<usize> {
        let node = self.node(index.node)?;
        let bookmark = node.bookmark.as_ref()?;
        *node
            .destination
            .get_or_init(|| service.resolve_destination_page_index(bookmark))
    }
}

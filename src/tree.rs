//! In-memory model of a discovered community hierarchy.
//!
//! Nodes live in a single arena owned by [`MirrorTree`] and refer to each
//! other by [`NodeId`]. A node is *structural* after discovery (no local
//! paths) and *resolved* once the synthesizer has assigned its directories.
//!
//! Every pass that visits the hierarchy (synthesis, materialization, summary
//! logging) goes through [`MirrorTree::walk`], so they all agree on the same
//! depth-first order: a community, then its wikis (each wiki before its
//! subwikis, subwikis before the next sibling), then its subcommunities.

use std::path::{Path, PathBuf};

/// Index of a node inside a [`MirrorTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// The two node variants of the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A community scope owning wikis and subcommunities.
    Community,
    /// A wiki page owning a page body, links, attachments and subwikis.
    Wiki,
}

/// Per-wiki content directories created next to the page file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDirs {
    /// Destination for internal API links found in the page body.
    pub links: PathBuf,
    /// Destination for the wiki's attachment listing.
    pub attachments: PathBuf,
}

/// A single community or wiki.
#[derive(Debug, Clone)]
pub struct TreeNode {
    kind: NodeKind,
    name: String,
    source_url: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local_path: Option<PathBuf>,
    content_dirs: Option<ContentDirs>,
}

impl TreeNode {
    fn new(kind: NodeKind, name: String, source_url: String, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            name,
            source_url,
            parent,
            children: Vec::new(),
            local_path: None,
            content_dirs: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Display title as read from the portal.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in discovery order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Directory assigned by the synthesizer, `None` while structural.
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    /// `links/` and `attachments/` directories, wikis only.
    #[must_use]
    pub fn content_dirs(&self) -> Option<&ContentDirs> {
        self.content_dirs.as_ref()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        match self.kind {
            NodeKind::Community => self.local_path.is_some(),
            NodeKind::Wiki => self.local_path.is_some() && self.content_dirs.is_some(),
        }
    }
}

/// Arena-backed community hierarchy rooted at a single community.
#[derive(Debug, Clone)]
pub struct MirrorTree {
    nodes: Vec<TreeNode>,
}

impl MirrorTree {
    /// Creates a tree holding only the root community.
    #[must_use]
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            nodes: vec![TreeNode::new(
                NodeKind::Community,
                name.into(),
                source_url.into(),
                None,
            )],
        }
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Returns the node for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was produced by a different tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    /// Total number of nodes, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of wiki nodes at any depth.
    #[must_use]
    pub fn wiki_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Wiki)
            .count()
    }

    /// Appends a wiki under a community or another wiki.
    pub fn add_wiki(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        source_url: impl Into<String>,
    ) -> NodeId {
        self.push(NodeKind::Wiki, parent, name.into(), source_url.into())
    }

    /// Appends a subcommunity under a community.
    pub fn add_community(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        source_url: impl Into<String>,
    ) -> NodeId {
        debug_assert_eq!(self.node(parent).kind, NodeKind::Community);
        self.push(NodeKind::Community, parent, name.into(), source_url.into())
    }

    fn push(&mut self, kind: NodeKind, parent: NodeId, name: String, source_url: String) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes
            .push(TreeNode::new(kind, name, source_url, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Wikis directly owned by `id`, in discovery order.
    pub fn wikis(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children_of_kind(id, NodeKind::Wiki)
    }

    /// Subcommunities directly owned by `id`, in discovery order.
    pub fn subcommunities(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children_of_kind(id, NodeKind::Community)
    }

    fn children_of_kind(&self, id: NodeId, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id)
            .children
            .iter()
            .copied()
            .filter(move |child| self.node(*child).kind == kind)
    }

    /// Depth-first traversal in mirror order.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![(self.root(), 0)],
        }
    }

    /// Returns true once every node has its directories assigned.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.nodes.iter().all(TreeNode::is_resolved)
    }

    pub(crate) fn assign_community_path(&mut self, id: NodeId, path: PathBuf) {
        self.nodes[id.0].local_path = Some(path);
    }

    pub(crate) fn assign_wiki_paths(&mut self, id: NodeId, path: PathBuf, dirs: ContentDirs) {
        let node = &mut self.nodes[id.0];
        node.local_path = Some(path);
        node.content_dirs = Some(dirs);
    }
}

/// One step of a [`Walk`].
#[derive(Debug, Clone, Copy)]
pub struct WalkEntry<'a> {
    pub id: NodeId,
    /// Distance from the root community.
    pub depth: usize,
    pub node: &'a TreeNode,
}

/// Pre-order iterator over a [`MirrorTree`] driven by an explicit stack.
#[derive(Debug)]
pub struct Walk<'a> {
    tree: &'a MirrorTree,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = WalkEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        let node = self.tree.node(id);
        // Children are stored wikis-first, so reversing keeps that order on pop.
        self.stack
            .extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
        Some(WalkEntry { id, depth, node })
    }
}

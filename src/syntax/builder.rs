use std::sync::Arc;

use super::{NodeData, NodeId, NodeKind, SyntaxTree, TextRange};
use crate::model::{Binding, TypeName};

/// Builds a [`SyntaxTree`] bottom-up: children are pushed before the node that
/// refers to them, and parent links are wired when the parent is pushed.
pub struct TreeBuilder {
    path: Arc<str>,
    text: Arc<str>,
    nodes: Vec<NodeData>,
}

impl TreeBuilder {
    pub fn new(path: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            nodes: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn node(&mut self, kind: NodeKind, range: TextRange) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for child in kind.child_ids() {
            let data = &mut self.nodes[child.0 as usize];
            debug_assert!(data.parent.is_none(), "node {child:?} attached twice");
            data.parent = Some(id);
        }
        self.nodes.push(NodeData {
            kind,
            range,
            parent: None,
            binding: None,
            ty: None,
            recovered: false,
        });
        id
    }

    pub fn bind(&mut self, id: NodeId, binding: Binding) -> &mut Self {
        self.nodes[id.0 as usize].binding = Some(binding);
        self
    }

    pub fn set_type(&mut self, id: NodeId, ty: impl Into<TypeName>) -> &mut Self {
        self.nodes[id.0 as usize].ty = Some(ty.into());
        self
    }

    pub fn mark_recovered(&mut self, id: NodeId) -> &mut Self {
        self.nodes[id.0 as usize].recovered = true;
        self
    }

    /// Push the root over the whole text and freeze the tree.
    pub fn finish(mut self, root: NodeKind) -> SyntaxTree {
        let range = TextRange::new(0, self.text.len() as u32);
        let root = self.node(root, range);
        SyntaxTree {
            path: self.path,
            text: self.text,
            nodes: self.nodes,
            root,
        }
    }
}

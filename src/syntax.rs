//! Bound syntax tree handed over by the front end.
//!
//! The tree is an arena of nodes with parent links. Node kinds form a closed
//! enum so every consumer matches exhaustively over the same variant set.
//! Trees produced under parse errors keep going: unbindable pieces are marked
//! `recovered`, and unparseable stretches become `Error` nodes.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::error::EngineError;
use crate::model::{Binding, TypeName};

pub mod builder;
pub mod position;

pub use builder::TreeBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Byte range `[start, end)` in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextRange {
    pub start: u32,
    pub end: u32,
}

impl TextRange {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "inverted range {start}..{end}");
        Self { start, end }
    }

    pub fn empty(at: u32) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// `start <= offset < end`
    pub fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }

    /// `start <= offset <= end`: a cursor right after the last character still
    /// touches the range.
    pub fn touches(&self, offset: u32) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn covers(&self, other: TextRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    Xor,
    And,
    Or,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl InfixOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Rem)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, Self::Shl | Self::Shr | Self::UShr)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, Self::BitAnd | Self::BitOr | Self::Xor)
    }

    pub fn is_conditional(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn is_relational(self) -> bool {
        matches!(self, Self::Lt | Self::Gt | Self::Le | Self::Ge)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrefixOp {
    Plus,
    Minus,
    Not,
    Complement,
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LiteralKind {
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Boolean,
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum NodeKind {
    CompilationUnit {
        items: Vec<NodeId>,
    },
    PackageDecl {
        name: NodeId,
    },
    ImportDecl {
        name: NodeId,
        is_static: bool,
        on_demand: bool,
    },
    /// Class, interface, enum, record or annotation declaration.
    TypeDecl {
        name: Arc<str>,
        is_static: bool,
        members: Vec<NodeId>,
    },
    MethodDecl {
        name: Arc<str>,
        is_static: bool,
        is_constructor: bool,
        params: Vec<NodeId>,
        body: Option<NodeId>,
    },
    Initializer {
        is_static: bool,
        body: NodeId,
    },
    FieldDecl {
        is_static: bool,
        ty: NodeId,
        declarators: Vec<NodeId>,
    },
    Block {
        statements: Vec<NodeId>,
    },
    LocalVarDecl {
        ty: NodeId,
        declarators: Vec<NodeId>,
    },
    VariableDeclarator {
        name: Arc<str>,
        init: Option<NodeId>,
    },
    Parameter {
        name: Arc<str>,
        ty: Option<NodeId>,
    },
    /// Resolved type of the node is the target functional interface.
    Lambda {
        params: Vec<NodeId>,
        body: NodeId,
    },
    Return {
        expr: Option<NodeId>,
    },
    If {
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    While {
        cond: NodeId,
        body: NodeId,
    },
    DoWhile {
        body: NodeId,
        cond: NodeId,
    },
    For {
        init: Vec<NodeId>,
        cond: Option<NodeId>,
        update: Vec<NodeId>,
        body: NodeId,
    },
    ExpressionStmt {
        expr: NodeId,
    },
    SimpleName {
        ident: Arc<str>,
    },
    QualifiedName {
        qualifier: NodeId,
        name: Arc<str>,
    },
    SimpleType {
        name: Arc<str>,
    },
    FieldAccess {
        receiver: NodeId,
        name: Arc<str>,
    },
    MethodInvocation {
        receiver: Option<NodeId>,
        name: Arc<str>,
        args: Vec<NodeId>,
    },
    /// `this(...)` or `super(...)` inside a constructor.
    ConstructorInvocation {
        is_super: bool,
        args: Vec<NodeId>,
    },
    InstanceCreation {
        ty: NodeId,
        args: Vec<NodeId>,
    },
    Assignment {
        compound: Option<InfixOp>,
        lhs: NodeId,
        rhs: NodeId,
    },
    Cast {
        ty: NodeId,
        expr: NodeId,
    },
    InstanceOf {
        expr: NodeId,
        ty: NodeId,
    },
    Infix {
        op: InfixOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Prefix {
        op: PrefixOp,
        operand: NodeId,
    },
    Postfix {
        operand: NodeId,
    },
    Conditional {
        cond: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
    },
    Parenthesized {
        expr: NodeId,
    },
    Literal {
        literal: LiteralKind,
    },
    ArrayAccess {
        array: NodeId,
        index: NodeId,
    },
    MethodRef {
        receiver: NodeId,
        name: Arc<str>,
    },
    /// `PROCESSOR."template"`
    StringTemplate {
        processor: NodeId,
        template: NodeId,
    },
    This,
    Comment {
        javadoc: bool,
    },
    /// Stretch of input the parser could not make sense of.
    Error {
        children: Vec<NodeId>,
    },
}

impl NodeKind {
    /// Child nodes in source order.
    pub fn child_ids(&self) -> Vec<NodeId> {
        use NodeKind::*;
        let mut out = Vec::new();
        match self {
            CompilationUnit { items } => out.extend(items),
            PackageDecl { name } | ImportDecl { name, .. } => out.push(*name),
            TypeDecl { members, .. } => out.extend(members),
            MethodDecl { params, body, .. } => {
                out.extend(params);
                out.extend(body);
            }
            Initializer { body, .. } => out.push(*body),
            FieldDecl { ty, declarators, .. } | LocalVarDecl { ty, declarators } => {
                out.push(*ty);
                out.extend(declarators);
            }
            Block { statements } => out.extend(statements),
            VariableDeclarator { init, .. } => out.extend(init),
            Parameter { ty, .. } => out.extend(ty),
            Lambda { params, body } => {
                out.extend(params);
                out.push(*body);
            }
            Return { expr } => out.extend(expr),
            If {
                cond,
                then_branch,
                else_branch,
            } => {
                out.push(*cond);
                out.push(*then_branch);
                out.extend(else_branch);
            }
            While { cond, body } => out.extend([*cond, *body]),
            DoWhile { body, cond } => out.extend([*body, *cond]),
            For {
                init,
                cond,
                update,
                body,
            } => {
                out.extend(init);
                out.extend(cond);
                out.extend(update);
                out.push(*body);
            }
            ExpressionStmt { expr } | Parenthesized { expr } => out.push(*expr),
            QualifiedName { qualifier, .. } => out.push(*qualifier),
            FieldAccess { receiver, .. } | MethodRef { receiver, .. } => out.push(*receiver),
            MethodInvocation { receiver, args, .. } => {
                out.extend(receiver);
                out.extend(args);
            }
            ConstructorInvocation { args, .. } => out.extend(args),
            InstanceCreation { ty, args } => {
                out.push(*ty);
                out.extend(args);
            }
            Assignment { lhs, rhs, .. } | Infix { lhs, rhs, .. } => out.extend([*lhs, *rhs]),
            Cast { ty, expr } => out.extend([*ty, *expr]),
            InstanceOf { expr, ty } => out.extend([*expr, *ty]),
            Prefix { operand, .. } | Postfix { operand } => out.push(*operand),
            Conditional {
                cond,
                then_expr,
                else_expr,
            } => out.extend([*cond, *then_expr, *else_expr]),
            ArrayAccess { array, index } => out.extend([*array, *index]),
            StringTemplate {
                processor,
                template,
            } => out.extend([*processor, *template]),
            Error { children } => out.extend(children),
            SimpleName { .. } | SimpleType { .. } | Literal { .. } | This | Comment { .. } => {}
        }
        out
    }

    pub fn is_statement_boundary(&self) -> bool {
        matches!(
            self,
            NodeKind::Block { .. }
                | NodeKind::TypeDecl { .. }
                | NodeKind::MethodDecl { .. }
                | NodeKind::CompilationUnit { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub kind: NodeKind,
    pub range: TextRange,
    #[serde(default)]
    pub parent: Option<NodeId>,
    /// Binding the front end attached to this node.
    #[serde(default)]
    pub binding: Option<Binding>,
    /// Resolved type of an expression or type reference.
    #[serde(default)]
    pub ty: Option<TypeName>,
    /// Set by error recovery when the node could not be bound as written.
    #[serde(default)]
    pub recovered: bool,
}

/// Trees from outside the process are checked once, when they are read: every
/// id points into the arena, parent links are acyclic and agree with the
/// child lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TreeData")]
pub struct SyntaxTree {
    path: Arc<str>,
    text: Arc<str>,
    nodes: Vec<NodeData>,
    root: NodeId,
}

#[derive(Deserialize)]
struct TreeData {
    path: Arc<str>,
    text: Arc<str>,
    nodes: Vec<NodeData>,
    root: NodeId,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {node:?} refers to {missing:?}, which is not in the tree")]
    DanglingId { node: NodeId, missing: NodeId },

    #[error("root {0:?} is not in the tree")]
    MissingRoot(NodeId),

    #[error("node {0:?} is its own ancestor")]
    Cycle(NodeId),

    #[error("node {child:?} is listed under {node:?} but its parent is {parent:?}")]
    ParentMismatch {
        node: NodeId,
        child: NodeId,
        parent: Option<NodeId>,
    },
}

impl TryFrom<TreeData> for SyntaxTree {
    type Error = TreeError;

    fn try_from(data: TreeData) -> Result<Self, TreeError> {
        let nodes = &data.nodes;
        let exists = |id: NodeId| (id.0 as usize) < nodes.len();
        if !exists(data.root) {
            return Err(TreeError::MissingRoot(data.root));
        }
        for (i, n) in nodes.iter().enumerate() {
            let node = NodeId(i as u32);
            if let Some(missing) = n
                .parent
                .into_iter()
                .chain(n.kind.child_ids())
                .find(|&id| !exists(id))
            {
                return Err(TreeError::DanglingId { node, missing });
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            OnPath,
            Done,
        }
        let mut marks = vec![Mark::New; nodes.len()];
        for start in 0..nodes.len() {
            let mut path = Vec::new();
            let mut current = Some(start);
            while let Some(i) = current {
                match marks[i] {
                    Mark::Done => break,
                    Mark::OnPath => return Err(TreeError::Cycle(NodeId(i as u32))),
                    Mark::New => {
                        marks[i] = Mark::OnPath;
                        path.push(i);
                        current = nodes[i].parent.map(|p| p.0 as usize);
                    }
                }
            }
            for i in path {
                marks[i] = Mark::Done;
            }
        }

        for (i, n) in nodes.iter().enumerate() {
            let node = NodeId(i as u32);
            for child in n.kind.child_ids() {
                let parent = nodes[child.0 as usize].parent;
                if parent != Some(node) {
                    return Err(TreeError::ParentMismatch {
                        node,
                        child,
                        parent,
                    });
                }
            }
        }

        Ok(SyntaxTree {
            path: data.path,
            text: data.text,
            nodes: data.nodes,
            root: data.root,
        })
    }
}

impl SyntaxTree {
    pub fn path(&self) -> Arc<str> {
        Arc::clone(&self.path)
    }

    pub fn text(&self) -> &str {
        &self.text
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

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0 as usize]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn range(&self, id: NodeId) -> TextRange {
        self.node(id).range
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).kind.child_ids()
    }

    pub fn node_text(&self, id: NodeId) -> &str {
        self.slice(self.range(id))
    }

    pub fn slice(&self, range: TextRange) -> &str {
        self.text
            .get(range.start as usize..range.end as usize)
            .unwrap_or("")
    }

    /// The node itself followed by its ancestors up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&n| self.parent(n))
    }

    /// Offsets are byte offsets; an offset equal to the text length (cursor at
    /// end of file) is valid.
    pub fn check_offset(&self, offset: u32) -> Result<(), EngineError> {
        let len = self.text.len();
        if (offset as usize) > len || !self.text.is_char_boundary(offset as usize) {
            return Err(EngineError::InvalidOffset {
                offset,
                len: len as u32,
            });
        }
        Ok(())
    }

    pub fn check_range(&self, range: TextRange) -> Result<(), EngineError> {
        if range.start > range.end {
            return Err(EngineError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        self.check_offset(range.start)?;
        self.check_offset(range.end)
    }

    /// Innermost node touching `offset`. A node ending exactly at the offset is
    /// only taken when no sibling strictly contains it, so `foo|` lands on
    /// `foo` while `a|.b` lands on `a`.
    pub fn covering_node(&self, offset: u32) -> Option<NodeId> {
        if !self.range(self.root).touches(offset) {
            return None;
        }
        let mut current = self.root;
        loop {
            let children = self.children(current);
            let strict = children
                .iter()
                .copied()
                .find(|&c| self.range(c).contains(offset));
            let next = strict.or_else(|| {
                children
                    .iter()
                    .copied()
                    .rev()
                    .find(|&c| self.range(c).touches(offset))
            });
            match next {
                Some(child) => current = child,
                None => return Some(current),
            }
        }
    }

    /// Innermost node whose range covers `range`.
    pub fn covering_range(&self, range: TextRange) -> Option<NodeId> {
        if range.is_empty() {
            return self.covering_node(range.start);
        }
        if !self.range(self.root).covers(range) {
            return None;
        }
        let mut current = self.root;
        loop {
            let next = self
                .children(current)
                .into_iter()
                .find(|&c| self.range(c).covers(range));
            match next {
                Some(child) => current = child,
                None => return Some(current),
            }
        }
    }

    pub fn find_ancestor(
        &self,
        id: NodeId,
        pred: impl Fn(&NodeKind) -> bool,
    ) -> Option<NodeId> {
        self.ancestors(id).find(|&n| pred(self.kind(n)))
    }

    /// Innermost enclosing type declaration (including `id` itself).
    pub fn enclosing_type_decl(&self, id: NodeId) -> Option<NodeId> {
        self.find_ancestor(id, |k| matches!(k, NodeKind::TypeDecl { .. }))
    }

    /// Outermost type declaration containing `id`.
    pub fn top_level_type_decl(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .filter(|&n| matches!(self.kind(n), NodeKind::TypeDecl { .. }))
            .last()
    }

    /// Type name of the declaration bound to a `TypeDecl` node.
    pub fn declared_type(&self, type_decl: NodeId) -> Option<TypeName> {
        match &self.node(type_decl).binding {
            Some(Binding::Type(t)) => Some(t.name.clone()),
            _ => None,
        }
    }

    /// Dotted package name from the `package` declaration, if any.
    pub fn package_name(&self) -> Option<String> {
        let NodeKind::CompilationUnit { items } = self.kind(self.root) else {
            return None;
        };
        items.iter().find_map(|&item| match self.kind(item) {
            NodeKind::PackageDecl { name } => Some(self.node_text(*name).trim().to_string()),
            _ => None,
        })
    }

    /// Import declarations as `(dotted name, is_static, on_demand)`.
    pub fn imports(&self) -> Vec<(String, bool, bool)> {
        let NodeKind::CompilationUnit { items } = self.kind(self.root) else {
            return vec![];
        };
        items
            .iter()
            .filter_map(|&item| match self.kind(item) {
                NodeKind::ImportDecl {
                    name,
                    is_static,
                    on_demand,
                } => {
                    let text: String = self
                        .node_text(*name)
                        .chars()
                        .filter(|c| !c.is_whitespace())
                        .collect();
                    Some((text, *is_static, *on_demand))
                }
                _ => None,
            })
            .collect()
    }
}

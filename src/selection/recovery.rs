//! Best-effort type of a node the front end could not bind.
//!
//! The resolver walks outward from the node at the cursor. Each step either
//! produces a type, moves to the parent, or gives up. It never visits a node
//! that starts after the cursor, and every walk ends after at most a few
//! states per ancestor.

use crate::completion::expected::type_of;
use crate::completion::scope::ScopeWalker;
use crate::model::TypeName;
use crate::request::Request;
use crate::syntax::{NodeId, NodeKind, SyntaxTree};

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    AtCursorNode(NodeId),
    /// A type reference that failed to bind, read as a variable name.
    SimpleTypeCandidate(NodeId),
    QualifiedAccessCandidate(NodeId),
    /// `ident.|`: the identifier before the dot, read as a variable.
    DotFollowedCandidate(NodeId, String),
    TryParent(NodeId),
    Resolved(NodeId, TypeName),
    GiveUp,
}

struct Resolver<'r, 'a> {
    req: &'r Request<'a>,
    tree: &'r SyntaxTree,
    offset: u32,
}

impl Resolver<'_, '_> {
    fn step(&self, state: State) -> State {
        match state {
            State::AtCursorNode(node) => self.classify(node),
            State::SimpleTypeCandidate(node) => {
                let name = match self.tree.kind(node) {
                    NodeKind::SimpleType { name } => name.to_string(),
                    NodeKind::SimpleName { ident } => ident.to_string(),
                    _ => return State::TryParent(node),
                };
                self.accept(node, self.variable_type(node, &name))
            }
            State::QualifiedAccessCandidate(node) => {
                let NodeKind::QualifiedName { qualifier, .. } = self.tree.kind(node) else {
                    return State::TryParent(node);
                };
                let ty = type_of(self.req, self.tree, *qualifier).or_else(|| {
                    match self.tree.kind(*qualifier) {
                        NodeKind::SimpleName { ident } => self.variable_type(node, ident),
                        _ => None,
                    }
                });
                self.accept(node, ty)
            }
            State::DotFollowedCandidate(node, ident) => {
                self.accept(node, self.variable_type(node, &ident))
            }
            State::TryParent(node) => match self.tree.parent(node) {
                Some(parent) if self.tree.range(parent).start <= self.offset => {
                    State::AtCursorNode(parent)
                }
                _ => State::GiveUp,
            },
            terminal @ (State::Resolved(..) | State::GiveUp) => terminal,
        }
    }

    /// A type only counts when the model knows it.
    fn accept(&self, node: NodeId, ty: Option<TypeName>) -> State {
        match ty {
            Some(ty) if ty.is_array() || self.req.type_binding(&ty).is_some() => {
                State::Resolved(node, ty)
            }
            Some(ty) => {
                tracing::debug!(ty = %ty, "recovery: resolved type is unknown to the model");
                State::TryParent(node)
            }
            None => State::TryParent(node),
        }
    }

    fn classify(&self, node: NodeId) -> State {
        let sub = match self.tree.kind(node) {
            NodeKind::MethodInvocation { receiver, .. } => *receiver,
            NodeKind::FieldAccess { receiver, .. } => Some(*receiver),
            NodeKind::ExpressionStmt { expr } => Some(*expr),
            NodeKind::StringTemplate { processor, .. } => Some(*processor),
            NodeKind::SimpleType { .. } | NodeKind::SimpleName { .. }
                if self.tree.node(node).recovered =>
            {
                return State::SimpleTypeCandidate(node);
            }
            NodeKind::QualifiedName { .. } => return State::QualifiedAccessCandidate(node),
            _ => None,
        };
        if let Some(sub) = sub
            && let State::Resolved(at, ty) = self.accept(node, type_of(self.req, self.tree, sub))
        {
            return State::Resolved(at, ty);
        }
        match self.identifier_before_dot(node) {
            Some(ident) => State::DotFollowedCandidate(node, ident),
            None => State::TryParent(node),
        }
    }

    /// `foo.|` inside `node`: the bare identifier right before the dot that
    /// precedes the cursor.
    fn identifier_before_dot(&self, node: NodeId) -> Option<String> {
        let range = self.tree.range(node);
        if !range.touches(self.offset) {
            return None;
        }
        let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
        let text = &self.tree.text()[range.start as usize..self.offset as usize];
        let before_dot = text
            .trim_end_matches(is_ident)
            .trim_end()
            .strip_suffix('.')?
            .trim_end();
        let ident_start = before_dot.trim_end_matches(is_ident).len();
        let ident = &before_dot[ident_start..];
        let chained = before_dot[..ident_start].trim_end().ends_with(['.', ')']);
        (!ident.is_empty() && !chained && !ident.starts_with(|c: char| c.is_ascii_digit()))
            .then(|| ident.to_string())
    }

    fn variable_type(&self, from: NodeId, name: &str) -> Option<TypeName> {
        let found = ScopeWalker::new(self.req, self.tree, from, self.offset).find_variable(name)?;
        tracing::debug!(name, "recovery: identifier read as a variable");
        found.value_type().cloned()
    }
}

/// Type of `node` recovered from its surroundings, `None` when the walk gives
/// up and the caller should fall back to the index.
pub fn resolve(req: &Request<'_>, tree: &SyntaxTree, node: NodeId, offset: u32) -> Option<TypeName> {
    let resolver = Resolver { req, tree, offset };
    let mut state = State::AtCursorNode(node);
    // each ancestor is classified once and yields at most three further states
    let budget = (tree.ancestors(node).count() + 1) * 4;
    for _ in 0..budget {
        state = match resolver.step(state) {
            State::Resolved(_, ty) => {
                tracing::debug!(ty = %ty, "recovery: resolved");
                return Some(ty);
            }
            State::GiveUp => break,
            next => next,
        };
    }
    tracing::debug!(?node, "recovery: gave up");
    None
}

//! Selection requests: the declaration(s) a range of source refers to.

pub mod recovery;

use std::sync::Arc;
use tracing::instrument;

use crate::completion::expected::{methods_named, type_of};
use crate::error::EngineError;
use crate::index::SearchOutcome;
use crate::model::hierarchy::{erase, is_assignable, supertypes};
use crate::model::{Binding, DeclarationHandle, MethodBinding, TypeName};
use crate::request::Request;
use crate::syntax::{NodeId, NodeKind, SyntaxTree, TextRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Empty when nothing could be resolved. Several handles mean the
    /// reference is ambiguous.
    Resolved(Vec<DeclarationHandle>),
    Cancelled,
}

impl SelectionOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn handles(&self) -> &[DeclarationHandle] {
        match self {
            Self::Resolved(handles) => handles,
            Self::Cancelled => &[],
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
}

/// Dotted name around `range`, e.g. `java.util.List` in a Javadoc `@see`.
fn name_around(text: &str, range: TextRange) -> Option<&str> {
    let start = text[..range.start as usize]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_name_char(c))
        .last()
        .map_or(range.start as usize, |(i, _)| i);
    let end = text[range.end as usize..]
        .char_indices()
        .find(|&(_, c)| !is_name_char(c))
        .map_or(text.len(), |(i, _)| range.end as usize + i);
    let name = text[start..end].trim_matches('.');
    (!name.is_empty()).then_some(name)
}

/// `Some(package)` for a dotted name, the simple name always.
fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((package, simple)) => (Some(package), simple),
        None => (None, name),
    }
}

struct Selector<'r, 'a> {
    req: &'r Request<'a>,
    tree: &'r SyntaxTree,
    range: TextRange,
}

impl Selector<'_, '_> {
    fn handle(&self, binding: &Binding) -> Option<DeclarationHandle> {
        let handle = self.req.model.declaring_node(self.tree, binding);
        if handle.is_none() {
            tracing::debug!(name = binding.name(), "selection: binding has no declaration");
        }
        handle
    }

    fn index_search(&self, name: &str) -> Result<Vec<DeclarationHandle>, EngineError> {
        let (package, simple) = split_qualified(name);
        // `Outer.Inner` or `Type.member`: the qualifier is not a package
        let package = package.filter(|p| !p.chars().any(char::is_uppercase));
        match self.req.index.find_type(
            simple,
            package,
            self.req.project.as_deref(),
            &self.req.cancel,
        ) {
            SearchOutcome::Found(handles) => Ok(handles),
            SearchOutcome::Cancelled => Err(EngineError::Cancelled),
        }
    }

    /// Type of a receiver expression, through recovery when it did not bind.
    fn receiver_type(&self, receiver: NodeId) -> Option<TypeName> {
        if let Some(Binding::Type(t)) = self.req.model.resolve_binding(self.tree, receiver) {
            return Some(t.name.clone());
        }
        type_of(self.req, self.tree, receiver)
            .or_else(|| recovery::resolve(self.req, self.tree, receiver, self.range.start))
    }

    /// Methods an unbound call may target: same name, compatible arity, and
    /// every argument with a known type assignable to its parameter.
    fn candidate_methods(&self, owner: &TypeName, name: &str, args: &[NodeId]) -> Vec<Arc<MethodBinding>> {
        let owner_params = self
            .req
            .type_binding(owner)
            .map(|t| t.type_params.clone())
            .unwrap_or_default();
        methods_named(self.req, owner, name)
            .into_iter()
            .filter(|m| m.accepts_arity(args.len()))
            .filter(|m| {
                args.iter().enumerate().all(|(i, &arg)| {
                    let accepted = m.params_at(i);
                    let Some(actual) = type_of(self.req, self.tree, arg) else {
                        return true;
                    };
                    accepted.is_empty()
                        || accepted.iter().any(|param| {
                            let param =
                                erase(param, m.type_params.iter().chain(owner_params.iter()));
                            is_assignable(self.req, &actual, &param)
                        })
                })
            })
            .collect()
    }

    fn unbound_member(&self, node: NodeId) -> Option<Vec<DeclarationHandle>> {
        match self.tree.kind(node) {
            NodeKind::MethodInvocation {
                receiver,
                name,
                args,
            } => {
                let owners: Vec<TypeName> = match receiver {
                    Some(r) => self.receiver_type(*r).into_iter().collect(),
                    None => self
                        .tree
                        .ancestors(node)
                        .filter_map(|n| self.tree.declared_type(n))
                        .collect(),
                };
                owners.iter().find_map(|owner| {
                    let methods = self.candidate_methods(owner, name, args);
                    tracing::debug!(owner = %owner, %name, count = methods.len(), "selection: unbound call");
                    (!methods.is_empty()).then(|| {
                        methods
                            .into_iter()
                            .filter_map(|m| self.handle(&Binding::Method(m)))
                            .collect()
                    })
                })
            }
            NodeKind::FieldAccess { receiver, name } => {
                let owner = self.receiver_type(*receiver)?;
                let field = supertypes(self.req, owner.base())
                    .into_iter()
                    .find_map(|t| t.fields.iter().find(|f| f.name == *name).cloned())?;
                self.handle(&Binding::Field(field)).map(|h| vec![h])
            }
            _ => None,
        }
    }

    fn select(&self) -> Result<Vec<DeclarationHandle>, EngineError> {
        let node = self
            .tree
            .covering_range(self.range)
            .unwrap_or_else(|| self.tree.root());

        let in_comment = self
            .tree
            .ancestors(node)
            .any(|n| matches!(self.tree.kind(n), NodeKind::Comment { .. }));
        if in_comment {
            let Some(name) = name_around(self.tree.text(), self.range) else {
                return Ok(Vec::new());
            };
            tracing::debug!(name, "selection: reference in comment");
            return self.index_search(name);
        }

        if let Some(binding) = self.req.model.resolve_binding(self.tree, node) {
            tracing::debug!(kind = ?binding.kind(), name = binding.name(), "selection: direct binding");
            return Ok(self.handle(&binding).into_iter().collect());
        }

        if let Some(handles) = self.unbound_member(node) {
            return Ok(handles);
        }

        if let Some(ty) = recovery::resolve(self.req, self.tree, node, self.range.start) {
            let handle = self
                .req
                .type_binding(&ty)
                .and_then(|t| self.handle(&Binding::Type(t)));
            if let Some(handle) = handle {
                return Ok(vec![handle]);
            }
        }

        let text = self.tree.node_text(node);
        let name = if text.chars().all(is_name_char) {
            Some(text)
        } else {
            name_around(self.tree.text(), self.range)
        };
        match name {
            Some(name) => {
                tracing::debug!(name, "selection: falling back to the index");
                self.index_search(name)
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Resolve the declarations `range` refers to. Direct bindings win, then
/// unbound calls and field accesses through their receiver type, then error
/// recovery, then the workspace index.
#[instrument(skip(req, tree), fields(path = %tree.path()))]
pub fn select(
    req: &Request<'_>,
    tree: &SyntaxTree,
    range: TextRange,
) -> Result<SelectionOutcome, EngineError> {
    tree.check_range(range)?;
    let selector = Selector { req, tree, range };
    match selector.select() {
        Ok(handles) => {
            tracing::debug!(count = handles.len(), "selection: done");
            Ok(SelectionOutcome::Resolved(handles))
        }
        Err(EngineError::Cancelled) => Ok(SelectionOutcome::Cancelled),
        Err(e) => Err(e),
    }
}

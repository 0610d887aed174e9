//! Lexical scope chain around a position, innermost first.

use rustc_hash::FxHashSet;
use std::sync::Arc;

use crate::model::hierarchy::supertypes;
use crate::model::{Binding, TypeName};
use crate::request::Request;
use crate::syntax::{NodeId, NodeKind, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Block,
    Lambda,
    Method,
    For,
    Type,
    CompilationUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub node: NodeId,
    pub kind: ScopeKind,
    /// Position in the walk, 0 for the innermost scope.
    pub depth: usize,
    /// Instance members are excluded from this scope and everything outside it.
    pub static_only: bool,
}

/// Lazy walk over the scopes enclosing `offset`. Each step yields the scope and
/// the bindings it introduces. Ends after the compilation-unit scope.
pub struct ScopeWalker<'r, 'a> {
    req: &'r Request<'a>,
    tree: &'r SyntaxTree,
    offset: u32,
    next: Option<NodeId>,
    /// Child we came from, used to tell a declarator's initializer from its scope.
    came_from: Option<NodeId>,
    static_only: bool,
    depth: usize,
}

impl<'r, 'a> ScopeWalker<'r, 'a> {
    pub fn new(req: &'r Request<'a>, tree: &'r SyntaxTree, start: NodeId, offset: u32) -> Self {
        Self {
            req,
            tree,
            offset,
            next: Some(start),
            came_from: None,
            static_only: false,
            depth: 0,
        }
    }

    /// Variables, parameters and fields named `name`, closest first.
    pub fn find_variable(self, name: &str) -> Option<Binding> {
        self.flat_map(|(_, bindings)| bindings)
            .find(|b| matches!(b, Binding::Variable(_) | Binding::Field(_)) && b.name() == name)
    }

    fn bound(&self, node: NodeId) -> Option<Binding> {
        self.req.model.resolve_binding(self.tree, node)
    }

    /// Locals of a block declared before the cursor. A declarator does not see
    /// itself from its own initializer.
    fn block_locals(&self, statements: &[NodeId]) -> Vec<Binding> {
        let mut out = Vec::new();
        for &stmt in statements {
            if self.tree.range(stmt).start >= self.offset {
                break;
            }
            if let NodeKind::LocalVarDecl { declarators, .. } = self.tree.kind(stmt) {
                out.extend(self.declarator_bindings(declarators));
            }
        }
        out.reverse();
        out
    }

    fn declarator_bindings(&self, declarators: &[NodeId]) -> Vec<Binding> {
        declarators
            .iter()
            .filter(|&&d| self.tree.range(d).end < self.offset)
            .filter_map(|&d| self.bound(d))
            .filter(|b| matches!(b, Binding::Variable(_)))
            .collect()
    }

    fn parameters(&self, params: &[NodeId]) -> Vec<Binding> {
        params
            .iter()
            .filter_map(|&p| self.bound(p))
            .filter(|b| matches!(b, Binding::Variable(_)))
            .collect()
    }

    /// Members of a type and all its supertypes, in lookup order.
    fn type_members(&self, ty: &TypeName) -> Vec<Binding> {
        let mut out = Vec::new();
        for t in supertypes(self.req, ty.base()) {
            for f in &t.fields {
                if !self.static_only || f.modifiers.is_static() {
                    out.push(Binding::Field(Arc::clone(f)));
                }
            }
            for m in t.member_methods() {
                if !self.static_only || m.modifiers.is_static() {
                    out.push(Binding::Method(Arc::clone(m)));
                }
            }
            for member in &t.member_types {
                if let Some(mt) = self.req.type_binding(member) {
                    out.push(Binding::Type(mt));
                }
            }
        }
        out
    }

    /// Types of this unit, imports, the unit's package and `java.lang`, in
    /// that precedence.
    fn unit_bindings(&self, items: &[NodeId]) -> Vec<Binding> {
        let mut out = Vec::new();
        let mut seen: FxHashSet<TypeName> = FxHashSet::default();
        let mut push_type = |out: &mut Vec<Binding>, name: &str| {
            if seen.contains(name) {
                return;
            }
            if let Some(t) = self.req.type_binding(name) {
                seen.insert(t.name.clone());
                out.push(Binding::Type(t));
            }
        };

        for &item in items {
            if matches!(self.tree.kind(item), NodeKind::TypeDecl { .. })
                && let Some(Binding::Type(t)) = self.bound(item)
            {
                push_type(&mut out, &t.name);
            }
        }

        let imports = self.tree.imports();
        for (name, is_static, on_demand) in &imports {
            match (is_static, on_demand) {
                (false, false) => push_type(&mut out, &dotted_to_internal(self.req, name)),
                (true, false) => {
                    let Some((owner, member)) = name.rsplit_once('.') else {
                        continue;
                    };
                    out.extend(self.static_members(&dotted_to_internal(self.req, owner), Some(member)));
                }
                _ => {}
            }
        }

        let mut on_demand_packages: Vec<String> = Vec::new();
        if let Some(pkg) = self.tree.package_name() {
            on_demand_packages.push(pkg);
        } else {
            on_demand_packages.push(String::new());
        }
        for (name, is_static, on_demand) in &imports {
            match (is_static, on_demand) {
                (false, true) => {
                    let internal = dotted_to_internal(self.req, name);
                    if let Some(t) = self.req.type_binding(&internal) {
                        // `import p.Outer.*` brings in member types
                        for member in &t.member_types {
                            push_type(&mut out, member);
                        }
                    } else {
                        on_demand_packages.push(name.clone());
                    }
                }
                (true, true) => {
                    out.extend(self.static_members(&dotted_to_internal(self.req, name), None));
                }
                _ => {}
            }
        }
        on_demand_packages.push("java.lang".to_string());

        for pkg in on_demand_packages {
            let mut entries = self.req.index.types_in_package(&pkg);
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            for entry in entries {
                // member types come in through their outer type
                if !entry.name.contains('$') {
                    push_type(&mut out, &entry.name);
                }
            }
        }
        out
    }

    fn static_members(&self, owner: &str, only: Option<&str>) -> Vec<Binding> {
        let Some(ty) = self.req.type_binding(owner) else {
            tracing::debug!(owner, "scope: static import owner not found");
            return vec![];
        };
        let wanted = |name: &str| only.is_none_or(|o| o == name);
        let mut out = Vec::new();
        for t in supertypes(self.req, &ty.name) {
            out.extend(
                t.fields
                    .iter()
                    .filter(|f| f.modifiers.is_static() && wanted(&f.name))
                    .map(|f| Binding::Field(Arc::clone(f))),
            );
            out.extend(
                t.member_methods()
                    .filter(|m| m.modifiers.is_static() && wanted(&m.name))
                    .map(|m| Binding::Method(Arc::clone(m))),
            );
        }
        out
    }

    fn scope(&self, node: NodeId, kind: ScopeKind) -> Scope {
        Scope {
            node,
            kind,
            depth: self.depth,
            static_only: self.static_only,
        }
    }
}

/// Dotted names may denote nested types ("java.util.Map.Entry"). Try the
/// longest package prefix the model knows.
pub fn dotted_to_internal(req: &Request<'_>, dotted: &str) -> String {
    let segments: Vec<&str> = dotted.split('.').collect();
    for split in (1..segments.len()).rev() {
        let pkg = segments[..split].join("/");
        let name = format!("{pkg}/{}", segments[split..].join("$"));
        if req.type_binding(&name).is_some() {
            return name;
        }
    }
    dotted.replace('.', "/")
}

impl Iterator for ScopeWalker<'_, '_> {
    type Item = (Scope, Vec<Binding>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.next {
            self.next = self.tree.parent(node);
            let came_from = self.came_from.replace(node);

            let item = match self.tree.kind(node) {
                NodeKind::Block { statements } => {
                    let locals = self.block_locals(statements);
                    Some((self.scope(node, ScopeKind::Block), locals))
                }
                NodeKind::For { init, .. } => {
                    // the loop variables are not in scope inside their own initializers
                    if init.iter().any(|&i| Some(i) == came_from) {
                        None
                    } else {
                        let mut vars = Vec::new();
                        for &i in init {
                            if let NodeKind::LocalVarDecl { declarators, .. } = self.tree.kind(i) {
                                vars.extend(self.declarator_bindings(declarators));
                            }
                        }
                        Some((self.scope(node, ScopeKind::For), vars))
                    }
                }
                NodeKind::Lambda { params, .. } => {
                    let params = self.parameters(params);
                    Some((self.scope(node, ScopeKind::Lambda), params))
                }
                NodeKind::MethodDecl {
                    params, is_static, ..
                } => {
                    let params = self.parameters(params);
                    let item = (self.scope(node, ScopeKind::Method), params);
                    if *is_static {
                        self.static_only = true;
                    }
                    Some(item)
                }
                NodeKind::Initializer { is_static, .. } => {
                    if *is_static {
                        self.static_only = true;
                    }
                    None
                }
                NodeKind::FieldDecl { is_static, .. } => {
                    if *is_static {
                        self.static_only = true;
                    }
                    None
                }
                NodeKind::TypeDecl { is_static, .. } => {
                    let members = match self.tree.declared_type(node) {
                        Some(ty) => self.type_members(&ty),
                        None => {
                            tracing::debug!(?node, "scope: type declaration without binding");
                            Vec::new()
                        }
                    };
                    let item = (self.scope(node, ScopeKind::Type), members);
                    if *is_static {
                        self.static_only = true;
                    }
                    Some(item)
                }
                NodeKind::CompilationUnit { items } => {
                    let bindings = self.unit_bindings(items);
                    self.next = None;
                    Some((self.scope(node, ScopeKind::CompilationUnit), bindings))
                }
                _ => None,
            };

            if let Some(item) = item {
                self.depth += 1;
                return Some(item);
            }
        }
        None
    }
}

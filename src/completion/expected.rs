//! Expected types at the cursor, read off the surrounding syntax.
//!
//! The result only ranks candidates and narrows overloads; nothing is ever
//! rejected because of it.

use std::sync::Arc;

use crate::model::hierarchy::{erase, functional_method, is_assignable, supertypes};
use crate::model::{Binding, MethodBinding, Primitive, TypeName, type_name::STRING};
use crate::request::Request;
use crate::syntax::{InfixOp, NodeId, NodeKind, PrefixOp, SyntaxTree, TextRange};

/// Ancestor steps taken before giving up with "no opinion".
const MAX_ANCESTOR_STEPS: usize = 12;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedTypeSet {
    pub types: Vec<TypeName>,
    /// Candidates assignable to an expected type are acceptable.
    pub allow_subtypes: bool,
    /// Candidates an expected type is assignable to are acceptable.
    pub allow_supertypes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    Exact,
    Compatible,
}

impl ExpectedTypeSet {
    fn exact(types: Vec<TypeName>) -> Self {
        Self::new(types, false, false)
    }

    fn subtypes_of(types: Vec<TypeName>) -> Self {
        Self::new(types, true, false)
    }

    fn either_way(types: Vec<TypeName>) -> Self {
        Self::new(types, true, true)
    }

    fn new(types: Vec<TypeName>, allow_subtypes: bool, allow_supertypes: bool) -> Self {
        let mut unique: Vec<TypeName> = Vec::with_capacity(types.len());
        for t in types {
            if !t.is_void() && !unique.contains(&t) {
                unique.push(t);
            }
        }
        Self {
            types: unique,
            allow_subtypes,
            allow_supertypes,
        }
    }

    fn boolean() -> Self {
        Self::exact(vec![TypeName::primitive(Primitive::Boolean)])
    }

    fn numeric() -> Self {
        Self::subtypes_of(Primitive::NUMERIC.map(TypeName::primitive).to_vec())
    }

    fn integral() -> Self {
        Self::subtypes_of(Primitive::INTEGRAL.map(TypeName::primitive).to_vec())
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn contains(&self, ty: &TypeName) -> bool {
        self.types.iter().any(|t| t.base() == ty.base())
    }

    /// How a value of type `ty` fits, honoring the admitted directions.
    pub fn fit(&self, req: &Request<'_>, ty: &TypeName) -> Option<Fit> {
        if self.contains(ty) {
            return Some(Fit::Exact);
        }
        let compatible = self.types.iter().any(|e| {
            (self.allow_subtypes && is_assignable(req, ty, e))
                || (self.allow_supertypes && is_assignable(req, e, ty))
        });
        compatible.then_some(Fit::Compatible)
    }
}

/// Static type of an expression or type node: the resolved type the front end
/// recorded, else the type its binding evaluates to. Recovered nodes have none.
pub fn type_of(req: &Request<'_>, tree: &SyntaxTree, node: NodeId) -> Option<TypeName> {
    let data = tree.node(node);
    if data.recovered {
        return None;
    }
    if let Some(ty) = &data.ty {
        return Some(ty.clone());
    }
    req.model
        .resolve_binding(tree, node)
        .and_then(|b| b.value_type().cloned())
}

/// `text` with the contents of string and char literals blanked out, so
/// separators inside them are not read as syntax. `text` must start outside
/// any literal.
fn mask_literals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for ch in text.chars() {
        match quote {
            None => {
                if ch == '"' || ch == '\'' {
                    quote = Some(ch);
                }
                out.push(ch);
            }
            Some(_) if escaped => {
                escaped = false;
                out.push(' ');
            }
            Some(_) if ch == '\\' => {
                escaped = true;
                out.push(' ');
            }
            Some(q) if ch == q => {
                quote = None;
                out.push(ch);
            }
            Some(_) => out.push(' '),
        }
    }
    out
}

/// Index of the argument slot at the end of `text` inside the innermost open
/// parenthesis, if the end is inside one.
fn argument_index(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut commas = 0usize;
    for ch in mask_literals(text).chars().rev() {
        match ch {
            ')' | ']' | '}' => depth += 1,
            '(' | '[' | '{' => {
                if depth == 0 {
                    return (ch == '(').then_some(commas);
                }
                depth -= 1;
            }
            ',' if depth == 0 => commas += 1,
            ';' if depth == 0 => return None,
            _ => {}
        }
    }
    None
}

/// Top-level commas in `text`, which follows an argument. `None` once the
/// argument list closes.
fn commas_after_argument(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut commas = 0usize;
    for ch in mask_literals(text).chars() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => commas += 1,
            ';' if depth == 0 => return None,
            _ => {}
        }
    }
    Some(commas)
}

enum Step {
    Found(ExpectedTypeSet),
    Continue,
    Stop,
}

pub struct ExpectedTypeInferrer<'r, 'a> {
    req: &'r Request<'a>,
    tree: &'r SyntaxTree,
    offset: u32,
}

impl<'r, 'a> ExpectedTypeInferrer<'r, 'a> {
    pub fn new(req: &'r Request<'a>, tree: &'r SyntaxTree, offset: u32) -> Self {
        Self { req, tree, offset }
    }

    pub fn infer(&self, node: NodeId) -> ExpectedTypeSet {
        if let Some(found) = self.hole_inside(node) {
            tracing::debug!(types = ?found.types, "expected: hole inside node");
            return found;
        }
        let mut child = node;
        for _ in 0..MAX_ANCESTOR_STEPS {
            let Some(parent) = self.tree.parent(child) else {
                break;
            };
            match self.constraint(parent, child) {
                Step::Found(found) => {
                    tracing::debug!(
                        types = ?found.types,
                        subtypes = found.allow_subtypes,
                        supertypes = found.allow_supertypes,
                        "expected: constrained by ancestor"
                    );
                    return found;
                }
                Step::Continue => child = parent,
                Step::Stop => break,
            }
        }
        ExpectedTypeSet::default()
    }

    fn type_of(&self, node: NodeId) -> Option<TypeName> {
        type_of(self.req, self.tree, node)
    }

    /// The cursor sits in a hole the parser left inside `node`, such as
    /// `int i = |` or `foo(a, |)`.
    fn hole_inside(&self, node: NodeId) -> Option<ExpectedTypeSet> {
        let range = self.tree.range(node);
        let cursor = self.offset.clamp(range.start, range.end);
        let before = self.tree.slice(TextRange::new(range.start, cursor));
        match self.tree.kind(node) {
            NodeKind::VariableDeclarator { init, .. } => {
                let in_init = init.is_some_and(|i| self.tree.range(i).touches(self.offset));
                (before.contains('=') && !in_init).then(|| self.declarator_type(node))
            }
            NodeKind::MethodInvocation { args, .. }
            | NodeKind::InstanceCreation { args, .. }
            | NodeKind::ConstructorInvocation { args, .. } => {
                let index = self.argument_slot(args, before, cursor)?;
                Some(self.argument_types(node, index, args))
            }
            NodeKind::Return { expr: None } if before.len() > "return".len() => {
                Some(self.return_types(node))
            }
            _ => None,
        }
    }

    /// Argument slot at `cursor`. Arguments the parser kept anchor the count;
    /// only the text after the last one before the cursor is scanned.
    fn argument_slot(&self, args: &[NodeId], call_text: &str, cursor: u32) -> Option<usize> {
        let passed = args
            .iter()
            .take_while(|&&a| self.tree.range(a).end <= cursor)
            .count();
        let Some(last) = passed.checked_sub(1) else {
            return argument_index(call_text);
        };
        let tail = self
            .tree
            .slice(TextRange::new(self.tree.range(args[last]).end, cursor));
        Some(last + commas_after_argument(tail)?)
    }

    fn constraint(&self, parent: NodeId, child: NodeId) -> Step {
        use NodeKind::*;
        match self.tree.kind(parent) {
            VariableDeclarator { init: Some(i), .. } if *i == child => {
                Step::Found(self.declarator_type(parent))
            }
            Assignment { lhs, rhs, compound } if *rhs == child => match compound {
                Some(op) => Step::Found(self.operand_types(*op, *lhs)),
                None => match self.type_of(*lhs) {
                    Some(t) => Step::Found(ExpectedTypeSet::subtypes_of(vec![t])),
                    None => Step::Stop,
                },
            },
            Cast { ty, expr } if *expr == child => self.found_either_way(*ty),
            InstanceOf { expr, ty } => {
                let other = if *expr == child { *ty } else { *expr };
                self.found_either_way(other)
            }
            If { cond, .. } | While { cond, .. } | DoWhile { cond, .. } if *cond == child => {
                Step::Found(ExpectedTypeSet::boolean())
            }
            For { cond: Some(cond), .. } if *cond == child => Step::Found(ExpectedTypeSet::boolean()),
            Conditional { cond, .. } if *cond == child => Step::Found(ExpectedTypeSet::boolean()),
            Conditional { .. } => match self.type_of(parent) {
                Some(t) => Step::Found(ExpectedTypeSet::subtypes_of(vec![t])),
                None => Step::Continue,
            },
            Infix { op, lhs, rhs } => {
                let other = if *lhs == child { *rhs } else { *lhs };
                Step::Found(self.operand_types(*op, other))
            }
            Prefix { op, .. } => Step::Found(match op {
                PrefixOp::Not => ExpectedTypeSet::boolean(),
                PrefixOp::Complement => ExpectedTypeSet::integral(),
                PrefixOp::Plus | PrefixOp::Minus | PrefixOp::Increment | PrefixOp::Decrement => {
                    ExpectedTypeSet::numeric()
                }
            }),
            Postfix { .. } => Step::Found(ExpectedTypeSet::numeric()),
            ArrayAccess { index, .. } if *index == child => Step::Found(
                ExpectedTypeSet::subtypes_of(vec![TypeName::primitive(Primitive::Int)]),
            ),
            // `new Li|` takes the expectation of the whole creation
            InstanceCreation { ty, .. } if *ty == child => Step::Continue,
            MethodInvocation { args, .. }
            | InstanceCreation { args, .. }
            | ConstructorInvocation { args, .. } => match args.iter().position(|&a| a == child) {
                Some(index) => Step::Found(self.argument_types(parent, index, args)),
                None => Step::Stop,
            },
            Return { expr: Some(e) } if *e == child => Step::Found(self.return_types(parent)),
            Lambda { body, .. } if *body == child => {
                if matches!(self.tree.kind(child), Block { .. }) {
                    Step::Stop
                } else {
                    Step::Found(self.lambda_return(parent))
                }
            }
            Parenthesized { .. } | Error { .. } => Step::Continue,
            _ => Step::Stop,
        }
    }

    fn found_either_way(&self, node: NodeId) -> Step {
        match self.type_of(node) {
            Some(t) => Step::Found(ExpectedTypeSet::either_way(vec![t])),
            None => Step::Stop,
        }
    }

    fn declarator_type(&self, declarator: NodeId) -> ExpectedTypeSet {
        let declared = match self.req.model.resolve_binding(self.tree, declarator) {
            Some(Binding::Variable(v)) => Some(v.ty.clone()),
            Some(Binding::Field(f)) => Some(f.ty.clone()),
            _ => self.tree.parent(declarator).and_then(|decl| match self.tree.kind(decl) {
                NodeKind::LocalVarDecl { ty, .. } | NodeKind::FieldDecl { ty, .. } => {
                    self.type_of(*ty)
                }
                _ => None,
            }),
        };
        declared
            .map(|t| ExpectedTypeSet::subtypes_of(vec![t]))
            .unwrap_or_default()
    }

    /// Operands of a binary operator, given the type of the other operand.
    fn operand_types(&self, op: InfixOp, other: NodeId) -> ExpectedTypeSet {
        let other_ty = self.type_of(other);
        let other_is_boolean = other_ty
            .as_ref()
            .is_some_and(|t| t.is_boolean() || t.as_str() == "java/lang/Boolean");
        match op {
            InfixOp::And | InfixOp::Or => ExpectedTypeSet::boolean(),
            InfixOp::Xor | InfixOp::BitAnd | InfixOp::BitOr => {
                if other_is_boolean {
                    ExpectedTypeSet::boolean()
                } else {
                    ExpectedTypeSet::integral()
                }
            }
            InfixOp::Add => {
                let mut set = ExpectedTypeSet::numeric();
                set.types.push(TypeName::from(STRING));
                set
            }
            InfixOp::Sub
            | InfixOp::Mul
            | InfixOp::Div
            | InfixOp::Rem
            | InfixOp::Lt
            | InfixOp::Gt
            | InfixOp::Le
            | InfixOp::Ge => ExpectedTypeSet::numeric(),
            InfixOp::Shl | InfixOp::Shr | InfixOp::UShr => ExpectedTypeSet::integral(),
            InfixOp::Eq | InfixOp::Ne => other_ty
                .map(|t| ExpectedTypeSet::either_way(vec![t]))
                .unwrap_or_default(),
        }
    }

    /// Parameter types at `index` of every overload the call could target.
    fn argument_types(&self, call: NodeId, index: usize, args: &[NodeId]) -> ExpectedTypeSet {
        let arity = args.len().max(index + 1);
        let mut types = Vec::new();
        for m in self.overloads(call) {
            if !m.accepts_arity(arity) {
                continue;
            }
            let owner = self.req.type_binding(&m.declaring_type);
            let params: Vec<_> = m
                .type_params
                .iter()
                .chain(owner.iter().flat_map(|o| o.type_params.iter()))
                .cloned()
                .collect();
            let preceding_ok = args.iter().take(index).enumerate().all(|(j, &arg)| {
                let accepted = m.params_at(j);
                match self.type_of(arg) {
                    Some(actual) if !accepted.is_empty() => accepted
                        .iter()
                        .any(|param| is_assignable(self.req, &actual, &erase(param, &params))),
                    _ => true,
                }
            });
            if !preceding_ok {
                continue;
            }
            types.extend(m.params_at(index).iter().map(|param| erase(param, &params)));
        }
        ExpectedTypeSet::subtypes_of(types)
    }

    /// Methods or constructors a call node may invoke.
    pub fn overloads(&self, call: NodeId) -> Vec<Arc<MethodBinding>> {
        match self.tree.kind(call) {
            NodeKind::MethodInvocation { receiver, name, .. } => {
                let owners: Vec<TypeName> = match receiver {
                    Some(r) => self.type_of(*r).into_iter().collect(),
                    None => self
                        .tree
                        .ancestors(call)
                        .filter_map(|n| self.tree.declared_type(n))
                        .collect(),
                };
                for owner in owners {
                    let found = methods_named(self.req, &owner, name);
                    if !found.is_empty() {
                        return found;
                    }
                }
                // the front end may still know which method it meant
                match self.req.model.resolve_binding(self.tree, call) {
                    Some(Binding::Method(m)) => methods_named(self.req, &m.declaring_type, name),
                    _ => Vec::new(),
                }
            }
            NodeKind::InstanceCreation { ty, .. } => self
                .type_of(*ty)
                .map(|t| constructors_of(self.req, &t))
                .unwrap_or_default(),
            NodeKind::ConstructorInvocation { is_super, .. } => {
                let Some(this) = self
                    .tree
                    .enclosing_type_decl(call)
                    .and_then(|d| self.tree.declared_type(d))
                else {
                    return Vec::new();
                };
                let target = if *is_super {
                    self.req.type_binding(&this).and_then(|t| t.superclass.clone())
                } else {
                    Some(this)
                };
                target
                    .map(|t| constructors_of(self.req, &t))
                    .unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    fn return_types(&self, ret: NodeId) -> ExpectedTypeSet {
        let owner = self.tree.ancestors(ret).skip(1).find(|&n| {
            matches!(
                self.tree.kind(n),
                NodeKind::Lambda { .. } | NodeKind::MethodDecl { .. }
            )
        });
        let Some(owner) = owner else {
            return ExpectedTypeSet::default();
        };
        if matches!(self.tree.kind(owner), NodeKind::Lambda { .. }) {
            return self.lambda_return(owner);
        }
        match self.req.model.resolve_binding(self.tree, owner) {
            Some(Binding::Method(m)) if !m.is_constructor => {
                let owner_ty = self.req.type_binding(&m.declaring_type);
                let params: Vec<_> = m
                    .type_params
                    .iter()
                    .chain(owner_ty.iter().flat_map(|o| o.type_params.iter()))
                    .cloned()
                    .collect();
                ExpectedTypeSet::subtypes_of(vec![erase(&m.return_type, &params)])
            }
            _ => ExpectedTypeSet::default(),
        }
    }

    fn lambda_return(&self, lambda: NodeId) -> ExpectedTypeSet {
        let Some(target) = self.type_of(lambda) else {
            return ExpectedTypeSet::default();
        };
        let Some(sam) = functional_method(self.req, &target) else {
            tracing::debug!(target = %target, "expected: lambda target is not functional");
            return ExpectedTypeSet::default();
        };
        let iface = self.req.type_binding(&sam.declaring_type);
        let params: Vec<_> = sam
            .type_params
            .iter()
            .chain(iface.iter().flat_map(|o| o.type_params.iter()))
            .cloned()
            .collect();
        ExpectedTypeSet::subtypes_of(vec![erase(&sam.return_type, &params)])
    }
}

/// Non-constructor methods named `name` visible through `owner`, most
/// specific declaration first and overridden ones dropped.
pub fn methods_named(req: &Request<'_>, owner: &TypeName, name: &str) -> Vec<Arc<MethodBinding>> {
    let mut out: Vec<Arc<MethodBinding>> = Vec::new();
    for t in supertypes(req, owner.base()) {
        for m in t.member_methods().filter(|m| m.name.as_ref() == name) {
            if !out.iter().any(|o| o.same_signature(m)) {
                out.push(Arc::clone(m));
            }
        }
    }
    out
}

pub fn constructors_of(req: &Request<'_>, ty: &TypeName) -> Vec<Arc<MethodBinding>> {
    req.type_binding(ty)
        .map(|t| t.constructors().cloned().collect())
        .unwrap_or_default()
}

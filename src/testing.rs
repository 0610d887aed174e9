//! Fixtures shared by the unit tests: small Java worlds and hand-built trees.

use std::sync::Arc;

use crate::index::{IndexShard, IndexSnapshot};
use crate::model::{
    Binding, FieldBinding, MemoryModel, MethodBinding, Modifiers, Origin, TypeBinding, TypeKind,
    TypeName, VarId, VariableBinding, access,
};
use crate::syntax::{NodeId, NodeKind, SyntaxTree, TextRange, TreeBuilder};

/// Range of the first occurrence of `needle` in `src`.
pub fn span(src: &str, needle: &str) -> TextRange {
    span_nth(src, needle, 0)
}

/// Range of the `n`-th (zero-based) occurrence of `needle` in `src`.
pub fn span_nth(src: &str, needle: &str, n: usize) -> TextRange {
    let start = src
        .match_indices(needle)
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or_else(|| panic!("`{needle}` occurrence {n} not found in fixture"));
    TextRange::new(start as u32, (start + needle.len()) as u32)
}

/// Offset of the `|` marker, the last `|` in the text so that `||` and `|`
/// operators can precede it; returns the source without it.
pub fn cursor(marked: &str) -> (String, u32) {
    let at = marked.rfind('|').expect("fixture has a `|` cursor marker");
    let mut src = marked.to_string();
    src.remove(at);
    (src, at as u32)
}

/// Builds a [`MemoryModel`] with `java.lang` basics already present.
pub struct WorldBuilder {
    types: Vec<TypeBinding>,
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldBuilder {
    pub fn new() -> Self {
        let mut world = WorldBuilder { types: Vec::new() };
        world.push_type("java/lang/Object", TypeKind::Class, None, &[]);
        world = world
            .method("java/lang/Object", "equals", &["java/lang/Object"], "boolean")
            .method("java/lang/Object", "hashCode", &[], "int")
            .method("java/lang/Object", "toString", &[], "java/lang/String")
            .class("java/lang/String", None, &[])
            .method("java/lang/String", "length", &[], "int")
            .method("java/lang/String", "isEmpty", &[], "boolean")
            .class("java/lang/Number", None, &[])
            .class("java/lang/Boolean", None, &[])
            .class("java/lang/Character", None, &[]);
        for boxed in ["Byte", "Short", "Integer", "Long", "Float", "Double"] {
            world = world.class(&format!("java/lang/{boxed}"), Some("java/lang/Number"), &[]);
        }
        world
    }

    fn push_type(&mut self, name: &str, kind: TypeKind, superclass: Option<&str>, ifaces: &[&str]) {
        self.types.retain(|t| t.name.as_str() != name);
        let outer = name.rfind('$').map(|i| TypeName::from(&name[..i]));
        if let Some(outer) = &outer
            && let Some(o) = self.types.iter_mut().find(|t| &t.name == outer)
        {
            o.member_types.push(TypeName::from(name));
        }
        self.types.push(TypeBinding {
            name: TypeName::from(name),
            kind,
            modifiers: Modifiers::PUBLIC,
            superclass: superclass.map(TypeName::from),
            interfaces: ifaces.iter().map(|i| TypeName::from(*i)).collect(),
            outer,
            member_types: vec![],
            type_params: vec![],
            methods: vec![],
            fields: vec![],
            origin: Origin::Source(Arc::from(format!("{name}.java"))),
            decl_range: None,
        });
    }

    fn ty_mut(&mut self, name: &str) -> &mut TypeBinding {
        self.types
            .iter_mut()
            .find(|t| t.name.as_str() == name)
            .unwrap_or_else(|| panic!("type {name} must be declared first"))
    }

    /// A class; `None` superclass means `java/lang/Object`. Nested classes use
    /// `Outer$Inner` names and are registered as member types of the outer.
    pub fn class(mut self, name: &str, superclass: Option<&str>, ifaces: &[&str]) -> Self {
        let superclass = superclass.unwrap_or("java/lang/Object");
        self.push_type(name, TypeKind::Class, Some(superclass), ifaces);
        self
    }

    pub fn interface(mut self, name: &str, extends: &[&str]) -> Self {
        self.push_type(name, TypeKind::Interface, None, extends);
        self.ty_mut(name).modifiers = Modifiers::PUBLIC.with(access::ACC_INTERFACE | access::ACC_ABSTRACT);
        self
    }

    pub fn type_modifiers(mut self, name: &str, modifiers: Modifiers) -> Self {
        self.ty_mut(name).modifiers = modifiers;
        self
    }

    pub fn origin(mut self, name: &str, origin: Origin) -> Self {
        self.ty_mut(name).origin = origin;
        self
    }

    pub fn method_with(
        mut self,
        owner: &str,
        name: &str,
        params: &[&str],
        ret: &str,
        modifiers: Modifiers,
    ) -> Self {
        let varargs = modifiers.0 & access::ACC_VARARGS != 0;
        let method = MethodBinding {
            name: Arc::from(name),
            declaring_type: TypeName::from(owner),
            modifiers,
            params: params.iter().map(|p| TypeName::from(*p)).collect(),
            varargs,
            return_type: TypeName::from(ret),
            exceptions: vec![],
            type_params: vec![],
            is_constructor: name == "<init>",
            decl_range: None,
        };
        self.ty_mut(owner).methods.push(Arc::new(method));
        self
    }

    pub fn method(self, owner: &str, name: &str, params: &[&str], ret: &str) -> Self {
        self.method_with(owner, name, params, ret, Modifiers::PUBLIC)
    }

    pub fn static_method(self, owner: &str, name: &str, params: &[&str], ret: &str) -> Self {
        self.method_with(owner, name, params, ret, Modifiers::PUBLIC_STATIC)
    }

    pub fn abstract_method(self, owner: &str, name: &str, params: &[&str], ret: &str) -> Self {
        self.method_with(
            owner,
            name,
            params,
            ret,
            Modifiers::PUBLIC.with(access::ACC_ABSTRACT),
        )
    }

    pub fn constructor(self, owner: &str, params: &[&str]) -> Self {
        self.method_with(owner, "<init>", params, "void", Modifiers::PUBLIC)
    }

    pub fn field_with(mut self, owner: &str, name: &str, ty: &str, modifiers: Modifiers) -> Self {
        let field = FieldBinding {
            name: Arc::from(name),
            declaring_type: TypeName::from(owner),
            modifiers,
            ty: TypeName::from(ty),
            decl_range: None,
        };
        self.ty_mut(owner).fields.push(Arc::new(field));
        self
    }

    pub fn field(self, owner: &str, name: &str, ty: &str) -> Self {
        self.field_with(owner, name, ty, Modifiers::PUBLIC)
    }

    pub fn static_field(self, owner: &str, name: &str, ty: &str) -> Self {
        self.field_with(owner, name, ty, Modifiers::PUBLIC_STATIC)
    }

    pub fn build(self) -> MemoryModel {
        MemoryModel::new(self.types)
    }
}

/// A model together with a one-shard index over it.
pub fn world_with_index(builder: WorldBuilder) -> (MemoryModel, Arc<IndexSnapshot>) {
    let model = builder.build();
    let shard = IndexShard::from_model("app", &model);
    (model, Arc::new(IndexSnapshot::new(vec![shard])))
}

pub fn type_binding(model: &MemoryModel, name: &str) -> Binding {
    use crate::model::BindingModel;
    Binding::Type(
        model
            .type_binding(name)
            .unwrap_or_else(|| panic!("{name} not in fixture model")),
    )
}

pub fn method_binding(model: &MemoryModel, owner: &str, name: &str) -> Binding {
    use crate::model::BindingModel;
    let ty = model.type_binding(owner).expect("owner in fixture model");
    let m = ty
        .methods
        .iter()
        .find(|m| m.name.as_ref() == name)
        .unwrap_or_else(|| panic!("{owner}.{name} not in fixture model"));
    Binding::Method(Arc::clone(m))
}

/// Hand-built tree over a source fixture. Node ranges are taken from
/// occurrences of text in the source.
pub struct TreeFixture {
    src: String,
    builder: TreeBuilder,
    next_var: u32,
    /// Needles are looked up from here on.
    search_from: usize,
    method_params: Vec<NodeId>,
}

impl TreeFixture {
    pub fn new(src: &str) -> Self {
        Self {
            src: src.to_string(),
            builder: TreeBuilder::new("Test.java", src),
            next_var: 0,
            search_from: 0,
            method_params: Vec::new(),
        }
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn span(&self, needle: &str) -> TextRange {
        self.span_nth(needle, 0)
    }

    pub fn span_nth(&self, needle: &str, n: usize) -> TextRange {
        let r = span_nth(&self.src[self.search_from..], needle, n);
        let base = self.search_from as u32;
        TextRange::new(r.start + base, r.end + base)
    }

    pub fn node(&mut self, kind: NodeKind, needle: &str) -> NodeId {
        let range = self.span(needle);
        self.builder.node(kind, range)
    }

    pub fn node_nth(&mut self, kind: NodeKind, needle: &str, n: usize) -> NodeId {
        let range = self.span_nth(needle, n);
        self.builder.node(kind, range)
    }

    pub fn node_at(&mut self, kind: NodeKind, range: TextRange) -> NodeId {
        self.builder.node(kind, range)
    }

    /// `SimpleName` over the `n`-th occurrence of `ident`.
    pub fn name(&mut self, ident: &str, n: usize) -> NodeId {
        self.node_nth(
            NodeKind::SimpleName {
                ident: Arc::from(ident),
            },
            ident,
            n,
        )
    }

    pub fn simple_type(&mut self, name: &str, n: usize, ty: &str) -> NodeId {
        let id = self.node_nth(
            NodeKind::SimpleType {
                name: Arc::from(name),
            },
            name,
            n,
        );
        self.builder.set_type(id, ty);
        id
    }

    pub fn bind(&mut self, id: NodeId, binding: Binding) -> &mut Self {
        self.builder.bind(id, binding);
        self
    }

    pub fn set_type(&mut self, id: NodeId, ty: &str) -> &mut Self {
        self.builder.set_type(id, ty);
        self
    }

    pub fn mark_recovered(&mut self, id: NodeId) -> &mut Self {
        self.builder.mark_recovered(id);
        self
    }

    /// Variable binding for a declaration whose name is the `n`-th occurrence
    /// of `name` in the source.
    pub fn variable(&mut self, name: &str, n: usize, ty: &str, is_parameter: bool) -> Binding {
        self.next_var += 1;
        Binding::Variable(Arc::new(VariableBinding {
            id: VarId(self.next_var),
            name: Arc::from(name),
            ty: TypeName::from(ty),
            modifiers: Modifiers::default(),
            is_parameter,
            decl_range: self.span_nth(name, n),
        }))
    }

    /// `VariableDeclarator` spanning `text`, bound to a fresh local variable.
    pub fn declarator(
        &mut self,
        name: &str,
        n: usize,
        text: &str,
        ty: &str,
        init: Option<NodeId>,
    ) -> (NodeId, Binding) {
        let var = self.variable(name, n, ty, false);
        let id = self.node(
            NodeKind::VariableDeclarator {
                name: Arc::from(name),
                init,
            },
            text,
        );
        self.builder.bind(id, var.clone());
        (id, var)
    }

    pub fn parameter(&mut self, name: &str, n: usize, text: &str, ty: &str) -> (NodeId, Binding) {
        let var = self.variable(name, n, ty, true);
        let id = self.node(
            NodeKind::Parameter {
                name: Arc::from(name),
                ty: None,
            },
            text,
        );
        self.builder.bind(id, var.clone());
        (id, var)
    }

    /// Parameter of the enclosing method built by [`method_fixture`].
    pub fn method_param(&mut self, name: &str, n: usize, text: &str, ty: &str) -> Binding {
        let (id, var) = self.parameter(name, n, text, ty);
        self.method_params.push(id);
        var
    }

    pub fn finish(self, items: Vec<NodeId>) -> SyntaxTree {
        self.builder.finish(NodeKind::CompilationUnit { items })
    }
}

pub struct MethodFixture {
    pub model: MemoryModel,
    pub index: Arc<IndexSnapshot>,
    pub tree: SyntaxTree,
    pub offset: u32,
}

/// `package p; class A { <header> { <body> } }` with a `|` cursor marker in
/// the body. `build` creates the body statements; the method, class and
/// package nodes are added around them and bound to `p/A` and its method when
/// the world declares them.
pub fn method_fixture(
    world: WorldBuilder,
    header: &str,
    body: &str,
    build: impl FnOnce(&mut TreeFixture) -> Vec<NodeId>,
) -> MethodFixture {
    use crate::model::BindingModel;

    let marked = format!("package p;\nclass A {{\n    {header} {{\n        {body}\n    }}\n}}\n");
    let (src, offset) = cursor(&marked);
    let (model, index) = world_with_index(world);
    let mut f = TreeFixture::new(&src);

    let header_start = src.find(header).expect("header in fixture");
    let block_start = header_start + header.len() + 1;
    f.search_from = header_start;
    let statements = build(&mut f);

    let block_end = src.rfind("\n    }").expect("method body end") + "\n    }".len();
    let block = f.node_at(
        NodeKind::Block { statements },
        TextRange::new(block_start as u32, block_end as u32),
    );
    let name = header
        .split('(')
        .next()
        .and_then(|h| h.split_whitespace().last())
        .unwrap_or("m");
    let params = std::mem::take(&mut f.method_params);
    let method = f.node_at(
        NodeKind::MethodDecl {
            name: Arc::from(name),
            is_static: header.starts_with("static"),
            is_constructor: false,
            params,
            body: Some(block),
        },
        TextRange::new(header_start as u32, block_end as u32),
    );
    let a = model.type_binding("p/A");
    if let Some(m) = a
        .as_ref()
        .and_then(|a| a.methods.iter().find(|m| m.name.as_ref() == name))
    {
        f.bind(method, Binding::Method(Arc::clone(m)));
    }
    let class_start = src.find("class A").expect("class in fixture");
    let class = f.node_at(
        NodeKind::TypeDecl {
            name: Arc::from("A"),
            is_static: false,
            members: vec![method],
        },
        TextRange::new(class_start as u32, src.trim_end().len() as u32),
    );
    if let Some(a) = a {
        f.bind(class, Binding::Type(a));
    }
    let pkg_name = f.node_at(
        NodeKind::SimpleName {
            ident: Arc::from("p"),
        },
        TextRange::new(8, 9),
    );
    let pkg = f.node_at(NodeKind::PackageDecl { name: pkg_name }, TextRange::new(0, 10));
    let tree = f.finish(vec![pkg, class]);
    MethodFixture {
        model,
        index,
        tree,
        offset,
    }
}

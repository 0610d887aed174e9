//! Read-only query surface over the compiler's resolved symbols.
//!
//! Bindings are immutable snapshots produced by the front end. The engine only
//! ever holds `Arc` handles to them and never mutates them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::syntax::{NodeId, SyntaxTree, TextRange};

pub mod hierarchy;
pub mod memory;
pub mod type_name;

pub use memory::MemoryModel;
pub use type_name::{Primitive, TypeName};

/// JVM access flags, as found in class files.
pub mod access {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_VARARGS: u16 = 0x0080;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Visibility {
    Private,
    Package,
    Protected,
    Public,
}

impl Modifiers {
    pub const PUBLIC: Modifiers = Modifiers(access::ACC_PUBLIC);
    pub const PUBLIC_STATIC: Modifiers = Modifiers(access::ACC_PUBLIC | access::ACC_STATIC);

    fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub fn with(self, flag: u16) -> Self {
        Modifiers(self.0 | flag)
    }

    pub fn is_static(self) -> bool {
        self.has(access::ACC_STATIC)
    }

    pub fn is_final(self) -> bool {
        self.has(access::ACC_FINAL)
    }

    pub fn is_abstract(self) -> bool {
        self.has(access::ACC_ABSTRACT)
    }

    pub fn is_synthetic(self) -> bool {
        self.has(access::ACC_SYNTHETIC)
    }

    pub fn visibility(self) -> Visibility {
        if self.has(access::ACC_PUBLIC) {
            Visibility::Public
        } else if self.has(access::ACC_PROTECTED) {
            Visibility::Protected
        } else if self.has(access::ACC_PRIVATE) {
            Visibility::Private
        } else {
            Visibility::Package
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Annotation,
    Record,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: Arc<str>,
    #[serde(default)]
    pub bounds: Vec<TypeName>,
}

/// Where a declaration lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Source file path or URI.
    Source(Arc<str>),
    /// Archive path (jar, jmod) holding the class file.
    Binary(Arc<str>),
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeBinding {
    pub name: TypeName,
    pub kind: TypeKind,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub superclass: Option<TypeName>,
    #[serde(default)]
    pub interfaces: Vec<TypeName>,
    /// Directly enclosing type for member and local types.
    #[serde(default)]
    pub outer: Option<TypeName>,
    #[serde(default)]
    pub member_types: Vec<TypeName>,
    #[serde(default)]
    pub type_params: Vec<TypeParam>,
    #[serde(default)]
    pub methods: Vec<Arc<MethodBinding>>,
    #[serde(default)]
    pub fields: Vec<Arc<FieldBinding>>,
    #[serde(default)]
    pub origin: Origin,
    #[serde(default)]
    pub decl_range: Option<TextRange>,
}

impl TypeBinding {
    pub fn simple_name(&self) -> &str {
        self.name.simple_name()
    }

    pub fn package(&self) -> Option<&str> {
        self.name.package()
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface | TypeKind::Annotation)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &Arc<MethodBinding>> {
        self.methods.iter().filter(|m| m.is_constructor)
    }

    /// Methods that take part in ordinary member lookup (constructors excluded).
    pub fn member_methods(&self) -> impl Iterator<Item = &Arc<MethodBinding>> {
        self.methods.iter().filter(|m| !m.is_constructor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodBinding {
    pub name: Arc<str>,
    pub declaring_type: TypeName,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub params: Vec<TypeName>,
    #[serde(default)]
    pub varargs: bool,
    pub return_type: TypeName,
    #[serde(default)]
    pub exceptions: Vec<TypeName>,
    #[serde(default)]
    pub type_params: Vec<TypeParam>,
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub decl_range: Option<TextRange>,
}

impl MethodBinding {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether a call with `count` arguments can target this method.
    pub fn accepts_arity(&self, count: usize) -> bool {
        if self.varargs && !self.params.is_empty() {
            count + 1 >= self.params.len()
        } else {
            count == self.params.len()
        }
    }

    /// Parameter types an argument at position `index` may have. The
    /// variable-arity slot takes the element type or the whole array; slots
    /// past it take the element type only.
    pub fn params_at(&self, index: usize) -> Vec<TypeName> {
        let Some(last) = self.params.len().checked_sub(1) else {
            return Vec::new();
        };
        if !self.varargs || index < last {
            return self.params.get(index).cloned().into_iter().collect();
        }
        let vararg = &self.params[last];
        let element = vararg.element_type();
        if index > last {
            return element.into_iter().collect();
        }
        element.into_iter().chain([vararg.clone()]).collect()
    }

    /// Type-variable parameters are compared by name, so `m(T)` in a subtype
    /// and `m(T)` in its supertype count as the same signature.
    pub fn same_signature(&self, other: &MethodBinding) -> bool {
        self.name == other.name && self.params == other.params
    }

    /// "foo(String, int) : void"
    pub fn display_signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.simple_name()).collect();
        if self.is_constructor {
            format!("{}({})", self.declaring_type.simple_name(), params.join(", "))
        } else {
            format!(
                "{}({}) : {}",
                self.name,
                params.join(", "),
                self.return_type.simple_name()
            )
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldBinding {
    pub name: Arc<str>,
    pub declaring_type: TypeName,
    #[serde(default)]
    pub modifiers: Modifiers,
    pub ty: TypeName,
    #[serde(default)]
    pub decl_range: Option<TextRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(pub u32);

/// A local variable, parameter or pattern variable of the current tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableBinding {
    pub id: VarId,
    pub name: Arc<str>,
    pub ty: TypeName,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub is_parameter: bool,
    pub decl_range: TextRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingKind {
    Type,
    Method,
    Field,
    Variable,
    Package,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Binding {
    Type(Arc<TypeBinding>),
    Method(Arc<MethodBinding>),
    Field(Arc<FieldBinding>),
    Variable(Arc<VariableBinding>),
    /// Dotted package name, e.g. "java.util".
    Package(Arc<str>),
}

impl Binding {
    pub fn kind(&self) -> BindingKind {
        match self {
            Self::Type(_) => BindingKind::Type,
            Self::Method(_) => BindingKind::Method,
            Self::Field(_) => BindingKind::Field,
            Self::Variable(_) => BindingKind::Variable,
            Self::Package(_) => BindingKind::Package,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Type(t) => t.simple_name(),
            Self::Method(m) => &m.name,
            Self::Field(f) => &f.name,
            Self::Variable(v) => &v.name,
            Self::Package(p) => p.rsplit('.').next().unwrap_or(p),
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            Self::Type(t) => t.modifiers,
            Self::Method(m) => m.modifiers,
            Self::Field(f) => f.modifiers,
            Self::Variable(v) => v.modifiers,
            Self::Package(_) => Modifiers::PUBLIC,
        }
    }

    /// Declaring type of members; the outer type of member types.
    pub fn declaring_type(&self) -> Option<&TypeName> {
        match self {
            Self::Type(t) => t.outer.as_ref(),
            Self::Method(m) => Some(&m.declaring_type),
            Self::Field(f) => Some(&f.declaring_type),
            Self::Variable(_) | Self::Package(_) => None,
        }
    }

    /// The type a reference to this binding evaluates to.
    pub fn value_type(&self) -> Option<&TypeName> {
        match self {
            Self::Type(t) => Some(&t.name),
            Self::Method(m) => Some(&m.return_type),
            Self::Field(f) => Some(&f.ty),
            Self::Variable(v) => Some(&v.ty),
            Self::Package(_) => None,
        }
    }

    /// Instance members need an object; everything else does not.
    pub fn is_instance_member(&self) -> bool {
        match self {
            Self::Method(m) => !m.modifiers.is_static(),
            Self::Field(f) => !f.modifiers.is_static(),
            _ => false,
        }
    }

    /// Identity as defined by the front end's symbol table.
    pub fn same(&self, other: &Binding) -> bool {
        match (self, other) {
            (Self::Type(a), Self::Type(b)) => a.name == b.name,
            (Self::Method(a), Self::Method(b)) => {
                a.declaring_type == b.declaring_type
                    && a.is_constructor == b.is_constructor
                    && a.same_signature(b)
            }
            (Self::Field(a), Self::Field(b)) => {
                a.declaring_type == b.declaring_type && a.name == b.name
            }
            (Self::Variable(a), Self::Variable(b)) => a.id == b.id,
            (Self::Package(a), Self::Package(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Location {
    Source { path: Arc<str>, range: Option<TextRange> },
    Binary { archive: Arc<str> },
    Unknown,
}

/// Resolved target of a selection request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationHandle {
    pub kind: BindingKind,
    /// Dotted qualified name of the type, or the package / variable name.
    pub qualified_name: Arc<str>,
    pub member: Option<Arc<str>>,
    pub location: Location,
}

fn location_of(origin: &Origin, range: Option<TextRange>) -> Location {
    match origin {
        Origin::Source(path) => Location::Source {
            path: Arc::clone(path),
            range,
        },
        Origin::Binary(archive) => Location::Binary {
            archive: Arc::clone(archive),
        },
        Origin::Unknown => Location::Unknown,
    }
}

/// Query surface of the compiler front end. Implementations must be safe for
/// concurrent read-only use by several requests.
pub trait BindingModel: Send + Sync {
    /// Type binding by internal name ("java/util/List").
    fn type_binding(&self, name: &str) -> Option<Arc<TypeBinding>>;

    /// Dotted package name, e.g. "java.util".
    fn has_package(&self, name: &str) -> bool;

    fn resolve_binding(&self, tree: &SyntaxTree, node: NodeId) -> Option<Binding> {
        tree.node(node).binding.clone()
    }

    fn declaring_node(&self, tree: &SyntaxTree, binding: &Binding) -> Option<DeclarationHandle> {
        let handle = match binding {
            Binding::Type(t) => DeclarationHandle {
                kind: BindingKind::Type,
                qualified_name: Arc::from(t.name.to_source()),
                member: None,
                location: location_of(&t.origin, t.decl_range),
            },
            Binding::Method(m) => {
                let owner = self.type_binding(&m.declaring_type)?;
                DeclarationHandle {
                    kind: BindingKind::Method,
                    qualified_name: Arc::from(owner.name.to_source()),
                    member: Some(Arc::clone(&m.name)),
                    location: location_of(&owner.origin, m.decl_range),
                }
            }
            Binding::Field(f) => {
                let owner = self.type_binding(&f.declaring_type)?;
                DeclarationHandle {
                    kind: BindingKind::Field,
                    qualified_name: Arc::from(owner.name.to_source()),
                    member: Some(Arc::clone(&f.name)),
                    location: location_of(&owner.origin, f.decl_range),
                }
            }
            Binding::Variable(v) => DeclarationHandle {
                kind: BindingKind::Variable,
                qualified_name: Arc::clone(&v.name),
                member: None,
                location: Location::Source {
                    path: tree.path(),
                    range: Some(v.decl_range),
                },
            },
            Binding::Package(p) => DeclarationHandle {
                kind: BindingKind::Package,
                qualified_name: Arc::clone(p),
                member: None,
                location: Location::Unknown,
            },
        };
        Some(handle)
    }
}

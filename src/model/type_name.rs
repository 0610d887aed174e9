use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const OBJECT: &str = "java/lang/Object";
pub const STRING: &str = "java/lang/String";

/// Uniform internal type names, always using source style:
/// - Objects: "java/lang/String"
/// - Primitive types: "int", "char"
/// - Arrays: "java/lang/String[]", "int[][]"
/// - Nested types: "java/util/Map$Entry"
///
/// Two types are the same type exactly when their names are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(pub(crate) Arc<str>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl Primitive {
    pub const NUMERIC: [Primitive; 7] = [
        Primitive::Byte,
        Primitive::Short,
        Primitive::Char,
        Primitive::Int,
        Primitive::Long,
        Primitive::Float,
        Primitive::Double,
    ];

    pub const INTEGRAL: [Primitive; 5] = [
        Primitive::Byte,
        Primitive::Short,
        Primitive::Char,
        Primitive::Int,
        Primitive::Long,
    ];

    pub fn from_keyword(s: &str) -> Option<Self> {
        Some(match s {
            "boolean" => Self::Boolean,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "char" => Self::Char,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "void" => Self::Void,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Char => "char",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Void => "void",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Boolean | Self::Void)
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::Short | Self::Char | Self::Int | Self::Long
        )
    }

    /// JLS 5.1.2 widening primitive conversion (identity included).
    pub fn widens_to(self, to: Primitive) -> bool {
        use Primitive::*;
        if self == to {
            return true;
        }
        match self {
            Byte => matches!(to, Short | Int | Long | Float | Double),
            Short | Char => matches!(to, Int | Long | Float | Double),
            Int => matches!(to, Long | Float | Double),
            Long => matches!(to, Float | Double),
            Float => to == Double,
            Boolean | Double | Void => false,
        }
    }

    /// "int" → "java/lang/Integer"
    pub fn boxed(self) -> Option<&'static str> {
        Some(match self {
            Self::Boolean => "java/lang/Boolean",
            Self::Byte => "java/lang/Byte",
            Self::Short => "java/lang/Short",
            Self::Char => "java/lang/Character",
            Self::Int => "java/lang/Integer",
            Self::Long => "java/lang/Long",
            Self::Float => "java/lang/Float",
            Self::Double => "java/lang/Double",
            Self::Void => return None,
        })
    }

    pub fn unboxed(internal: &str) -> Option<Self> {
        Some(match internal {
            "java/lang/Boolean" => Self::Boolean,
            "java/lang/Byte" => Self::Byte,
            "java/lang/Short" => Self::Short,
            "java/lang/Character" => Self::Char,
            "java/lang/Integer" => Self::Int,
            "java/lang/Long" => Self::Long,
            "java/lang/Float" => Self::Float,
            "java/lang/Double" => Self::Double,
            _ => return None,
        })
    }
}

impl TypeName {
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        TypeName(s.into())
    }

    pub fn primitive(p: Primitive) -> Self {
        TypeName(Arc::from(p.keyword()))
    }

    /// "java.util.Map.Entry" style names are not supported here; callers pass
    /// dotted package names only: "java.lang.String" → "java/lang/String".
    pub fn from_dotted(s: &str) -> Self {
        if Primitive::from_keyword(s).is_some() {
            return TypeName::from(s);
        }
        TypeName::from(s.replace('.', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_array(&self) -> bool {
        self.0.ends_with("[]")
    }

    pub fn is_primitive(&self) -> bool {
        self.as_primitive().is_some()
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        Primitive::from_keyword(&self.0)
    }

    pub fn is_boolean(&self) -> bool {
        self.as_primitive() == Some(Primitive::Boolean)
    }

    pub fn is_void(&self) -> bool {
        self.as_primitive() == Some(Primitive::Void)
    }

    pub fn is_object(&self) -> bool {
        self.as_ref() == OBJECT
    }

    pub fn is_string(&self) -> bool {
        self.as_ref() == STRING
    }

    /// "java/lang/String[][]" → Some("java/lang/String[]")
    pub fn element_type(&self) -> Option<TypeName> {
        self.0.strip_suffix("[]").map(TypeName::from)
    }

    /// "java/lang/String" → "java/lang/String[]"
    pub fn wrap_array(&self) -> TypeName {
        TypeName::new(format!("{}[]", self.0))
    }

    /// Remove generic parameters: "java/util/List<Ljava/lang/String;>" → "java/util/List"
    pub fn base(&self) -> &str {
        self.0.split('<').next().unwrap_or(&self.0)
    }

    /// "java/util/Map$Entry" → "Entry", "int[]" → "int[]"
    pub fn simple_name(&self) -> &str {
        let base = self.base();
        let last = base.rsplit('/').next().unwrap_or(base);
        last.rsplit('$').next().unwrap_or(last)
    }

    /// "java/util/Map$Entry" → Some("java/util")
    pub fn package(&self) -> Option<&str> {
        if self.is_primitive() || self.is_array() {
            return None;
        }
        self.base().rfind('/').map(|slash| &self.base()[..slash])
    }

    /// "java/util/Map$Entry" → "java.util.Map.Entry"
    pub fn to_source(&self) -> String {
        self.0.replace(['/', '$'], ".")
    }

    pub fn to_arc(&self) -> Arc<str> {
        self.0.clone()
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        TypeName(Arc::from(s))
    }
}

impl From<String> for TypeName {
    fn from(s: String) -> Self {
        TypeName(Arc::from(s.as_str()))
    }
}

impl From<Arc<str>> for TypeName {
    fn from(arc: Arc<str>) -> Self {
        TypeName(arc)
    }
}

impl std::borrow::Borrow<str> for TypeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TypeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for TypeName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

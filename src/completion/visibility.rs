use crate::model::hierarchy::{TypeLookup, is_subtype};
use crate::model::{Binding, TypeName, Visibility};
use crate::syntax::{NodeId, SyntaxTree};

/// Where an access happens: the package of the unit and the types enclosing
/// the site, innermost first.
#[derive(Debug, Clone, Default)]
pub struct AccessSite {
    /// Internal package name ("com/example"), `None` for the default package.
    pub package: Option<String>,
    pub enclosing_types: Vec<TypeName>,
}

impl AccessSite {
    pub fn at(tree: &SyntaxTree, node: NodeId) -> Self {
        let enclosing_types = tree
            .ancestors(node)
            .filter_map(|n| tree.declared_type(n))
            .collect();
        Self {
            package: tree.package_name().map(|p| p.replace('.', "/")),
            enclosing_types,
        }
    }

    fn top_level(&self) -> Option<&str> {
        self.enclosing_types.last().map(|t| top_level_of(t))
    }

    fn same_package(&self, declaring: &TypeName) -> bool {
        self.package.as_deref() == declaring.package()
    }
}

/// "p/Outer$Inner$Deep" → "p/Outer"
fn top_level_of(name: &str) -> &str {
    name.split('$').next().unwrap_or(name)
}

/// Java accessibility of candidates from one site. When `enforce` is off the
/// filter admits everything, but [`VisibilityFilter::is_accessible`] still
/// reports the real answer so ranking can prefer accessible candidates.
pub struct VisibilityFilter<'a> {
    lookup: &'a dyn TypeLookup,
    site: AccessSite,
    enforce: bool,
}

impl<'a> VisibilityFilter<'a> {
    pub fn new(lookup: &'a dyn TypeLookup, site: AccessSite, enforce: bool) -> Self {
        Self {
            lookup,
            site,
            enforce,
        }
    }

    pub fn site(&self) -> &AccessSite {
        &self.site
    }

    /// Whether the candidate enters the result at all. Synthetic members never do.
    pub fn admits(&self, binding: &Binding) -> bool {
        if binding.modifiers().is_synthetic() {
            return false;
        }
        !self.enforce || self.is_accessible(binding)
    }

    pub fn is_accessible(&self, binding: &Binding) -> bool {
        let declaring = match binding {
            Binding::Variable(_) | Binding::Package(_) => return true,
            Binding::Type(t) => match &t.outer {
                Some(outer) => outer.clone(),
                // top-level types are public or package-private
                None => {
                    return t.modifiers.visibility() == Visibility::Public
                        || self.site.same_package(&t.name);
                }
            },
            Binding::Method(m) => m.declaring_type.clone(),
            Binding::Field(f) => f.declaring_type.clone(),
        };
        self.member_accessible(binding.modifiers().visibility(), &declaring)
    }

    fn member_accessible(&self, visibility: Visibility, declaring: &TypeName) -> bool {
        match visibility {
            Visibility::Public => true,
            Visibility::Private => self.site.top_level() == Some(top_level_of(declaring)),
            Visibility::Package => self.site.same_package(declaring),
            Visibility::Protected => {
                self.site.same_package(declaring)
                    || self
                        .site
                        .enclosing_types
                        .iter()
                        .any(|t| is_subtype(self.lookup, t, declaring))
            }
        }
    }
}

//! Supertype traversal and type relations over the binding model.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use super::{BindingModel, MethodBinding, TypeBinding, TypeName, TypeParam, type_name::OBJECT};
use crate::model::Primitive;

/// The one operation hierarchy queries need. Implemented by the binding model
/// itself and by request-scoped caches in front of it.
pub trait TypeLookup {
    fn lookup(&self, name: &str) -> Option<Arc<TypeBinding>>;
}

impl TypeLookup for dyn BindingModel + '_ {
    fn lookup(&self, name: &str) -> Option<Arc<TypeBinding>> {
        self.type_binding(name)
    }
}

/// Return `start` followed by every supertype, each visited at most once:
/// first the superclass chain up to `java/lang/Object`, then all interfaces
/// (breadth-first). Types missing from the model are silently skipped, and the
/// walk ends there for that branch.
pub fn supertypes(lookup: &dyn TypeLookup, start: &str) -> Vec<Arc<TypeBinding>> {
    let mut result = Vec::new();
    let mut seen: FxHashSet<TypeName> = FxHashSet::default();
    let mut interfaces: VecDeque<TypeName> = VecDeque::new();

    // Superclass chain first
    let mut current = Some(TypeName::from(start));
    let mut start_is_interface = false;
    while let Some(name) = current.take() {
        if !seen.insert(name.clone()) {
            break; // cycle in a broken model
        }
        let Some(meta) = lookup.lookup(&name) else {
            break;
        };
        if result.is_empty() {
            start_is_interface = meta.is_interface();
        }
        interfaces.extend(meta.interfaces.iter().cloned());
        current = meta.superclass.clone();
        result.push(meta);
    }

    while let Some(name) = interfaces.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let Some(meta) = lookup.lookup(&name) else {
            continue;
        };
        interfaces.extend(meta.interfaces.iter().cloned());
        result.push(meta);
    }

    // Interfaces implicitly expose Object's public members.
    if start_is_interface
        && !seen.contains(OBJECT)
        && let Some(object) = lookup.lookup(OBJECT)
    {
        result.push(object);
    }

    result
}

/// Reflexive subtype relation on reference types.
pub fn is_subtype(lookup: &dyn TypeLookup, sub: &TypeName, sup: &TypeName) -> bool {
    if sub == sup {
        return true;
    }
    if sub.is_primitive() || sup.is_primitive() {
        return false;
    }
    if sup.is_object() {
        return true;
    }
    match (sub.element_type(), sup.element_type()) {
        (Some(se), Some(pe)) => {
            return !se.is_primitive() && !pe.is_primitive() && is_subtype(lookup, &se, &pe);
        }
        (Some(_), None) => {
            return matches!(sup.as_str(), "java/lang/Cloneable" | "java/io/Serializable");
        }
        (None, Some(_)) => return false,
        (None, None) => {}
    }
    supertypes(lookup, sub.base())
        .iter()
        .any(|t| t.name.base() == sup.base())
}

/// Assignment compatibility (JLS 5.2) restricted to what completion ranking
/// needs: identity, widening primitive, widening reference, boxing then
/// widening reference, unboxing then widening primitive, and `null`.
pub fn is_assignable(lookup: &dyn TypeLookup, from: &TypeName, to: &TypeName) -> bool {
    if from == to {
        return true;
    }
    if from.as_str() == "null" {
        return !to.is_primitive();
    }
    match (from.as_primitive(), to.as_primitive()) {
        (Some(f), Some(t)) => f.widens_to(t),
        (Some(f), None) => f
            .boxed()
            .is_some_and(|boxed| is_subtype(lookup, &TypeName::from(boxed), to)),
        (None, Some(t)) => Primitive::unboxed(from).is_some_and(|p| p.widens_to(t)),
        (None, None) => is_subtype(lookup, from, to),
    }
}

/// Erase type variables to their first bound, or `Object` when unbounded.
/// Anything that is not a declared type variable is returned unchanged.
pub fn erase<'a>(ty: &TypeName, params: impl IntoIterator<Item = &'a TypeParam>) -> TypeName {
    let base = ty.base();
    let (name, dims) = match base.find('[') {
        Some(i) => (&base[..i], &base[i..]),
        None => (base, ""),
    };
    for param in params {
        if param.name.as_ref() == name {
            let bound = param
                .bounds
                .first()
                .map(|b| b.base().to_string())
                .unwrap_or_else(|| OBJECT.to_string());
            return TypeName::from(format!("{bound}{dims}"));
        }
    }
    if base.len() == ty.len() {
        ty.clone()
    } else {
        TypeName::from(base)
    }
}

const OBJECT_METHODS: &[&str] = &["equals", "hashCode", "toString"];

/// The single abstract method of a functional interface, if `iface` is one.
pub fn functional_method(lookup: &dyn TypeLookup, iface: &TypeName) -> Option<Arc<MethodBinding>> {
    let root = lookup.lookup(iface.base())?;
    if !root.is_interface() {
        return None;
    }
    let mut found: Option<Arc<MethodBinding>> = None;
    let mut concrete: Vec<Arc<MethodBinding>> = Vec::new();
    for ty in supertypes(lookup, iface.base()) {
        if !ty.is_interface() {
            continue;
        }
        for m in ty.member_methods() {
            if !m.modifiers.is_abstract() {
                concrete.push(Arc::clone(m));
                continue;
            }
            if OBJECT_METHODS.contains(&m.name.as_ref()) {
                continue;
            }
            // A default method in a subinterface discharges an abstract one above it.
            if concrete.iter().any(|c| c.same_signature(m)) {
                continue;
            }
            match &found {
                Some(existing) if existing.same_signature(m) => {}
                Some(_) => return None,
                None => found = Some(Arc::clone(m)),
            }
        }
    }
    found
}

//! Candidate collection with override elimination and name hiding.

use crate::model::hierarchy::{TypeLookup, is_subtype};
use crate::model::{Binding, MethodBinding, TypeName};

/// One collected binding and where it came from.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub binding: Binding,
    /// Depth of the scope that contributed it, 0 for the innermost.
    pub depth: usize,
    /// Set for index types that are not in scope yet.
    pub required_import: Option<TypeName>,
    pub accessible: bool,
}

impl Candidate {
    pub fn new(binding: Binding, depth: usize) -> Self {
        Self {
            binding,
            depth,
            required_import: None,
            accessible: true,
        }
    }

    pub fn with_import(mut self, ty: TypeName) -> Self {
        self.required_import = Some(ty);
        self
    }

    pub fn with_accessible(mut self, accessible: bool) -> Self {
        self.accessible = accessible;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Namespace {
    Value,
    Type,
    Package,
}

fn namespace(binding: &Binding) -> Option<Namespace> {
    match binding {
        Binding::Variable(_) | Binding::Field(_) => Some(Namespace::Value),
        Binding::Type(_) => Some(Namespace::Type),
        Binding::Package(_) => Some(Namespace::Package),
        Binding::Method(_) => None,
    }
}

/// `a` overrides `b`: same signature, declared in a proper subtype.
fn overrides(lookup: &dyn TypeLookup, a: &MethodBinding, b: &MethodBinding) -> bool {
    a.same_signature(b)
        && a.declaring_type != b.declaring_type
        && is_subtype(lookup, &a.declaring_type, &b.declaring_type)
}

/// Candidates in two buckets. No two methods stand in an override relation
/// and no binding appears twice.
pub struct CandidateSet<'a> {
    lookup: &'a dyn TypeLookup,
    methods: Vec<Candidate>,
    others: Vec<Candidate>,
}

impl<'a> CandidateSet<'a> {
    pub fn new(lookup: &'a dyn TypeLookup) -> Self {
        Self {
            lookup,
            methods: Vec::new(),
            others: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.methods.len() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.others.is_empty()
    }

    /// Returns whether the candidate was kept.
    pub fn add(&mut self, candidate: Candidate) -> bool {
        let Binding::Method(m) = &candidate.binding else {
            return self.add_other(candidate);
        };
        if m.is_constructor {
            tracing::debug!(owner = %m.declaring_type, "collector: constructor skipped");
            return false;
        }
        self.add_method(candidate)
    }

    fn add_method(&mut self, candidate: Candidate) -> bool {
        let Binding::Method(incoming) = &candidate.binding else {
            return false;
        };
        let lookup = self.lookup;
        // an inaccessible method never shadows an accessible one
        let dominated = self.methods.iter().any(|c| match &c.binding {
            Binding::Method(existing) if c.accessible || !candidate.accessible => {
                overrides(lookup, existing, incoming)
                    || (existing.same_signature(incoming)
                        && (existing.declaring_type == incoming.declaring_type
                            || c.depth < candidate.depth))
            }
            _ => false,
        });
        if dominated {
            return false;
        }
        self.methods.retain(|c| match &c.binding {
            Binding::Method(existing) if candidate.accessible && !c.accessible => {
                !existing.same_signature(incoming)
            }
            Binding::Method(existing) if candidate.accessible || !c.accessible => {
                !overrides(lookup, incoming, existing)
            }
            _ => true,
        });
        self.methods.push(candidate);
        true
    }

    fn add_other(&mut self, candidate: Candidate) -> bool {
        if self
            .others
            .iter()
            .any(|c| c.binding.same(&candidate.binding))
        {
            return false;
        }
        // Types waiting for an import live beside the ones in scope.
        if candidate.required_import.is_some() {
            self.others.push(candidate);
            return true;
        }

        let ns = namespace(&candidate.binding);
        let name = candidate.binding.name();
        let rivals: Vec<usize> = self
            .others
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.required_import.is_none()
                    && namespace(&c.binding) == ns
                    && c.binding.name() == name
            })
            .map(|(i, _)| i)
            .collect();

        let mut replace = Vec::new();
        for i in rivals {
            match self.hides(&self.others[i], &candidate) {
                Some(true) => return false,
                Some(false) => replace.push(i),
                None => {}
            }
        }
        for i in replace.into_iter().rev() {
            self.others.remove(i);
        }
        self.others.push(candidate);
        true
    }

    /// `Some(true)` when `existing` hides `incoming`, `Some(false)` when the
    /// incoming one hides the existing, `None` when both stay.
    fn hides(&self, existing: &Candidate, incoming: &Candidate) -> Option<bool> {
        // inaccessible members are not inherited, so they hide nothing
        if existing.accessible != incoming.accessible {
            return Some(existing.accessible);
        }
        if existing.depth != incoming.depth {
            return Some(existing.depth < incoming.depth);
        }
        let (Some(a), Some(b)) = (
            existing.binding.declaring_type(),
            incoming.binding.declaring_type(),
        ) else {
            // same scope, no declaring types: the earlier declaration wins
            return Some(true);
        };
        if a == b {
            return Some(true);
        }
        if is_subtype(self.lookup, a, b) {
            return Some(true);
        }
        if is_subtype(self.lookup, b, a) {
            return Some(false);
        }
        let a_iface = self.lookup.lookup(a).is_some_and(|t| t.is_interface());
        let b_iface = self.lookup.lookup(b).is_some_and(|t| t.is_interface());
        match (a_iface, b_iface) {
            (false, true) => Some(true),
            (true, false) => Some(false),
            _ => None,
        }
    }

    /// Drain in insertion order: methods first, then the rest.
    pub fn drain(self) -> impl Iterator<Item = Candidate> {
        self.methods.into_iter().chain(self.others)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.methods.iter().chain(self.others.iter())
    }
}

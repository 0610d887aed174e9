use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::sync::Arc;

use super::{BindingModel, TypeBinding, hierarchy::TypeLookup};

/// Immutable in-memory binding model: a snapshot of the type bindings a front
/// end produced for one compilation, keyed by internal name.
#[derive(Debug, Default, Deserialize)]
#[serde(from = "ModelData")]
pub struct MemoryModel {
    /// internal name → binding
    types: FxHashMap<Arc<str>, Arc<TypeBinding>>,
    /// dotted package names, including every parent package
    packages: FxHashSet<Arc<str>>,
}

#[derive(Deserialize)]
struct ModelData {
    #[serde(default)]
    types: Vec<TypeBinding>,
    #[serde(default)]
    packages: Vec<Arc<str>>,
}

impl From<ModelData> for MemoryModel {
    fn from(data: ModelData) -> Self {
        let mut model = MemoryModel::new(data.types);
        for pkg in data.packages {
            model.add_package(&pkg);
        }
        model
    }
}

impl MemoryModel {
    pub fn new(types: Vec<TypeBinding>) -> Self {
        let mut model = MemoryModel::default();
        for ty in types {
            if let Some(pkg) = ty.package() {
                let dotted = pkg.replace('/', ".");
                model.add_package(&dotted);
            }
            model
                .types
                .insert(ty.name.to_arc(), Arc::new(ty));
        }
        tracing::debug!(
            types = model.types.len(),
            packages = model.packages.len(),
            "memory model built"
        );
        model
    }

    fn add_package(&mut self, dotted: &str) {
        let mut end = dotted.len();
        loop {
            self.packages.insert(Arc::from(&dotted[..end]));
            match dotted[..end].rfind('.') {
                Some(dot) => end = dot,
                None => break,
            }
        }
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn iter_types(&self) -> impl Iterator<Item = &Arc<TypeBinding>> {
        self.types.values()
    }
}

impl BindingModel for MemoryModel {
    fn type_binding(&self, name: &str) -> Option<Arc<TypeBinding>> {
        self.types.get(name).cloned()
    }

    fn has_package(&self, name: &str) -> bool {
        self.packages.contains(name)
    }
}

impl TypeLookup for MemoryModel {
    fn lookup(&self, name: &str) -> Option<Arc<TypeBinding>> {
        self.type_binding(name)
    }
}

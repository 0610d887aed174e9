//! State owned by one completion or selection request.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::AssistConfig;
use crate::index::IndexSnapshot;
use crate::model::hierarchy::TypeLookup;
use crate::model::{BindingModel, TypeBinding};

/// Memoizes type lookups for the lifetime of one request. Never shared: a new
/// request starts with an empty cache, so a rebuilt model is always seen.
#[derive(Debug, Default)]
pub struct TypeCache {
    entries: RefCell<FxHashMap<Arc<str>, Option<Arc<TypeBinding>>>>,
}

impl TypeCache {
    pub fn get_or_load(
        &self,
        name: &str,
        load: impl FnOnce(&str) -> Option<Arc<TypeBinding>>,
    ) -> Option<Arc<TypeBinding>> {
        if let Some(hit) = self.entries.borrow().get(name) {
            return hit.clone();
        }
        let loaded = load(name);
        self.entries
            .borrow_mut()
            .insert(Arc::from(name), loaded.clone());
        loaded
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

pub struct Request<'a> {
    pub model: &'a dyn BindingModel,
    pub index: Arc<IndexSnapshot>,
    pub config: &'a AssistConfig,
    /// Project of the file being edited; index searches look there first.
    pub project: Option<Arc<str>>,
    pub cancel: CancellationToken,
    cache: TypeCache,
}

impl<'a> Request<'a> {
    pub fn new(
        model: &'a dyn BindingModel,
        index: Arc<IndexSnapshot>,
        config: &'a AssistConfig,
    ) -> Self {
        Self {
            model,
            index,
            config,
            project: None,
            cancel: CancellationToken::new(),
            cache: TypeCache::default(),
        }
    }

    pub fn with_project(mut self, project: impl Into<Arc<str>>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Type binding by internal name, through the request cache. Generic
    /// arguments and array suffixes are not part of the key.
    pub fn type_binding(&self, name: &str) -> Option<Arc<TypeBinding>> {
        let base = name.split('<').next().unwrap_or(name);
        if base.ends_with("[]") {
            return None;
        }
        self.cache
            .get_or_load(base, |n| self.model.type_binding(n))
    }

    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }
}

impl TypeLookup for Request<'_> {
    fn lookup(&self, name: &str) -> Option<Arc<TypeBinding>> {
        self.type_binding(name)
    }
}

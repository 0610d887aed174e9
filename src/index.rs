//! Workspace-wide type and package index, used when no binding is available.
//!
//! The index is split into one shard per project. Searches poll the caller's
//! cancellation token while they scan. Readers work on an immutable
//! [`IndexSnapshot`]; a background rebuild publishes a new snapshot and never
//! disturbs requests that already hold the old one.

use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashMap};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::completion::pattern::{MatchPattern, MatchQuality};
use crate::model::{
    BindingKind, DeclarationHandle, Location, MemoryModel, Modifiers, Origin, TypeBinding,
    TypeKind, TypeName, access,
};

/// Simple names matched between two cancellation checks.
const CANCEL_POLL_INTERVAL: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeEntry {
    pub name: TypeName,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub origin: Origin,
}

impl TypeEntry {
    pub fn handle(&self) -> DeclarationHandle {
        let location = match &self.origin {
            Origin::Source(path) => Location::Source {
                path: Arc::clone(path),
                range: None,
            },
            Origin::Binary(archive) => Location::Binary {
                archive: Arc::clone(archive),
            },
            Origin::Unknown => Location::Unknown,
        };
        DeclarationHandle {
            kind: BindingKind::Type,
            qualified_name: Arc::from(self.name.to_source()),
            member: None,
            location,
        }
    }

    /// Member-less binding for an indexed type the model has not loaded.
    pub fn stub_binding(&self) -> TypeBinding {
        let kind = if self.modifiers.0 & access::ACC_INTERFACE != 0 {
            TypeKind::Interface
        } else {
            TypeKind::Class
        };
        TypeBinding {
            name: self.name.clone(),
            kind,
            modifiers: self.modifiers,
            superclass: None,
            interfaces: vec![],
            outer: None,
            member_types: vec![],
            type_params: vec![],
            methods: vec![],
            fields: vec![],
            origin: self.origin.clone(),
            decl_range: None,
        }
    }
}

/// Outcome of a search that may be cancelled. Cancellation is distinct from
/// an empty result.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome<T> {
    Found(Vec<T>),
    Cancelled,
}

impl<T> SearchOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn unwrap_or_default(self) -> Vec<T> {
        match self {
            Self::Found(v) => v,
            Self::Cancelled => Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct IndexShard {
    project: Arc<str>,
    /// internal name → entry
    exact_match: FxHashMap<Arc<str>, Arc<TypeEntry>>,
    /// simple name → internal names (several packages may declare the same name)
    simple_name_index: FxHashMap<Arc<str>, Vec<Arc<str>>>,
    /// internal package name → internal names
    package_index: FxHashMap<Arc<str>, Vec<Arc<str>>>,
}

impl IndexShard {
    pub fn new(project: impl Into<Arc<str>>) -> Self {
        Self {
            project: project.into(),
            exact_match: FxHashMap::with_capacity_and_hasher(1024, FxBuildHasher),
            simple_name_index: FxHashMap::with_capacity_and_hasher(1024, FxBuildHasher),
            package_index: FxHashMap::default(),
        }
    }

    /// Index every type of a binding model under `project`.
    pub fn from_model(project: impl Into<Arc<str>>, model: &MemoryModel) -> Self {
        let mut shard = IndexShard::new(project);
        shard.add_types(model.iter_types().map(|t| TypeEntry {
            name: t.name.clone(),
            modifiers: t.modifiers,
            origin: t.origin.clone(),
        }));
        shard
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn add_types(&mut self, entries: impl IntoIterator<Item = TypeEntry>) {
        for entry in entries {
            let internal = entry.name.to_arc();
            let simple: Arc<str> = Arc::from(entry.name.simple_name());
            // the default package is registered under ""
            let pkg: Arc<str> = Arc::from(entry.name.package().unwrap_or(""));

            self.exact_match
                .insert(Arc::clone(&internal), Arc::new(entry));
            self.simple_name_index
                .entry(simple)
                .or_default()
                .push(Arc::clone(&internal));
            self.package_index.entry(pkg).or_default().push(internal);
        }
    }

    pub fn type_count(&self) -> usize {
        self.exact_match.len()
    }

    fn by_simple_name(&self, simple_name: &str) -> impl Iterator<Item = &Arc<TypeEntry>> {
        self.simple_name_index
            .get(simple_name)
            .into_iter()
            .flatten()
            .filter_map(|n| self.exact_match.get(n))
    }

    pub fn has_package(&self, internal_pkg: &str) -> bool {
        if internal_pkg.is_empty() {
            return false;
        }
        self.package_index.contains_key(internal_pkg)
            || self
                .package_index
                .keys()
                .any(|p| p.starts_with(internal_pkg) && p[internal_pkg.len()..].starts_with('/'))
    }
}

#[derive(Debug, Default)]
pub struct IndexSnapshot {
    generation: u64,
    shards: Vec<Arc<IndexShard>>,
}

impl IndexSnapshot {
    pub fn new(shards: Vec<IndexShard>) -> Self {
        Self {
            generation: 0,
            shards: shards.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn shards(&self) -> &[Arc<IndexShard>] {
        &self.shards
    }

    /// Exact-name type search. Looks in `project` first and only broadens to
    /// the whole workspace when the project has no match. `package` is dotted.
    pub fn find_type(
        &self,
        simple_name: &str,
        package: Option<&str>,
        project: Option<&str>,
        cancel: &CancellationToken,
    ) -> SearchOutcome<DeclarationHandle> {
        let internal_pkg = package.map(|p| p.replace('.', "/"));
        let matches = |shard: &IndexShard| -> Vec<DeclarationHandle> {
            shard
                .by_simple_name(simple_name)
                .filter(|e| match &internal_pkg {
                    Some(p) => e.name.package() == Some(p.as_str()),
                    None => true,
                })
                .map(|e| e.handle())
                .collect()
        };

        if let Some(project) = project {
            let mut found = Vec::new();
            for shard in self.shards.iter().filter(|s| s.project() == project) {
                if cancel.is_cancelled() {
                    tracing::debug!(simple_name, "index: project search cancelled");
                    return SearchOutcome::Cancelled;
                }
                found.extend(matches(shard));
            }
            if !found.is_empty() {
                tracing::debug!(simple_name, project, count = found.len(), "index: project hit");
                return SearchOutcome::Found(found);
            }
        }

        let mut found = Vec::new();
        for shard in &self.shards {
            if cancel.is_cancelled() {
                tracing::debug!(simple_name, "index: workspace search cancelled");
                return SearchOutcome::Cancelled;
            }
            if project.is_some_and(|p| shard.project() == p) {
                continue;
            }
            found.extend(matches(shard));
        }
        tracing::debug!(simple_name, count = found.len(), "index: workspace search");
        SearchOutcome::Found(found)
    }

    /// Types whose simple name matches `pattern`, across all shards: the
    /// `limit` best matches, strongest match quality first.
    pub fn find_types(
        &self,
        pattern: &MatchPattern,
        limit: usize,
        cancel: &CancellationToken,
    ) -> SearchOutcome<Arc<TypeEntry>> {
        let mut found: Vec<(MatchQuality, Arc<TypeEntry>)> = Vec::new();
        for shard in &self.shards {
            for (i, (simple, internals)) in shard.simple_name_index.iter().enumerate() {
                if i % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                    return SearchOutcome::Cancelled;
                }
                let Some(quality) = pattern.quality(simple) else {
                    continue;
                };
                found.extend(
                    internals
                        .iter()
                        .filter_map(|n| shard.exact_match.get(n))
                        .map(|e| (quality, Arc::clone(e))),
                );
            }
        }
        found.sort_by(|(qa, a), (qb, b)| qb.cmp(qa).then_with(|| a.name.cmp(&b.name)));
        found.truncate(limit);
        SearchOutcome::Found(found.into_iter().map(|(_, e)| e).collect())
    }

    /// Dotted package names starting with the dotted `prefix`, sorted.
    pub fn find_packages(&self, prefix: &str) -> Vec<Arc<str>> {
        let internal_prefix = prefix.replace('.', "/");
        let mut out: Vec<Arc<str>> = self
            .shards
            .iter()
            .flat_map(|s| s.package_index.keys())
            .filter(|p| !p.is_empty() && p.starts_with(internal_prefix.as_str()))
            .map(|p| Arc::from(p.replace('/', ".")))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Types declared directly in the dotted package `package`.
    pub fn types_in_package(&self, package: &str) -> Vec<Arc<TypeEntry>> {
        let internal = package.replace('.', "/");
        self.shards
            .iter()
            .flat_map(|s| {
                s.package_index
                    .get(internal.as_str())
                    .into_iter()
                    .flatten()
                    .filter_map(|n| s.exact_match.get(n))
                    .cloned()
            })
            .collect()
    }

    pub fn has_package(&self, package: &str) -> bool {
        let internal = package.replace('.', "/");
        self.shards.iter().any(|s| s.has_package(&internal))
    }
}

/// Holder of the current snapshot. The lock only guards the pointer swap and is
/// never held while a search runs.
#[derive(Debug, Default)]
pub struct WorkspaceIndex {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl WorkspaceIndex {
    pub fn new(shards: Vec<IndexShard>) -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexSnapshot::new(shards))),
        }
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replace (or add) the shard of `shard.project()` and publish a new snapshot.
    pub fn update_shard(&self, shard: IndexShard) {
        let mut guard = self.current.write();
        let mut shards: Vec<Arc<IndexShard>> = guard
            .shards
            .iter()
            .filter(|s| s.project() != shard.project())
            .cloned()
            .collect();
        tracing::info!(
            project = shard.project(),
            types = shard.type_count(),
            generation = guard.generation + 1,
            "index: publishing shard"
        );
        shards.push(Arc::new(shard));
        *guard = Arc::new(IndexSnapshot {
            generation: guard.generation + 1,
            shards,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatchMode, MatchModes};

    fn entry(name: &str, origin: &str) -> TypeEntry {
        TypeEntry {
            name: TypeName::from(name),
            modifiers: Modifiers::PUBLIC,
            origin: Origin::Source(Arc::from(origin)),
        }
    }

    fn shard(project: &str, names: &[&str]) -> IndexShard {
        let mut s = IndexShard::new(project);
        s.add_types(
            names
                .iter()
                .map(|n| entry(n, &format!("{project}/{n}.java"))),
        );
        s
    }

    #[test]
    fn test_project_scope_first() {
        let snap = IndexSnapshot::new(vec![
            shard("app", &["com/app/Widget"]),
            shard("lib", &["com/lib/Widget"]),
        ]);
        let cancel = CancellationToken::new();
        let found = snap
            .find_type("Widget", None, Some("app"), &cancel)
            .unwrap_or_default();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].qualified_name.as_ref(), "com.app.Widget");
    }

    #[test]
    fn test_broadens_to_workspace_and_reports_ambiguity() {
        let snap = IndexSnapshot::new(vec![
            shard("app", &["com/app/Main"]),
            shard("lib1", &["com/one/Widget"]),
            shard("lib2", &["com/two/Widget"]),
        ]);
        let cancel = CancellationToken::new();
        let found = snap
            .find_type("Widget", None, Some("app"), &cancel)
            .unwrap_or_default();
        let names: Vec<&str> = found.iter().map(|h| h.qualified_name.as_ref()).collect();
        assert_eq!(names, vec!["com.one.Widget", "com.two.Widget"]);
    }

    #[test]
    fn test_package_filter() {
        let snap = IndexSnapshot::new(vec![shard("lib", &["com/one/Widget", "com/two/Widget"])]);
        let cancel = CancellationToken::new();
        let found = snap
            .find_type("Widget", Some("com.two"), None, &cancel)
            .unwrap_or_default();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].qualified_name.as_ref(), "com.two.Widget");
    }

    #[test]
    fn test_cancelled_search_is_not_empty_result() {
        let snap = IndexSnapshot::new(vec![shard("lib", &["com/one/Widget"])]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = snap.find_type("Widget", None, None, &cancel);
        assert!(outcome.is_cancelled());
        let pattern = MatchPattern::new("Wid", MatchModes::only(MatchMode::Prefix), false);
        assert!(snap.find_types(&pattern, 10, &cancel).is_cancelled());
    }

    #[test]
    fn test_find_types_keeps_best_matches() {
        let mut names: Vec<String> = (0..50).map(|i| format!("com/lib/ListView{i}")).collect();
        names.push("com/lib/List".to_string());
        names.push("com/lib/MyList".to_string());
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let snap = IndexSnapshot::new(vec![shard("lib", &names)]);
        let modes = MatchModes::only(MatchMode::Prefix).with(MatchMode::Substring);
        let pattern = MatchPattern::new("List", modes, true);
        let cancel = CancellationToken::new();

        let found = snap.find_types(&pattern, 3, &cancel).unwrap_or_default();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].name.as_str(), "com/lib/List", "exact name survives the limit");
        assert!(found.iter().all(|e| e.name.simple_name() != "MyList"));

        let all = snap.find_types(&pattern, 100, &cancel).unwrap_or_default();
        assert_eq!(all.len(), 52);
        assert_eq!(all.last().map(|e| e.name.as_str()), Some("com/lib/MyList"));
    }

    #[test]
    fn test_find_packages() {
        let snap = IndexSnapshot::new(vec![shard(
            "lib",
            &["java/util/List", "java/util/concurrent/Future", "javax/swing/JButton"],
        )]);
        let pkgs = snap.find_packages("java.util");
        assert_eq!(
            pkgs.iter().map(|p| p.as_ref()).collect::<Vec<_>>(),
            vec!["java.util", "java.util.concurrent"]
        );
        assert!(snap.has_package("java"));
        assert!(!snap.has_package("jav"));
    }

    #[test]
    fn test_default_package_types() {
        let snap = IndexSnapshot::new(vec![shard("app", &["Main", "Helper", "com/app/Widget"])]);
        let mut names: Vec<String> = snap
            .types_in_package("")
            .iter()
            .map(|e| e.name.to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Helper", "Main"]);
        assert!(!snap.has_package(""));
        let pkgs = snap.find_packages("");
        assert_eq!(pkgs.iter().map(|p| p.as_ref()).collect::<Vec<_>>(), vec!["com.app"]);
    }

    #[test]
    fn test_snapshot_isolation() {
        let index = WorkspaceIndex::new(vec![shard("app", &["com/app/Old"])]);
        let before = index.snapshot();
        index.update_shard(shard("app", &["com/app/New"]));
        let after = index.snapshot();
        let cancel = CancellationToken::new();

        assert_eq!(
            before.find_type("Old", None, None, &cancel).unwrap_or_default().len(),
            1
        );
        assert!(before.find_type("New", None, None, &cancel).unwrap_or_default().is_empty());
        assert_eq!(
            after.find_type("New", None, None, &cancel).unwrap_or_default().len(),
            1
        );
        assert_eq!(after.generation(), before.generation() + 1);
    }
}

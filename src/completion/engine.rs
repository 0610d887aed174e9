//! Completion requests: classify the cursor, collect candidates for the
//! location, turn them into ranked proposals.

use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::instrument;

use super::bindings::{Candidate, CandidateSet};
use super::context::{CursorContext, CursorLocation};
use super::expected::{ExpectedTypeInferrer, ExpectedTypeSet, type_of};
use super::keyword::matching_keywords;
use super::pattern::MatchPattern;
use super::proposal::{CollectingSink, CompletionSink, Proposal};
use super::relevance::{ProposalBuilder, rank};
use super::scope::{ScopeWalker, dotted_to_internal};
use super::visibility::{AccessSite, VisibilityFilter};
use crate::config::AssistConfig;
use crate::error::EngineError;
use crate::index::{SearchOutcome, TypeEntry, WorkspaceIndex};
use crate::model::hierarchy::supertypes;
use crate::model::type_name::OBJECT;
use crate::model::{
    Binding, BindingKind, BindingModel, FieldBinding, Modifiers, TypeBinding, TypeName, access,
};
use crate::request::Request;
use crate::selection::recovery;
use crate::syntax::{NodeId, NodeKind, SyntaxTree};

/// Depth given to candidates that come from outside the scope chain.
const OUTSIDE_SCOPE: usize = usize::MAX;

#[derive(Debug, Default, Clone, Copy)]
pub struct CompletionEngine;

impl CompletionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Propose completions at `offset`. An invalid offset is rejected before
    /// the sink sees anything; otherwise the sink always gets `begin` and
    /// `end`. A cancelled request emits no proposals.
    #[instrument(skip(self, req, tree, sink), fields(path = %tree.path()))]
    pub fn complete(
        &self,
        req: &Request<'_>,
        tree: &SyntaxTree,
        offset: u32,
        sink: &mut dyn CompletionSink,
    ) -> Result<(), EngineError> {
        tree.check_offset(offset)?;
        sink.begin();

        let ctx = CursorContext::analyze(tree, offset, req.config.replace_full_word);
        let pattern = MatchPattern::new(
            ctx.prefix.clone(),
            req.config.match_modes,
            req.config.case_sensitive,
        );
        let expected = match ctx.location {
            CursorLocation::Expression
            | CursorLocation::MemberAccess { .. }
            | CursorLocation::TypeReference => {
                ExpectedTypeInferrer::new(req, tree, offset).infer(ctx.node)
            }
            _ => ExpectedTypeSet::default(),
        };

        let mut collector = Collector::new(req, tree, &ctx, &pattern);
        let result = collector.collect();
        match &result {
            Err(EngineError::Cancelled) => {
                tracing::debug!("completion: cancelled");
                sink.end();
                return Err(EngineError::Cancelled);
            }
            Err(e) => {
                tracing::error!(error = %e, "completion: request aborted, keeping partial results");
            }
            Ok(()) => {}
        }

        let builder = ProposalBuilder::new(req, &ctx, &pattern, &expected);
        let mut proposals: Vec<Proposal> = collector
            .candidates
            .drain()
            .filter_map(|c| builder.build(&c))
            .collect();
        proposals.extend(collector.keywords.iter().filter_map(|kw| builder.keyword(kw)));
        proposals.extend(
            collector
                .on_demand
                .iter()
                .filter_map(|(q, of_type)| builder.on_demand(q, *of_type)),
        );

        let proposals = rank(proposals);
        tracing::debug!(count = proposals.len(), "completion: done");
        for p in proposals {
            sink.accept(p);
        }
        sink.end();
        Ok(())
    }
}

struct Collector<'r, 'a> {
    req: &'r Request<'a>,
    tree: &'r SyntaxTree,
    ctx: &'r CursorContext,
    pattern: &'r MatchPattern,
    filter: VisibilityFilter<'r>,
    candidates: CandidateSet<'r>,
    keywords: Vec<&'static str>,
    /// `(qualifier, is a type)` for `import q.*;`
    on_demand: Vec<(String, bool)>,
}

impl<'r, 'a> Collector<'r, 'a> {
    fn new(
        req: &'r Request<'a>,
        tree: &'r SyntaxTree,
        ctx: &'r CursorContext,
        pattern: &'r MatchPattern,
    ) -> Self {
        let site = AccessSite::at(tree, ctx.node);
        Self {
            req,
            tree,
            ctx,
            pattern,
            filter: VisibilityFilter::new(req, site, req.config.check_visibility),
            candidates: CandidateSet::new(req),
            keywords: Vec::new(),
            on_demand: Vec::new(),
        }
    }

    fn check_cancelled(&self) -> Result<(), EngineError> {
        if self.req.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    fn collect(&mut self) -> Result<(), EngineError> {
        match self.ctx.location.clone() {
            CursorLocation::Comment => Ok(()),
            CursorLocation::Expression => self.expression(),
            CursorLocation::TypeReference => self.type_reference(),
            CursorLocation::MemberAccess { receiver } => self.member_access(receiver),
            CursorLocation::Import {
                qualifier,
                is_static,
            } => self.import(qualifier.as_deref(), is_static),
            CursorLocation::Package { qualifier } => {
                self.child_packages(qualifier.as_deref());
                Ok(())
            }
        }
    }

    /// Offer one candidate. Returns whether it was kept.
    fn offer(&mut self, candidate: Candidate) -> bool {
        if !self.pattern.matches(candidate.binding.name()) {
            return false;
        }
        if !self.filter.admits(&candidate.binding) {
            tracing::debug!(name = candidate.binding.name(), "completion: not accessible");
            return false;
        }
        let accessible = self.filter.is_accessible(&candidate.binding);
        self.candidates.add(candidate.with_accessible(accessible))
    }

    fn offer_binding(&mut self, binding: Binding, depth: usize) -> bool {
        self.offer(Candidate::new(binding, depth))
    }

    fn expression(&mut self) -> Result<(), EngineError> {
        self.scope_chain(|_| true)?;
        self.index_types()?;
        if !self.pattern.token().is_empty() {
            self.child_packages(None);
        }
        if self.req.config.include_keywords {
            self.keywords.extend(matching_keywords(self.pattern));
        }
        Ok(())
    }

    fn type_reference(&mut self) -> Result<(), EngineError> {
        self.scope_chain(|b| matches!(b, Binding::Type(_)))?;
        self.index_types()
    }

    fn scope_chain(&mut self, keep: impl Fn(&Binding) -> bool) -> Result<(), EngineError> {
        let walker = ScopeWalker::new(self.req, self.tree, self.ctx.node, self.ctx.offset);
        for (scope, bindings) in walker {
            self.check_cancelled()?;
            tracing::debug!(kind = ?scope.kind, depth = scope.depth, count = bindings.len(), "completion: scope");
            for b in bindings.into_iter().filter(|b| keep(b)) {
                self.offer_binding(b, scope.depth);
            }
        }
        Ok(())
    }

    /// Types from the index that are not in scope yet. They carry the import
    /// they need. Nothing is searched before a first character is typed.
    fn index_types(&mut self) -> Result<(), EngineError> {
        if self.pattern.token().is_empty() {
            return Ok(());
        }
        let entries = match self.req.index.find_types(
            self.pattern,
            self.req.config.max_index_results,
            &self.req.cancel,
        ) {
            SearchOutcome::Found(entries) => entries,
            SearchOutcome::Cancelled => return Err(EngineError::Cancelled),
        };
        for entry in entries {
            // default-package types cannot be imported; the unit scope has
            // them when they are visible at all
            if entry.name.contains('$') || entry.name.package().is_none() {
                continue;
            }
            let binding = Binding::Type(self.type_of_entry(&entry));
            let candidate =
                Candidate::new(binding, OUTSIDE_SCOPE).with_import(entry.name.clone());
            self.offer(candidate);
        }
        Ok(())
    }

    fn type_of_entry(&self, entry: &TypeEntry) -> Arc<TypeBinding> {
        self.req
            .type_binding(&entry.name)
            .unwrap_or_else(|| Arc::new(entry.stub_binding()))
    }

    /// Packages directly below `parent`, or the top-level ones.
    fn child_packages(&mut self, parent: Option<&str>) {
        let prefix = parent.map(|p| format!("{p}.")).unwrap_or_default();
        let mut children: Vec<String> = self
            .req
            .index
            .find_packages(&prefix)
            .iter()
            .filter_map(|p| {
                let segment = p.strip_prefix(prefix.as_str())?.split('.').next()?;
                (!segment.is_empty()).then(|| format!("{prefix}{segment}"))
            })
            .collect();
        children.sort();
        children.dedup();
        let depth = if parent.is_some() { 0 } else { OUTSIDE_SCOPE };
        for child in children {
            self.offer_binding(Binding::Package(Arc::from(child)), depth);
        }
    }

    fn member_access(&mut self, receiver: NodeId) -> Result<(), EngineError> {
        match self.req.model.resolve_binding(self.tree, receiver) {
            Some(Binding::Type(t)) => {
                self.static_members(&t.name);
                if self.pattern.matches("class") {
                    self.keywords.push("class");
                }
                Ok(())
            }
            Some(Binding::Package(p)) => {
                self.package_members(&p);
                Ok(())
            }
            Some(Binding::Method(_))
                if !matches!(self.tree.kind(receiver), NodeKind::MethodInvocation { .. }) =>
            {
                Err(EngineError::UnexpectedBinding {
                    context: "member access receiver",
                    expected: BindingKind::Variable,
                    found: BindingKind::Method,
                })
            }
            _ => {
                let ty = type_of(self.req, self.tree, receiver)
                    .or_else(|| recovery::resolve(self.req, self.tree, receiver, self.ctx.offset));
                match ty {
                    Some(ty) => self.instance_members(&ty),
                    None => self.unbound_qualifier(receiver),
                }
                Ok(())
            }
        }
    }

    /// `Type.|`: static members and member types.
    fn static_members(&mut self, ty: &TypeName) {
        for t in supertypes(self.req, ty.base()) {
            for f in t.fields.iter().filter(|f| f.modifiers.is_static()) {
                self.offer_binding(Binding::Field(Arc::clone(f)), 0);
            }
            for m in t.member_methods().filter(|m| m.modifiers.is_static()) {
                self.offer_binding(Binding::Method(Arc::clone(m)), 0);
            }
            for member in &t.member_types {
                if let Some(mt) = self.req.type_binding(member) {
                    self.offer_binding(Binding::Type(mt), 0);
                }
            }
        }
    }

    /// `expr.|`: every field and method reachable through the type.
    fn instance_members(&mut self, ty: &TypeName) {
        if ty.is_array() {
            let length = FieldBinding {
                name: Arc::from("length"),
                declaring_type: ty.clone(),
                modifiers: Modifiers::PUBLIC.with(access::ACC_FINAL),
                ty: TypeName::from("int"),
                decl_range: None,
            };
            self.offer_binding(Binding::Field(Arc::new(length)), 0);
            self.instance_members(&TypeName::from(OBJECT));
            return;
        }
        if ty.is_primitive() {
            tracing::debug!(ty = %ty, "completion: primitive receiver has no members");
            return;
        }
        let chain = supertypes(self.req, ty.base());
        if chain.is_empty() {
            tracing::warn!(ty = %ty, "completion: receiver type not in model");
        }
        for t in chain {
            for f in &t.fields {
                self.offer_binding(Binding::Field(Arc::clone(f)), 0);
            }
            for m in t.member_methods() {
                self.offer_binding(Binding::Method(Arc::clone(m)), 0);
            }
        }
    }

    /// Types and subpackages of a dotted package.
    fn package_members(&mut self, package: &str) {
        let mut entries = self.req.index.types_in_package(package);
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        for entry in entries.iter().filter(|e| !e.name.contains('$')) {
            let binding = Binding::Type(self.type_of_entry(entry));
            self.offer_binding(binding, 0);
        }
        self.child_packages(Some(package));
    }

    /// A receiver nobody bound, read as a dotted type or package name.
    fn unbound_qualifier(&mut self, receiver: NodeId) {
        let text: String = self
            .tree
            .node_text(receiver)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let is_name = !text.is_empty()
            && text
                .split('.')
                .all(|s| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$'));
        if !is_name {
            tracing::debug!(receiver = %text, "completion: receiver type unknown");
            return;
        }
        let internal = dotted_to_internal(self.req, &text);
        if self.req.type_binding(&internal).is_some() {
            self.static_members(&TypeName::from(internal));
        } else if self.req.index.has_package(&text) || self.req.model.has_package(&text) {
            self.package_members(&text);
        } else {
            tracing::debug!(receiver = %text, "completion: receiver is neither type nor package");
        }
    }

    fn import(&mut self, qualifier: Option<&str>, is_static: bool) -> Result<(), EngineError> {
        let Some(qualifier) = qualifier else {
            self.child_packages(None);
            return Ok(());
        };
        let internal = dotted_to_internal(self.req, qualifier);
        if let Some(t) = self.req.type_binding(&internal) {
            for member in &t.member_types {
                if let Some(mt) = self.req.type_binding(member) {
                    self.offer_binding(Binding::Type(mt), 0);
                }
            }
            if is_static {
                for st in supertypes(self.req, &t.name) {
                    for f in st.fields.iter().filter(|f| f.modifiers.is_static()) {
                        self.offer_binding(Binding::Field(Arc::clone(f)), 0);
                    }
                    for m in st.member_methods().filter(|m| m.modifiers.is_static()) {
                        self.offer_binding(Binding::Method(Arc::clone(m)), 0);
                    }
                }
            }
            self.on_demand.push((qualifier.to_string(), true));
            return Ok(());
        }

        self.check_cancelled()?;
        self.package_members(qualifier);
        if !is_static && self.req.index.has_package(qualifier) {
            self.on_demand.push((qualifier.to_string(), false));
        }
        Ok(())
    }
}

/// One completion request of a batch.
#[derive(Debug, Clone)]
pub struct CompletionJob {
    pub tree: Arc<SyntaxTree>,
    pub offset: u32,
    pub project: Option<Arc<str>>,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run independent requests in parallel. Each job takes the index snapshot
/// current when it starts and runs on one worker; a panic fails that job only.
pub fn complete_batch(
    model: &dyn BindingModel,
    index: &WorkspaceIndex,
    config: &AssistConfig,
    jobs: &[CompletionJob],
) -> Vec<Result<Vec<Proposal>, EngineError>> {
    jobs.par_iter()
        .map(|job| {
            let run = || -> Result<Vec<Proposal>, EngineError> {
                let mut req = Request::new(model, index.snapshot(), config);
                if let Some(project) = &job.project {
                    req = req.with_project(Arc::clone(project));
                }
                let mut sink = CollectingSink::default();
                CompletionEngine::new().complete(&req, &job.tree, job.offset, &mut sink)?;
                Ok(sink.into_proposals())
            };
            catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::error!(path = %job.tree.path(), offset = job.offset, %message, "completion: request panicked");
                Err(EngineError::Internal(message))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ProposalKind;
    use crate::model::MemoryModel;
    use crate::syntax::{LiteralKind, TextRange, TreeBuilder};
    use crate::testing::{MethodFixture, WorldBuilder, cursor, method_fixture, span};
    use tokio_util::sync::CancellationToken;

    fn run(fx: &MethodFixture, config: &AssistConfig) -> CollectingSink {
        let req = Request::new(&fx.model, Arc::clone(&fx.index), config);
        let mut sink = CollectingSink::default();
        CompletionEngine::new()
            .complete(&req, &fx.tree, fx.offset, &mut sink)
            .expect("completion succeeds");
        assert!(sink.begun && sink.ended, "sink lifecycle");
        sink
    }

    /// `<ident>|;` as the only statement of the method body.
    fn expression_stmt(f: &mut crate::testing::TreeFixture, ident: &str, n: usize) -> NodeId {
        let name = f.name(ident, n);
        f.mark_recovered(name);
        f.node(NodeKind::ExpressionStmt { expr: name }, &format!("{ident};"))
    }

    /// `<receiver>.|;` with `receiver` bound by `bind`.
    fn member_stmt(f: &mut crate::testing::TreeFixture, receiver: NodeId, text: &str) -> NodeId {
        let err = f.node(
            NodeKind::Error {
                children: vec![receiver],
            },
            &format!("{text}."),
        );
        f.node(NodeKind::ExpressionStmt { expr: err }, &format!("{text}.;"))
    }

    #[test]
    fn test_innermost_declaration_wins() {
        let fx = method_fixture(
            WorldBuilder::new()
                .class("p/A", None, &[])
                .field("p/A", "x", "int"),
            "void m(String x)",
            "{ long x = 1L; x|; }",
            |f| {
                f.method_param("x", 0, "String x", "java/lang/String");
                let long_ty = f.simple_type("long", 0, "long");
                let lit = f.node(NodeKind::Literal { literal: LiteralKind::Long }, "1L");
                let (decl, _) = f.declarator("x", 1, "x = 1L", "long", Some(lit));
                let local = f.node(
                    NodeKind::LocalVarDecl {
                        ty: long_ty,
                        declarators: vec![decl],
                    },
                    "long x = 1L;",
                );
                let x = f.name("x", 2);
                let stmt = f.node(NodeKind::ExpressionStmt { expr: x }, "x;");
                vec![f.node(
                    NodeKind::Block {
                        statements: vec![local, stmt],
                    },
                    "{ long x = 1L; x; }",
                )]
            },
        );
        let sink = run(&fx, &AssistConfig::default());
        let xs: Vec<&Proposal> = sink
            .proposals
            .iter()
            .filter(|p| p.display_name.as_ref() == "x")
            .collect();
        assert_eq!(xs.len(), 1, "outer x declarations are hidden: {:?}", sink.labels());
        assert_eq!(xs[0].detail.as_deref(), Some("long"));
        assert_eq!(sink.proposals[0].display_name.as_ref(), "x", "innermost x ranks first");
    }

    #[test]
    fn test_static_method_excludes_instance_fields() {
        let fx = method_fixture(
            WorldBuilder::new()
                .class("p/A", None, &[])
                .field("p/A", "count", "int")
                .static_field("p/A", "COUNTER", "int"),
            "static void m()",
            "co|;",
            |f| vec![expression_stmt(f, "co", 0)],
        );
        let sink = run(&fx, &AssistConfig::default());
        let labels = sink.labels();
        assert!(labels.contains(&"COUNTER"), "static field proposed: {labels:?}");
        assert!(!labels.contains(&"count"), "instance field excluded: {labels:?}");
        assert!(labels.contains(&"continue"), "keywords still proposed: {labels:?}");
    }

    fn inheritance_world() -> WorldBuilder {
        WorldBuilder::new()
            .class("p/A", None, &[])
            .class("p/Base", None, &[])
            .method("p/Base", "name", &[], "java/lang/String")
            .static_method("p/Base", "helper", &[], "void")
            .class("p/Derived", Some("p/Base"), &[])
            .method("p/Derived", "name", &[], "java/lang/String")
    }

    #[test]
    fn test_member_access_drops_overridden_methods() {
        let fx = method_fixture(inheritance_world(), "void m(Derived obj)", "obj.|;", |f| {
            let var = f.method_param("obj", 0, "Derived obj", "p/Derived");
            let obj = f.name("obj", 1);
            f.bind(obj, var);
            vec![member_stmt(f, obj, "obj")]
        });
        let sink = run(&fx, &AssistConfig::default());
        let names: Vec<&Proposal> = sink
            .proposals
            .iter()
            .filter(|p| p.display_name.as_ref() == "name() : String")
            .collect();
        assert_eq!(names.len(), 1, "{:?}", sink.labels());
        assert_eq!(names[0].declaring_type.as_deref(), Some("p.Derived"));
        assert_eq!(names[0].completion, "name()");
        let labels = sink.labels();
        assert!(labels.contains(&"helper() : void"));
        assert!(labels.contains(&"toString() : String"), "Object members: {labels:?}");
    }

    #[test]
    fn test_static_access_proposes_static_members_only() {
        let fx = method_fixture(inheritance_world(), "void m()", "Base.|;", |f| {
            let base = f.name("Base", 0);
            f.bind(base, crate::testing::type_binding(&inheritance_world().build(), "p/Base"));
            vec![member_stmt(f, base, "Base")]
        });
        let sink = run(&fx, &AssistConfig::default());
        let labels = sink.labels();
        assert!(labels.contains(&"helper() : void"), "{labels:?}");
        assert!(!labels.contains(&"name() : String"), "{labels:?}");
        assert!(labels.contains(&"class"), "{labels:?}");
    }

    #[test]
    fn test_relaxed_visibility_only_adds_proposals() {
        let world = || {
            WorldBuilder::new()
                .class("p/A", None, &[])
                .class("a/Lib", None, &[])
                .method("a/Lib", "open", &[], "void")
                .method_with("a/Lib", "secret", &[], "void", Modifiers(access::ACC_PRIVATE))
                .method_with("a/Lib", "internal", &[], "void", Modifiers(0))
        };
        let fx = method_fixture(world(), "void m(Lib lib)", "lib.|;", |f| {
            let var = f.method_param("lib", 0, "Lib lib", "a/Lib");
            let lib = f.name("lib", 1);
            f.bind(lib, var);
            vec![member_stmt(f, lib, "lib")]
        });

        let strict = run(&fx, &AssistConfig::default());
        let relaxed = run(
            &fx,
            &AssistConfig {
                check_visibility: false,
                ..AssistConfig::default()
            },
        );
        let strict_labels = strict.labels();
        let relaxed_labels = relaxed.labels();
        for label in &strict_labels {
            assert!(relaxed_labels.contains(label), "{label} lost when relaxed");
        }
        assert!(!strict_labels.contains(&"secret() : void"));
        assert!(relaxed_labels.contains(&"secret() : void"));
        let pos = |l: &str| relaxed_labels.iter().position(|x| *x == l).expect(l);
        assert!(pos("open() : void") < pos("secret() : void"), "accessible ranks first");
    }

    #[test]
    fn test_private_inherited_field_does_not_hide_interface_constant() {
        let world = WorldBuilder::new()
            .class("q/Base", None, &[])
            .field_with("q/Base", "val", "long", Modifiers(access::ACC_PRIVATE))
            .interface("q/I", &[])
            .static_field("q/I", "val", "int")
            .class("p/A", Some("q/Base"), &["q/I"]);
        let fx = method_fixture(world, "void m()", "va|;", |f| vec![expression_stmt(f, "va", 0)]);
        let owners = |sink: &CollectingSink| -> Vec<String> {
            sink.proposals
                .iter()
                .filter(|p| p.kind == ProposalKind::Field && p.display_name.as_ref() == "val")
                .filter_map(|p| p.declaring_type.as_deref().map(str::to_string))
                .collect()
        };

        let strict = run(&fx, &AssistConfig::default());
        let relaxed = run(
            &fx,
            &AssistConfig {
                check_visibility: false,
                ..AssistConfig::default()
            },
        );
        assert_eq!(owners(&strict), vec!["q.I"]);
        assert_eq!(owners(&relaxed), vec!["q.I"]);
        for label in strict.labels() {
            assert!(relaxed.labels().contains(&label), "{label} lost when relaxed");
        }
    }

    #[test]
    fn test_index_type_needs_import() {
        let fx = method_fixture(
            WorldBuilder::new()
                .class("p/A", None, &[])
                .class("q/Helper", None, &[])
                .class("q/Helper$Inner", None, &[]),
            "void m()",
            "Hel|;",
            |f| vec![expression_stmt(f, "Hel", 0)],
        );
        let sink = run(&fx, &AssistConfig::default());
        let helper = sink
            .proposals
            .iter()
            .find(|p| p.display_name.as_ref() == "Helper")
            .expect("index type proposed");
        assert_eq!(helper.required_import.as_deref(), Some("q.Helper"));
        assert_eq!(helper.completion, "Helper");
    }

    #[test]
    fn test_default_package_type_is_never_imported() {
        let fx = method_fixture(
            WorldBuilder::new()
                .class("p/A", None, &[])
                .class("Helper", None, &[]),
            "void m()",
            "Hel|;",
            |f| vec![expression_stmt(f, "Hel", 0)],
        );
        let sink = run(&fx, &AssistConfig::default());
        assert!(!sink.labels().contains(&"Helper"), "{:?}", sink.labels());
    }

    #[test]
    fn test_expected_type_ranks_matching_variable_first() {
        let fx = method_fixture(
            WorldBuilder::new().class("p/A", None, &[]),
            "void m(String s, int n)",
            "int i = |;",
            |f| {
                f.method_param("s", 0, "String s", "java/lang/String");
                // "n" also occurs in "String" and "int"
                f.method_param("n", 2, "int n", "int");
                let int_ty = f.simple_type("int", 1, "int");
                let (decl, _) = f.declarator("i", 4, "i = ", "int", None);
                vec![f.node(
                    NodeKind::LocalVarDecl {
                        ty: int_ty,
                        declarators: vec![decl],
                    },
                    "int i = ;",
                )]
            },
        );
        let sink = run(&fx, &AssistConfig::default());
        let labels = sink.labels();
        let pos = |l: &str| labels.iter().position(|x| *x == l).expect(l);
        assert!(pos("n") < pos("s"), "{labels:?}");
        assert!(!labels.contains(&"i"), "a variable is not in scope in its own initializer");
    }

    fn import_fixture(marked: &str) -> (MemoryModel, Arc<crate::index::IndexSnapshot>, SyntaxTree, u32) {
        let (src, offset) = cursor(marked);
        let (model, index) = crate::testing::world_with_index(
            WorldBuilder::new()
                .class("java/util/List", None, &[])
                .class("java/util/Map", None, &[])
                .class("java/util/concurrent/Future", None, &[]),
        );
        let mut b = TreeBuilder::new("A.java", src.as_str());
        let start = span(&src, "java").start;
        let end = span(&src, ";").start;
        let name = b.node(
            NodeKind::SimpleName {
                ident: Arc::from(&src[start as usize..end as usize]),
            },
            TextRange::new(start, end),
        );
        let import = b.node(
            NodeKind::ImportDecl {
                name,
                is_static: false,
                on_demand: false,
            },
            TextRange::new(0, end + 1),
        );
        let tree = b.finish(NodeKind::CompilationUnit { items: vec![import] });
        (model, index, tree, offset)
    }

    #[test]
    fn test_import_completes_packages_and_types() {
        let config = AssistConfig::default();
        let (model, index, tree, offset) = import_fixture("import java.ut|;\n");
        let req = Request::new(&model, index, &config);
        let mut sink = CollectingSink::default();
        CompletionEngine::new()
            .complete(&req, &tree, offset, &mut sink)
            .expect("completion succeeds");
        assert_eq!(sink.labels(), vec!["java.util"]);
        let p = &sink.proposals[0];
        assert_eq!(p.completion, "java.util");
        assert_eq!(tree.slice(p.replace), "java.ut");

        let (model, index, tree, offset) = import_fixture("import java.util.|;\n");
        let req = Request::new(&model, index, &config);
        let mut sink = CollectingSink::default();
        CompletionEngine::new()
            .complete(&req, &tree, offset, &mut sink)
            .expect("completion succeeds");
        let completions: Vec<&str> = sink.proposals.iter().map(|p| p.completion.as_str()).collect();
        assert!(completions.contains(&"java.util.List"), "{completions:?}");
        assert!(completions.contains(&"java.util.Map"), "{completions:?}");
        assert!(completions.contains(&"java.util.concurrent"), "{completions:?}");
        assert!(completions.contains(&"java.util.*;"), "{completions:?}");
    }

    #[test]
    fn test_invalid_offset_is_rejected() {
        let fx = method_fixture(
            WorldBuilder::new().class("p/A", None, &[]),
            "void m()",
            "x|;",
            |f| vec![expression_stmt(f, "x", 0)],
        );
        let config = AssistConfig::default();
        let req = Request::new(&fx.model, Arc::clone(&fx.index), &config);
        let mut sink = CollectingSink::default();
        let past_end = fx.tree.text().len() as u32 + 1;
        let err = CompletionEngine::new()
            .complete(&req, &fx.tree, past_end, &mut sink)
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(!sink.begun, "nothing reaches the sink");
    }

    #[test]
    fn test_cancelled_request_reports_cancellation() {
        let fx = method_fixture(
            WorldBuilder::new().class("p/A", None, &[]),
            "void m()",
            "Str|;",
            |f| vec![expression_stmt(f, "Str", 0)],
        );
        let config = AssistConfig::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let req = Request::new(&fx.model, Arc::clone(&fx.index), &config).with_cancellation(cancel);
        let mut sink = CollectingSink::default();
        let result = CompletionEngine::new().complete(&req, &fx.tree, fx.offset, &mut sink);
        assert_eq!(result, Err(EngineError::Cancelled));
        assert!(sink.proposals.is_empty());
        assert!(sink.ended, "end() is still called");
    }

    #[test]
    fn test_batch_isolates_failures() {
        let fx = method_fixture(
            WorldBuilder::new().class("p/A", None, &[]),
            "void m()",
            "Str|;",
            |f| vec![expression_stmt(f, "Str", 0)],
        );
        let index = WorkspaceIndex::new(vec![crate::index::IndexShard::from_model("app", &fx.model)]);
        let tree = Arc::new(fx.tree);
        let jobs = vec![
            CompletionJob {
                tree: Arc::clone(&tree),
                offset: fx.offset,
                project: Some(Arc::from("app")),
            },
            CompletionJob {
                tree: Arc::clone(&tree),
                offset: u32::MAX,
                project: None,
            },
        ];
        let results = complete_batch(&fx.model, &index, &AssistConfig::default(), &jobs);
        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().expect("first job succeeds");
        assert!(first.iter().any(|p| p.display_name.as_ref() == "String"));
        assert!(matches!(results[1], Err(EngineError::InvalidOffset { .. })));
    }
}

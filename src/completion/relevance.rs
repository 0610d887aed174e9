//! Turning candidates into scored proposals, and the final ordering.

use std::sync::Arc;

use super::bindings::Candidate;
use super::context::{CursorContext, CursorLocation};
use super::expected::{ExpectedTypeSet, Fit};
use super::fuzzy::fuzzy_score;
use super::pattern::{MatchPattern, MatchQuality};
use super::proposal::{Proposal, ProposalKind};
use crate::config::RelevanceWeights;
use crate::model::{Binding, TypeName};
use crate::request::Request;

fn dotted(internal: &str) -> Arc<str> {
    Arc::from(internal.replace(['/', '$'], "."))
}

pub struct ProposalBuilder<'r, 'a> {
    req: &'r Request<'a>,
    ctx: &'r CursorContext,
    pattern: &'r MatchPattern,
    expected: &'r ExpectedTypeSet,
}

impl<'r, 'a> ProposalBuilder<'r, 'a> {
    pub fn new(
        req: &'r Request<'a>,
        ctx: &'r CursorContext,
        pattern: &'r MatchPattern,
        expected: &'r ExpectedTypeSet,
    ) -> Self {
        Self {
            req,
            ctx,
            pattern,
            expected,
        }
    }

    fn weights(&self) -> &RelevanceWeights {
        &self.req.config.relevance
    }

    fn quality_score(&self, quality: MatchQuality) -> f32 {
        let w = self.weights();
        match quality {
            MatchQuality::Exact => w.exact_match,
            MatchQuality::CamelCase => w.camel_case_match,
            MatchQuality::Prefix => w.prefix_match,
            MatchQuality::Substring => w.substring_match,
            MatchQuality::Subword => w.subword_match,
        }
    }

    /// Fuzzy score squeezed below one point so it only orders names that
    /// matched in the same way.
    fn tie_break(&self, name: &str) -> f32 {
        fuzzy_score(self.pattern.token(), name, self.pattern.case_sensitive())
            .map_or(0.0, |s| s.min(999) as f32 / 1000.0)
    }

    fn expected_boost(&self, ty: Option<&TypeName>) -> f32 {
        if self.expected.is_empty() {
            return 0.0;
        }
        match ty.and_then(|t| self.expected.fit(self.req, t)) {
            Some(Fit::Exact) => self.weights().expected_exact,
            Some(Fit::Compatible) => self.weights().expected_compatible,
            None => 0.0,
        }
    }

    fn qualified(&self) -> bool {
        matches!(
            self.ctx.location,
            CursorLocation::Import { .. } | CursorLocation::Package { .. }
        )
    }

    /// `None` when the candidate's name does not match the pattern.
    pub fn build(&self, candidate: &Candidate) -> Option<Proposal> {
        let binding = &candidate.binding;
        let name = binding.name();
        let quality = self.pattern.quality(name)?;
        let w = self.weights();

        let (kind, kind_weight) = match binding {
            Binding::Type(_) => (ProposalKind::Type, w.type_name),
            Binding::Method(_) => (ProposalKind::Method, w.method),
            Binding::Field(_) => (ProposalKind::Field, w.field),
            Binding::Variable(_) => (ProposalKind::LocalVariable, w.local_variable),
            Binding::Package(_) => (ProposalKind::Package, w.package),
        };

        let mut relevance = self.quality_score(quality)
            + kind_weight
            + self.expected_boost(binding.value_type())
            + self.tie_break(name)
            + 1.0 / (1.0 + candidate.depth as f32);
        if !candidate.accessible {
            relevance -= w.inaccessible_penalty;
        }
        if candidate.required_import.is_some() {
            relevance -= w.needs_import_penalty;
        }

        let (display_name, detail, package): (Arc<str>, Option<String>, Option<Arc<str>>) =
            match binding {
                Binding::Type(t) => (
                    Arc::from(t.simple_name()),
                    Some(t.name.to_source()),
                    t.package().map(dotted),
                ),
                Binding::Method(m) => (
                    Arc::from(m.display_signature()),
                    Some(m.declaring_type.to_source()),
                    None,
                ),
                Binding::Field(f) => (
                    Arc::clone(&f.name),
                    Some(f.ty.simple_name().to_string()),
                    None,
                ),
                Binding::Variable(v) => (
                    Arc::clone(&v.name),
                    Some(v.ty.simple_name().to_string()),
                    None,
                ),
                Binding::Package(p) => (Arc::clone(p), None, Some(Arc::clone(p))),
            };

        Some(Proposal {
            kind,
            declaring_type: binding.declaring_type().map(|t| dotted(t.base())),
            package,
            display_name,
            completion: self.completion_text(binding),
            replace: self.ctx.replace,
            relevance,
            detail,
            required_import: candidate.required_import.as_ref().map(|t| dotted(t.base())),
        })
    }

    fn completion_text(&self, binding: &Binding) -> String {
        if self.qualified() {
            return match binding {
                Binding::Type(t) => t.name.to_source(),
                Binding::Method(_) | Binding::Field(_) => binding
                    .declaring_type()
                    .map(|owner| format!("{}.{}", owner.to_source(), binding.name()))
                    .unwrap_or_else(|| binding.name().to_string()),
                Binding::Package(p) => p.to_string(),
                Binding::Variable(v) => v.name.to_string(),
            };
        }
        match binding {
            Binding::Method(m) if !self.ctx.followed_by_paren => format!("{}()", m.name),
            _ => binding.name().to_string(),
        }
    }

    pub fn keyword(&self, keyword: &'static str) -> Option<Proposal> {
        let quality = self.pattern.quality(keyword)?;
        Some(Proposal {
            kind: ProposalKind::Keyword,
            declaring_type: None,
            package: None,
            display_name: Arc::from(keyword),
            completion: keyword.to_string(),
            replace: self.ctx.replace,
            relevance: self.quality_score(quality) + self.weights().keyword + self.tie_break(keyword),
            detail: None,
            required_import: None,
        })
    }

    /// `import java.util.*;` for a package or type qualifier. Only offered
    /// before anything is typed after the dot.
    pub fn on_demand(&self, qualifier: &str, of_type: bool) -> Option<Proposal> {
        if !self.pattern.token().is_empty() {
            return None;
        }
        Some(Proposal {
            kind: if of_type {
                ProposalKind::Type
            } else {
                ProposalKind::Package
            },
            declaring_type: None,
            package: (!of_type).then(|| Arc::from(qualifier)),
            display_name: Arc::from(format!("{qualifier}.*")),
            completion: format!("{qualifier}.*;"),
            replace: self.ctx.replace,
            relevance: self.weights().package,
            detail: None,
            required_import: None,
        })
    }
}

/// Drop duplicates, then order by relevance (descending) and display name.
pub fn rank(proposals: Vec<Proposal>) -> Vec<Proposal> {
    let mut proposals = dedup(proposals);
    proposals.sort_by(|a, b| {
        b.relevance
            .total_cmp(&a.relevance)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    proposals
}

fn dedup(mut proposals: Vec<Proposal>) -> Vec<Proposal> {
    proposals.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| b.relevance.total_cmp(&a.relevance))
    });

    let mut result: Vec<Proposal> = Vec::with_capacity(proposals.len());
    for p in proposals {
        let duplicate = result
            .iter()
            .rev()
            .take_while(|last| last.display_name == p.display_name)
            .any(|last| {
                last.kind == p.kind
                    && last.declaring_type == p.declaring_type
                    && last.package == p.package
                    && last.required_import == p.required_import
            });
        if !duplicate {
            result.push(p);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssistConfig, MatchMode, MatchModes};
    use crate::syntax::{NodeId, TextRange};
    use crate::testing::{WorldBuilder, method_binding, type_binding, world_with_index};

    fn context(location: CursorLocation, followed_by_paren: bool) -> CursorContext {
        CursorContext {
            offset: 10,
            node: NodeId(0),
            location,
            prefix: String::new(),
            replace: TextRange::new(8, 10),
            followed_by_paren,
        }
    }

    fn world() -> WorldBuilder {
        WorldBuilder::new()
            .class("java/util/NullPointerHolder", None, &[])
            .class("p/A", None, &[])
            .method("p/A", "nullSafe", &[], "int")
            .method("p/A", "getName", &[], "java/lang/String")
            .field("p/A", "count", "int")
    }

    #[test]
    fn test_match_quality_orders_proposals() {
        let (model, index) = world_with_index(world());
        let config = AssistConfig {
            match_modes: MatchModes::default()
                .with(MatchMode::Exact)
                .with(MatchMode::Substring),
            ..AssistConfig::default()
        };
        let req = Request::new(&model, index, &config);
        let ctx = context(CursorLocation::Expression, false);
        let expected = ExpectedTypeSet::default();

        let score = |token: &str, b: Binding| {
            let pattern = MatchPattern::new(token, config.match_modes, false);
            ProposalBuilder::new(&req, &ctx, &pattern, &expected)
                .build(&Candidate::new(b, 0))
                .map(|p| p.relevance)
        };
        let exact = score("String", type_binding(&model, "java/lang/String")).unwrap();
        let camel = score("NPH", type_binding(&model, "java/util/NullPointerHolder")).unwrap();
        let prefix = score("Str", type_binding(&model, "java/lang/String")).unwrap();
        let substring = score("ring", type_binding(&model, "java/lang/String")).unwrap();
        assert!(exact > camel, "exact {exact} <= camel {camel}");
        assert!(camel > prefix, "camel {camel} <= prefix {prefix}");
        assert!(prefix > substring, "prefix {prefix} <= substring {substring}");
        assert_eq!(score("xyz", type_binding(&model, "java/lang/String")), None);
    }

    #[test]
    fn test_expected_type_boosts_matching_member() {
        let (model, index) = world_with_index(world());
        let config = AssistConfig::default();
        let req = Request::new(&model, index, &config);
        let ctx = context(CursorLocation::Expression, false);
        let pattern = MatchPattern::new("", config.match_modes, false);
        let expected = ExpectedTypeSet {
            types: vec![TypeName::from("java/lang/String")],
            allow_subtypes: true,
            allow_supertypes: false,
        };
        let builder = ProposalBuilder::new(&req, &ctx, &pattern, &expected);
        let get_name = builder
            .build(&Candidate::new(method_binding(&model, "p/A", "getName"), 1))
            .unwrap();
        let null_safe = builder
            .build(&Candidate::new(method_binding(&model, "p/A", "nullSafe"), 1))
            .unwrap();
        assert!(get_name.relevance > null_safe.relevance);
        assert_eq!(get_name.completion, "getName()");
        assert_eq!(get_name.display_name.as_ref(), "getName() : String");
        assert_eq!(get_name.declaring_type.as_deref(), Some("p.A"));
    }

    #[test]
    fn test_completion_text_by_location() {
        let (model, index) = world_with_index(world());
        let config = AssistConfig::default();
        let req = Request::new(&model, index, &config);
        let pattern = MatchPattern::new("", config.match_modes, false);
        let expected = ExpectedTypeSet::default();

        let paren = context(CursorLocation::Expression, true);
        let p = ProposalBuilder::new(&req, &paren, &pattern, &expected)
            .build(&Candidate::new(method_binding(&model, "p/A", "getName"), 0))
            .unwrap();
        assert_eq!(p.completion, "getName", "no second pair of parentheses");

        let import = context(
            CursorLocation::Import {
                qualifier: Some("java.util".into()),
                is_static: false,
            },
            false,
        );
        let builder = ProposalBuilder::new(&req, &import, &pattern, &expected);
        let p = builder
            .build(&Candidate::new(type_binding(&model, "java/util/NullPointerHolder"), 0))
            .unwrap();
        assert_eq!(p.completion, "java.util.NullPointerHolder");
        assert_eq!(p.package.as_deref(), Some("java.util"));
        let star = builder.on_demand("java.util", false).unwrap();
        assert_eq!(star.completion, "java.util.*;");
    }

    #[test]
    fn test_penalties_for_import_and_access() {
        let (model, index) = world_with_index(world());
        let config = AssistConfig::default();
        let req = Request::new(&model, index, &config);
        let ctx = context(CursorLocation::Expression, false);
        let pattern = MatchPattern::new("Null", config.match_modes, false);
        let expected = ExpectedTypeSet::default();
        let builder = ProposalBuilder::new(&req, &ctx, &pattern, &expected);
        let holder = type_binding(&model, "java/util/NullPointerHolder");

        let in_scope = builder.build(&Candidate::new(holder.clone(), 0)).unwrap();
        let imported = builder
            .build(
                &Candidate::new(holder.clone(), 0)
                    .with_import(TypeName::from("java/util/NullPointerHolder")),
            )
            .unwrap();
        let hidden = builder
            .build(&Candidate::new(holder, 0).with_accessible(false))
            .unwrap();
        assert!(in_scope.relevance > imported.relevance);
        assert!(imported.relevance > hidden.relevance);
        assert_eq!(
            imported.required_import.as_deref(),
            Some("java.util.NullPointerHolder")
        );
    }

    #[test]
    fn test_rank_dedups_and_breaks_ties_by_name() {
        let proposal = |name: &str, relevance: f32| Proposal {
            kind: ProposalKind::Field,
            declaring_type: Some(Arc::from("p.A")),
            package: None,
            display_name: Arc::from(name),
            completion: name.to_string(),
            replace: TextRange::empty(0),
            relevance,
            detail: None,
            required_import: None,
        };
        let ranked = rank(vec![
            proposal("beta", 10.0),
            proposal("alpha", 10.0),
            proposal("gamma", 20.0),
            proposal("alpha", 5.0),
        ]);
        let names: Vec<&str> = ranked.iter().map(|p| p.display_name.as_ref()).collect();
        assert_eq!(names, vec!["gamma", "alpha", "beta"]);
        assert_eq!(ranked[1].relevance, 10.0, "the better duplicate survives");
    }
}

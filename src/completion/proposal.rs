use serde::Serialize;
use std::sync::Arc;

use crate::syntax::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProposalKind {
    Type,
    Method,
    Field,
    LocalVariable,
    Package,
    Keyword,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub kind: ProposalKind,
    /// Dotted name of the declaring type of a member or nested type.
    pub declaring_type: Option<Arc<str>>,
    /// Dotted package of a type, or the package itself.
    pub package: Option<Arc<str>>,
    /// The text displayed to the user ("substring(int, int) : String").
    pub display_name: Arc<str>,
    /// The text that replaces `replace`.
    pub completion: String,
    pub replace: TextRange,
    /// The higher, the earlier.
    pub relevance: f32,
    /// Optional: type or signature shown beside the name
    pub detail: Option<String>,
    /// Dotted name of the type to import when the proposal is accepted.
    pub required_import: Option<Arc<str>>,
}

/// Receives the proposals of one request. `begin` and `end` are called exactly
/// once, around every `accept`, even when the request fails.
pub trait CompletionSink {
    fn begin(&mut self) {}
    fn accept(&mut self, proposal: Proposal);
    fn end(&mut self) {}
}

/// Sink that keeps everything in acceptance order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub proposals: Vec<Proposal>,
    pub begun: bool,
    pub ended: bool,
}

impl CollectingSink {
    pub fn labels(&self) -> Vec<&str> {
        self.proposals.iter().map(|p| p.display_name.as_ref()).collect()
    }

    pub fn into_proposals(self) -> Vec<Proposal> {
        self.proposals
    }
}

impl CompletionSink for CollectingSink {
    fn begin(&mut self) {
        self.begun = true;
    }

    fn accept(&mut self, proposal: Proposal) {
        self.proposals.push(proposal);
    }

    fn end(&mut self) {
        self.ended = true;
    }
}

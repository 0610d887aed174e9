pub mod bindings;
pub mod context;
pub mod engine;
pub mod expected;
pub mod fuzzy;
pub mod keyword;
pub mod pattern;
pub mod proposal;
pub mod relevance;
pub mod scope;
pub mod visibility;

pub use context::{CursorContext, CursorLocation};
pub use engine::{CompletionEngine, CompletionJob, complete_batch};
pub use pattern::{MatchPattern, MatchQuality};
pub use proposal::{CollectingSink, CompletionSink, Proposal, ProposalKind};

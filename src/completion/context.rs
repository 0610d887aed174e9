//! Where the cursor is and what it is about to replace.

use crate::syntax::{NodeId, NodeKind, SyntaxTree, TextRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorLocation {
    /// `import java.ut|` or `import static java.lang.Math.m|`
    Import {
        /// Dotted name before the last dot, if any.
        qualifier: Option<String>,
        is_static: bool,
    },
    /// `package com.exa|`
    Package { qualifier: Option<String> },
    /// `expr.|` or `Type.|`
    MemberAccess { receiver: NodeId },
    /// A type position: `Str| s;`, `new Str|`
    TypeReference,
    Expression,
    /// Inside a comment or Javadoc; nothing to propose.
    Comment,
}

#[derive(Debug, Clone)]
pub struct CursorContext {
    pub offset: u32,
    /// Innermost node touching the offset.
    pub node: NodeId,
    pub location: CursorLocation,
    /// Part of the identifier typed before the cursor.
    pub prefix: String,
    pub replace: TextRange,
    /// An opening parenthesis already follows the identifier.
    pub followed_by_paren: bool,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

impl CursorContext {
    /// Classify the position at `offset`. The offset must already be checked
    /// against the tree.
    pub fn analyze(tree: &SyntaxTree, offset: u32, replace_full_word: bool) -> Self {
        let text = tree.text();
        let at = offset as usize;
        let token_start = text[..at]
            .char_indices()
            .rev()
            .take_while(|&(_, c)| is_ident_char(c))
            .last()
            .map_or(at, |(i, _)| i);
        let token_end = text[at..]
            .char_indices()
            .find(|&(_, c)| !is_ident_char(c))
            .map_or(text.len(), |(i, _)| at + i);
        let followed_by_paren = text[token_end..].trim_start().starts_with('(');

        let node = tree.covering_node(offset).unwrap_or_else(|| tree.root());
        let end = if replace_full_word { token_end } else { at };
        let mut replace = TextRange::new(token_start as u32, end as u32);

        let location = classify(tree, node, token_start as u32, &mut replace);
        tracing::debug!(
            offset,
            prefix = &text[token_start..at],
            location = ?location,
            "completion: cursor context"
        );
        Self {
            offset,
            node,
            location,
            prefix: text[token_start..at].to_string(),
            replace,
            followed_by_paren,
        }
    }
}

fn classify(
    tree: &SyntaxTree,
    node: NodeId,
    token_start: u32,
    replace: &mut TextRange,
) -> CursorLocation {
    for ancestor in tree.ancestors(node) {
        match tree.kind(ancestor) {
            NodeKind::Comment { .. } => return CursorLocation::Comment,
            NodeKind::ImportDecl { name, is_static, .. } => {
                let qualifier = qualified_start(tree, *name, token_start, replace);
                return CursorLocation::Import {
                    qualifier,
                    is_static: *is_static,
                };
            }
            NodeKind::PackageDecl { name } => {
                let qualifier = qualified_start(tree, *name, token_start, replace);
                return CursorLocation::Package { qualifier };
            }
            _ => {}
        }
    }

    let text = tree.text();
    let before = text[..token_start as usize].trim_end();
    if let Some(dot) = before.strip_suffix('.') {
        let dot_at = dot.len() as u32;
        if let Some(receiver) = receiver_ending_at(tree, dot_at) {
            return CursorLocation::MemberAccess { receiver };
        }
    }

    let ends_with_new = before
        .strip_suffix("new")
        .is_some_and(|rest| !rest.ends_with(is_ident_char));
    if ends_with_new || matches!(tree.kind(node), NodeKind::SimpleType { .. }) {
        return CursorLocation::TypeReference;
    }
    CursorLocation::Expression
}

/// For a qualified name under completion, move the replacement start to the
/// beginning of the whole name and return the dotted qualifier before the
/// token.
fn qualified_start(
    tree: &SyntaxTree,
    name: NodeId,
    token_start: u32,
    replace: &mut TextRange,
) -> Option<String> {
    let name_range = tree.range(name);
    let start = if name_range.start <= token_start {
        name_range.start
    } else {
        token_start
    };
    replace.start = start;
    let qualifier: String = tree
        .slice(TextRange::new(start, token_start))
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let qualifier = qualifier.trim_end_matches('.');
    (!qualifier.is_empty()).then(|| qualifier.to_string())
}

/// The largest expression ending right before the dot at `dot_at`.
fn receiver_ending_at(tree: &SyntaxTree, dot_at: u32) -> Option<NodeId> {
    let start = tree.covering_node(dot_at)?;
    if tree.range(start).end != dot_at {
        return None;
    }
    tree.ancestors(start)
        .take_while(|&n| tree.range(n).end == dot_at)
        .last()
}

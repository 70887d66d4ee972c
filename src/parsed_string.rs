//! Binds the piece table, grammar, and memo table together and owns the
//! current parse tree (component E).

use std::ops::Range;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::memo::MemoTable;
use crate::peg::Grammar;
use crate::piece_table::PieceTable;
use crate::tree::Node;

/// The outcome of attempting to cover the whole buffer with the grammar's
/// start rule.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Complete(Node),
    Incomplete { consumed: u32 },
}

impl ParseOutcome {
    pub fn root(&self) -> Option<&Node> {
        match self {
            ParseOutcome::Complete(node) => Some(node),
            ParseOutcome::Incomplete { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ParseOutcome::Complete(_))
    }
}

/// An ancestor frame returned by [`ParsedString::path_to`]: the node and the
/// raw offset at which it begins.
#[derive(Debug, Clone)]
pub struct PathEntry<'a> {
    pub node: &'a Node,
    pub start: u32,
}

pub struct ParsedString {
    buffer: PieceTable,
    grammar: Grammar,
    memo: MemoTable,
    result: ParseOutcome,
}

impl ParsedString {
    pub fn new(text: &str, grammar: Grammar) -> Self {
        Self::with_config(text, grammar, EngineConfig::default())
    }

    pub fn with_config(text: &str, grammar: Grammar, config: EngineConfig) -> Self {
        let buffer = PieceTable::new(text);
        let memo = MemoTable::with_config(grammar.rule_count(), buffer.len(), config);
        let mut parsed = ParsedString {
            buffer,
            grammar,
            memo,
            result: ParseOutcome::Incomplete { consumed: 0 },
        };
        parsed.reparse();
        parsed
    }

    pub fn buffer(&self) -> &PieceTable {
        &self.buffer
    }

    pub fn len(&self) -> u32 {
        self.buffer.len()
    }

    pub fn result(&self) -> &ParseOutcome {
        &self.result
    }

    /// Convenience accessor for callers that would rather propagate
    /// `?` than match on [`ParseOutcome`]; returns `Error::IncompleteParse`
    /// when the grammar doesn't cover the whole buffer.
    pub fn complete_root(&self) -> Result<&Node> {
        match &self.result {
            ParseOutcome::Complete(node) => Ok(node),
            ParseOutcome::Incomplete { consumed } => Err(Error::IncompleteParse {
                consumed: *consumed,
            }),
        }
    }

    pub fn memo_stats(&self) -> crate::memo::MemoStats {
        self.memo.stats()
    }

    /// Rewrites `range` of the raw buffer to `new`, invalidates the
    /// footprint in the memo table, and re-runs the start rule (§4.E).
    pub fn replace(&mut self, range: Range<u32>, new: &[u16]) {
        self.buffer.replace(range.clone(), new);
        self.memo.apply_edit(range, new.len() as u32);
        self.reparse();
    }

    fn reparse(&mut self) {
        let start = self.grammar.start();
        let outcome = start.apply(&self.buffer, 0, &mut self.memo);
        self.result = if outcome.succeeded && outcome.consumed == self.buffer.len() {
            match outcome.node {
                Some(node) => ParseOutcome::Complete(node),
                None => ParseOutcome::Complete(Node::leaf(
                    crate::tree::NodeType::DOCUMENT_FRAGMENT,
                    self.buffer.len(),
                )),
            }
        } else {
            ParseOutcome::Incomplete {
                consumed: outcome.consumed,
            }
        };
        log::debug!(
            "reparse: consumed={} len={} complete={}",
            match &self.result {
                ParseOutcome::Complete(n) => n.length,
                ParseOutcome::Incomplete { consumed } => *consumed,
            },
            self.buffer.len(),
            self.result.is_complete(),
        );
    }

    /// Walks the current tree accumulating running offsets and returns the
    /// list of ancestors (root-first) containing `offset`, with each
    /// ancestor's starting raw offset.
    pub fn path_to(&self, offset: u32) -> Vec<PathEntry<'_>> {
        let mut path = Vec::new();
        if let Some(root) = self.result.root() {
            collect_path(root, 0, offset, &mut path);
        }
        path
    }
}

fn collect_path<'a>(node: &'a Node, start: u32, offset: u32, path: &mut Vec<PathEntry<'a>>) {
    if offset < start || offset > start + node.length {
        return;
    }
    path.push(PathEntry { node, start });
    let mut child_start = start;
    for child in &node.children {
        if offset >= child_start && offset <= child_start + child.length {
            collect_path(child, child_start, offset, path);
            break;
        }
        child_start += child.length;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peg::{CharSet, Rule};
    use crate::tree::NodeType;

    const LETTER: NodeType = NodeType(1);
    const DOC: NodeType = NodeType(2);

    fn letters_grammar() -> Grammar {
        let letter = Rule::absorb(
            Rule::class(CharSet::predicate(|u| {
                (b'a' as u16..=b'z' as u16).contains(&u)
            })),
            LETTER,
        );
        Grammar::new(Rule::wrap(Rule::star(letter), DOC))
    }

    #[test]
    fn fresh_parse_of_valid_input_is_complete() {
        let parsed = ParsedString::new("abc", letters_grammar());
        assert!(parsed.result().is_complete());
        assert_eq!(parsed.result().root().unwrap().length, 3);
    }

    #[test]
    fn invalid_input_yields_incomplete_with_consumed() {
        let parsed = ParsedString::new("ab1", letters_grammar());
        match parsed.result() {
            ParseOutcome::Incomplete { consumed } => assert_eq!(*consumed, 2),
            ParseOutcome::Complete(_) => panic!("expected incomplete parse"),
        }
    }

    #[test]
    fn edit_reparses_and_memo_survives_unaffected_region() {
        let mut parsed = ParsedString::new("aaa", letters_grammar());
        assert!(parsed.result().is_complete());
        parsed.replace(0..0, &[b'b' as u16]);
        assert!(parsed.result().is_complete());
        assert_eq!(parsed.result().root().unwrap().length, 4);
    }

    #[test]
    fn path_to_returns_root_first_ancestor_chain() {
        let parsed = ParsedString::new("abc", letters_grammar());
        let path = parsed.path_to(1);
        assert_eq!(path.first().unwrap().node.node_type, DOC);
    }
}

//! Property-based tests against a small, self-contained grammar, checked
//! with `quickcheck` the way the crate's unit tests check against fixed
//! examples. Each property mirrors one of the universal properties.

use std::ops::Range;

use formatkit_core::{
    AttributeDescriptor, AttributesArray, CharSet, Grammar, NodeType, ParsedString, PieceTable,
    Rule, Side,
};
use quickcheck::{quickcheck, TestResult};

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

fn to_units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn from_units(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

/// Clamps a quickcheck-generated `(pos, len, text)` triple into a valid
/// `replace` call against a buffer of the given length, returning the
/// concrete range and insertion text.
fn clamp_edit(buffer_len: u32, pos: u8, del: u8, insert: &str) -> (Range<u32>, Vec<u16>) {
    let len = buffer_len;
    let start = if len == 0 { 0 } else { pos as u32 % (len + 1) };
    let max_del = len - start;
    let del_len = if max_del == 0 { 0 } else { del as u32 % (max_del + 1) };
    (start..start + del_len, to_units(insert))
}

quickcheck! {
    /// Buffer round-trip: `slice(0..len)` after a sequence of edits matches
    /// applying the same edits to a reference `String` of code units.
    fn buffer_round_trip(ops: Vec<(u8, u8, String)>) -> TestResult {
        let mut pt = PieceTable::new("");
        let mut reference: Vec<u16> = Vec::new();
        for (pos, del, text) in ops {
            let (range, units) = clamp_edit(pt.len(), pos, del, &text);
            pt.replace(range.clone(), &units);
            reference.splice(range.start as usize..range.end as usize, units);
        }
        TestResult::from_bool(pt.slice(0..pt.len()) == reference)
    }
}

quickcheck! {
    /// Tree covers input: on a successful parse, the root's length equals
    /// the buffer length, and every internal node's length equals the sum
    /// of its children's lengths.
    fn tree_covers_input(letters: Vec<bool>) -> TestResult {
        let text: String = letters
            .iter()
            .map(|&b| if b { 'a' } else { 'b' })
            .collect();
        let parsed = ParsedString::new(&text, letters_grammar());
        let root = match parsed.complete_root() {
            Ok(node) => node,
            Err(_) => return TestResult::discard(),
        };
        if root.length != parsed.len() {
            return TestResult::failed();
        }
        TestResult::from_bool(subtree_lengths_are_consistent(root))
    }
}

fn subtree_lengths_are_consistent(node: &formatkit_core::Node) -> bool {
    if node.is_leaf() {
        return true;
    }
    let sum: u32 = node.children.iter().map(|c| c.length).sum();
    sum == node.length && node.children.iter().all(subtree_lengths_are_consistent)
}

quickcheck! {
    /// Memoization consistency: parsing a buffer with a fresh memo table
    /// produces the same tree shape as reaching the same text through an
    /// arbitrary sequence of edits against a live, incrementally-reused
    /// memo table.
    fn memoization_consistency(ops: Vec<(u8, u8, String)>) -> TestResult {
        let mut incremental = ParsedString::new("", letters_grammar());
        for (pos, del, text) in &ops {
            let filtered: String = text.chars().filter(|c| c.is_ascii_lowercase()).collect();
            let (range, units) = clamp_edit(incremental.len(), *pos, *del, &filtered);
            incremental.replace(range, &units);
        }
        let final_text = from_units(&incremental.buffer().slice(0..incremental.buffer().len()));
        let fresh = ParsedString::new(&final_text, letters_grammar());

        let (a, b) = match (incremental.complete_root(), fresh.complete_root()) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(_), Err(_)) => return TestResult::passed(),
            _ => return TestResult::failed(),
        };
        TestResult::from_bool(a.to_sexp(&|_| "letter") == b.to_sexp(&|_| "letter"))
    }
}

quickcheck! {
    /// Overlay round-trip: `raw_to_visible(visible_to_raw(v, side), side)`
    /// is the identity for every visible offset, for a single non-empty
    /// replacement entry (the only shape where both directions agree on
    /// every offset without ambiguity from zero-length substitutions).
    fn overlay_round_trip(raw_start: u8, raw_len: u8, replacement_len: u8) -> TestResult {
        let raw_start = raw_start as u32 % 50;
        let raw_len = (raw_len as u32 % 10) + 1;
        let replacement_len = (replacement_len as u32 % 10) + 1;
        let mut overlay = formatkit_core::ReplacementOverlay::new();
        if overlay
            .insert(raw_start..raw_start + raw_len, vec![0u16; replacement_len as usize])
            .is_err()
        {
            return TestResult::discard();
        }
        let visible_len = raw_start + replacement_len + 20;
        for v in 0..visible_len {
            let r = overlay.visible_to_raw(v, Side::Lower);
            let back = overlay.raw_to_visible(r, Side::Lower);
            if back != v {
                return TestResult::failed();
            }
        }
        TestResult::passed()
    }
}

quickcheck! {
    /// Attributes coalesce: no two adjacent runs share a descriptor, no
    /// matter what sequence of `append` calls built the array.
    fn attributes_coalesce(runs: Vec<(u8, u8)>) -> TestResult {
        let mut arr = AttributesArray::new();
        for (descriptor, length) in runs {
            arr.append(AttributeDescriptor(descriptor as u64), length as u32);
        }
        let collected: Vec<_> = arr.iter().collect();
        TestResult::from_bool(
            collected.windows(2).all(|w| w[0].0 != w[1].0)
        )
    }
}

quickcheck! {
    /// Run-length sum: the total of run lengths always equals the total
    /// length reported by the array.
    fn run_length_sum_matches_total(runs: Vec<(u8, u8)>) -> TestResult {
        let mut arr = AttributesArray::new();
        let mut expected = 0u32;
        for (descriptor, length) in runs {
            arr.append(AttributeDescriptor(descriptor as u64), length as u32);
            expected += length as u32;
        }
        let iter_sum: u32 = arr.iter().map(|(_, len)| len).sum();
        TestResult::from_bool(iter_sum == expected && arr.total_length() == expected)
    }
}

quickcheck! {
    /// Diff correctness: outside the reported `diff_range`, the two arrays
    /// agree everywhere. Builds `new` from `old` by retagging exactly one
    /// run with a descriptor guaranteed absent elsewhere.
    fn diff_correctness(base_runs: Vec<(u8, u8)>, flip_at: u8) -> TestResult {
        let runs: Vec<(u8, u32)> = base_runs
            .into_iter()
            .filter(|(_, l)| *l > 0)
            .map(|(d, l)| (d, l as u32))
            .collect();
        if runs.is_empty() {
            return TestResult::discard();
        }
        let flip_idx = flip_at as usize % runs.len();

        let mut old = AttributesArray::new();
        for (d, l) in &runs {
            old.append(AttributeDescriptor(*d as u64), *l);
        }
        let mut new = AttributesArray::new();
        for (idx, (d, l)) in runs.iter().enumerate() {
            let descriptor = if idx == flip_idx {
                AttributeDescriptor(255)
            } else {
                AttributeDescriptor(*d as u64)
            };
            new.append(descriptor, *l);
        }

        let total = old.total_length();
        let range = match old.diff_range(&new) {
            Ok(r) => r,
            Err(_) => return TestResult::discard(),
        };
        let Some(range) = range else {
            // Only possible if the flip happened to retag with an
            // already-identical descriptor (e.g. original was 255 too).
            return TestResult::passed();
        };
        for o in 0..total {
            if range.contains(&o) {
                continue;
            }
            if old.attrs_at(o).map(|(d, _)| d) != new.attrs_at(o).map(|(d, _)| d) {
                return TestResult::failed();
            }
        }
        TestResult::passed()
    }
}

use crate::memo::MemoTable;
use crate::peg::pcs::{CharSet, Pcs};
use crate::peg::ParseResult;
use crate::piece_table::PieceTable;
use crate::tree::{Key, Node, NodeType, Value};

/// A memoization column index, assigned once per `Memoize` node by
/// [`Grammar::new`]'s preparation traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(pub u32);

/// The PEG combinator tree. Every input either matches a rule or falls
/// through to a default leaf chosen by the grammar — there is no error
/// recovery at this layer (`spec.md` §1 Non-goals).
#[derive(Debug, Clone)]
pub enum Rule {
    Dot,
    CharClass(CharSet),
    Literal(Box<[u16]>),
    InOrder(Vec<Rule>),
    Choice(Vec<Rule>),
    ZeroOrOne(Box<Rule>),
    /// Half-open repetition count `lo..hi`: `hi` is the first disallowed
    /// repeat count (documented resolution of the spec's open question,
    /// see `DESIGN.md`).
    Range(Box<Rule>, u32, u32),
    Assert(Box<Rule>),
    NotAssert(Box<Rule>),
    Absorb(Box<Rule>, NodeType),
    Wrap(Box<Rule>, NodeType),
    /// `RuleId(u32::MAX)` is the "unassigned" sentinel used before
    /// `Grammar::new` runs its preparation pass.
    Memoize(RuleId, Box<Rule>),
    SetProp(Box<Rule>, Key, Value),
}

/// Sentinel written into freshly-constructed `Memoize` nodes before
/// `Grammar::new` assigns real, sequential ids.
pub const UNASSIGNED: RuleId = RuleId(u32::MAX);

impl Rule {
    pub fn literal(s: &str) -> Rule {
        Rule::Literal(s.encode_utf16().collect::<Vec<_>>().into_boxed_slice())
    }

    pub fn class(set: CharSet) -> Rule {
        Rule::CharClass(set)
    }

    pub fn memoize(rule: Rule) -> Rule {
        Rule::Memoize(UNASSIGNED, Box::new(rule))
    }

    pub fn wrap(rule: Rule, node_type: NodeType) -> Rule {
        Rule::Wrap(Box::new(rule), node_type)
    }

    pub fn absorb(rule: Rule, node_type: NodeType) -> Rule {
        Rule::Absorb(Box::new(rule), node_type)
    }

    pub fn opt(rule: Rule) -> Rule {
        Rule::ZeroOrOne(Box::new(rule))
    }

    pub fn repeat(rule: Rule, lo: u32, hi: u32) -> Rule {
        Rule::Range(Box::new(rule), lo, hi)
    }

    pub fn star(rule: Rule) -> Rule {
        Rule::repeat(rule, 0, u32::MAX)
    }

    pub fn plus(rule: Rule) -> Rule {
        Rule::repeat(rule, 1, u32::MAX)
    }

    pub fn not(rule: Rule) -> Rule {
        Rule::NotAssert(Box::new(rule))
    }

    pub fn assert(rule: Rule) -> Rule {
        Rule::Assert(Box::new(rule))
    }

    /// Evaluates this rule at `pos` against `buf`, consulting/populating
    /// `memo` for any `Memoize` node encountered.
    ///
    /// Guards every recursive descent with `memo`'s soft recursion-depth
    /// cap (`EngineConfig::max_recursion_depth`): a grammar that would
    /// recurse past it fails cleanly here instead of overflowing the stack.
    pub fn apply(&self, buf: &PieceTable, pos: u32, memo: &mut MemoTable) -> ParseResult {
        if !memo.enter_recursion() {
            log::warn!("grammar recursion exceeded the configured soft cap at position {pos}");
            return ParseResult::failure(1);
        }
        let result = self.apply_inner(buf, pos, memo);
        memo.exit_recursion();
        result
    }

    fn apply_inner(&self, buf: &PieceTable, pos: u32, memo: &mut MemoTable) -> ParseResult {
        match self {
            Rule::Dot => {
                if pos < buf.len() {
                    ParseResult::success(1, 1, None)
                } else {
                    ParseResult::failure(1)
                }
            }

            Rule::CharClass(set) => match buf.code_unit_at(pos) {
                Some(unit) if set.contains(unit) => ParseResult::success(1, 1, None),
                _ => ParseResult::failure(1),
            },

            Rule::Literal(units) => {
                let mut compared = 0u32;
                for &want in units.iter() {
                    match buf.code_unit_at(pos + compared) {
                        Some(got) if got == want => compared += 1,
                        _ => {
                            compared += 1;
                            return ParseResult::failure(compared);
                        }
                    }
                }
                ParseResult::success(units.len() as u32, units.len() as u32, None)
            }

            Rule::InOrder(children) => apply_in_order(children, buf, pos, memo),

            Rule::Choice(alternatives) => apply_choice(alternatives, buf, pos, memo),

            Rule::ZeroOrOne(inner) => {
                let r = inner.apply(buf, pos, memo);
                if r.succeeded {
                    ParseResult::success(r.consumed, r.examined, r.node)
                } else {
                    ParseResult {
                        succeeded: true,
                        consumed: 0,
                        examined: r.examined,
                        node: None,
                    }
                }
            }

            Rule::Range(inner, lo, hi) => apply_range(inner, *lo, *hi, buf, pos, memo),

            Rule::Assert(inner) => {
                let r = inner.apply(buf, pos, memo);
                ParseResult {
                    succeeded: r.succeeded,
                    consumed: 0,
                    examined: r.examined.max(1),
                    node: None,
                }
            }

            Rule::NotAssert(inner) => {
                let r = inner.apply(buf, pos, memo);
                ParseResult {
                    succeeded: !r.succeeded,
                    consumed: 0,
                    examined: r.examined.max(1),
                    node: None,
                }
            }

            Rule::Absorb(inner, node_type) => {
                let r = inner.apply(buf, pos, memo);
                if r.succeeded {
                    ParseResult::success(
                        r.consumed,
                        r.examined,
                        Some(Node::leaf(*node_type, r.consumed)),
                    )
                } else {
                    ParseResult::failure(r.examined)
                }
            }

            Rule::Wrap(inner, node_type) => {
                let r = inner.apply(buf, pos, memo);
                if !r.succeeded {
                    return ParseResult::failure(r.examined);
                }
                let children = match r.node {
                    Some(n) if n.node_type.is_fragment() => n.children,
                    Some(n) => vec![n],
                    None => Vec::new(),
                };
                let node = if children.is_empty() {
                    Node::leaf(*node_type, r.consumed)
                } else {
                    Node::with_children(*node_type, children)
                };
                ParseResult::success(r.consumed, r.examined, Some(node))
            }

            Rule::Memoize(id, inner) => {
                debug_assert!(*id != UNASSIGNED, "Grammar::new was never called to assign rule ids");
                if let Some(cached) = memo.get(pos, *id) {
                    return cached;
                }
                let result = inner.apply(buf, pos, memo);
                memo.put(pos, *id, result.clone());
                result
            }

            Rule::SetProp(inner, key, value) => {
                let mut r = inner.apply(buf, pos, memo);
                if r.succeeded {
                    if let Some(node) = r.node.as_mut() {
                        node.set_prop(*key, value.clone());
                    }
                }
                r
            }
        }
    }

    /// The possible-opening-character-set used to prune `Choice`
    /// alternatives and `InOrder` heads (§4.B rule 4).
    pub fn pcs(&self) -> Pcs {
        match self {
            Rule::Dot => Pcs::Unknown,
            Rule::CharClass(set) => set.pcs(),
            Rule::Literal(units) => match units.first() {
                Some(&u) => Pcs::single(u),
                None => Pcs::Unknown,
            },
            Rule::InOrder(children) => in_order_pcs(children),
            Rule::Choice(alternatives) => {
                let mut acc = Pcs::empty();
                for alt in alternatives {
                    match alt.pcs() {
                        Pcs::Unknown => return Pcs::Unknown,
                        p => acc = acc.union(p),
                    }
                }
                acc
            }
            Rule::ZeroOrOne(_) => Pcs::Unknown,
            Rule::Range(inner, lo, _) => {
                if *lo == 0 {
                    Pcs::Unknown
                } else {
                    inner.pcs()
                }
            }
            Rule::Assert(inner) => inner.pcs(),
            Rule::NotAssert(_) => Pcs::Unknown,
            Rule::Absorb(inner, _) | Rule::Wrap(inner, _) => inner.pcs(),
            Rule::Memoize(_, inner) => inner.pcs(),
            Rule::SetProp(inner, _, _) => inner.pcs(),
        }
    }
}

fn in_order_pcs(children: &[Rule]) -> Pcs {
    let mut acc = Pcs::Unknown;
    for child in children {
        match child {
            Rule::Assert(inner) => acc = acc.intersect(inner.pcs()),
            Rule::NotAssert(inner) => acc = acc.subtract(inner.pcs()),
            other => return acc.intersect(other.pcs()),
        }
    }
    acc
}

fn apply_in_order(children: &[Rule], buf: &PieceTable, pos: u32, memo: &mut MemoTable) -> ParseResult {
    let mut consumed = 0u32;
    let mut examined = 0u32;
    let mut nodes: Vec<Node> = Vec::new();
    for child in children {
        let r = child.apply(buf, pos + consumed, memo);
        examined = examined.max(consumed + r.examined);
        if !r.succeeded {
            return ParseResult::failure(examined);
        }
        if let Some(n) = r.node {
            nodes.push(n);
        }
        consumed += r.consumed;
    }
    let node = if nodes.is_empty() {
        None
    } else {
        Some(Node::fragment(nodes))
    };
    ParseResult::success(consumed, examined.max(consumed), node)
}

fn apply_choice(alternatives: &[Rule], buf: &PieceTable, pos: u32, memo: &mut MemoTable) -> ParseResult {
    let current = buf.code_unit_at(pos);
    let pruning = memo.pcs_pruning_enabled();
    let mut examined = 0u32;
    for alt in alternatives {
        if pruning {
            if let Some(unit) = current {
                if !alt.pcs().contains(unit) {
                    continue;
                }
            }
        }
        let r = alt.apply(buf, pos, memo);
        examined = examined.max(r.examined);
        if r.succeeded {
            return ParseResult {
                succeeded: true,
                consumed: r.consumed,
                examined,
                node: r.node,
            };
        }
    }
    ParseResult::failure(examined)
}

fn apply_range(
    inner: &Rule,
    lo: u32,
    hi: u32,
    buf: &PieceTable,
    pos: u32,
    memo: &mut MemoTable,
) -> ParseResult {
    let mut consumed = 0u32;
    let mut examined = 0u32;
    let mut nodes: Vec<Node> = Vec::new();
    let mut count = 0u32;
    // `hi` is the first disallowed repeat count (half-open `lo..hi`), so at
    // most `hi - 1` repetitions may ever be attempted and counted.
    let max_count = hi.saturating_sub(1);

    while count < max_count {
        let r = inner.apply(buf, pos + consumed, memo);
        examined = examined.max(consumed + r.examined);
        if !r.succeeded {
            break;
        }
        count += 1;
        if let Some(n) = r.node {
            nodes.push(n);
        }
        if r.consumed == 0 {
            // Zero-length guard (§4.B rule 3): count this match once, then
            // stop unconditionally to avoid looping forever.
            break;
        }
        consumed += r.consumed;
    }

    if count >= lo && count < hi {
        let node = if nodes.is_empty() {
            None
        } else {
            Some(Node::fragment(nodes))
        };
        ParseResult::success(consumed, examined.max(consumed), node)
    } else {
        ParseResult::failure(examined)
    }
}

/// Binds a prepared start rule together with the number of distinct
/// `Memoize` nodes it contains, so a fresh [`MemoTable`] can be sized
/// correctly.
#[derive(Debug, Clone)]
pub struct Grammar {
    start: Rule,
    rule_count: u32,
}

impl Grammar {
    /// Assigns sequential rule ids to every `Memoize` node in `start` by a
    /// single preparation traversal (§4.C), then binds the grammar.
    pub fn new(mut start: Rule) -> Self {
        let mut next = 0u32;
        assign_rule_ids(&mut start, &mut next);
        Grammar {
            start,
            rule_count: next,
        }
    }

    pub fn start(&self) -> &Rule {
        &self.start
    }

    pub fn rule_count(&self) -> u32 {
        self.rule_count
    }
}

fn assign_rule_ids(rule: &mut Rule, next: &mut u32) {
    match rule {
        Rule::Memoize(id, inner) => {
            *id = RuleId(*next);
            *next += 1;
            assign_rule_ids(inner, next);
        }
        Rule::InOrder(children) | Rule::Choice(children) => {
            for child in children {
                assign_rule_ids(child, next);
            }
        }
        Rule::ZeroOrOne(inner)
        | Rule::Range(inner, _, _)
        | Rule::Assert(inner)
        | Rule::NotAssert(inner)
        | Rule::Absorb(inner, _)
        | Rule::Wrap(inner, _)
        | Rule::SetProp(inner, _, _) => assign_rule_ids(inner, next),
        Rule::Dot | Rule::CharClass(_) | Rule::Literal(_) => {}
    }
}

//! Grammar-construction sugar over the combinator table in [`crate::peg`],
//! mirroring the teacher's own `helix-parsec` combinator-function style so
//! test grammars don't have to spell out every `Rule` variant by hand.

use crate::peg::{CharSet, Rule};

/// Matches the literal string exactly.
pub fn lit(s: &str) -> Rule {
    Rule::literal(s)
}

/// Matches any single code unit, failing only at end of input.
pub fn dot() -> Rule {
    Rule::Dot
}

/// Matches a single code unit satisfying `pred`.
pub fn class(pred: impl Fn(u16) -> bool + Send + Sync + 'static) -> Rule {
    Rule::class(CharSet::predicate(pred))
}

/// Builds a `Rule::Choice` from a variadic list of alternatives, tried in
/// order (see `helix_parsec::choice!`).
#[macro_export]
macro_rules! choice {
    ($($rule:expr),+ $(,)?) => {
        $crate::peg::Rule::Choice(vec![$($rule),+])
    };
}

/// Builds a `Rule::InOrder` from a variadic list of rules, each applied at
/// the position left by the previous one (see `helix_parsec::seq!`).
#[macro_export]
macro_rules! seq {
    ($($rule:expr),+ $(,)?) => {
        $crate::peg::Rule::InOrder(vec![$($rule),+])
    };
}

//! Tunables for the parse/format engine. Defaults reproduce the spec's
//! described behavior exactly; nothing here changes parse semantics unless
//! a caller deliberately overrides a field.

/// Engine-wide configuration, consumed once at [`crate::ParsedString::with_config`]
/// construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Lower bound on the memo table's column vector capacity, reserved up
    /// front to absorb the first few insert-heavy edits without reallocating.
    pub initial_memo_capacity: u32,
    /// Whether `Choice`/`InOrder` consult possible-opening-character-set
    /// pruning before trying an alternative. Disabling this only affects
    /// performance, never which alternative ultimately matches.
    pub pcs_pruning_enabled: bool,
    /// Soft cap on nested `Rule::apply` recursion. A grammar that would
    /// recurse past this (most often a left-recursive rule with no
    /// consuming prefix) fails cleanly as `IncompleteParse` instead of
    /// overflowing the stack.
    pub max_recursion_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_memo_capacity: 0,
            pcs_pruning_enabled: true,
            max_recursion_depth: 4096,
        }
    }
}

//! Packrat memoization table with edit-aware invalidation (component C).
//!
//! Implements the Dubroy–Warth incremental-packrat rule: a memoized result
//! survives an edit iff its observation window (`[pos, pos + examined)`)
//! lies strictly before the edited range.

use crate::config::EngineConfig;
use crate::peg::{ParseResult, RuleId};

#[derive(Debug, Clone, Default)]
struct Column {
    entries: Vec<Option<ParseResult>>,
    max_examined: u32,
}

impl Column {
    fn new(rule_count: u32) -> Self {
        Column {
            entries: vec![None; rule_count as usize],
            max_examined: 0,
        }
    }

    fn recompute_max_examined(&mut self) {
        self.max_examined = self
            .entries
            .iter()
            .filter_map(|e| e.as_ref())
            .map(|r| r.examined)
            .max()
            .unwrap_or(0);
    }
}

/// Counters exposed for host instrumentation; purely observational, they
/// never affect parse results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

#[derive(Debug, Clone)]
pub struct MemoTable {
    columns: Vec<Column>,
    rule_count: u32,
    stats: MemoStats,
    config: EngineConfig,
    depth: u32,
}

impl MemoTable {
    pub fn new(rule_count: u32, buffer_len: u32) -> Self {
        Self::with_config(rule_count, buffer_len, EngineConfig::default())
    }

    pub fn with_config(rule_count: u32, buffer_len: u32, config: EngineConfig) -> Self {
        // One column per code-unit offset plus a sentinel column at `len`
        // (a rule may succeed with zero width exactly at end-of-buffer).
        let capacity = config.initial_memo_capacity.max(buffer_len + 1) as usize;
        let mut columns = Vec::with_capacity(capacity);
        columns.extend((0..=buffer_len).map(|_| Column::new(rule_count)));
        MemoTable {
            columns,
            rule_count,
            stats: MemoStats::default(),
            config,
            depth: 0,
        }
    }

    pub fn stats(&self) -> MemoStats {
        self.stats
    }

    pub fn pcs_pruning_enabled(&self) -> bool {
        self.config.pcs_pruning_enabled
    }

    /// Attempts to enter one more level of `Rule::apply` recursion. Returns
    /// `false` if the configured soft cap would be exceeded, in which case
    /// the caller must treat the rule as failed without recursing further.
    pub(crate) fn enter_recursion(&mut self) -> bool {
        if self.depth >= self.config.max_recursion_depth {
            return false;
        }
        self.depth += 1;
        true
    }

    pub(crate) fn exit_recursion(&mut self) {
        self.depth -= 1;
    }

    pub fn get(&mut self, pos: u32, rule: RuleId) -> Option<ParseResult> {
        let result = self
            .columns
            .get(pos as usize)
            .and_then(|col| col.entries.get(rule.0 as usize))
            .and_then(|e| e.clone());
        if result.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        result
    }

    /// Stores `result` at `(pos, rule)`.
    ///
    /// Precondition: `result.examined >= 1` and `pos + result.examined <=
    /// len + 1` (§4.C); both hold by construction for every `ParseResult`
    /// produced by the PEG runtime, so this only asserts in debug builds.
    pub fn put(&mut self, pos: u32, rule: RuleId, result: ParseResult) {
        debug_assert!(result.examined >= 1);
        debug_assert!((pos as u64 + result.examined as u64) <= (self.columns.len() as u64));
        if let Some(col) = self.columns.get_mut(pos as usize) {
            col.max_examined = col.max_examined.max(result.examined);
            if let Some(slot) = col.entries.get_mut(rule.0 as usize) {
                *slot = Some(result);
            }
        }
    }

    /// The core incremental-reparse routine (§4.C): resizes the column
    /// vector for the new text length, clears the rewritten span entirely,
    /// and drops any entry elsewhere whose observation window crosses the
    /// edited range.
    pub fn apply_edit(&mut self, range: std::ops::Range<u32>, new_len: u32) {
        let lo = range.start as usize;
        let hi = range.end as usize;
        let old_len = hi - lo;

        if (new_len as usize) < old_len {
            let remove = old_len - new_len as usize;
            self.columns.drain(lo..lo + remove);
            log::trace!("memo: removed {remove} columns at {lo}");
        } else if (new_len as usize) > old_len {
            let insert = new_len as usize - old_len;
            let fresh = std::iter::repeat_with(|| Column::new(self.rule_count)).take(insert);
            self.columns.splice(lo..lo, fresh);
            log::trace!("memo: inserted {insert} fresh columns at {lo}");
        }

        for col in self.columns[lo..lo + new_len as usize].iter_mut() {
            *col = Column::new(self.rule_count);
        }

        let mut invalidated = 0u64;
        for (c, col) in self.columns[..lo].iter_mut().enumerate() {
            if c as u32 + col.max_examined <= lo as u32 {
                continue;
            }
            let mut changed = false;
            for entry in col.entries.iter_mut() {
                let crosses = entry
                    .as_ref()
                    .map(|r| r.examined > (lo as u32 - c as u32))
                    .unwrap_or(false);
                if crosses {
                    *entry = None;
                    changed = true;
                    invalidated += 1;
                }
            }
            if changed {
                col.recompute_max_examined();
            }
        }
        self.stats.invalidations += invalidated;
        log::trace!("memo: invalidated {invalidated} entries for edit at {lo}..{hi} -> {new_len}");
    }

    pub fn len(&self) -> u32 {
        self.columns.len().saturating_sub(1) as u32
    }
}

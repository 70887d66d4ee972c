//! Run-length-encoded map from visible offset to an opaque attribute
//! descriptor (component F).

use std::ops::Range;

use crate::error::{Error, Result};

/// An opaque, hashable token identifying a set of display attributes.
/// Resolution to concrete attributes (colors, fonts, ...) happens outside
/// this crate; the core only ever compares descriptors for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeDescriptor(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    descriptor: AttributeDescriptor,
    length: u32,
}

/// A run list whose adjacent entries always carry distinct descriptors and
/// whose lengths always sum to the array's total length.
#[derive(Debug, Clone, Default)]
pub struct AttributesArray {
    runs: Vec<Run>,
}

impl AttributesArray {
    pub fn new() -> Self {
        AttributesArray { runs: Vec::new() }
    }

    pub fn total_length(&self) -> u32 {
        self.runs.iter().map(|r| r.length).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Appends a run, extending the last run in place if it shares the
    /// descriptor (keeping the "no two adjacent runs share a descriptor"
    /// invariant).
    pub fn append(&mut self, descriptor: AttributeDescriptor, length: u32) {
        if length == 0 {
            return;
        }
        if let Some(last) = self.runs.last_mut() {
            if last.descriptor == descriptor {
                last.length += length;
                return;
            }
        }
        self.runs.push(Run { descriptor, length });
    }

    /// Returns the descriptor active at `offset` and the maximal range over
    /// which that descriptor applies.
    pub fn attrs_at(&self, offset: u32) -> Option<(AttributeDescriptor, Range<u32>)> {
        let mut running = 0u32;
        for run in &self.runs {
            let next = running + run.length;
            if offset < next {
                return Some((run.descriptor, running..next));
            }
            running = next;
        }
        None
    }

    /// Grows or shrinks the run containing `offset` by `delta`. Positive
    /// deltas past the end of the array append a trailing run of `default`.
    /// Negative deltas may consume across run boundaries, deleting any run
    /// left empty.
    pub fn set_length_at(&mut self, offset: u32, delta: i64, default: AttributeDescriptor) {
        if delta == 0 {
            return;
        }
        if delta > 0 {
            let grow = delta as u32;
            if offset >= self.total_length() {
                self.append(default, grow);
                return;
            }
            let mut running = 0u32;
            for run in &mut self.runs {
                let next = running + run.length;
                if offset < next {
                    run.length += grow;
                    return;
                }
                running = next;
            }
            self.append(default, grow);
            return;
        }

        let mut remaining = (-delta) as u32;
        let mut running = 0u32;
        let mut idx = 0usize;
        // Find the run containing `offset` first.
        while idx < self.runs.len() {
            let next = running + self.runs[idx].length;
            if offset < next {
                break;
            }
            running = next;
            idx += 1;
        }
        if idx >= self.runs.len() {
            return;
        }
        while remaining > 0 && idx < self.runs.len() {
            let take = remaining.min(self.runs[idx].length);
            self.runs[idx].length -= take;
            remaining -= take;
            if self.runs[idx].length == 0 {
                self.runs.remove(idx);
            } else {
                idx += 1;
            }
        }
        self.merge_adjacent();
    }

    fn merge_adjacent(&mut self) {
        let mut i = 1;
        while i < self.runs.len() {
            if self.runs[i - 1].descriptor == self.runs[i].descriptor {
                let len = self.runs[i].length;
                self.runs[i - 1].length += len;
                self.runs.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Minimal `[lo, hi)` over which `self` and `other` disagree, or `None`
    /// if they are identical. Both arrays must have equal total length.
    ///
    /// Walks the boundaries of both run lists merged together so each
    /// compared segment has a single descriptor on each side; this is
    /// `O(runs)` rather than `O(length)`.
    pub fn diff_range(&self, other: &AttributesArray) -> Result<Option<Range<u32>>> {
        let len = self.total_length();
        let other_len = other.total_length();
        if len != other_len {
            return Err(Error::AmbiguousLength {
                expected: len,
                found: other_len,
            });
        }

        let mut boundaries: Vec<u32> = Vec::new();
        let mut running = 0u32;
        for run in &self.runs {
            boundaries.push(running);
            running += run.length;
        }
        running = 0;
        for run in &other.runs {
            boundaries.push(running);
            running += run.length;
        }
        boundaries.push(len);
        boundaries.sort_unstable();
        boundaries.dedup();

        let mut lo = None;
        let mut hi = None;
        for window in boundaries.windows(2) {
            let (start, end) = (window[0], window[1]);
            if start >= end {
                continue;
            }
            let a = self.attrs_at(start).map(|(d, _)| d);
            let b = other.attrs_at(start).map(|(d, _)| d);
            if a != b {
                if lo.is_none() {
                    lo = Some(start);
                }
                hi = Some(end);
            }
        }

        match (lo, hi) {
            (Some(lo), Some(hi)) => Ok(Some(lo..hi)),
            _ => Ok(None),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttributeDescriptor, u32)> + '_ {
        self.runs.iter().map(|r| (r.descriptor, r.length))
    }
}

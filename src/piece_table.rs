//! Range-replaceable UTF-16 sequence backed by two append-only buffers.
//!
//! The table never shrinks `original` or `added`; `replace` only ever
//! rewrites the `slices` directory that stitches windows of those two
//! buffers into the logical sequence. Deletion trims or drops slices;
//! insertion appends to `added` and splices a new slice in (or extends an
//! adjacent one).

use std::fmt;
use std::ops::Range;

/// Which of the two backing buffers a slice draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Original,
    Added,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slice {
    source: Source,
    start: u32,
    end: u32,
}

impl Slice {
    fn len(&self) -> u32 {
        self.end - self.start
    }

    fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Selects which end of an interior-overlap a bound-translation query maps
/// to when the requested logical offset lands inside an added/inserted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Lower,
    Upper,
}

/// A mutable UTF-16 sequence supporting O(log S) range replacement over `S`
/// slices and O(1) random access via the slice directory.
///
/// Characters are never physically deleted: `original` is immutable once
/// constructed and `added` only ever grows, so offsets captured in either
/// backing buffer remain valid even after edits remove them from the
/// logical sequence.
#[derive(Debug, Clone)]
pub struct PieceTable {
    original: Vec<u16>,
    added: Vec<u16>,
    slices: Vec<Slice>,
}

impl PieceTable {
    pub fn new(text: &str) -> Self {
        let original: Vec<u16> = text.encode_utf16().collect();
        let slices = if original.is_empty() {
            Vec::new()
        } else {
            vec![Slice {
                source: Source::Original,
                start: 0,
                end: original.len() as u32,
            }]
        };
        PieceTable {
            original,
            added: Vec::new(),
            slices,
        }
    }

    pub fn from_units(units: Vec<u16>) -> Self {
        let slices = if units.is_empty() {
            Vec::new()
        } else {
            vec![Slice {
                source: Source::Original,
                start: 0,
                end: units.len() as u32,
            }]
        };
        PieceTable {
            original: units,
            added: Vec::new(),
            slices,
        }
    }

    pub fn len(&self) -> u32 {
        self.slices.iter().map(Slice::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    fn backing(&self, source: Source) -> &[u16] {
        match source {
            Source::Original => &self.original,
            Source::Added => &self.added,
        }
    }

    /// Locates the slice containing logical offset `pos` and the running
    /// logical start of that slice. Returns `None` if `pos >= len()`.
    fn locate(&self, pos: u32) -> Option<(usize, u32)> {
        let mut running = 0u32;
        for (idx, slice) in self.slices.iter().enumerate() {
            let next = running + slice.len();
            if pos < next {
                return Some((idx, running));
            }
            running = next;
        }
        None
    }

    pub fn code_unit_at(&self, pos: u32) -> Option<u16> {
        let (idx, running) = self.locate(pos)?;
        let slice = self.slices[idx];
        let offset_in_slice = pos - running;
        Some(self.backing(slice.source)[(slice.start + offset_in_slice) as usize])
    }

    /// Materializes the code units in `range`. Out-of-bounds ranges are
    /// clamped to `len()` and logged; this never panics (§7 `OutOfBounds`).
    pub fn slice(&self, range: Range<u32>) -> Vec<u16> {
        let len = self.len();
        let lo = range.start.min(len);
        let hi = range.end.min(len);
        if range.end > len {
            log::warn!(
                "PieceTable::slice({:?}) exceeds length {len}, clamping",
                range
            );
        }
        if lo >= hi {
            return Vec::new();
        }
        let mut out = Vec::with_capacity((hi - lo) as usize);
        let mut running = 0u32;
        for slice in &self.slices {
            let slice_end = running + slice.len();
            if slice_end > lo && running < hi {
                let start_in_slice = lo.saturating_sub(running).max(0);
                let end_in_slice = (hi - running).min(slice.len());
                let backing = self.backing(slice.source);
                let from = (slice.start + start_in_slice) as usize;
                let to = (slice.start + end_in_slice) as usize;
                out.extend_from_slice(&backing[from..to]);
            }
            running = slice_end;
            if running >= hi {
                break;
            }
        }
        out
    }

    pub fn to_string(&self) -> String {
        String::from_utf16_lossy(&self.slice(0..self.len()))
    }

    /// Replaces `range` with `new`, the single mutating entry point.
    pub fn replace(&mut self, range: Range<u32>, new: &[u16]) {
        debug_assert!(range.start <= range.end);
        debug_assert!(range.end <= self.len());
        if range.start < range.end {
            self.delete(range.clone());
        }
        if !new.is_empty() {
            self.insert(range.start, new);
        }
    }

    fn split_slice_at(&mut self, idx: usize, offset_in_slice: u32) {
        let slice = self.slices[idx];
        if offset_in_slice == 0 || offset_in_slice == slice.len() {
            return;
        }
        let left = Slice {
            source: slice.source,
            start: slice.start,
            end: slice.start + offset_in_slice,
        };
        let right = Slice {
            source: slice.source,
            start: slice.start + offset_in_slice,
            end: slice.end,
        };
        self.slices.splice(idx..=idx, [left, right]);
    }

    fn delete(&mut self, range: Range<u32>) {
        let Some((lo_idx, lo_running)) = self.locate(range.start) else {
            return;
        };
        let lo_offset = range.start - lo_running;
        self.split_slice_at(lo_idx, lo_offset);

        // Re-locate after the split may have inserted a slice before lo_idx's
        // remainder; recompute against the (possibly shifted) directory.
        let Some((lo_idx, lo_running)) = self.locate(range.start) else {
            return;
        };
        let _ = lo_running;

        let Some((hi_idx, hi_running)) = self.locate_upper(range.end) else {
            // Deleting to the end of the buffer.
            self.slices.truncate(lo_idx);
            return;
        };
        let hi_offset = range.end - hi_running;
        self.split_slice_at(hi_idx, hi_offset);
        let Some((hi_idx, _)) = self.locate_upper(range.end) else {
            self.slices.truncate(lo_idx);
            return;
        };

        self.slices.drain(lo_idx..hi_idx);
        self.slices.retain(|s| !s.is_empty());
    }

    /// Like `locate` but treats an offset equal to the logical length as
    /// "the slice boundary just past the last slice", used to find the
    /// upper bound of a deletion range without pulling in the next slice.
    fn locate_upper(&self, pos: u32) -> Option<(usize, u32)> {
        let mut running = 0u32;
        for (idx, slice) in self.slices.iter().enumerate() {
            let next = running + slice.len();
            if pos <= next && pos != next {
                return Some((idx, running));
            }
            if pos == next {
                return Some((idx + 1, next));
            }
            running = next;
        }
        None
    }

    fn insert(&mut self, pos: u32, new: &[u16]) {
        let insert_start = self.added.len() as u32;
        self.added.extend_from_slice(new);
        let new_slice = Slice {
            source: Source::Added,
            start: insert_start,
            end: insert_start + new.len() as u32,
        };

        // Extend the previous slice in place if it's an Added slice that
        // ends exactly where the new text begins.
        match self.locate(pos) {
            None => {
                if let Some(last) = self.slices.last_mut() {
                    if last.source == Source::Added && last.end == insert_start {
                        last.end = new_slice.end;
                        return;
                    }
                }
                self.slices.push(new_slice);
            }
            Some((idx, running)) => {
                let offset_in_slice = pos - running;
                if offset_in_slice == 0 {
                    if idx > 0 {
                        let prev = self.slices[idx - 1];
                        if prev.source == Source::Added && prev.end == insert_start {
                            self.slices[idx - 1].end = new_slice.end;
                            return;
                        }
                    }
                    self.slices.insert(idx, new_slice);
                } else {
                    self.split_slice_at(idx, offset_in_slice);
                    self.slices.insert(idx + 1, new_slice);
                }
            }
        }
    }

    /// Translates a logical offset into an offset in the `original` vector,
    /// keeping externally-held raw offsets stable across edits that do not
    /// touch the text they anchor. `side` disambiguates offsets that land
    /// inside an `added` run (which has no original-vector counterpart) by
    /// choosing the nearest original-backed boundary on that side.
    pub fn find_original_bound(&self, side: Side, pos: u32) -> u32 {
        let mut running = 0u32;
        let mut last_original_end = 0u32;
        for slice in &self.slices {
            let next = running + slice.len();
            if pos < next || (pos == next && side == Side::Upper) {
                match slice.source {
                    Source::Original => {
                        let offset_in_slice = pos.saturating_sub(running).min(slice.len());
                        return slice.start + offset_in_slice;
                    }
                    Source::Added => {
                        return match side {
                            Side::Lower => last_original_end,
                            Side::Upper => last_original_end,
                        };
                    }
                }
            }
            if slice.source == Source::Original {
                last_original_end = slice.end;
            }
            running = next;
        }
        last_original_end
    }

    /// Inverse of `find_original_bound`: translates an `original`-vector
    /// offset back into the current logical offset.
    pub fn find_bound_for_original(&self, side: Side, original_pos: u32) -> u32 {
        let mut running = 0u32;
        let mut candidate: Option<u32> = None;
        for slice in &self.slices {
            if slice.source == Source::Original {
                if original_pos >= slice.start && original_pos <= slice.end {
                    let offset_in_slice = original_pos - slice.start;
                    return running + offset_in_slice;
                }
                if original_pos < slice.start && candidate.is_none() {
                    candidate = Some(running);
                }
            }
            running += slice.len();
        }
        match side {
            Side::Lower => candidate.unwrap_or(running),
            Side::Upper => candidate.unwrap_or(running),
        }
    }
}

impl fmt::Display for PieceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn construct_and_read() {
        let pt = PieceTable::new("hello");
        assert_eq!(pt.len(), 5);
        assert_eq!(pt.to_string(), "hello");
        assert_eq!(pt.code_unit_at(0), Some('h' as u16));
        assert_eq!(pt.code_unit_at(5), None);
    }

    #[test]
    fn insert_at_start_middle_end() {
        let mut pt = PieceTable::new("ac");
        pt.replace(1..1, &units("b"));
        assert_eq!(pt.to_string(), "abc");
        pt.replace(0..0, &units("X"));
        assert_eq!(pt.to_string(), "Xabc");
        let len = pt.len();
        pt.replace(len..len, &units("Y"));
        assert_eq!(pt.to_string(), "XabcY");
    }

    #[test]
    fn delete_whole_and_partial() {
        let mut pt = PieceTable::new("hello world");
        pt.replace(5..11, &[]);
        assert_eq!(pt.to_string(), "hello");
        let mut pt2 = PieceTable::new("hello world");
        pt2.replace(0..6, &[]);
        assert_eq!(pt2.to_string(), "world");
    }

    #[test]
    fn replace_across_slices() {
        let mut pt = PieceTable::new("ac");
        pt.replace(1..1, &units("b"));
        assert_eq!(pt.to_string(), "abc");
        pt.replace(0..3, &units("xyz"));
        assert_eq!(pt.to_string(), "xyz");
    }

    #[test]
    fn consecutive_inserts_coalesce_added_slices() {
        let mut pt = PieceTable::new("");
        pt.replace(0..0, &units("a"));
        pt.replace(1..1, &units("b"));
        pt.replace(2..2, &units("c"));
        assert_eq!(pt.to_string(), "abc");
    }

    #[test]
    fn slice_out_of_bounds_clamps_without_panicking() {
        let pt = PieceTable::new("abc");
        let out = pt.slice(1..100);
        assert_eq!(String::from_utf16_lossy(&out), "bc");
    }

    #[test]
    fn original_bound_round_trip_on_untouched_region() {
        let mut pt = PieceTable::new("hello world");
        let before = pt.find_original_bound(Side::Lower, 8);
        pt.replace(0..1, &units("H"));
        let after_pos = pt.find_bound_for_original(Side::Lower, before);
        assert_eq!(pt.code_unit_at(after_pos), Some('o' as u16));
    }
}

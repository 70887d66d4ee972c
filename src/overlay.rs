//! Ordered, disjoint set of raw-range → replacement-unit substitutions with
//! raw↔visible coordinate translation (component G).

use std::ops::Range;

use crate::error::{Error, Result};
use crate::piece_table::Side;

#[derive(Debug, Clone)]
struct Entry {
    raw_start: u32,
    raw_len: u32,
    replacement: Vec<u16>,
}

impl Entry {
    fn raw_end(&self) -> u32 {
        self.raw_start + self.raw_len
    }

    fn visible_len(&self) -> u32 {
        self.replacement.len() as u32
    }
}

/// Maintains replacements ordered by raw range and lets a caller translate
/// offsets between the raw (unmodified parse) coordinate space and the
/// visible (post-replacement) coordinate space.
#[derive(Debug, Clone, Default)]
pub struct ReplacementOverlay {
    entries: Vec<Entry>,
}

impl ReplacementOverlay {
    pub fn new() -> Self {
        ReplacementOverlay {
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find_overlap_index(&self, raw_range: &Range<u32>) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.raw_start < raw_range.end && raw_range.start < e.raw_end())
    }

    /// Inserts a replacement for `raw_range`. Fails if it overlaps an
    /// existing entry (§7 `OverlappingReplacement`).
    pub fn insert(&mut self, raw_range: Range<u32>, units: Vec<u16>) -> Result<()> {
        if self.find_overlap_index(&raw_range).is_some() {
            return Err(Error::OverlappingReplacement { raw_range });
        }
        let entry = Entry {
            raw_start: raw_range.start,
            raw_len: raw_range.end - raw_range.start,
            replacement: units,
        };
        let idx = self
            .entries
            .iter()
            .position(|e| e.raw_start > entry.raw_start)
            .unwrap_or(self.entries.len());
        self.entries.insert(idx, entry);
        Ok(())
    }

    /// Drops every entry overlapping `raw_range`.
    pub fn remove_overlapping(&mut self, raw_range: Range<u32>) {
        self.entries
            .retain(|e| !(e.raw_start < raw_range.end && raw_range.start < e.raw_end()));
    }

    /// Shifts every entry starting at or after `raw_pos` by `delta`, used
    /// after a raw-buffer edit that does not itself touch overlay
    /// structure (i.e. an edit strictly outside every replacement).
    pub fn shift_after(&mut self, raw_pos: u32, delta: i64) {
        for entry in &mut self.entries {
            if entry.raw_start as i64 >= raw_pos as i64 {
                entry.raw_start = (entry.raw_start as i64 + delta).max(0) as u32;
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Range<u32>, &[u16])> {
        self.entries
            .iter()
            .map(|e| (e.raw_start..e.raw_end(), e.replacement.as_slice()))
    }

    /// Translates a raw offset to a visible offset. If `raw_pos` lands
    /// strictly inside a replacement, `side` selects whether it resolves to
    /// the start or the end of that replacement's visible span (from the
    /// visible side a replacement is atomic).
    pub fn raw_to_visible(&self, raw_pos: u32, side: Side) -> u32 {
        let mut raw_running = 0u32;
        let mut visible_running = 0u32;
        for entry in &self.entries {
            if raw_pos < entry.raw_start {
                return visible_running + (raw_pos - raw_running);
            }
            if raw_pos < entry.raw_end() {
                return match side {
                    Side::Lower => visible_running,
                    Side::Upper => visible_running + entry.visible_len(),
                };
            }
            visible_running += entry.visible_len();
            raw_running = entry.raw_end();
        }
        visible_running + (raw_pos - raw_running)
    }

    /// Translates a visible offset back to a raw offset. If `vis_pos` lands
    /// inside a replacement's visible span, `side` selects the start or end
    /// raw boundary of the replaced raw range.
    pub fn visible_to_raw(&self, vis_pos: u32, side: Side) -> u32 {
        let mut raw_running = 0u32;
        let mut visible_running = 0u32;
        for entry in &self.entries {
            let gap = entry.raw_start - raw_running;
            if vis_pos < visible_running + gap {
                return entry.raw_start - ((visible_running + gap) - vis_pos);
            }
            let vis_end = visible_running + gap + entry.visible_len();
            if vis_pos < vis_end {
                return match side {
                    Side::Lower => entry.raw_start,
                    Side::Upper => entry.raw_end(),
                };
            }
            visible_running = vis_end;
            raw_running = entry.raw_end();
        }
        raw_running + (vis_pos - visible_running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_overlap() {
        let mut overlay = ReplacementOverlay::new();
        overlay.insert(0..3, vec![]).unwrap();
        let err = overlay.insert(1..2, vec![]).unwrap_err();
        assert!(matches!(err, Error::OverlappingReplacement { .. }));
    }

    #[test]
    fn raw_to_visible_round_trip_outside_replacements() {
        let mut overlay = ReplacementOverlay::new();
        overlay.insert(0..2, vec![]).unwrap();
        for v in 0..5 {
            let r = overlay.visible_to_raw(v, Side::Lower);
            let back = overlay.raw_to_visible(r, Side::Lower);
            assert_eq!(back, v, "round trip failed at visible offset {v}");
        }
    }

    #[test]
    fn substitution_collapses_raw_range_to_visible_point() {
        // "# Hi\n" with `#` replaced by "" -> raw len 5, visible len 3.
        let mut overlay = ReplacementOverlay::new();
        overlay.insert(0..2, vec![]).unwrap(); // "# " -> ""
        assert_eq!(overlay.raw_to_visible(0, Side::Lower), 0);
        assert_eq!(overlay.raw_to_visible(2, Side::Lower), 0);
        assert_eq!(overlay.raw_to_visible(2, Side::Upper), 0);
        assert_eq!(overlay.raw_to_visible(3, Side::Lower), 1);
    }

    #[test]
    fn shift_after_moves_later_entries() {
        let mut overlay = ReplacementOverlay::new();
        overlay.insert(5..7, vec![b'x' as u16]).unwrap();
        overlay.shift_after(5, 2);
        let (range, _) = overlay.iter().next().unwrap();
        assert_eq!(range, 7..9);
    }
}

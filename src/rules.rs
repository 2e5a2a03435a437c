use fixedbitset::FixedBitSet;
use image::imageops;
use log::warn;
use rustc_hash::FxHashMap;

use crate::pattern::Pattern;

pub type Offset = (i32, i32);

/// All `(dx, dy)` with `-(N-1) <= dx, dy <= N-1` excluding `(0, 0)`, in
/// row-major iteration order. Shared by `RuleTable` construction and by the
/// solver's propagation loop, so that both walk offsets in the same
/// deterministic sequence (spec's determinism guarantee depends on this).
pub fn generate_offsets(pattern_size: usize) -> Vec<Offset> {
    let span = pattern_size as i32 - 1;
    let mut offsets = Vec::with_capacity(((2 * span + 1) * (2 * span + 1) - 1) as usize);
    for dx in -span..=span {
        for dy in -span..=span {
            if dx == 0 && dy == 0 {
                continue;
            }
            offsets.push((dx, dy));
        }
    }
    offsets
}

/// For every ordered pair `(i, j)` and offset `δ`, whether pattern `j` may
/// sit at offset `δ` from pattern `i`. Stored as a `P`-bit bitset per
/// `(pattern, offset)` so the solver's hot loop ("allowed set at neighbour")
/// reduces to iterating set bits and OR-ing bitsets, per the spec's §9
/// bitset design note.
pub struct RuleTable {
    offsets: Vec<Offset>,
    rules: Vec<FxHashMap<Offset, FixedBitSet>>,
    pattern_count: usize,
}

impl RuleTable {
    /// Builds the table from a pattern catalog's patterns. Only tests `j >=
    /// i` per offset and inserts the symmetric entry at `-δ`, halving the
    /// comparison work, as specified in spec.md §4.2 and grounded in
    /// `Analyzer::generateRules`.
    pub fn new(patterns: &[Pattern], pattern_size: usize) -> Self {
        let offsets = generate_offsets(pattern_size);
        let pattern_count = patterns.len();
        let mut rules: Vec<FxHashMap<Offset, FixedBitSet>> =
            (0..pattern_count).map(|_| FxHashMap::default()).collect();

        for i in 0..pattern_count {
            for &offset in &offsets {
                for j in i..pattern_count {
                    if compatible(&patterns[i], &patterns[j], offset) {
                        rules[i]
                            .entry(offset)
                            .or_insert_with(|| FixedBitSet::with_capacity(pattern_count))
                            .insert(j);
                        let neg = (-offset.0, -offset.1);
                        rules[j]
                            .entry(neg)
                            .or_insert_with(|| FixedBitSet::with_capacity(pattern_count))
                            .insert(i);
                    }
                }
                if !rules[i].contains_key(&offset) {
                    warn!("no compatible pattern found for pattern {i} at offset {offset:?}");
                }
            }
        }

        RuleTable {
            offsets,
            rules,
            pattern_count,
        }
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }

    /// The bitset of pattern ids allowed at `offset` from `pattern_id`, or
    /// `None` if no pattern is ever compatible there.
    pub fn allowed(&self, pattern_id: usize, offset: Offset) -> Option<&FixedBitSet> {
        self.rules[pattern_id].get(&offset)
    }
}

/// Overlay `b` shifted by `offset` onto `a`; compatible iff the two agree
/// byte-for-byte on their overlapping region. Grounded in
/// `Analyzer::{checkForMatch,maskWithOffset}`.
fn compatible(a: &Pattern, b: &Pattern, offset: Offset) -> bool {
    let crop_a = overlap_crop(a, offset);
    let crop_b = overlap_crop(b, (-offset.0, -offset.1));
    crop_a == crop_b
}

fn overlap_crop(pattern: &Pattern, offset: Offset) -> Vec<u8> {
    let n = pattern.size() as i32;
    if offset.0.abs() >= n || offset.1.abs() >= n {
        return Vec::new();
    }
    let x1 = offset.0.max(0);
    let x2 = (n - 1).min(n - 1 + offset.0);
    let y1 = offset.1.max(0);
    let y2 = (n - 1).min(n - 1 + offset.1);
    let width = (x2 - x1 + 1) as u32;
    let height = (y2 - y1 + 1) as u32;
    imageops::crop_imm(pattern.image(), x1 as u32, y1 as u32, width, height)
        .to_image()
        .into_raw()
}

use fixedbitset::FixedBitSet;

/// The per-cell possibility bitset and collapsed-index grid for a W×H
/// output, plus the entropy query the solver's `Observe` step relies on.
///
/// Invariants (spec.md §3): if a cell is collapsed to `k`, its mask is the
/// singleton `{k}`; a cell whose mask is all-false is in contradiction.
#[derive(Clone)]
pub struct StateGrid {
    width: usize,
    height: usize,
    pattern_count: usize,
    possible: Vec<FixedBitSet>,
    collapsed: Vec<Option<usize>>,
}

impl StateGrid {
    pub fn new(width: usize, height: usize, pattern_count: usize) -> Self {
        let mut full = FixedBitSet::with_capacity(pattern_count);
        full.insert_range(..);
        StateGrid {
            width,
            height,
            pattern_count,
            possible: vec![full; width * height],
            collapsed: vec![None; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn possible_count(&self, x: usize, y: usize) -> usize {
        self.possible[self.index(x, y)].count_ones(..)
    }

    pub fn is_possible(&self, x: usize, y: usize, pattern: usize) -> bool {
        self.possible[self.index(x, y)].contains(pattern)
    }

    pub fn possible_ones(&self, x: usize, y: usize) -> impl Iterator<Item = usize> + '_ {
        self.possible[self.index(x, y)].ones()
    }

    pub fn collapsed_at(&self, x: usize, y: usize) -> Option<usize> {
        self.collapsed[self.index(x, y)]
    }

    /// Shannon entropy `ln(Σw) - (Σw·ln w)/Σw` over the probabilities of
    /// patterns still possible at `(x, y)`. Returns 0 when `Σw = 0`.
    pub fn entropy(&self, x: usize, y: usize, probability: &[f64]) -> f64 {
        let mask = &self.possible[self.index(x, y)];
        let mut sum_weights = 0.0;
        let mut sum_log_weights = 0.0;
        for k in mask.ones() {
            let w = probability[k];
            sum_weights += w;
            sum_log_weights += w * w.ln();
        }
        if sum_weights == 0.0 {
            return 0.0;
        }
        sum_weights.ln() - (sum_log_weights / sum_weights)
    }

    pub fn is_contradiction(&self) -> bool {
        self.possible.iter().any(|mask| mask.count_ones(..) == 0)
    }

    /// Reduces the cell's mask to the singleton `{k}` and records it as
    /// collapsed.
    pub fn collapse(&mut self, x: usize, y: usize, k: usize) {
        let idx = self.index(x, y);
        let mut mask = FixedBitSet::with_capacity(self.pattern_count);
        mask.insert(k);
        self.possible[idx] = mask;
        self.collapsed[idx] = Some(k);
    }

    /// `possible[x,y] &= allowed`. Returns `(updated, now_singleton)`; if
    /// the intersection collapsed the cell to one surviving pattern, records
    /// it in `collapsed` too.
    pub fn intersect(&mut self, x: usize, y: usize, allowed: &FixedBitSet) -> (bool, bool) {
        let idx = self.index(x, y);
        let before = self.possible[idx].clone();
        self.possible[idx].intersect_with(allowed);
        let updated = self.possible[idx] != before;
        let count = self.possible[idx].count_ones(..);
        let now_singleton = count == 1;
        if now_singleton {
            self.collapsed[idx] = self.possible[idx].ones().next();
        }
        (updated, now_singleton)
    }
}

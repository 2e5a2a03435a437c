use std::collections::VecDeque;
use std::ops::ControlFlow;

use log::{debug, info};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rustc_hash::FxHashSet;

use crate::backtrack::{Backtracker, SolverState};
use crate::config::SolverConfig;
use crate::grid::StateGrid;
use crate::rules::RuleTable;

/// `PREPARING -> RUNNING -> {SOLUTION, CONTRADICTION}`. `Solution` and
/// `Contradiction` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Preparing,
    Running,
    Solution,
    Contradiction,
}

/// The outcome of running a solver to completion.
#[derive(Debug, Clone, Copy)]
pub struct SolverOutcome {
    pub status: Status,
    pub iterations: usize,
}

/// Wraps `x.rem_euclid(bound)` for the toroidal wrap-around grid topology:
/// the neighbour of `(x, y)` at offset `(dx, dy)` is
/// `((x + dx) mod W, (y + dy) mod H)`.
fn wrap(value: usize, delta: i32, bound: usize) -> usize {
    let bound = bound as i32;
    let wrapped = (value as i32 + delta).rem_euclid(bound);
    wrapped as usize
}

/// Observe/collapse/propagate loop over a `StateGrid`, with contradiction
/// recovery delegated to a `Backtracker`. Grounded in `WFC::{startWFC,
/// Observe, propagate, updateCell}` from the reference implementation.
pub struct Solver<'a> {
    probability: &'a [f64],
    rules: &'a RuleTable,
    grid: StateGrid,
    backtracker: Backtracker,
    rng: StdRng,
    status: Status,
    iteration: usize,
}

impl<'a> Solver<'a> {
    pub fn new(
        pattern_count: usize,
        probability: &'a [f64],
        rules: &'a RuleTable,
        config: SolverConfig,
        backtracker: Backtracker,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Solver {
            probability,
            rules,
            grid: StateGrid::new(config.output_width, config.output_height, pattern_count),
            backtracker,
            rng,
            status: Status::Preparing,
            iteration: 0,
        }
    }

    pub fn grid(&self) -> &StateGrid {
        &self.grid
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Runs `Observe`/`Propagate` to completion.
    pub fn run(&mut self) -> SolverOutcome {
        self.run_with(|_| ControlFlow::Continue(()))
    }

    /// Runs to completion, invoking `checkpoint` after every completed
    /// iteration (i.e. after `Propagate` returns). Returning
    /// `ControlFlow::Break(())` stops the loop early, leaving `status` as
    /// `Running` — the natural cancellation checkpoint spec.md §5 mentions.
    pub fn run_with(&mut self, mut checkpoint: impl FnMut(&Solver<'a>) -> ControlFlow<()>) -> SolverOutcome {
        self.status = Status::Running;
        loop {
            if self.status != Status::Running {
                break;
            }
            let observed = self.observe();
            if self.status != Status::Running {
                break;
            }
            if let Some(point) = observed {
                self.propagate(point);
                self.iteration += 1;
                if checkpoint(self).is_break() {
                    break;
                }
            }
        }
        info!(
            "solver finished with status {:?} after {} iterations",
            self.status, self.iteration
        );
        SolverOutcome {
            status: self.status,
            iterations: self.iteration,
        }
    }

    fn observe(&mut self) -> Option<(usize, usize)> {
        if self.backtracker.is_backtracking() && self.backtracker.last_iteration() == self.iteration {
            self.backtracker.set_backtracking(false);
            self.backtracker.merge();
        }

        if self.grid.is_contradiction() {
            if self.backtracker.is_enabled() && self.backtracker.is_able_to_backtrack() {
                if !self.backtracker.is_backtracking() {
                    self.backtracker.set_last_iteration(self.iteration + 1);
                    self.backtracker.set_backtracking(true);
                }
                match self.backtracker.draw() {
                    Some(state) => {
                        self.grid = state.grid;
                        self.iteration = state.iteration;
                    }
                    None => self.status = Status::Contradiction,
                }
            } else {
                self.status = Status::Contradiction;
            }
            return None;
        }

        let width = self.grid.width();
        let height = self.grid.height();

        let mut min_entropy = f64::INFINITY;
        let mut candidates: Vec<(usize, usize)> = Vec::new();
        for y in 0..height {
            for x in 0..width {
                if self.grid.collapsed_at(x, y).is_some() {
                    continue;
                }
                let e = self.grid.entropy(x, y, self.probability);
                if e <= 0.0 {
                    continue;
                }
                if e < min_entropy {
                    min_entropy = e;
                    candidates.clear();
                    candidates.push((x, y));
                } else if e == min_entropy {
                    candidates.push((x, y));
                }
            }
        }

        let point = match candidates.choose(&mut self.rng) {
            Some(&point) => point,
            None => {
                self.status = Status::Solution;
                return None;
            }
        };

        let snapshot = SolverState {
            grid: self.grid.clone(),
            iteration: self.iteration,
        };
        if self.backtracker.is_backtracking() {
            self.backtracker.push_backtracked(snapshot);
        } else {
            self.backtracker.push(snapshot);
        }

        let chosen = self.draw_pattern(point.0, point.1);
        self.grid.collapse(point.0, point.1, chosen);
        Some(point)
    }

    fn draw_pattern(&mut self, x: usize, y: usize) -> usize {
        let weights: Vec<f64> = self
            .probability
            .iter()
            .enumerate()
            .map(|(k, &p)| if self.grid.is_possible(x, y, k) { p } else { 0.0 })
            .collect();
        let dist = WeightedIndex::new(&weights)
            .expect("a non-contradicted cell has at least one possible pattern");
        dist.sample(&mut self.rng)
    }

    /// AC-3-style worklist propagation starting from the just-collapsed
    /// cell. Never raises a contradiction directly; a drained possibility
    /// mask is only discovered by the next `Observe` call.
    fn propagate(&mut self, start: (usize, usize)) {
        let width = self.grid.width();
        let height = self.grid.height();

        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
        let mut visited: FxHashSet<(usize, usize)> = FxHashSet::default();
        queue.push_back(start);
        visited.insert(start);

        while let Some((cx, cy)) = queue.pop_front() {
            for &(dx, dy) in self.rules.offsets() {
                let nx = wrap(cx, dx, width);
                let ny = wrap(cy, dy, height);
                if self.grid.collapsed_at(nx, ny).is_some() {
                    continue;
                }

                let mut allowed = fixedbitset::FixedBitSet::with_capacity(self.rules.pattern_count());
                for i in self.grid.possible_ones(cx, cy) {
                    if let Some(bits) = self.rules.allowed(i, (dx, dy)) {
                        allowed.union_with(bits);
                    }
                }

                let (updated, _) = self.grid.intersect(nx, ny, &allowed);
                if updated && visited.insert((nx, ny)) {
                    queue.push_back((nx, ny));
                }
            }
        }
        debug!("propagation from ({}, {}) visited {} cells", start.0, start.1, visited.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtrack::BacktrackerConfig;
    use pretty_assertions::assert_eq;
    use crate::config::AnalyzerOptions;
    use crate::pattern::PatternCatalog;
    use image::{Rgb, RgbImage};

    fn solver_for<'a>(
        probability: &'a [f64],
        rules: &'a RuleTable,
        width: usize,
        height: usize,
        backtracker_enabled: bool,
        seed: u64,
    ) -> Solver<'a> {
        Solver::new(
            probability.len(),
            probability,
            rules,
            SolverConfig {
                output_width: width,
                output_height: height,
            },
            Backtracker::new(BacktrackerConfig {
                max_depth: 5,
                max_iterations: 3,
                enabled: backtracker_enabled,
            }),
            Some(seed),
        )
    }

    #[test]
    fn solid_exemplar_solves_to_uniform_output() {
        let exemplar = RgbImage::from_pixel(4, 4, Rgb([200, 30, 30]));
        let options = AnalyzerOptions {
            pattern_size: 3,
            allow_rotate: false,
            allow_flip: false,
        };
        let catalog = PatternCatalog::analyze(&exemplar, &options).unwrap();
        let rules = RuleTable::new(catalog.patterns(), options.pattern_size);
        let mut solver = solver_for(catalog.probability(), &rules, 8, 8, false, 42);
        let outcome = solver.run();
        assert_eq!(outcome.status, Status::Solution);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(solver.grid().collapsed_at(x, y), Some(0));
            }
        }
    }

    #[test]
    fn one_by_one_output_solves_in_a_single_iteration() {
        let exemplar = RgbImage::from_pixel(3, 3, Rgb([1, 2, 3]));
        let options = AnalyzerOptions {
            pattern_size: 2,
            allow_rotate: false,
            allow_flip: false,
        };
        let catalog = PatternCatalog::analyze(&exemplar, &options).unwrap();
        let rules = RuleTable::new(catalog.patterns(), options.pattern_size);
        let mut solver = solver_for(catalog.probability(), &rules, 1, 1, false, 7);
        let outcome = solver.run();
        assert_eq!(outcome.status, Status::Solution);
        assert_eq!(outcome.iterations, 1);
    }

    /// A 2-wide, 4-tall exemplar of horizontal bands R,G,B,R. With pattern
    /// size 2 every window's two rows are a single solid colour each
    /// (columns are uniform), so the only cross-pattern compatibility is the
    /// cyclic R->G->B->R vertical succession; horizontally, a pattern is
    /// only ever compatible with itself. Tiling this toroidally over a
    /// height that isn't a multiple of 3 can never close the cycle.
    fn band_exemplar() -> RgbImage {
        let mut exemplar = RgbImage::new(2, 4);
        let rows = [Rgb([200, 0, 0]), Rgb([0, 200, 0]), Rgb([0, 0, 200]), Rgb([200, 0, 0])];
        for (y, color) in rows.iter().enumerate() {
            for x in 0..2 {
                exemplar.put_pixel(x, y as u32, *color);
            }
        }
        exemplar
    }

    #[test]
    fn impossible_period_without_backtracking_yields_contradiction() {
        let exemplar = band_exemplar();
        let options = AnalyzerOptions {
            pattern_size: 2,
            allow_rotate: false,
            allow_flip: false,
        };
        let catalog = PatternCatalog::analyze(&exemplar, &options).unwrap();
        let rules = RuleTable::new(catalog.patterns(), options.pattern_size);
        // Height 4 cannot host a closed cycle of period 3.
        let mut solver = solver_for(catalog.probability(), &rules, 4, 4, false, 99);
        let outcome = solver.run();
        assert_eq!(outcome.status, Status::Contradiction);
    }

    #[test]
    fn impossible_period_with_backtracking_still_contradicts() {
        let exemplar = band_exemplar();
        let options = AnalyzerOptions {
            pattern_size: 2,
            allow_rotate: false,
            allow_flip: false,
        };
        let catalog = PatternCatalog::analyze(&exemplar, &options).unwrap();
        let rules = RuleTable::new(catalog.patterns(), options.pattern_size);
        // Structurally unsolvable regardless of choices, so backtracking
        // exhausts its budget and the solver still reports Contradiction.
        let mut solver = solver_for(catalog.probability(), &rules, 4, 4, true, 99);
        let outcome = solver.run();
        assert_eq!(outcome.status, Status::Contradiction);
    }

    #[test]
    fn compatible_period_solves_cleanly() {
        let exemplar = band_exemplar();
        let options = AnalyzerOptions {
            pattern_size: 2,
            allow_rotate: false,
            allow_flip: false,
        };
        let catalog = PatternCatalog::analyze(&exemplar, &options).unwrap();
        let rules = RuleTable::new(catalog.patterns(), options.pattern_size);
        // Height 6 is a multiple of the period, so a consistent tiling
        // exists: every row must be solid, and consecutive rows (with
        // wrap-around) must be adjacent in the R->G->B->R cycle.
        let mut solver = solver_for(catalog.probability(), &rules, 6, 6, false, 3);
        let outcome = solver.run();
        assert_eq!(outcome.status, Status::Solution);
        for y in 0..6 {
            let first = solver.grid().collapsed_at(0, y);
            for x in 1..6 {
                assert_eq!(solver.grid().collapsed_at(x, y), first);
            }
        }
    }

    #[test]
    fn determinism_given_fixed_seed() {
        let mut exemplar = RgbImage::new(4, 4);
        for x in 0..4 {
            for y in 0..4 {
                exemplar.put_pixel(x, y, Rgb([(x * 60) as u8, (y * 60) as u8, 0]));
            }
        }
        let options = AnalyzerOptions {
            pattern_size: 2,
            allow_rotate: false,
            allow_flip: false,
        };
        let catalog = PatternCatalog::analyze(&exemplar, &options).unwrap();
        let rules = RuleTable::new(catalog.patterns(), options.pattern_size);

        let mut solver_a = solver_for(catalog.probability(), &rules, 6, 6, true, 1234);
        let mut solver_b = solver_for(catalog.probability(), &rules, 6, 6, true, 1234);
        let outcome_a = solver_a.run();
        let outcome_b = solver_b.run();

        assert_eq!(outcome_a.status, outcome_b.status);
        for y in 0..6 {
            for x in 0..6 {
                assert_eq!(
                    solver_a.grid().collapsed_at(x, y),
                    solver_b.grid().collapsed_at(x, y)
                );
            }
        }
    }
}

//! Overlapping-model Wave Function Collapse: given a small exemplar raster,
//! produces a larger raster whose every N×N window reoccurs somewhere in the
//! exemplar, with window frequency approximating the exemplar's.

pub mod backtrack;
pub mod config;
pub mod error;
pub mod grid;
pub mod io_util;
pub mod pattern;
pub mod render;
pub mod rules;
pub mod solver;

pub use backtrack::{Backtracker, BacktrackerConfig, SolverState};
pub use config::{AnalyzerOptions, Config, SolverConfig};
pub use error::{Result, WfcError};
pub use grid::StateGrid;
pub use pattern::{Pattern, PatternCatalog};
pub use rules::RuleTable;
pub use solver::{Solver, SolverOutcome, Status};

use image::RgbImage;

/// Everything a caller needs after a run: the catalog the rules were built
/// from, the rules themselves, and the solver's final grid and outcome.
/// Kept together because the renderer needs the catalog and the grid, and a
/// caller investigating a contradiction needs the rules too.
pub struct Generation {
    pub catalog: PatternCatalog,
    pub rules: RuleTable,
    pub grid: StateGrid,
    pub outcome: SolverOutcome,
}

/// Runs analysis, rule construction and solving end to end, then returns
/// everything needed to render or inspect the result. This is the crate's
/// one-call convenience entry point; `main.rs` uses the pieces directly so
/// it can snapshot intermediate state and honour `--seed`/`-v`.
pub fn generate(exemplar: &RgbImage, config: &Config) -> Result<Generation> {
    config.solver.validate()?;
    let catalog = PatternCatalog::analyze(exemplar, &config.analyzer)?;
    let rules = RuleTable::new(catalog.patterns(), config.analyzer.pattern_size);
    let mut solver = Solver::new(
        catalog.len(),
        catalog.probability(),
        &rules,
        config.solver,
        Backtracker::new(config.backtracker),
        config.seed,
    );
    let outcome = solver.run();
    let grid = solver.grid().clone();
    Ok(Generation {
        catalog,
        rules,
        grid,
        outcome,
    })
}

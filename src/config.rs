use crate::backtrack::BacktrackerConfig;
use crate::error::{Result, WfcError};

/// Options controlling pattern extraction from the exemplar.
///
/// See `Analyzer::generatePatterns` in the reference implementation for the
/// emission order (base crop, then flips, then rotations) these options
/// gate.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerOptions {
    pub pattern_size: usize,
    pub allow_rotate: bool,
    pub allow_flip: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            pattern_size: 3,
            allow_rotate: false,
            allow_flip: false,
        }
    }
}

/// Dimensions of the grid the `Solver` collapses.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub output_width: usize,
    pub output_height: usize,
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_width == 0 || self.output_height == 0 {
            return Err(WfcError::InvalidOutputSize {
                width: self.output_width,
                height: self.output_height,
            });
        }
        Ok(())
    }
}

/// Top-level configuration bundling every option group from the spec's
/// configuration table (Analyzer, Solver, Backtracker) plus the seed hook
/// needed for reproducible runs.
#[derive(Debug, Clone)]
pub struct Config {
    pub analyzer: AnalyzerOptions,
    pub solver: SolverConfig,
    pub backtracker: BacktrackerConfig,
    pub seed: Option<u64>,
}

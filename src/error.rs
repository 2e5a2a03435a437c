use thiserror::Error;

/// Errors surfaced by the analysis, solving and rendering pipeline.
#[derive(Debug, Error)]
pub enum WfcError {
    #[error("pattern size {pattern_size} exceeds exemplar dimensions {width}x{height}")]
    PatternTooLarge {
        pattern_size: usize,
        width: u32,
        height: u32,
    },

    #[error("output dimensions must be positive, got {width}x{height}")]
    InvalidOutputSize { width: usize, height: usize },

    #[error("contradiction: solver exhausted all backtracking options after {iterations} iterations")]
    ContradictionExhausted { iterations: usize },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WfcError>;

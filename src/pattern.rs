use std::path::Path;

use image::{imageops, Rgb, RgbImage};
use log::{debug, info};
use rustc_hash::FxHashMap;

use crate::config::AnalyzerOptions;
use crate::error::{Result, WfcError};

/// An N×N crop of the exemplar (or one of its mirrors/rotations), identified
/// by a stable id `0..P-1`. Patterns compare and hash by exact pixel byte
/// equality, matching `Analyzer::patternToStr` in the reference
/// implementation, which keys pattern frequency by the raw pixel sequence.
#[derive(Clone)]
pub struct Pattern {
    id: usize,
    image: RgbImage,
}

impl Pattern {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn size(&self) -> u32 {
        self.image.width()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// The top-left pixel, used by the renderer's averaging rule.
    pub fn top_left(&self) -> Rgb<u8> {
        *self.image.get_pixel(0, 0)
    }
}

/// Enumerates the distinct N×N patterns present in an exemplar image, their
/// frequencies and their derived probability vector.
///
/// Grounded in `Analyzer::{generatePatterns,addPattern,calculateProbabilities}`
/// from the reference implementation: a window is extracted at every
/// top-left position, optionally expanded with mirrors and rotations, and
/// deduplicated by exact byte content while frequency accumulates across
/// every emission.
pub struct PatternCatalog {
    patterns: Vec<Pattern>,
    frequency: Vec<usize>,
    probability: Vec<f64>,
    pattern_size: usize,
}

impl PatternCatalog {
    pub fn analyze(exemplar: &RgbImage, options: &AnalyzerOptions) -> Result<Self> {
        let (width, height) = exemplar.dimensions();
        let n = options.pattern_size as u32;
        if n > width || n > height {
            return Err(WfcError::PatternTooLarge {
                pattern_size: options.pattern_size,
                width,
                height,
            });
        }

        let mut patterns: Vec<Pattern> = Vec::new();
        let mut index: FxHashMap<Vec<u8>, usize> = FxHashMap::default();
        let mut frequency: Vec<usize> = Vec::new();
        let mut total_emissions = 0usize;

        let mut add = |crop: RgbImage| {
            total_emissions += 1;
            let bytes = crop.as_raw().clone();
            match index.get(&bytes) {
                Some(&id) => frequency[id] += 1,
                None => {
                    let id = patterns.len();
                    index.insert(bytes, id);
                    patterns.push(Pattern { id, image: crop });
                    frequency.push(1);
                }
            }
        };

        for x in 0..=(width - n) {
            for y in 0..=(height - n) {
                let base = imageops::crop_imm(exemplar, x, y, n, n).to_image();

                if options.allow_flip {
                    let h = imageops::flip_horizontal(&base);
                    let v = imageops::flip_vertical(&base);
                    add(base.clone());
                    add(h);
                    add(v);
                } else {
                    add(base.clone());
                }

                if options.allow_rotate {
                    add(imageops::rotate90(&base));
                    add(imageops::rotate180(&base));
                    add(imageops::rotate270(&base));
                }
            }
        }

        info!(
            "analyzed {}x{} exemplar at pattern size {}: {} emissions, {} distinct patterns",
            width,
            height,
            options.pattern_size,
            total_emissions,
            patterns.len()
        );

        let sum_frequency: usize = frequency.iter().sum();
        let probability: Vec<f64> = frequency
            .iter()
            .map(|&f| f as f64 / sum_frequency as f64)
            .collect();

        debug!(
            "probability vector sums to {}",
            probability.iter().sum::<f64>()
        );

        Ok(PatternCatalog {
            patterns,
            frequency,
            probability,
            pattern_size: options.pattern_size,
        })
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn probability(&self) -> &[f64] {
        &self.probability
    }

    pub fn frequency(&self) -> &[usize] {
        &self.frequency
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn pattern_size(&self) -> usize {
        self.pattern_size
    }

    /// Renders a grid of scaled pattern tiles, laid out the way
    /// `Analyzer::savePatternsPreviewTo` does. Unlike the reference, this
    /// does not overlay id/frequency/probability text (no text-rendering
    /// crate is in use); see `DESIGN.md`. If `path` already exists, writes
    /// to a `_1`/`_2`/... sibling instead of overwriting it.
    pub fn save_preview(&self, path: &Path, scale: u32, space_between: u32) -> Result<()> {
        let scaled = self.pattern_size as u32 * scale;
        let cols = (self.patterns.len() as f64).sqrt().ceil() as u32;
        let cols = cols.max(1);
        let rows = ((self.patterns.len() as u32) + cols - 1) / cols;

        let canvas_w = space_between + rows.max(1) * (scaled + space_between);
        let canvas_h = space_between + cols.max(1) * (scaled + space_between);
        let mut canvas = RgbImage::from_pixel(canvas_w, canvas_h, Rgb([128, 128, 128]));

        for (i, pattern) in self.patterns.iter().enumerate() {
            let row = i as u32 / cols;
            let col = i as u32 % cols;
            let resized = imageops::resize(
                pattern.image(),
                scaled,
                scaled,
                imageops::FilterType::Nearest,
            );
            let x = space_between + row * (scaled + space_between);
            let y = space_between + col * (scaled + space_between);
            imageops::overlay(&mut canvas, &resized, x as i64, y as i64);
        }

        if let Some(parent) = path.parent() {
            crate::io_util::ensure_dir(parent)?;
        }
        canvas.save(crate::io_util::unique_path(path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn solid(size: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(size, size, Rgb(color))
    }

    fn checker() -> RgbImage {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([0, 0, 0]));
        img.put_pixel(1, 0, Rgb([255, 255, 255]));
        img.put_pixel(0, 1, Rgb([255, 255, 255]));
        img.put_pixel(1, 1, Rgb([0, 0, 0]));
        img
    }

    #[test]
    fn solid_exemplar_has_single_pattern() {
        let exemplar = solid(4, [255, 0, 0]);
        let options = AnalyzerOptions {
            pattern_size: 3,
            allow_rotate: false,
            allow_flip: false,
        };
        let catalog = PatternCatalog::analyze(&exemplar, &options).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.probability(), &[1.0]);
    }

    #[test]
    fn pattern_size_larger_than_exemplar_fails() {
        let exemplar = solid(2, [0, 0, 0]);
        let options = AnalyzerOptions {
            pattern_size: 3,
            allow_rotate: false,
            allow_flip: false,
        };
        let result = PatternCatalog::analyze(&exemplar, &options);
        assert!(matches!(result, Err(WfcError::PatternTooLarge { .. })));
    }

    #[test]
    fn checker_yields_base_patterns_at_every_window() {
        let exemplar = checker();
        let options = AnalyzerOptions {
            pattern_size: 2,
            allow_rotate: false,
            allow_flip: false,
        };
        let catalog = PatternCatalog::analyze(&exemplar, &options).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.frequency(), &[1]);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let mut exemplar = RgbImage::new(4, 4);
        for x in 0..4 {
            for y in 0..4 {
                exemplar.put_pixel(x, y, Rgb([(x + y) as u8 * 10, 0, 0]));
            }
        }
        let options = AnalyzerOptions {
            pattern_size: 2,
            allow_rotate: false,
            allow_flip: false,
        };
        let catalog = PatternCatalog::analyze(&exemplar, &options).unwrap();
        let sum: f64 = catalog.probability().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rotations_and_flips_multiply_emissions_not_necessarily_patterns() {
        let exemplar = solid(4, [10, 20, 30]);
        let options = AnalyzerOptions {
            pattern_size: 2,
            allow_rotate: true,
            allow_flip: true,
        };
        let catalog = PatternCatalog::analyze(&exemplar, &options).unwrap();
        // A solid exemplar's crops are invariant under every transform, so
        // there is still exactly one distinct pattern, but its frequency
        // grows to reflect every emission.
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.frequency()[0], 9 * 6);
    }
}

use image::{imageops, Rgb, RgbImage};

use crate::grid::StateGrid;
use crate::pattern::PatternCatalog;

/// For each output cell, the arithmetic mean of the top-left pixel of every
/// pattern still possible there. When a cell has collapsed this is exactly
/// that pattern's `(0,0)` pixel — the canonical overlapping-model output
/// rule (spec.md §4.6). Cells with no surviving pattern (mid-contradiction)
/// render as black, grounded in `WFC::displayOutputImage`'s zero-initialised
/// canvas.
pub fn render(catalog: &PatternCatalog, grid: &StateGrid) -> RgbImage {
    let mut image = RgbImage::new(grid.width() as u32, grid.height() as u32);
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            let mut sum = [0u64, 0u64, 0u64];
            let mut count = 0u64;
            for k in grid.possible_ones(x, y) {
                let Rgb([r, g, b]) = catalog.patterns()[k].top_left();
                sum[0] += r as u64;
                sum[1] += g as u64;
                sum[2] += b as u64;
                count += 1;
            }
            let pixel = if count == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([
                    (sum[0] / count) as u8,
                    (sum[1] / count) as u8,
                    (sum[2] / count) as u8,
                ])
            };
            image.put_pixel(x as u32, y as u32, pixel);
        }
    }
    image
}

/// Nearest-neighbour resize of a rendered raster, mirroring
/// `WFC::displayOutputImage`'s `res.resize(width, height, 1, 3, 1)` call
/// used when writing preview-scaled solution images.
pub fn scale(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    imageops::resize(image, width, height, imageops::FilterType::Nearest)
}

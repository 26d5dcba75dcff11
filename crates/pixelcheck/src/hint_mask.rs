//! Hint and mask overlays for human review.
//!
//! A hint is a transparent canvas with an outline around every failing
//! pixel; a mask dims the whole canvas except around the failures. Fast
//! mode draws one box around the union of all failures, precise mode
//! works per pixel and splits the canvas by column across the rayon pool.

use crate::config::HintConfig;
use crate::raster::{RasterImage, TRANSPARENT};
use crate::summary::PixelSummary;
use image::Rgba;
use rayon::prelude::*;

/// Outline colour
pub const HINT_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Dimming applied outside the failures
pub const MASK_COLOR: Rgba<u8> = Rgba([0, 0, 0, 160]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Cell {
    Empty,
    Outline,
    Clear,
}

/// Rendered overlays for one summary
#[derive(Debug, Clone)]
pub struct HintMask {
    /// Outline overlay
    pub hint: RasterImage,
    /// Dimming overlay, when mask generation is enabled
    pub mask: Option<RasterImage>,
}

/// Renders hint and mask images from a failed-pixel index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintMaskHelper {
    fast: bool,
    masks: bool,
    margin: u32,
}

impl Default for HintMaskHelper {
    fn default() -> Self {
        Self::from_config(&HintConfig::default())
    }
}

impl HintMaskHelper {
    /// Create a helper
    #[must_use]
    pub const fn new(fast: bool, masks: bool, margin: u32) -> Self {
        Self {
            fast,
            masks,
            margin,
        }
    }

    /// Helper configured from the `hints` config section
    #[must_use]
    pub const fn from_config(config: &HintConfig) -> Self {
        Self::new(config.fast, config.generate_masks, config.margin)
    }

    /// Whether masks are rendered
    #[must_use]
    pub const fn generates_masks(&self) -> bool {
        self.masks
    }

    /// Render overlays for `summary` on a `width` x `height` canvas
    #[must_use]
    pub fn render(&self, summary: &PixelSummary, width: u32, height: u32) -> HintMask {
        if width == 0 || height == 0 {
            return HintMask {
                hint: RasterImage::new(width, height),
                mask: self.masks.then(|| RasterImage::new(width, height)),
            };
        }
        let columns = if self.fast {
            self.fast_cells(summary, width, height)
        } else {
            self.precise_cells(summary, width, height)
        };
        let hint = RasterImage::from_fn(width, height, |x, y| {
            match columns[x as usize][y as usize] {
                Cell::Outline => HINT_COLOR,
                Cell::Empty | Cell::Clear => TRANSPARENT,
            }
        });
        let mask = self.masks.then(|| {
            RasterImage::from_fn(width, height, |x, y| {
                match columns[x as usize][y as usize] {
                    Cell::Clear => TRANSPARENT,
                    Cell::Empty | Cell::Outline => MASK_COLOR,
                }
            })
        });
        HintMask { hint, mask }
    }

    /// One box around the union of all failures
    fn fast_cells(&self, summary: &PixelSummary, width: u32, height: u32) -> Vec<Vec<Cell>> {
        let mut columns = vec![vec![Cell::Empty; height as usize]; width as usize];
        let Some((min_x, min_y, max_x, max_y)) = summary.bounds() else {
            return columns;
        };
        let max_col = width - 1;
        let max_row = height - 1;
        let outer = self.margin.saturating_add(1);
        let clear = (
            min_x.saturating_sub(self.margin),
            min_y.saturating_sub(self.margin),
            max_x.saturating_add(self.margin).min(max_col),
            max_y.saturating_add(self.margin).min(max_row),
        );
        let outline = (
            min_x.saturating_sub(outer),
            min_y.saturating_sub(outer),
            max_x.saturating_add(outer).min(max_col),
            max_y.saturating_add(outer).min(max_row),
        );
        for x in outline.0..=outline.2 {
            for y in outline.1..=outline.3 {
                let inside = x >= clear.0 && x <= clear.2 && y >= clear.1 && y <= clear.3;
                columns[x as usize][y as usize] = if inside { Cell::Clear } else { Cell::Outline };
            }
        }
        columns
    }

    /// Per-pixel boxes: fill an outer box around every failure, then clear
    /// the inner box so neighbouring failures share one outline
    fn precise_cells(&self, summary: &PixelSummary, width: u32, height: u32) -> Vec<Vec<Cell>> {
        let margin = self.margin;
        let outer = margin.saturating_add(1);
        let max_row = height - 1;
        (0..width)
            .into_par_iter()
            .map(|x| {
                let mut column = vec![Cell::Empty; height as usize];
                let paint = |column: &mut Vec<Cell>, rows: &std::collections::BTreeSet<u32>, r: u32, cell: Cell| {
                    for &y in rows {
                        let lo = y.saturating_sub(r);
                        let hi = y.saturating_add(r).min(max_row);
                        for slot in &mut column[lo as usize..=hi as usize] {
                            *slot = (*slot).max(cell);
                        }
                    }
                };
                for (_, rows) in summary.columns_between(x.saturating_sub(outer), x.saturating_add(outer)) {
                    paint(&mut column, rows, outer, Cell::Outline);
                }
                for (_, rows) in summary.columns_between(x.saturating_sub(margin), x.saturating_add(margin)) {
                    paint(&mut column, rows, margin, Cell::Clear);
                }
                column
            })
            .collect()
    }
}

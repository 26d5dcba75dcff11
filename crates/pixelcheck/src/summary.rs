//! Sparse record of failed pixels.
//!
//! Failures are indexed by column, then row. Differences in screenshots
//! tend to run vertically (text cursors, borders), so a column map of row
//! sets stays small where a full bitmap per comparison would not, and the
//! column index is what the parallel scans split on.

use std::collections::{BTreeMap, BTreeSet};

/// Failed-pixel index plus aggregate statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelSummary {
    total_pixels: u64,
    failed: BTreeMap<u32, BTreeSet<u32>>,
    failed_count: u64,
}

impl PixelSummary {
    /// Empty summary over an image of `total_pixels` pixels
    #[must_use]
    pub fn new(total_pixels: u64) -> Self {
        Self {
            total_pixels,
            failed: BTreeMap::new(),
            failed_count: 0,
        }
    }

    /// Build a summary from per-column row sets, dropping empty columns
    #[must_use]
    pub fn from_columns(
        total_pixels: u64,
        columns: impl IntoIterator<Item = (u32, BTreeSet<u32>)>,
    ) -> Self {
        let mut summary = Self::new(total_pixels);
        for (x, rows) in columns {
            if rows.is_empty() {
                continue;
            }
            summary.failed_count += rows.len() as u64;
            summary.failed.entry(x).or_default().extend(rows);
        }
        summary
    }

    /// Record a failed pixel; returns false if it was already recorded
    pub fn add(&mut self, x: u32, y: u32) -> bool {
        let inserted = self.failed.entry(x).or_default().insert(y);
        if inserted {
            self.failed_count += 1;
        }
        inserted
    }

    /// Whether `(x, y)` is recorded as failed
    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.failed.get(&x).is_some_and(|rows| rows.contains(&y))
    }

    /// Total pixels in the compared image
    #[must_use]
    pub const fn total_pixels(&self) -> u64 {
        self.total_pixels
    }

    /// Number of failed pixels
    #[must_use]
    pub const fn failed_count(&self) -> u64 {
        self.failed_count
    }

    /// No pixel failed
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.failed_count == 0
    }

    /// Ratio of matching pixels, `1 - failed/total`. An empty image is fully confident.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        if self.total_pixels == 0 {
            return 1.0;
        }
        1.0 - self.failed_count as f64 / self.total_pixels as f64
    }

    /// Failed rows of one column
    #[must_use]
    pub fn column(&self, x: u32) -> Option<&BTreeSet<u32>> {
        self.failed.get(&x)
    }

    /// Columns containing at least one failure, with their rows
    pub fn columns(&self) -> impl Iterator<Item = (u32, &BTreeSet<u32>)> {
        self.failed.iter().map(|(x, rows)| (*x, rows))
    }

    /// Failed columns with `lo <= x <= hi`
    pub fn columns_between(&self, lo: u32, hi: u32) -> impl Iterator<Item = (u32, &BTreeSet<u32>)> {
        self.failed.range(lo..=hi).map(|(x, rows)| (*x, rows))
    }

    /// Column indices containing at least one failure
    #[must_use]
    pub fn column_indices(&self) -> Vec<u32> {
        self.failed.keys().copied().collect()
    }

    /// Every failed coordinate, column-major
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.failed
            .iter()
            .flat_map(|(x, rows)| rows.iter().map(move |y| (*x, *y)))
    }

    /// Smallest rectangle `(min_x, min_y, max_x, max_y)` covering every failure
    #[must_use]
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let min_x = *self.failed.keys().next()?;
        let max_x = *self.failed.keys().next_back()?;
        let mut min_y = u32::MAX;
        let mut max_y = 0;
        for rows in self.failed.values() {
            if let (Some(first), Some(last)) = (rows.first(), rows.last()) {
                min_y = min_y.min(*first);
                max_y = max_y.max(*last);
            }
        }
        Some((min_x, min_y, max_x, max_y))
    }

    /// Count recorded failures in the `(2r+1)x(2r+1)` square centred on `(x, y)`, centre included
    #[must_use]
    pub fn count_neighbourhood(&self, x: u32, y: u32, radius: u32) -> u32 {
        let y_lo = y.saturating_sub(radius);
        let y_hi = y.saturating_add(radius);
        let x_lo = x.saturating_sub(radius);
        let x_hi = x.saturating_add(radius);
        self.failed
            .range(x_lo..=x_hi)
            .map(|(_, rows)| rows.range(y_lo..=y_hi).count() as u32)
            .sum()
    }
}

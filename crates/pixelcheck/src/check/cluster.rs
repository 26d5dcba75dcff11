//! Tolerance of isolated failing pixels.
//!
//! A failing pixel belongs to a cluster when its 3x3 or its 5x5
//! neighbourhood (centre included) holds more failures than allowed.
//! Either radius alone is enough.

use super::{Check, CheckResult, CheckType, Comparison};
use crate::config::{ClusterConfig, ClusterSource};
use crate::diff::{AlternativeDiff, PropertyValue};
use crate::hint_mask::HintMaskHelper;
use crate::raster::RasterImage;
use crate::result::PixelCheckResult;
use crate::summary::PixelSummary;
use image::Rgba;
use rayon::prelude::*;
use std::collections::BTreeSet;

/// Colour of a clustered pixel in the review image
pub const CLUSTER_COLOR: Rgba<u8> = Rgba([255, 128, 0, 255]);

fn is_clustered(summary: &PixelSummary, x: u32, y: u32, max_9: u32, max_25: u32) -> bool {
    summary.count_neighbourhood(x, y, 1) > max_9 || summary.count_neighbourhood(x, y, 2) > max_25
}

/// Whether any failing pixel is part of a cluster
#[must_use]
pub fn has_clusters(summary: &PixelSummary, max_9: u32, max_25: u32) -> bool {
    summary.column_indices().into_par_iter().any(|x| {
        summary
            .column(x)
            .is_some_and(|rows| rows.iter().any(|&y| is_clustered(summary, x, y, max_9, max_25)))
    })
}

/// Clustered pixels and their rendering
#[derive(Debug, Clone)]
pub struct ClusterScan {
    /// Pixels that are part of a cluster
    pub summary: PixelSummary,
    /// Clustered pixels painted on a transparent canvas
    pub image: RasterImage,
}

/// Enumerate every clustered pixel, one column per task
#[must_use]
pub fn get_clusters(summary: &PixelSummary, max_9: u32, max_25: u32, width: u32, height: u32) -> ClusterScan {
    let columns: Vec<(u32, BTreeSet<u32>)> = summary
        .column_indices()
        .into_par_iter()
        .map(|x| {
            let rows = summary
                .column(x)
                .map(|rows| {
                    rows.iter()
                        .copied()
                        .filter(|&y| is_clustered(summary, x, y, max_9, max_25))
                        .collect()
                })
                .unwrap_or_default();
            (x, rows)
        })
        .collect();
    let clusters = PixelSummary::from_columns(summary.total_pixels(), columns);
    let mut image = RasterImage::new(width, height);
    for (x, y) in clusters.pixels() {
        if x < width && y < height {
            image.put_pixel(x, y, CLUSTER_COLOR);
        }
    }
    ClusterScan {
        summary: clusters,
        image,
    }
}

/// Passes when every remaining failure is isolated
#[derive(Debug, Clone)]
pub struct ClusterCheck {
    max_9: u32,
    max_25: u32,
    source: ClusterSource,
    hints: HintMaskHelper,
}

impl ClusterCheck {
    /// Create a cluster check
    #[must_use]
    pub const fn new(config: &ClusterConfig, hints: HintMaskHelper) -> Self {
        Self {
            max_9: config.max_cluster_9,
            max_25: config.max_cluster_25,
            source: config.source,
            hints,
        }
    }

    const fn source_type(&self) -> CheckType {
        match self.source {
            ClusterSource::Fuzzy => CheckType::Fuzzy,
            ClusterSource::Strict => CheckType::Strict,
        }
    }

    fn source_summary(&self, comparison: &Comparison) -> Option<std::sync::Arc<PixelSummary>> {
        match self.source {
            ClusterSource::Fuzzy => comparison.fuzzy_summary().cloned(),
            ClusterSource::Strict => comparison.strict_summary().cloned(),
        }
    }
}

impl Check for ClusterCheck {
    fn check_type(&self) -> CheckType {
        CheckType::Cluster
    }

    fn dependencies(&self) -> Vec<CheckType> {
        let mut deps = CheckType::Cluster.base_dependencies().to_vec();
        deps.push(self.source_type());
        deps
    }

    fn run(&self, result: &mut CheckResult) -> bool {
        self.source_summary(&result.comparison)
            .is_some_and(|summary| !has_clusters(&summary, self.max_9, self.max_25))
    }

    fn diff(&self, diff: &mut AlternativeDiff) -> PixelCheckResult<bool> {
        let kind = CheckType::Cluster;
        let (Some(summary), Some(current)) =
            (self.source_summary(&diff.comparison), diff.comparison.current.clone())
        else {
            diff.log(format!("cluster scan needs a {} summary", self.source_type()));
            return Ok(false);
        };
        let (width, height) = current.dimensions();
        let scan = get_clusters(&summary, self.max_9, self.max_25, width, height);
        diff.set_property(kind, "clustered_pixels", PropertyValue::Number(scan.summary.failed_count() as f64));
        diff.set_hint(kind, self.hints.render(&scan.summary, width, height));
        let passed = scan.summary.is_empty();
        diff.set_image(kind, scan.image);
        Ok(passed)
    }
}

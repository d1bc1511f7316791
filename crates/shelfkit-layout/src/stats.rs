#![forbid(unsafe_code)]

//! Aggregate statistics computed on demand from the model.
//!
//! Nothing here is cached; recompute after each committed change.

use serde::{Deserialize, Serialize};
use shelfkit_core::id::SegmentId;

use crate::model::LayoutModel;

/// Width usage of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentUtilization {
    pub segment_id: SegmentId,
    pub level: i32,
    pub used_width: f64,
    pub available_width: f64,
    /// `used_width / shelf.width * 100`.
    pub utilization: f64,
}

/// Shelf-wide placement statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShelfStatistics {
    pub total_placements: usize,
    pub total_faces: u64,
    pub own_products: usize,
    pub competitor_products: usize,
    /// Mean of per-segment utilization percentages; 0 without segments.
    pub average_utilization: f64,
    pub segments: Vec<SegmentUtilization>,
}

impl ShelfStatistics {
    #[must_use]
    pub fn compute(model: &LayoutModel) -> Self {
        let shelf_width = model.shelf().width;
        let segments: Vec<SegmentUtilization> = model
            .segments()
            .iter()
            .map(|segment| {
                let used_width = segment.used_width();
                SegmentUtilization {
                    segment_id: segment.id,
                    level: segment.level,
                    used_width,
                    available_width: shelf_width - used_width,
                    utilization: used_width / shelf_width * 100.0,
                }
            })
            .collect();

        let mut stats = Self {
            average_utilization: if segments.is_empty() {
                0.0
            } else {
                segments.iter().map(|s| s.utilization).sum::<f64>() / segments.len() as f64
            },
            segments,
            ..Self::default()
        };
        for placement in model.placements() {
            stats.total_placements += 1;
            stats.total_faces += u64::from(placement.face_count);
            if placement.product.is_own {
                stats.own_products += 1;
            } else {
                stats.competitor_products += 1;
            }
        }
        stats
    }

    /// Own-product share of all placements, in percent.
    #[must_use]
    pub fn own_share(&self) -> f64 {
        if self.total_placements == 0 {
            0.0
        } else {
            self.own_products as f64 / self.total_placements as f64 * 100.0
        }
    }
}

/// Height summary across all segments.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentHeightSummary {
    pub count: usize,
    pub total_height: f64,
    pub average_height: f64,
    pub min_height: f64,
    pub max_height: f64,
}

impl SegmentHeightSummary {
    #[must_use]
    pub fn compute(model: &LayoutModel) -> Self {
        let heights: Vec<f64> = model.segments().iter().map(|s| s.height).collect();
        if heights.is_empty() {
            return Self::default();
        }
        let total_height: f64 = heights.iter().sum();
        Self {
            count: heights.len(),
            total_height,
            average_height: total_height / heights.len() as f64,
            min_height: heights.iter().copied().fold(f64::INFINITY, f64::min),
            max_height: heights.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

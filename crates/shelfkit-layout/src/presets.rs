#![forbid(unsafe_code)]

//! Segment height presets and content-driven height optimization.
//!
//! Both produce a list of `(segment, height)` changes for the caller to stage
//! and validate; neither touches the model.

use serde::{Deserialize, Serialize};
use shelfkit_core::id::SegmentId;

use crate::model::LayoutModel;

/// Named height layouts, applied bottom-up by level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightPreset {
    /// Every segment 30 cm.
    Uniform,
    /// Every segment 40 cm.
    Tall,
    /// 25/30/35/40 cm, repeating the last value.
    Mixed,
    /// 20/25/30/35 cm, repeating the last value.
    Grocery,
}

impl HeightPreset {
    pub const ALL: [Self; 4] = [Self::Uniform, Self::Tall, Self::Mixed, Self::Grocery];

    fn pattern(self) -> &'static [f64] {
        match self {
            Self::Uniform => &[30.0],
            Self::Tall => &[40.0],
            Self::Mixed => &[25.0, 30.0, 35.0, 40.0],
            Self::Grocery => &[20.0, 25.0, 30.0, 35.0],
        }
    }

    /// Height for the `index`-th segment counted from the lowest level.
    #[must_use]
    pub fn height_for(self, index: usize) -> f64 {
        let pattern = self.pattern();
        pattern[index.min(pattern.len() - 1)]
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Tall => "tall",
            Self::Mixed => "mixed",
            Self::Grocery => "grocery",
        }
    }
}

/// Preset heights for every segment, lowest level first.
#[must_use]
pub fn preset_heights(model: &LayoutModel, preset: HeightPreset) -> Vec<(SegmentId, f64)> {
    model
        .segments()
        .iter()
        .enumerate()
        .map(|(index, segment)| (segment.id, preset.height_for(index)))
        .collect()
}

/// Shrink-to-fit heights: `max(floor, tallest product + headroom)`.
///
/// Empty segments are left alone. Only segments whose height would change
/// are returned.
#[must_use]
pub fn optimize_heights(model: &LayoutModel, headroom: f64, floor: f64) -> Vec<(SegmentId, f64)> {
    let (min, max) = (
        model.config().min_segment_height,
        model.config().max_segment_height,
    );
    model
        .segments()
        .iter()
        .filter_map(|segment| {
            let tallest = segment.max_product_height()?;
            let wanted = (tallest + headroom).max(floor).max(min).min(max);
            (wanted != segment.height).then_some((segment.id, wanted))
        })
        .collect()
}

#![forbid(unsafe_code)]

//! Stateless validation producing reports instead of errors.
//!
//! The interaction layer asks for a [`ValidationReport`] on every pointer
//! move (live feedback) and once more before committing. A rejected proposal
//! is an ordinary outcome here, so the engine only returns `Err` when an id
//! in the proposal does not resolve.

use serde::{Deserialize, Serialize};
use shelfkit_core::id::{PlacementId, SegmentId};

use crate::model::{LayoutModel, ModelError, ProductSpec, Violation};

/// A placement as it would look after a create/move/resize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementProposal {
    pub segment_id: SegmentId,
    pub product: ProductSpec,
    pub x_position: f64,
    pub face_count: u32,
    /// The placement being edited; excluded from overlap checks.
    #[serde(default)]
    pub exclude: Option<PlacementId>,
}

impl PlacementProposal {
    #[must_use]
    pub fn new(segment_id: SegmentId, product: ProductSpec, x_position: f64, face_count: u32) -> Self {
        Self {
            segment_id,
            product,
            x_position,
            face_count,
            exclude: None,
        }
    }

    #[must_use]
    pub fn excluding(mut self, id: PlacementId) -> Self {
        self.exclude = Some(id);
        self
    }
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationReport {
    pub valid: bool,
    /// Human-readable reasons, one per violation.
    pub errors: Vec<String>,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    #[must_use]
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            valid: violations.is_empty(),
            errors: violations.iter().map(ToString::to_string).collect(),
            violations,
        }
    }

    #[must_use]
    pub fn ok() -> Self {
        Self::from_violations(Vec::new())
    }
}

/// Validation queries over a [`LayoutModel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationEngine;

impl ValidationEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Check a proposed placement: bounds, overlap, height, and face limits.
    pub fn validate_placement(
        &self,
        model: &LayoutModel,
        proposal: &PlacementProposal,
    ) -> Result<ValidationReport, ModelError> {
        let violations = model.check_placement(
            proposal.segment_id,
            proposal.x_position,
            &proposal.product,
            proposal.face_count,
            proposal.exclude,
        )?;
        Ok(ValidationReport::from_violations(violations))
    }

    /// Check a proposed segment height against bounds and current contents.
    pub fn validate_segment_height(
        &self,
        model: &LayoutModel,
        segment_id: SegmentId,
        height: f64,
    ) -> Result<ValidationReport, ModelError> {
        Ok(ValidationReport::from_violations(
            model.check_segment_height(segment_id, height)?,
        ))
    }

    /// Validate several height changes against the current model.
    ///
    /// Each change is checked in isolation; the report aggregates every
    /// violation across all of them.
    pub fn validate_height_changes(
        &self,
        model: &LayoutModel,
        changes: &[(SegmentId, f64)],
    ) -> Result<ValidationReport, ModelError> {
        let mut violations = Vec::new();
        for &(segment_id, height) in changes {
            violations.extend(model.check_segment_height(segment_id, height)?);
        }
        Ok(ValidationReport::from_violations(violations))
    }
}

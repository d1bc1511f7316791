#![forbid(unsafe_code)]

//! Shelf edits as reversible commands over a [`LayoutModel`].
//!
//! Each variant carries values captured when the edit was confirmed: the full
//! created/deleted placement, both states of an update, both heights of a
//! resize. Undo never reads the model to work out what to restore.

use shelfkit_core::id::{PlacementId, SegmentId};
use shelfkit_layout::{LayoutModel, Placement, PlacementState};

use super::command::{CommandMetadata, CommandResult, CommandSource, UndoableCmd};

/// The edit a [`ShelfCommand`] performs.
#[derive(Debug, Clone, PartialEq)]
pub enum ShelfEdit {
    CreatePlacement {
        placement: Placement,
    },
    UpdatePlacement {
        before: PlacementState,
        after: PlacementState,
    },
    DeletePlacement {
        placement: Placement,
    },
    ResizeSegment {
        segment_id: SegmentId,
        before: f64,
        after: f64,
    },
    CreateSegment {
        segment_id: SegmentId,
        level: i32,
        height: f64,
    },
    DeleteSegment {
        segment_id: SegmentId,
        level: i32,
        height: f64,
    },
}

impl ShelfEdit {
    fn default_description(&self) -> &'static str {
        match self {
            Self::CreatePlacement { .. } => "Add product",
            Self::UpdatePlacement { before, after } => {
                if before.face_count != after.face_count
                    && before.x_position == after.x_position
                    && before.segment_id == after.segment_id
                {
                    "Change faces"
                } else {
                    "Move product"
                }
            }
            Self::DeletePlacement { .. } => "Delete product",
            Self::ResizeSegment { .. } => "Resize segment",
            Self::CreateSegment { .. } => "Add segment",
            Self::DeleteSegment { .. } => "Delete segment",
        }
    }

    /// Placement touched by this edit, if any.
    #[must_use]
    pub fn placement_id(&self) -> Option<PlacementId> {
        match self {
            Self::CreatePlacement { placement } | Self::DeletePlacement { placement } => {
                Some(placement.id)
            }
            Self::UpdatePlacement { after, .. } => Some(after.id),
            _ => None,
        }
    }
}

/// One confirmed shelf edit recorded in history.
#[derive(Debug, Clone)]
pub struct ShelfCommand {
    edit: ShelfEdit,
    metadata: CommandMetadata,
}

impl ShelfCommand {
    #[must_use]
    pub fn new(edit: ShelfEdit) -> Self {
        let metadata = CommandMetadata::new(edit.default_description());
        Self { edit, metadata }
    }

    #[must_use]
    pub fn create_placement(placement: Placement) -> Self {
        Self::new(ShelfEdit::CreatePlacement { placement })
    }

    #[must_use]
    pub fn update_placement(before: PlacementState, after: PlacementState) -> Self {
        Self::new(ShelfEdit::UpdatePlacement { before, after })
    }

    #[must_use]
    pub fn delete_placement(placement: Placement) -> Self {
        Self::new(ShelfEdit::DeletePlacement { placement })
    }

    #[must_use]
    pub fn resize_segment(segment_id: SegmentId, before: f64, after: f64) -> Self {
        Self::new(ShelfEdit::ResizeSegment {
            segment_id,
            before,
            after,
        })
    }

    #[must_use]
    pub fn create_segment(segment_id: SegmentId, level: i32, height: f64) -> Self {
        Self::new(ShelfEdit::CreateSegment {
            segment_id,
            level,
            height,
        })
    }

    #[must_use]
    pub fn delete_segment(segment_id: SegmentId, level: i32, height: f64) -> Self {
        Self::new(ShelfEdit::DeleteSegment {
            segment_id,
            level,
            height,
        })
    }

    #[must_use]
    pub fn with_source(mut self, source: CommandSource) -> Self {
        self.metadata.source = source;
        self
    }

    #[must_use]
    pub fn with_batch(mut self, batch_id: u64) -> Self {
        self.metadata.batch_id = Some(batch_id);
        self
    }

    #[must_use]
    pub fn edit(&self) -> &ShelfEdit {
        &self.edit
    }
}

impl UndoableCmd<LayoutModel> for ShelfCommand {
    fn execute(&mut self, model: &mut LayoutModel) -> CommandResult {
        match &self.edit {
            ShelfEdit::CreatePlacement { placement } => model.insert_placement(placement.clone())?,
            ShelfEdit::UpdatePlacement { after, .. } => {
                model.apply_placement_state(*after)?;
            }
            ShelfEdit::DeletePlacement { placement } => {
                model.remove_placement(placement.id)?;
            }
            ShelfEdit::ResizeSegment {
                segment_id, after, ..
            } => {
                model.resize_segment(*segment_id, *after)?;
            }
            ShelfEdit::CreateSegment {
                segment_id,
                level,
                height,
            } => model.insert_segment(*segment_id, *level, *height)?,
            ShelfEdit::DeleteSegment { segment_id, .. } => {
                model.remove_segment(*segment_id)?;
            }
        }
        Ok(())
    }

    fn undo(&mut self, model: &mut LayoutModel) -> CommandResult {
        match &self.edit {
            ShelfEdit::CreatePlacement { placement } => {
                model.remove_placement(placement.id)?;
            }
            ShelfEdit::UpdatePlacement { before, .. } => {
                model.apply_placement_state(*before)?;
            }
            ShelfEdit::DeletePlacement { placement } => model.insert_placement(placement.clone())?,
            ShelfEdit::ResizeSegment {
                segment_id, before, ..
            } => {
                model.resize_segment(*segment_id, *before)?;
            }
            ShelfEdit::CreateSegment { segment_id, .. } => {
                model.remove_segment(*segment_id)?;
            }
            ShelfEdit::DeleteSegment {
                segment_id,
                level,
                height,
            } => model.insert_segment(*segment_id, *level, *height)?,
        }
        Ok(())
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.metadata.size_bytes()
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn debug_name(&self) -> &'static str {
        "ShelfCommand"
    }
}

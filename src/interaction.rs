//! Tools and the pointer state machine.
//!
//! ```text
//!            pointer_down                 pointer_move          pointer_up
//! Idle ──┬── brush/eraser ──► DrawingStroke ───► (extend) ───► Idle (1 undo entry)
//!        ├── select/lasso ──► DraggingSelection ► (grow) ─────► Idle
//!        ├── transform+hit ─► DraggingHandle ──► (preview) ───► Idle (commit)
//!        └── move ──────────► MovingLayer ─────► (offset) ────► Idle (1 undo entry)
//! ```
//!
//! Switching tools while a gesture is live ends it exactly as a release
//! would.

use serde::{Deserialize, Serialize};

use crate::canvas::{LayerId, Placement};
use crate::history::UndoEntry;
use crate::ops::stroke::{StrokeMode, StrokeSession};
use crate::ops::transform::{self, Handle};
use crate::selection::Point;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    Move,
    Select,
    Lasso,
    Transform,
    Eyedropper,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Brush,
            Tool::Eraser,
            Tool::Move,
            Tool::Select,
            Tool::Lasso,
            Tool::Transform,
            Tool::Eyedropper,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Brush => "brush",
            Tool::Eraser => "eraser",
            Tool::Move => "move",
            Tool::Select => "select",
            Tool::Lasso => "lasso",
            Tool::Transform => "transform",
            Tool::Eyedropper => "eyedropper",
        }
    }

    pub fn stroke_mode(&self) -> Option<StrokeMode> {
        match self {
            Tool::Brush => Some(StrokeMode::Paint),
            Tool::Eraser => Some(StrokeMode::Erase),
            _ => None,
        }
    }
}

/// Held modifier keys. `shift` locks the aspect ratio while dragging a
/// transform handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false };
    pub const SHIFT: Modifiers = Modifiers { shift: true };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    Rect,
    Polygon,
}

/// A live handle drag.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformDrag {
    pub layer: LayerId,
    pub handle: Handle,
    pub start_rect: Placement,
    pub start_point: Point,
    pub preview: Placement,
}

impl TransformDrag {
    pub fn new(layer: LayerId, handle: Handle, start_rect: Placement, start_point: Point) -> Self {
        Self {
            layer,
            handle,
            start_rect,
            start_point,
            preview: start_rect,
        }
    }

    pub fn update(&mut self, p: Point, mods: Modifiers) {
        self.preview = transform::drag_rect(
            self.start_rect,
            self.handle,
            p.x - self.start_point.x,
            p.y - self.start_point.y,
            mods.shift,
        );
    }
}

/// A live move-tool drag.
pub struct LayerMove {
    pub layer: LayerId,
    pub start_point: Point,
    pub start_x: i32,
    pub start_y: i32,
    pub snapshot: UndoEntry,
}

impl LayerMove {
    /// Offset for the pointer at `p`: start offset plus the rounded delta.
    pub fn offset_at(&self, p: Point) -> (i32, i32) {
        (
            self.start_x + (p.x - self.start_point.x).round() as i32,
            self.start_y + (p.y - self.start_point.y).round() as i32,
        )
    }
}

#[derive(Default)]
pub enum InteractionState {
    #[default]
    Idle,
    DrawingStroke(StrokeSession),
    DraggingSelection { kind: SelectionKind, start: Point },
    DraggingHandle(TransformDrag),
    MovingLayer(LayerMove),
}

impl InteractionState {
    pub fn name(&self) -> &'static str {
        match self {
            InteractionState::Idle => "idle",
            InteractionState::DrawingStroke(_) => "drawing-stroke",
            InteractionState::DraggingSelection { .. } => "dragging-selection",
            InteractionState::DraggingHandle(_) => "dragging-handle",
            InteractionState::MovingLayer(_) => "moving-layer",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }
}

impl std::fmt::Debug for InteractionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

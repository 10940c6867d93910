use std::collections::VecDeque;
use std::time::SystemTime;

use crate::canvas::{Layer, RasterBuffer};
use crate::error::EngineResult;

pub const DEFAULT_UNDO_CAPACITY: usize = 30;
pub const DEFAULT_LOG_CAPACITY: usize = 50;

// ============================================================================
// UNDO ENTRIES
// ============================================================================

/// Snapshot sufficient to restore a layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UndoEntry {
    /// Pixel contents only; dimensions and placement are unchanged by the
    /// operation it guards.
    Pixels(RasterBuffer),
    /// Buffer (and thereby dimensions) plus placement.
    Layer { pixels: RasterBuffer, x: i32, y: i32 },
}

impl UndoEntry {
    pub fn pixels(layer: &Layer) -> EngineResult<Self> {
        Ok(UndoEntry::Pixels(layer.pixels.try_clone()?))
    }

    pub fn layer(layer: &Layer) -> EngineResult<Self> {
        Ok(UndoEntry::Layer {
            pixels: layer.pixels.try_clone()?,
            x: layer.x,
            y: layer.y,
        })
    }

    /// Capture the layer's current state in the same shape as `self`.
    fn capture_like(&self, layer: &Layer) -> EngineResult<Self> {
        match self {
            UndoEntry::Pixels(_) => Self::pixels(layer),
            UndoEntry::Layer { .. } => Self::layer(layer),
        }
    }

    fn apply(self, layer: &mut Layer) {
        match self {
            UndoEntry::Pixels(pixels) => {
                if pixels.dimensions() == layer.pixels.dimensions() {
                    layer.pixels.as_raw_mut().copy_from_slice(pixels.as_raw());
                } else {
                    // Dimensions drifted since capture; a straight copy would
                    // tear, so take the snapshot wholesale.
                    layer.pixels = pixels;
                }
            }
            UndoEntry::Layer { pixels, x, y } => {
                layer.pixels = pixels;
                layer.x = x;
                layer.y = y;
            }
        }
    }

    pub fn byte_size(&self) -> usize {
        match self {
            UndoEntry::Pixels(p) | UndoEntry::Layer { pixels: p, .. } => p.as_raw().len(),
        }
    }
}

// ============================================================================
// PER-LAYER HISTORY
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UndoSlot {
    Stack,
    Fallback,
}

/// Bounded undo/redo stacks owned by one layer.
#[derive(Debug)]
pub struct LayerHistory {
    undo_stack: VecDeque<UndoEntry>,
    redo_stack: VecDeque<UndoEntry>,
    /// Most recently evicted undo entry; applied once when the stack runs dry.
    fallback: Option<UndoEntry>,
    capacity: usize,
}

impl Default for LayerHistory {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

impl LayerHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            fallback: None,
            capacity: capacity.max(1),
        }
    }

    /// Push a pre-mutation snapshot. Clears the redo stack.
    pub fn record(&mut self, entry: UndoEntry) {
        self.redo_stack.clear();
        self.undo_stack.push_back(entry);
        while self.undo_stack.len() > self.capacity {
            self.fallback = self.undo_stack.pop_front();
        }
    }

    fn push_redo(&mut self, entry: UndoEntry) {
        self.redo_stack.push_back(entry);
        while self.redo_stack.len() > self.capacity {
            self.redo_stack.pop_front();
        }
    }

    fn push_undo_keep_redo(&mut self, entry: UndoEntry) {
        self.undo_stack.push_back(entry);
        while self.undo_stack.len() > self.capacity {
            self.fallback = self.undo_stack.pop_front();
        }
    }

    /// Next entry to undo, tagged with the slot it was taken from.
    fn take_undo(&mut self) -> Option<(UndoEntry, UndoSlot)> {
        if let Some(entry) = self.undo_stack.pop_back() {
            return Some((entry, UndoSlot::Stack));
        }
        self.fallback.take().map(|entry| (entry, UndoSlot::Fallback))
    }

    /// Put back an entry from [`take_undo`](Self::take_undo) after a failed undo.
    fn restore_undo(&mut self, entry: UndoEntry, slot: UndoSlot) {
        match slot {
            UndoSlot::Stack => self.undo_stack.push_back(entry),
            UndoSlot::Fallback => self.fallback = Some(entry),
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || self.fallback.is_some()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.fallback = None;
    }

    pub fn memory_usage(&self) -> usize {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .chain(self.fallback.iter())
            .map(UndoEntry::byte_size)
            .sum()
    }
}

impl Layer {
    /// Record a pre-mutation snapshot on this layer's history.
    pub fn record(&mut self, entry: UndoEntry) {
        self.history.record(entry);
    }

    /// Step back one entry. `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self) -> EngineResult<bool> {
        let Some((entry, slot)) = self.history.take_undo() else {
            return Ok(false);
        };
        let current = match entry.capture_like(self) {
            Ok(c) => c,
            Err(e) => {
                self.history.restore_undo(entry, slot);
                return Err(e);
            }
        };
        self.history.push_redo(current);
        entry.apply(self);
        Ok(true)
    }

    /// Re-apply the most recently undone entry. `Ok(false)` when the redo
    /// stack is empty.
    pub fn redo(&mut self) -> EngineResult<bool> {
        let Some(entry) = self.history.redo_stack.pop_back() else {
            return Ok(false);
        };
        let current = match entry.capture_like(self) {
            Ok(c) => c,
            Err(e) => {
                self.history.redo_stack.push_back(entry);
                return Err(e);
            }
        };
        self.history.push_undo_keep_redo(current);
        entry.apply(self);
        Ok(true)
    }
}

// ============================================================================
// HISTORY LOG
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub id: u64,
    pub label: String,
    pub timestamp: SystemTime,
}

/// Capped, append-only list of human-readable action labels. Purely
/// observational; nothing in the engine reads it back.
#[derive(Debug)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    next_id: u64,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl HistoryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    pub fn push(&mut self, label: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back(HistoryEntry {
            id,
            label: label.into(),
            timestamp: SystemTime::now(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        id
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.label.clone()).collect()
    }
}

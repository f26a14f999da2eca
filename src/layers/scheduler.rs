//! Pattern scheduling
//!
//! Pure bar-grid logic: toggling, auto-repeating and clearing a layer's
//! blocks while keeping them pairwise non-overlapping. Every operation works
//! on a copy of the block list and commits it in one step.

use std::fmt;

use log::debug;

use super::layer::Layer;
use super::pattern::PatternBlock;
use crate::error::{LoopdeckError, Result};

/// What a toggle did to a layer's pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternEdit {
    /// A new block was placed at the toggled bar
    Added(PatternBlock),
    /// The block covering the toggled bar was removed
    Removed(PatternBlock),
    /// A new block would have overlapped; nothing changed
    Blocked,
}

impl fmt::Display for PatternEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternEdit::Added(b) => write!(f, "added [{}, {})", b.start(), b.end()),
            PatternEdit::Removed(b) => write!(f, "removed [{}, {})", b.start(), b.end()),
            PatternEdit::Blocked => write!(f, "blocked"),
        }
    }
}

/// Grid-bounded pattern editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternScheduler {
    timeline_bars: u32,
}

impl Default for PatternScheduler {
    fn default() -> Self {
        Self::new(64)
    }
}

impl PatternScheduler {
    pub fn new(timeline_bars: u32) -> Self {
        Self { timeline_bars }
    }

    pub fn timeline_bars(&self) -> u32 {
        self.timeline_bars
    }

    /// Toggle bar `index` on `layer`
    ///
    /// A bar inside an existing block removes that whole block. Otherwise a
    /// block of the layer's natural length is placed at `index`, unless it
    /// would overlap an existing block, in which case nothing changes.
    ///
    /// # Errors
    /// * `InvalidBar` - if `index` lies beyond the timeline
    pub fn toggle_beat(&self, layer: &mut Layer, index: u32) -> Result<PatternEdit> {
        self.check_bar(index)?;

        let mut blocks = layer.pattern_blocks().to_vec();
        let edit = if let Some(pos) = blocks.iter().position(|b| b.contains(index)) {
            PatternEdit::Removed(blocks.remove(pos))
        } else {
            let candidate = PatternBlock::new(index, layer.length())?;
            if blocks.iter().any(|b| b.overlaps(&candidate)) {
                PatternEdit::Blocked
            } else {
                blocks.push(candidate);
                PatternEdit::Added(candidate)
            }
        };

        if edit != PatternEdit::Blocked {
            layer.set_pattern(blocks)?;
        }
        debug!("Layer {} toggle bar {}: {}", layer.id(), index, edit);
        Ok(edit)
    }

    /// Place the layer's loop every `interval` bars from `start_beat`
    ///
    /// Steps that would overlap an existing block are skipped; the cursor
    /// still advances. Returns the number of blocks inserted.
    ///
    /// # Errors
    /// * `InvalidInterval` - if `interval` is zero
    /// * `InvalidBar` - if `start_beat` lies beyond the timeline
    pub fn apply_auto_repeat(
        &self,
        layer: &mut Layer,
        start_beat: u32,
        interval: u32,
    ) -> Result<usize> {
        if interval == 0 {
            return Err(LoopdeckError::InvalidInterval);
        }
        self.check_bar(start_beat)?;

        let mut blocks = layer.pattern_blocks().to_vec();
        let mut inserted = 0;
        let mut cursor = start_beat;
        while cursor < self.timeline_bars {
            let candidate = PatternBlock::new(cursor, layer.length())?;
            if !blocks.iter().any(|b| b.overlaps(&candidate)) {
                blocks.push(candidate);
                inserted += 1;
            }
            cursor = match cursor.checked_add(interval) {
                Some(next) => next,
                None => break,
            };
        }

        layer.set_pattern(blocks)?;
        debug!(
            "Layer {} auto-repeat from {} every {}: {} blocks inserted",
            layer.id(),
            start_beat,
            interval,
            inserted
        );
        Ok(inserted)
    }

    /// Remove every block from `layer`, keeping its length
    pub fn reset_pattern(&self, layer: &mut Layer) {
        // An empty list cannot overlap
        let _ = layer.set_pattern(Vec::new());
        debug!("Layer {} pattern cleared", layer.id());
    }

    fn check_bar(&self, bar: u32) -> Result<()> {
        if bar >= self.timeline_bars {
            return Err(LoopdeckError::InvalidBar {
                bar,
                timeline_bars: self.timeline_bars,
            });
        }
        Ok(())
    }
}

//! Layer model
//!
//! A layer is one audio source (loop, recording or imported stem) together
//! with its placements on the bar grid.

use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use super::instrument::{instrument_style, InstrumentCategory, RECORDING_INSTRUMENT_CODE};
use super::pattern::{is_non_overlapping, PatternBlock};
use crate::error::{LoopdeckError, Result};

/// Session-local layer identity. Zero means "not yet added".
pub type LayerId = u32;

/// Source id carried by layers recorded on this device
pub const LOCAL_SOURCE_ID: i64 = -1;

/// Description given to microphone takes
pub const RECORDING_DESCRIPTION: &str = "Recording";

/// Beats per bar (fixed 4/4)
pub const BEATS_PER_BAR: f64 = 4.0;

/// One audio source and its placement pattern
///
/// Deserialization enforces the same invariants as the constructors: a
/// power-of-two length and pairwise non-overlapping blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LayerRepr")]
pub struct Layer {
    id: LayerId,
    /// Origin layer id from import, or -1 for local recordings
    pub source_id: i64,
    pub name: String,
    pub description: String,
    pub category: InstrumentCategory,
    pub instrument_type: u32,
    /// Display tag, carried through untouched
    pub color_hex: String,
    length: u32,
    /// Native tempo of the audio; `None` follows the project BPM
    pub bpm: Option<f32>,
    pub volume: f32,
    pub wav_path: PathBuf,
    pattern_blocks: Vec<PatternBlock>,
}

#[derive(Deserialize)]
struct LayerRepr {
    id: LayerId,
    source_id: i64,
    name: String,
    description: String,
    category: InstrumentCategory,
    instrument_type: u32,
    color_hex: String,
    length: u32,
    bpm: Option<f32>,
    volume: f32,
    wav_path: PathBuf,
    pattern_blocks: Vec<PatternBlock>,
}

impl TryFrom<LayerRepr> for Layer {
    type Error = LoopdeckError;

    fn try_from(repr: LayerRepr) -> Result<Self> {
        let mut layer = Layer::new(repr.name, repr.instrument_type, repr.length, repr.wav_path)?;
        layer.set_pattern(repr.pattern_blocks)?;
        layer.id = repr.id;
        layer.source_id = repr.source_id;
        layer.description = repr.description;
        layer.category = repr.category;
        layer.color_hex = repr.color_hex;
        layer.bpm = repr.bpm;
        layer.volume = repr.volume;
        Ok(layer)
    }
}

impl Layer {
    /// Create a layer with an empty pattern
    ///
    /// Category and color are derived from `instrument_type`.
    ///
    /// # Errors
    /// * `InvalidBlock` - if `length` is not a power of two
    pub fn new(
        name: impl Into<String>,
        instrument_type: u32,
        length: u32,
        wav_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        if !length.is_power_of_two() {
            return Err(LoopdeckError::InvalidBlock {
                reason: format!("loop length {} is not a power of two", length),
            });
        }
        let style = instrument_style(instrument_type);
        Ok(Self {
            id: 0,
            source_id: LOCAL_SOURCE_ID,
            name: name.into(),
            description: String::new(),
            category: style.category,
            instrument_type,
            color_hex: style.color_hex.to_string(),
            length,
            bpm: None,
            volume: 1.0,
            wav_path: wav_path.into(),
            pattern_blocks: Vec::new(),
        })
    }

    /// Wrap a finished microphone take as a layer with one block at bar 0
    pub fn from_recording(
        name: impl Into<String>,
        wav_path: &Path,
        duration_ms: u64,
        project_bpm: f32,
        max_loop_bars: u32,
    ) -> Result<Self> {
        let length = bars_from_duration(duration_ms, project_bpm, max_loop_bars);
        let mut layer = Layer::new(name, RECORDING_INSTRUMENT_CODE, length, wav_path)?;
        layer.description = RECORDING_DESCRIPTION.to_string();
        layer.pattern_blocks = vec![PatternBlock::new(0, length)?];
        Ok(layer)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_source_id(mut self, source_id: i64) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn with_bpm(mut self, bpm: Option<f32>) -> Self {
        self.bpm = bpm;
        self
    }

    /// Replace the pattern wholesale
    ///
    /// # Errors
    /// * `InvalidBlock` - if any two blocks overlap
    pub fn with_pattern(mut self, blocks: Vec<PatternBlock>) -> Result<Self> {
        self.set_pattern(blocks)?;
        Ok(self)
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: LayerId) {
        self.id = id;
    }

    /// Natural loop length in bars (always a power of two)
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn pattern_blocks(&self) -> &[PatternBlock] {
        &self.pattern_blocks
    }

    pub fn has_pattern(&self) -> bool {
        !self.pattern_blocks.is_empty()
    }

    pub(crate) fn set_pattern(&mut self, blocks: Vec<PatternBlock>) -> Result<()> {
        if !is_non_overlapping(&blocks) {
            return Err(LoopdeckError::InvalidBlock {
                reason: "pattern blocks overlap".to_string(),
            });
        }
        self.pattern_blocks = blocks;
        Ok(())
    }

    /// Start bars of every block, in pattern order
    pub fn block_starts(&self) -> Vec<u32> {
        self.pattern_blocks.iter().map(|b| b.start()).collect()
    }

    /// Per-bar occupancy on a grid of `timeline_bars`, blocks clipped to the grid
    pub fn beat_pattern(&self, timeline_bars: u32) -> Vec<bool> {
        let mut bars = vec![false; timeline_bars as usize];
        for block in &self.pattern_blocks {
            for bar in block.start()..block.end().min(timeline_bars) {
                bars[bar as usize] = true;
            }
        }
        bars
    }

    /// Tempo of the underlying audio, falling back to the project tempo
    pub fn effective_bpm(&self, project_bpm: f32) -> f32 {
        self.bpm.unwrap_or(project_bpm)
    }

    /// Rate at which the engine must play this layer to match the project tempo
    pub fn playback_rate(&self, project_bpm: f32) -> f32 {
        project_bpm / self.effective_bpm(project_bpm)
    }
}

/// Round a bar count up to the nearest power of two, capped at `max_bars`
///
/// Anything at or below one bar becomes one bar.
pub fn round_up_to_power_of_two(bars: f64, max_bars: u32) -> u32 {
    let cap = max_bars.max(1);
    if !(bars > 1.0) {
        return 1;
    }
    let mut length = 1u32;
    while (length as f64) < bars && length < cap {
        length *= 2;
    }
    length.min(cap)
}

/// Natural loop length in bars for audio of `duration_ms` at `bpm`
pub fn bars_from_duration(duration_ms: u64, bpm: f32, max_bars: u32) -> u32 {
    let beat_ms = 60_000.0 / bpm as f64;
    let bar_ms = beat_ms * BEATS_PER_BAR;
    round_up_to_power_of_two(duration_ms as f64 / bar_ms, max_bars)
}

/// Build a pattern from server-provided start bars
///
/// Each hint becomes a block of `length` bars. Hints that would overlap an
/// earlier block are dropped. No hints yields a single block at bar 0.
pub fn pattern_from_hints(hints: Option<&[u32]>, length: u32) -> Result<Vec<PatternBlock>> {
    let hints = match hints {
        Some(h) if !h.is_empty() => h,
        _ => return Ok(vec![PatternBlock::new(0, length)?]),
    };

    let mut blocks: Vec<PatternBlock> = Vec::with_capacity(hints.len());
    for &start in hints {
        let candidate = PatternBlock::new(start, length)?;
        if blocks.iter().any(|b| b.overlaps(&candidate)) {
            warn!("Dropping overlapping bar hint {} (length {})", start, length);
            continue;
        }
        blocks.push(candidate);
    }
    Ok(blocks)
}

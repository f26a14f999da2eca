//! Layer Model Module
//!
//! Layers, their bar-grid placements and the logic that edits them:
//! - Pattern blocks and the non-overlap rule
//! - Layer model and bar-length quantization
//! - Instrument lookup table
//! - Pattern scheduler
//! - Layer lifecycle manager

mod instrument;
mod layer;
mod manager;
mod pattern;
mod scheduler;

pub use instrument::{
    instrument_style, InstrumentCategory, InstrumentStyle, RECORDING_INSTRUMENT_CODE,
};
pub use layer::{
    bars_from_duration, pattern_from_hints, round_up_to_power_of_two, Layer, LayerId,
    BEATS_PER_BAR, LOCAL_SOURCE_ID, RECORDING_DESCRIPTION,
};
pub use manager::{IdSequence, LayerLifecycleManager, ProjectSnapshot};
pub use pattern::{is_non_overlapping, PatternBlock};
pub use scheduler::{PatternEdit, PatternScheduler};

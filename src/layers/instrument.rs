//! Instrument-type lookup
//!
//! Maps the backend's numeric instrument codes to a category and a display
//! color. The table is kept apart from the layer model so sequencing logic
//! never depends on presentation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Instrument code used for microphone recordings
pub const RECORDING_INSTRUMENT_CODE: u32 = 0;

/// Instrument category derived from an instrument code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentCategory {
    Record,
    Whistle,
    AcousticGuitar,
    Voice,
    Drums,
    Bass,
    ElectricGuitar,
    Piano,
    Synth,
    Unknown,
}

impl fmt::Display for InstrumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstrumentCategory::Record => "Record",
            InstrumentCategory::Whistle => "Whistle",
            InstrumentCategory::AcousticGuitar => "Acoustic Guitar",
            InstrumentCategory::Voice => "Voice",
            InstrumentCategory::Drums => "Drums",
            InstrumentCategory::Bass => "Bass",
            InstrumentCategory::ElectricGuitar => "Electric Guitar",
            InstrumentCategory::Piano => "Piano",
            InstrumentCategory::Synth => "Synth",
            InstrumentCategory::Unknown => "Unknown",
        };
        write!(f, "{}", label)
    }
}

/// Category plus display color for one instrument code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentStyle {
    pub category: InstrumentCategory,
    pub color_hex: &'static str,
}

const UNKNOWN_STYLE: InstrumentStyle = InstrumentStyle {
    category: InstrumentCategory::Unknown,
    color_hex: "#7A7A7A",
};

const STYLES: [InstrumentStyle; 9] = [
    InstrumentStyle {
        category: InstrumentCategory::Record,
        color_hex: "#7A7A7A",
    },
    InstrumentStyle {
        category: InstrumentCategory::Whistle,
        color_hex: "#B7A700",
    },
    InstrumentStyle {
        category: InstrumentCategory::AcousticGuitar,
        color_hex: "#5F7320",
    },
    InstrumentStyle {
        category: InstrumentCategory::Voice,
        color_hex: "#D14400",
    },
    InstrumentStyle {
        category: InstrumentCategory::Drums,
        color_hex: "#E67E00",
    },
    InstrumentStyle {
        category: InstrumentCategory::Bass,
        color_hex: "#5D1070",
    },
    InstrumentStyle {
        category: InstrumentCategory::ElectricGuitar,
        color_hex: "#144D9A",
    },
    InstrumentStyle {
        category: InstrumentCategory::Piano,
        color_hex: "#2A2D72",
    },
    InstrumentStyle {
        category: InstrumentCategory::Synth,
        color_hex: "#2C6D2B",
    },
];

/// Look up the category and color for an instrument code
pub fn instrument_style(code: u32) -> InstrumentStyle {
    STYLES.get(code as usize).copied().unwrap_or(UNKNOWN_STYLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, InstrumentCategory::Record, "#7A7A7A")]
    #[test_case(4, InstrumentCategory::Drums, "#E67E00")]
    #[test_case(8, InstrumentCategory::Synth, "#2C6D2B")]
    #[test_case(9, InstrumentCategory::Unknown, "#7A7A7A")]
    #[test_case(1129, InstrumentCategory::Unknown, "#7A7A7A")]
    fn test_lookup(code: u32, category: InstrumentCategory, color: &str) {
        let style = instrument_style(code);
        assert_eq!(style.category, category);
        assert_eq!(style.color_hex, color);
    }

    #[test]
    fn test_recording_code_maps_to_record() {
        assert_eq!(
            instrument_style(RECORDING_INSTRUMENT_CODE).category,
            InstrumentCategory::Record
        );
        assert_eq!(InstrumentCategory::ElectricGuitar.to_string(), "Electric Guitar");
    }
}

//! CLI Module
//!
//! Command-line tools for inspecting and rendering arrangements offline.
//! An arrangement is a JSON project snapshot: `{ "bpm": .., "layers": [..] }`.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Loopdeck - layer sequencing and mixdown tools
#[derive(Parser, Debug)]
#[command(name = "loopdeck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (JSON); LOOPDECK_* variables override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Frame count for a number of bars
    #[command(name = "frames")]
    Frames {
        /// Number of bars
        #[arg(short, long)]
        bars: u32,

        /// Tempo (defaults to the configured BPM)
        #[arg(long)]
        bpm: Option<f32>,
    },

    /// Quantized loop length of a WAV file or a duration
    #[command(name = "bars")]
    Bars {
        /// WAV file to measure
        #[arg(short, long, conflicts_with = "duration_ms")]
        wav: Option<PathBuf>,

        /// Duration in milliseconds
        #[arg(short, long)]
        duration_ms: Option<u64>,

        /// Tempo (defaults to the configured BPM)
        #[arg(long)]
        bpm: Option<f32>,
    },

    /// Print the engine parameters for an arrangement
    #[command(name = "plan")]
    Plan {
        /// Arrangement JSON file
        arrangement: PathBuf,
    },

    /// Mix an arrangement to a WAV file
    #[command(name = "render")]
    Render {
        /// Arrangement JSON file
        arrangement: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the upload form for an arrangement and its rendered mix
    #[command(name = "form")]
    Form {
        /// Arrangement JSON file
        arrangement: PathBuf,

        /// Rendered mix
        #[arg(short, long)]
        mix: PathBuf,

        #[arg(short, long)]
        title: String,

        #[arg(short = 'D', long)]
        description: String,

        /// Comma-separated tag ids
        #[arg(long, value_delimiter = ',')]
        tags: Vec<u32>,

        /// Publish publicly
        #[arg(long)]
        public: bool,
    },
}

//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;

use crate::config::WorkstationConfig;
use crate::engine::{total_frames, wav_duration_ms, wav_duration_secs, HeadlessEngine, RenderCoordinator};
use crate::layers::{bars_from_duration, ProjectSnapshot};
use crate::upload::{UploadForm, UploadMetadata, Visibility};

/// Load the configuration from `path`, or defaults plus environment
pub fn load_config(path: Option<&Path>) -> Result<WorkstationConfig> {
    match path {
        Some(p) => WorkstationConfig::load(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => WorkstationConfig::from_env().context("Invalid environment configuration"),
    }
}

/// Read an arrangement JSON file
pub fn load_arrangement(path: &Path) -> Result<ProjectSnapshot> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let snapshot: ProjectSnapshot = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid arrangement {}", path.display()))?;
    if !(snapshot.bpm.is_finite() && snapshot.bpm > 0.0) {
        bail!("Arrangement BPM must be positive, got {}", snapshot.bpm);
    }
    Ok(snapshot)
}

fn renderer(config: &WorkstationConfig) -> RenderCoordinator {
    let engine = Arc::new(HeadlessEngine::new(config.sample_rate));
    RenderCoordinator::from_config(engine, config)
}

/// Print the frame count of `bars` bars.
pub fn frames(config: &WorkstationConfig, bars: u32, bpm: Option<f32>) -> Result<()> {
    let bpm = bpm.unwrap_or(config.default_bpm);
    let frames = total_frames(bars, bpm, config.sample_rate);
    println!("{} bars @ {} BPM, {} Hz = {} frames", bars, bpm, config.sample_rate, frames);
    Ok(())
}

/// Print the quantized loop length of a file or duration.
pub fn bars(
    config: &WorkstationConfig,
    wav: Option<&Path>,
    duration_ms: Option<u64>,
    bpm: Option<f32>,
) -> Result<()> {
    let duration_ms = match (wav, duration_ms) {
        (Some(path), _) => {
            wav_duration_ms(path).with_context(|| format!("Cannot measure {}", path.display()))?
        }
        (None, Some(ms)) => ms,
        (None, None) => bail!("Pass --wav or --duration-ms"),
    };
    let bpm = bpm.unwrap_or(config.default_bpm);
    let length = bars_from_duration(duration_ms, bpm, config.max_loop_bars);
    println!("{} ms @ {} BPM = {} bar loop", duration_ms, bpm, length);
    Ok(())
}

/// Print the render plan of an arrangement.
pub fn plan(config: &WorkstationConfig, arrangement: &Path) -> Result<()> {
    let snapshot = load_arrangement(arrangement)?;
    let plan = renderer(config)
        .render_plan(&snapshot)
        .context("Arrangement cannot be played")?;

    println!("Layers:          {}", plan.infos.len());
    println!("Max used bars:   {}", plan.max_used_bars);
    println!("Total frames:    {}", plan.total_frames);
    println!("{}", serde_json::to_string_pretty(&plan.infos)?);
    Ok(())
}

/// Mix an arrangement to `output`.
pub fn render(config: &WorkstationConfig, arrangement: &Path, output: &Path) -> Result<()> {
    let snapshot = load_arrangement(arrangement)?;
    info!("Rendering {} to {}", arrangement.display(), output.display());

    let mix = renderer(config)
        .render_mix(&snapshot, output)
        .context("Render failed")?;
    println!(
        "Rendered {} bars ({} frames) to {}",
        mix.max_used_bars,
        mix.total_frames,
        mix.path.display()
    );
    Ok(())
}

/// Print the upload form as JSON.
pub fn form(
    config: &WorkstationConfig,
    arrangement: &Path,
    mix: &Path,
    metadata: UploadMetadata,
) -> Result<()> {
    metadata.validate().context("Incomplete upload metadata")?;
    let snapshot = load_arrangement(arrangement)?;
    let duration = wav_duration_secs(mix).with_context(|| format!("Cannot measure {}", mix.display()))?;

    let form = UploadForm::build(&snapshot, &metadata, mix, duration, &config.upload_key)?;
    println!("{}", serde_json::to_string_pretty(&form)?);
    Ok(())
}

/// Upload metadata from command-line values
pub fn metadata(title: String, description: String, tags: Vec<u32>, public: bool) -> UploadMetadata {
    let visibility = if public {
        Visibility::Public
    } else {
        Visibility::Private
    };
    UploadMetadata::new(title, description, tags).with_visibility(visibility)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Layer, PatternBlock};
    use tempfile::tempdir;

    #[test]
    fn test_load_arrangement() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.json");
        let layer = Layer::new("a", 1, 2, "a.wav")
            .unwrap()
            .with_pattern(vec![PatternBlock::new(4, 2).unwrap()])
            .unwrap();
        let snapshot = ProjectSnapshot {
            bpm: 100.0,
            layers: vec![layer],
        };
        std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        assert_eq!(load_arrangement(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_load_arrangement_rejects_bad_bpm() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.json");
        std::fs::write(&path, r#"{"bpm": 0.0, "layers": []}"#).unwrap();
        assert!(load_arrangement(&path).is_err());
    }

    #[test]
    fn test_load_arrangement_rejects_broken_layer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.json");
        let layer = Layer::new("a", 1, 4, "a.wav").unwrap();
        let mut json = serde_json::to_value(ProjectSnapshot {
            bpm: 100.0,
            layers: vec![layer],
        })
        .unwrap();
        json["layers"][0]["length"] = serde_json::json!(3);
        std::fs::write(&path, json.to_string()).unwrap();

        assert!(load_arrangement(&path).is_err());
    }

    #[test]
    fn test_metadata_visibility() {
        let meta = metadata("t".into(), "d".into(), vec![1], true);
        assert_eq!(meta.visibility, Visibility::Public);
    }
}

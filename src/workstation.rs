//! Workstation session
//!
//! Single owner of project state. Engine callbacks, recording progress and
//! the results of background imports and uploads arrive on one
//! `crossbeam-channel` queue and are applied only by [`Workstation::pump_events`]
//! or [`Workstation::wait_event`], on the thread that owns the session.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::config::WorkstationConfig;
use crate::engine::{
    AudioRenderService, EngineEvent, EventSink, PlaybackStateMachine, RenderCoordinator,
    RenderedMix,
};
use crate::error::{LoopdeckError, Result};
use crate::layers::{Layer, LayerId, LayerLifecycleManager, PatternScheduler};
use crate::recording::{take_path, CaptureBackend, RecordingEvent, RecordingPipeline, RecordingSettings};
use crate::remote::{remove_downloads, ImportSource, Importer, WorkstationService};
use crate::upload::{UploadMetadata, UploadPipeline, UploadReceipt};

/// Everything that can happen off the session thread
#[derive(Debug)]
pub enum WorkstationEvent {
    Engine(EngineEvent),
    Recording(RecordingEvent),
    Imported {
        source: ImportSource,
        result: Result<Vec<Layer>>,
    },
    UploadFinished(Result<UploadReceipt>),
}

impl From<EngineEvent> for WorkstationEvent {
    fn from(event: EngineEvent) -> Self {
        WorkstationEvent::Engine(event)
    }
}

impl From<RecordingEvent> for WorkstationEvent {
    fn from(event: RecordingEvent) -> Self {
        WorkstationEvent::Recording(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// Short user-facing message about an outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            NotificationKind::Success => "ok",
            NotificationKind::Error => "error",
        };
        write!(f, "[{}] {}", tag, self.message)
    }
}

/// One editing session
pub struct Workstation {
    config: WorkstationConfig,
    layers: LayerLifecycleManager,
    renderer: RenderCoordinator,
    transport: PlaybackStateMachine,
    recorder: RecordingPipeline,
    importer: Arc<Importer>,
    uploader: Arc<UploadPipeline>,
    events_tx: Sender<WorkstationEvent>,
    events_rx: Receiver<WorkstationEvent>,
    notifications: Vec<Notification>,
    pending_jobs: usize,
}

impl Workstation {
    /// Create a session and register its listener with `engine`
    ///
    /// # Errors
    /// * `Config` - if `config` does not validate
    pub fn new(
        config: WorkstationConfig,
        engine: Arc<dyn AudioRenderService>,
        server: Arc<dyn WorkstationService>,
        capture: Arc<dyn CaptureBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let (events_tx, events_rx) = unbounded();
        engine.set_listener(Arc::new(EventSink::new(events_tx.clone())));

        let layers = LayerLifecycleManager::new(
            config.default_bpm,
            PatternScheduler::new(config.timeline_bars),
        )?;
        let renderer = RenderCoordinator::from_config(engine, &config);
        let recorder = RecordingPipeline::new(capture, RecordingSettings::from_config(&config));
        let importer = Importer::new(server.clone(), &config.files_dir, config.max_loop_bars);
        let uploader = UploadPipeline::new(server, &config.files_dir, config.upload_key.clone());

        info!(
            "Session ready: {} BPM, {} bars, files in {}",
            config.default_bpm,
            config.timeline_bars,
            config.files_dir.display()
        );
        Ok(Self {
            config,
            layers,
            renderer,
            transport: PlaybackStateMachine::new(),
            recorder,
            importer: Arc::new(importer),
            uploader: Arc::new(uploader),
            events_tx,
            events_rx,
            notifications: Vec::new(),
            pending_jobs: 0,
        })
    }

    pub fn config(&self) -> &WorkstationConfig {
        &self.config
    }

    pub fn layers(&self) -> &LayerLifecycleManager {
        &self.layers
    }

    /// Layer and pattern edits
    pub fn layers_mut(&mut self) -> &mut LayerLifecycleManager {
        &mut self.layers
    }

    pub fn transport(&self) -> &PlaybackStateMachine {
        &self.transport
    }

    pub fn recorder(&self) -> &RecordingPipeline {
        &self.recorder
    }

    pub fn renderer(&self) -> &RenderCoordinator {
        &self.renderer
    }

    /// True while an import or upload is running
    pub fn is_busy(&self) -> bool {
        self.pending_jobs > 0
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Play the current arrangement, restarting if already playing
    pub fn play(&mut self) -> Result<()> {
        let snapshot = self.layers.snapshot();
        match self.renderer.start_playback(&snapshot, &mut self.transport) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.notify_error(&e);
                Err(e)
            }
        }
    }

    pub fn stop(&mut self) {
        self.renderer.stop_playback(&mut self.transport);
    }

    /// Play/stop button. Returns whether playback is now running.
    pub fn toggle_playback(&mut self) -> Result<bool> {
        if self.transport.is_playing() {
            self.stop();
            return Ok(false);
        }
        self.play()?;
        Ok(true)
    }

    /// Render the arrangement to `path` on this thread
    pub fn render_mix(&self, path: &Path) -> Result<RenderedMix> {
        self.renderer.render_mix(&self.layers.snapshot(), path)
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Start the countdown and capture into a fresh file
    pub fn start_recording(&mut self) -> Result<JoinHandle<()>> {
        fs::create_dir_all(&self.config.files_dir)?;
        let path = take_path(&self.config.files_dir);
        self.recorder
            .start_countdown_and_record(path, self.events_tx.clone())
    }

    pub fn stop_recording(&self) {
        self.recorder.stop_recording();
    }

    /// Add the last finished take as a layer
    ///
    /// # Errors
    /// * `NoRecordedTake` - if there is no finished take
    pub fn add_recorded_layer(&mut self, name: &str) -> Result<LayerId> {
        let take = self.recorder.last_take().ok_or(LoopdeckError::NoRecordedTake)?;
        let layer = Layer::from_recording(
            name,
            &take.path,
            take.duration_ms,
            self.layers.bpm(),
            self.config.max_loop_bars,
        )?;
        let id = self.layers.add_layer(layer)?;
        self.recorder.take_recording();
        Ok(id)
    }

    /// Throw away the last finished take
    pub fn discard_recording(&mut self) -> Result<bool> {
        self.recorder.discard_recording()
    }

    // ========================================================================
    // Background Jobs
    // ========================================================================

    /// Import layers in the background; they are added when the result is pumped
    pub fn import(&mut self, source: ImportSource) -> JoinHandle<()> {
        let importer = Arc::clone(&self.importer);
        let tx = self.events_tx.clone();
        let bpm = self.layers.bpm();
        self.pending_jobs += 1;

        thread::spawn(move || {
            let result = importer.import(&source, bpm);
            if tx.send(WorkstationEvent::Imported { source, result }).is_err() {
                debug!("Import result dropped: session closed");
            }
        })
    }

    /// Render the current arrangement, then upload it in the background
    ///
    /// The mix is rendered on this thread, so playback started while the
    /// upload is in flight cannot change what gets sent.
    ///
    /// # Errors
    /// * `MissingUploadField` - checked before anything is rendered or sent
    /// * `EmptyProject` / `LayerWithoutPattern` / `RenderFailed` - from the mix render
    pub fn upload(&mut self, metadata: UploadMetadata) -> Result<JoinHandle<()>> {
        let snapshot = self.layers.snapshot();
        let prepared = match self.uploader.prepare(&self.renderer, &snapshot, &metadata) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.notify_error(&e);
                return Err(e);
            }
        };

        let uploader = Arc::clone(&self.uploader);
        let tx = self.events_tx.clone();
        self.pending_jobs += 1;

        Ok(thread::spawn(move || {
            let result = uploader.submit(prepared);
            if tx.send(WorkstationEvent::UploadFinished(result)).is_err() {
                debug!("Upload result dropped: session closed");
            }
        }))
    }

    // ========================================================================
    // Event Handling
    // ========================================================================

    /// Apply every queued event. Returns how many were applied.
    pub fn pump_events(&mut self) -> usize {
        let events: Vec<WorkstationEvent> = self.events_rx.try_iter().collect();
        let count = events.len();
        for event in events {
            self.apply(event);
        }
        count
    }

    /// Wait up to `timeout` for one event and apply it
    pub fn wait_event(&mut self, timeout: Duration) -> bool {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.apply(event);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                // The session holds a sender, so this cannot happen while it lives
                error!("Event queue disconnected");
                false
            }
        }
    }

    fn apply(&mut self, event: WorkstationEvent) {
        match event {
            WorkstationEvent::Engine(event) => {
                debug!("Engine event: {}", event);
                self.transport.apply(event);
            }
            WorkstationEvent::Recording(event) => self.apply_recording(event),
            WorkstationEvent::Imported { source, result } => {
                self.pending_jobs = self.pending_jobs.saturating_sub(1);
                match result.and_then(|layers| self.add_imported(layers)) {
                    Ok(ids) => {
                        info!("Imported {} layers from {:?}", ids.len(), source);
                        self.notifications
                            .push(Notification::success(format!("Imported {} layers", ids.len())));
                    }
                    Err(e) => self.notify_error(&e),
                }
            }
            WorkstationEvent::UploadFinished(result) => {
                self.pending_jobs = self.pending_jobs.saturating_sub(1);
                match result {
                    Ok(receipt) => {
                        info!("Uploaded {} ({} s)", receipt.mix_path.display(), receipt.duration_secs);
                        self.notifications
                            .push(Notification::success("Mix saved to the server"));
                    }
                    Err(e) => self.notify_error(&e),
                }
            }
        }
    }

    /// Add an imported batch; a rejected batch leaves no downloads behind
    fn add_imported(&mut self, layers: Vec<Layer>) -> Result<Vec<LayerId>> {
        let paths: Vec<PathBuf> = layers.iter().map(|l| l.wav_path.clone()).collect();
        self.layers.add_layers(layers).map_err(|e| {
            remove_downloads(paths.iter().map(PathBuf::as_path));
            e
        })
    }

    fn apply_recording(&mut self, event: RecordingEvent) {
        match event {
            RecordingEvent::CountdownTick(n) => debug!("Countdown {}", n),
            RecordingEvent::Started => debug!("Recording started"),
            RecordingEvent::Cancelled => debug!("Recording cancelled"),
            RecordingEvent::Finished(take) => {
                info!("Take ready: {} ({} ms)", take.path.display(), take.duration_ms);
                self.notifications.push(Notification::success("Recording finished"));
            }
            RecordingEvent::Failed(e) => self.notify_error(&e),
        }
    }

    fn notify_error(&mut self, e: &LoopdeckError) {
        warn!("{} [{}]: {}", e.category(), e.error_code(), e);
        self.notifications.push(Notification::error(e.friendly_message()));
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Hand over queued notifications, oldest first
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{generate_test_tone, read_samples_i16, total_frames, write_samples_i16, HeadlessEngine};
    use crate::layers::{IdSequence, PatternBlock};
    use crate::recording::CaptureStream;
    use crate::remote::{ApiResponse, HttpWorkstationService, ImportedTrack};
    use crate::upload::UploadForm;
    use std::io;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct NoMicrophone;

    impl CaptureBackend for NoMicrophone {
        fn has_permission(&self) -> bool {
            false
        }
        fn min_buffer_size(&self, _sample_rate: u32, _channels: u16) -> usize {
            0
        }
        fn open(&self, _sample_rate: u32, _channels: u16) -> Result<Box<dyn CaptureStream>> {
            Err(LoopdeckError::DeviceRead(io::Error::new(io::ErrorKind::Other, "unused")))
        }
    }

    /// Holds each upload until the test releases it
    struct GatedServer {
        release: Receiver<()>,
        forms: Mutex<Vec<UploadForm>>,
    }

    impl WorkstationService for GatedServer {
        fn import_track(&self, _track_id: i64) -> Result<ApiResponse<ImportedTrack>> {
            unreachable!()
        }

        fn import_recommended(&self, _layer_ids: &[i64]) -> Result<ApiResponse<ImportedTrack>> {
            unreachable!()
        }

        fn upload_track(&self, form: &UploadForm) -> Result<ApiResponse<i64>> {
            self.forms.lock().unwrap().push(form.clone());
            let _ = self.release.recv();
            Ok(ApiResponse {
                code: "SU".to_string(),
                message: None,
                payload: Some(9),
            })
        }

        fn download(&self, _url: &str, _dest: &Path) -> Result<()> {
            unreachable!()
        }
    }

    fn tone_layer(dir: &Path, name: &str, bar: u32) -> Layer {
        let wav = dir.join(format!("{}.wav", name));
        write_samples_i16(&wav, &generate_test_tone(440.0, 0.5, 44100, 2), 44100, 2).unwrap();
        Layer::new(name, 1, 1, wav)
            .unwrap()
            .with_pattern(vec![PatternBlock::new(bar, 1).unwrap()])
            .unwrap()
    }

    fn session(dir: &Path) -> (Workstation, Arc<HeadlessEngine>) {
        session_with(dir, Arc::new(HttpWorkstationService::new("http://localhost:1")))
    }

    fn session_with(dir: &Path, server: Arc<dyn WorkstationService>) -> (Workstation, Arc<HeadlessEngine>) {
        let config = WorkstationConfig {
            files_dir: dir.to_path_buf(),
            countdown_tick_ms: 0,
            ..WorkstationConfig::default()
        };
        let engine = Arc::new(HeadlessEngine::new(config.sample_rate).without_auto_finish());
        let ws = Workstation::new(
            config,
            engine.clone(),
            server,
            Arc::new(NoMicrophone),
        )
        .unwrap();
        (ws, engine)
    }

    #[test]
    fn test_engine_events_apply_only_when_pumped() {
        let dir = tempdir().unwrap();
        let (mut ws, _engine) = session(dir.path());

        let listener = EventSink::new(ws.events_tx.clone());
        let remote = thread::spawn(move || {
            use crate::engine::PlaybackListener;
            listener.on_progress_update(0.5);
            listener.on_waveform_update(vec![0.25]);
        });
        remote.join().unwrap();

        assert_eq!(ws.transport().progress(), 0.0);
        assert_eq!(ws.pump_events(), 2);
        assert_eq!(ws.transport().progress(), 0.5);
        assert_eq!(ws.transport().waveform(), &[0.25]);
    }

    #[test]
    fn test_play_empty_project_notifies() {
        let dir = tempdir().unwrap();
        let (mut ws, engine) = session(dir.path());

        assert!(ws.play().is_err());
        assert!(!engine.is_playing());
        assert_eq!(ws.notifications()[0].kind, NotificationKind::Error);
    }

    #[test]
    fn test_add_recorded_layer_without_take() {
        let dir = tempdir().unwrap();
        let (mut ws, _engine) = session(dir.path());
        assert!(matches!(
            ws.add_recorded_layer("hum"),
            Err(LoopdeckError::NoRecordedTake)
        ));
    }

    #[test]
    fn test_permission_denied_recording_notifies() {
        let dir = tempdir().unwrap();
        let (mut ws, _engine) = session(dir.path());

        ws.start_recording().unwrap().join().unwrap();
        ws.pump_events();

        assert_eq!(ws.recorder().state(), crate::recording::RecordingState::Idle);
        let last = ws.notifications().last().unwrap();
        assert_eq!(last.kind, NotificationKind::Error);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_upload_validation_is_synchronous() {
        let dir = tempdir().unwrap();
        let (mut ws, _engine) = session(dir.path());
        let layer = Layer::new("a", 1, 1, dir.path().join("a.wav"))
            .unwrap()
            .with_pattern(vec![PatternBlock::new(0, 1).unwrap()])
            .unwrap();
        ws.layers_mut().add_layer(layer).unwrap();

        let result = ws.upload(UploadMetadata::new("t", "d", vec![]));
        assert!(result.is_err());
        assert!(!ws.is_busy());
    }

    #[test]
    fn test_play_during_upload_keeps_uploaded_mix() {
        let dir = tempdir().unwrap();
        let (release_tx, release_rx) = unbounded();
        let server = Arc::new(GatedServer {
            release: release_rx,
            forms: Mutex::new(Vec::new()),
        });
        let (mut ws, engine) = session_with(dir.path(), server.clone());
        let rate = ws.config().sample_rate;

        ws.layers_mut().add_layer(tone_layer(dir.path(), "a", 0)).unwrap();
        let handle = ws.upload(UploadMetadata::new("jam", "d", vec![1])).unwrap();
        assert!(ws.is_busy());

        // Edit and play while the submission is still waiting on the server
        ws.layers_mut().add_layer(tone_layer(dir.path(), "b", 5)).unwrap();
        ws.play().unwrap();
        assert_eq!(engine.layers().len(), 2);

        release_tx.send(()).unwrap();
        handle.join().unwrap();
        ws.pump_events();
        assert!(!ws.is_busy());
        assert_eq!(ws.notifications().last().unwrap().kind, NotificationKind::Success);

        let forms = server.forms.lock().unwrap();
        assert_eq!(forms[0].field("layerName"), Some("a"));
        assert_eq!(forms[0].field("barsJson"), Some("[[0]]"));
        let mix = read_samples_i16(&dir.path().join("jam.wav")).unwrap();
        assert_eq!(mix.frames() as u64, total_frames(1, 120.0, rate));
    }

    #[test]
    fn test_upload_render_failure_is_synchronous() {
        let dir = tempdir().unwrap();
        let (mut ws, _engine) = session(dir.path());
        let layer = Layer::new("a", 1, 1, dir.path().join("missing.wav"))
            .unwrap()
            .with_pattern(vec![PatternBlock::new(0, 1).unwrap()])
            .unwrap();
        ws.layers_mut().add_layer(layer).unwrap();

        let result = ws.upload(UploadMetadata::new("t", "d", vec![1]));
        assert!(matches!(result, Err(LoopdeckError::RenderFailed { .. })));
        assert!(!ws.is_busy());
        assert_eq!(ws.notifications().last().unwrap().kind, NotificationKind::Error);
    }

    #[test]
    fn test_rejected_import_removes_downloads() {
        let dir = tempdir().unwrap();
        let (mut ws, _engine) = session(dir.path());
        // Room for one identity, so a two-layer batch is rejected
        ws.layers = LayerLifecycleManager::with_sequence(
            120.0,
            PatternScheduler::default(),
            IdSequence::starting_after(u32::MAX - 2),
        )
        .unwrap();

        let downloads: Vec<PathBuf> = ["layer_a.wav", "layer_b.wav"]
            .iter()
            .map(|name| dir.path().join(name))
            .collect();
        let layers = downloads
            .iter()
            .map(|path| {
                fs::write(path, b"RIFF").unwrap();
                Layer::new("t", 1, 1, path.clone()).unwrap()
            })
            .collect();

        ws.pending_jobs = 1;
        ws.events_tx
            .send(WorkstationEvent::Imported {
                source: ImportSource::Search { track_id: 3 },
                result: Ok(layers),
            })
            .unwrap();
        ws.pump_events();

        assert!(ws.layers().is_empty());
        assert!(downloads.iter().all(|p| !p.exists()));
        assert!(!ws.is_busy());
        assert_eq!(ws.notifications().last().unwrap().kind, NotificationKind::Error);
    }

    #[test]
    fn test_notification_display() {
        let n = Notification::success("done");
        assert_eq!(n.to_string(), "[ok] done");
    }
}

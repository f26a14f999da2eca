//! Playback State Machine for Loopdeck
//!
//! Tracks whether the mix is playing, the playback progress and the latest
//! waveform points. Engine signals are applied here only after they have been
//! marshaled onto the coordination thread.

use std::fmt;

use log::debug;

use super::service::EngineEvent;

/// Playback states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing is playing (default state)
    #[default]
    Stopped,
    /// The engine is playing the mix
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
        }
    }
}

/// Play/stop state plus the progress and waveform reported by the engine
///
/// Transitions are optimistic: `stop()` takes effect immediately and a late
/// confirmation from the engine is applied harmlessly.
#[derive(Debug, Clone, Default)]
pub struct PlaybackStateMachine {
    /// Current playback state
    state: PlaybackState,

    /// Playback position as a fraction in [0, 1]
    progress: f32,

    /// Latest waveform points for visualization
    waveform: Vec<f32>,

    /// Number of times playback has been (re)started
    starts: u64,
}

impl PlaybackStateMachine {
    /// Create a stopped state machine
    ///
    /// # Example
    /// ```
    /// use loopdeck::engine::PlaybackStateMachine;
    /// let transport = PlaybackStateMachine::new();
    /// assert!(transport.is_stopped());
    /// assert_eq!(transport.progress(), 0.0);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // User Transitions
    // ========================================================================

    /// Enter `Playing` with progress at zero
    ///
    /// Only the render coordinator calls this, after its preconditions hold.
    /// Starting while already playing is a restart.
    ///
    /// # Example
    /// ```
    /// use loopdeck::engine::PlaybackStateMachine;
    /// let mut transport = PlaybackStateMachine::new();
    /// transport.start();
    /// transport.apply_progress(0.4);
    /// transport.start();
    /// assert!(transport.is_playing());
    /// assert_eq!(transport.progress(), 0.0);
    /// ```
    pub fn start(&mut self) {
        if self.state == PlaybackState::Playing {
            debug!("[PLAYBACK] Restart at {:.3}", self.progress);
        } else {
            debug!("[PLAYBACK] Play");
        }
        self.state = PlaybackState::Playing;
        self.progress = 0.0;
        self.starts += 1;
    }

    /// User stop: any state -> Stopped, progress reset
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Playing {
            debug!("[PLAYBACK] Stopped at {:.3}", self.progress);
        }
        self.state = PlaybackState::Stopped;
        self.progress = 0.0;
    }

    // ========================================================================
    // Engine Signals
    // ========================================================================

    /// Apply one marshaled engine signal
    pub fn apply(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::PlaybackFinished => self.on_finished(),
            EngineEvent::Progress(fraction) => self.apply_progress(fraction),
            EngineEvent::Waveform(points) => self.apply_waveform(points),
        }
    }

    /// The engine reached the end of the mix
    pub fn on_finished(&mut self) {
        debug!("[PLAYBACK] Finished (was {})", self.state);
        self.state = PlaybackState::Stopped;
        self.progress = 0.0;
    }

    /// Record a progress update, clamped to [0, 1]
    ///
    /// Updates arriving after a stop change the value but never the state.
    pub fn apply_progress(&mut self, fraction: f32) {
        if fraction.is_nan() {
            return;
        }
        self.progress = fraction.clamp(0.0, 1.0);
    }

    /// Replace the waveform points
    pub fn apply_waveform(&mut self, points: Vec<f32>) {
        self.waveform = points;
    }

    // ========================================================================
    // State Queries
    // ========================================================================

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PlaybackState::Stopped
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn waveform(&self) -> &[f32] {
        &self.waveform
    }

    /// Number of starts since creation, restarts included
    pub fn start_count(&self) -> u64 {
        self.starts
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Basic State Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_default_state_is_stopped() {
        let transport = PlaybackStateMachine::new();
        assert!(transport.is_stopped());
        assert!(!transport.is_playing());
        assert_eq!(transport.state(), PlaybackState::Stopped);
        assert!(transport.waveform().is_empty());
    }

    // ------------------------------------------------------------------------
    // State Transition Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_stopped_to_playing() {
        let mut transport = PlaybackStateMachine::new();
        transport.start();
        assert!(transport.is_playing());
        assert_eq!(transport.start_count(), 1);
    }

    #[test]
    fn test_playing_to_stopped() {
        let mut transport = PlaybackStateMachine::new();
        transport.start();
        transport.apply_progress(0.7);

        transport.stop();
        assert!(transport.is_stopped());
        assert_eq!(transport.progress(), 0.0);
    }

    #[test]
    fn test_finished_resets_progress() {
        let mut transport = PlaybackStateMachine::new();
        transport.start();
        transport.apply(EngineEvent::Progress(0.99));

        transport.apply(EngineEvent::PlaybackFinished);
        assert!(transport.is_stopped());
        assert_eq!(transport.progress(), 0.0);
    }

    #[test]
    fn test_restart_resets_progress() {
        let mut transport = PlaybackStateMachine::new();
        transport.start();
        transport.apply_progress(0.5);

        transport.start();
        assert!(transport.is_playing());
        assert_eq!(transport.progress(), 0.0);
        assert_eq!(transport.start_count(), 2);
    }

    // ------------------------------------------------------------------------
    // Signal Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_progress_is_clamped() {
        let mut transport = PlaybackStateMachine::new();
        transport.start();
        transport.apply_progress(1.5);
        assert_eq!(transport.progress(), 1.0);
        transport.apply_progress(-0.5);
        assert_eq!(transport.progress(), 0.0);
        transport.apply_progress(0.3);
        transport.apply_progress(f32::NAN);
        assert_eq!(transport.progress(), 0.3);
    }

    #[test]
    fn test_waveform_update_replaces_points() {
        let mut transport = PlaybackStateMachine::new();
        transport.apply(EngineEvent::Waveform(vec![0.1, 0.5]));
        transport.apply(EngineEvent::Waveform(vec![0.9]));
        assert_eq!(transport.waveform(), &[0.9]);
    }

    // ------------------------------------------------------------------------
    // Edge Cases
    // ------------------------------------------------------------------------

    #[test]
    fn test_late_signals_after_stop_do_not_restart() {
        let mut transport = PlaybackStateMachine::new();
        transport.start();
        transport.stop();

        transport.apply(EngineEvent::Progress(0.8));
        transport.apply(EngineEvent::Waveform(vec![0.2]));
        transport.apply(EngineEvent::PlaybackFinished);

        assert!(transport.is_stopped());
        assert_eq!(transport.waveform(), &[0.2]);
    }

    #[test]
    fn test_double_stop_no_op() {
        let mut transport = PlaybackStateMachine::new();
        transport.stop();
        transport.stop();
        assert!(transport.is_stopped());
    }

    #[test]
    fn test_playback_state_display() {
        assert_eq!(format!("{}", PlaybackState::Stopped), "Stopped");
        assert_eq!(format!("{}", PlaybackState::Playing), "Playing");
    }
}

//! Layer lifecycle
//!
//! The manager is the single source of truth for which layers exist in the
//! current session. It hands out identities, applies pattern edits by layer
//! id and produces owned snapshots for rendering and upload.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::layer::{Layer, LayerId};
use super::pattern::is_non_overlapping;
use super::scheduler::{PatternEdit, PatternScheduler};
use crate::error::{LoopdeckError, Result};

/// Monotonic layer identity source. Ids start at 1 and are never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSequence {
    next: LayerId,
}

impl Default for IdSequence {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue a sequence after `last_issued`
    pub fn starting_after(last_issued: LayerId) -> Self {
        Self {
            next: last_issued.saturating_add(1).max(1),
        }
    }

    /// Issue the next identity
    ///
    /// # Errors
    /// * `LayerIdsExhausted` - once the id space is used up
    pub fn next_id(&mut self) -> Result<LayerId> {
        let id = self.next;
        self.next = id.checked_add(1).ok_or(LoopdeckError::LayerIdsExhausted)?;
        Ok(id)
    }

    /// The identity the next call will return
    pub fn peek(&self) -> LayerId {
        self.next
    }
}

/// Owned copy of the project state handed to rendering and upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub bpm: f32,
    pub layers: Vec<Layer>,
}

impl ProjectSnapshot {
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Owner of the session's ordered layer list
#[derive(Debug, Clone)]
pub struct LayerLifecycleManager {
    layers: Vec<Layer>,
    ids: IdSequence,
    bpm: f32,
    scheduler: PatternScheduler,
}

impl LayerLifecycleManager {
    /// Create an empty session
    pub fn new(bpm: f32, scheduler: PatternScheduler) -> Result<Self> {
        Self::with_sequence(bpm, scheduler, IdSequence::new())
    }

    /// Create an empty session drawing identities from `ids`
    pub fn with_sequence(bpm: f32, scheduler: PatternScheduler, ids: IdSequence) -> Result<Self> {
        check_bpm(bpm)?;
        Ok(Self {
            layers: Vec::new(),
            ids,
            bpm,
            scheduler,
        })
    }

    /// Add a layer, assigning it the next identity
    ///
    /// # Errors
    /// * `InvalidBlock` - if the layer's pattern breaks the non-overlap rule
    ///   or its length is not a power of two
    /// * `LayerIdsExhausted` - if no identity is left
    pub fn add_layer(&mut self, mut layer: Layer) -> Result<LayerId> {
        if !layer.length().is_power_of_two() {
            return Err(LoopdeckError::InvalidBlock {
                reason: format!("loop length {} is not a power of two", layer.length()),
            });
        }
        if !is_non_overlapping(layer.pattern_blocks()) {
            return Err(LoopdeckError::InvalidBlock {
                reason: "pattern blocks overlap".to_string(),
            });
        }

        let id = self.ids.next_id()?;
        layer.assign_id(id);
        info!(
            "Added layer {} '{}' ({} bars, {} blocks)",
            id,
            layer.name,
            layer.length(),
            layer.pattern_blocks().len()
        );
        self.layers.push(layer);
        Ok(id)
    }

    /// Add several layers at once. Either all are added or none.
    pub fn add_layers(&mut self, layers: Vec<Layer>) -> Result<Vec<LayerId>> {
        let mut staged = self.clone();
        let ids = layers
            .into_iter()
            .map(|layer| staged.add_layer(layer))
            .collect::<Result<Vec<_>>>()?;
        *self = staged;
        Ok(ids)
    }

    /// Remove a layer by identity
    pub fn delete_layer(&mut self, id: LayerId) -> Result<Layer> {
        let pos = self.position(id)?;
        let removed = self.layers.remove(pos);
        info!("Deleted layer {} '{}'", id, removed.name);
        Ok(removed)
    }

    /// Empty a layer's pattern, keeping its audio source and other attributes
    pub fn reset_layer(&mut self, id: LayerId) -> Result<()> {
        self.reset_pattern(id)
    }

    /// Toggle a bar on a layer (see [`PatternScheduler::toggle_beat`])
    pub fn toggle_beat(&mut self, id: LayerId, index: u32) -> Result<PatternEdit> {
        let scheduler = self.scheduler;
        scheduler.toggle_beat(self.layer_mut(id)?, index)
    }

    /// Auto-repeat a layer's loop (see [`PatternScheduler::apply_auto_repeat`])
    pub fn apply_auto_repeat(&mut self, id: LayerId, start_beat: u32, interval: u32) -> Result<usize> {
        let scheduler = self.scheduler;
        scheduler.apply_auto_repeat(self.layer_mut(id)?, start_beat, interval)
    }

    /// Clear a layer's pattern
    pub fn reset_pattern(&mut self, id: LayerId) -> Result<()> {
        let scheduler = self.scheduler;
        scheduler.reset_pattern(self.layer_mut(id)?);
        Ok(())
    }

    pub fn set_bpm(&mut self, bpm: f32) -> Result<()> {
        check_bpm(bpm)?;
        debug!("Project BPM {} -> {}", self.bpm, bpm);
        self.bpm = bpm;
        Ok(())
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn scheduler(&self) -> &PatternScheduler {
        &self.scheduler
    }

    /// Copy the current state for rendering or upload
    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            bpm: self.bpm,
            layers: self.layers.clone(),
        }
    }

    fn position(&self, id: LayerId) -> Result<usize> {
        self.layers
            .iter()
            .position(|l| l.id() == id)
            .ok_or(LoopdeckError::LayerNotFound { layer_id: id })
    }

    fn layer_mut(&mut self, id: LayerId) -> Result<&mut Layer> {
        let pos = self.position(id)?;
        Ok(&mut self.layers[pos])
    }
}

fn check_bpm(bpm: f32) -> Result<()> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(())
    } else {
        Err(LoopdeckError::InvalidBpm { bpm })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::pattern::PatternBlock;
    use pretty_assertions::assert_eq;

    fn manager() -> LayerLifecycleManager {
        LayerLifecycleManager::new(120.0, PatternScheduler::default()).unwrap()
    }

    fn layer(name: &str, length: u32) -> Layer {
        Layer::new(name, 1, length, format!("{}.wav", name)).unwrap()
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut m = manager();
        assert_eq!(m.add_layer(layer("a", 1)).unwrap(), 1);
        assert_eq!(m.add_layer(layer("b", 2)).unwrap(), 2);
        assert_eq!(m.layers()[1].id(), 2);
    }

    #[test]
    fn test_ids_never_reused_after_delete() {
        let mut m = manager();
        let first = m.add_layer(layer("a", 1)).unwrap();
        assert_eq!(first, 1);
        m.delete_layer(first).unwrap();

        let second = m.add_layer(layer("b", 1)).unwrap();
        assert_eq!(second, 2);
        assert!(m.layer(1).is_none());
    }

    #[test]
    fn test_delete_unknown_layer() {
        let mut m = manager();
        assert!(matches!(
            m.delete_layer(7),
            Err(LoopdeckError::LayerNotFound { layer_id: 7 })
        ));
    }

    #[test]
    fn test_reset_layer_preserves_attributes() {
        let mut m = manager();
        let id = m
            .add_layer(
                layer("a", 4)
                    .with_description("intro")
                    .with_pattern(vec![PatternBlock::new(0, 4).unwrap()])
                    .unwrap(),
            )
            .unwrap();

        m.reset_layer(id).unwrap();
        let l = m.layer(id).unwrap();
        assert!(!l.has_pattern());
        assert_eq!(l.length(), 4);
        assert_eq!(l.description, "intro");
        assert_eq!(l.name, "a");
    }

    #[test]
    fn test_toggle_scenario_by_id() {
        let mut m = manager();
        let a = m.add_layer(layer("a", 4)).unwrap();

        m.toggle_beat(a, 10).unwrap();
        assert_eq!(
            m.layer(a).unwrap().pattern_blocks(),
            &[PatternBlock::new(10, 4).unwrap()]
        );

        m.toggle_beat(a, 11).unwrap();
        assert!(m.layer(a).unwrap().pattern_blocks().is_empty());
    }

    #[test]
    fn test_auto_repeat_by_id() {
        let mut m = manager();
        let id = m.add_layer(layer("a", 2)).unwrap();
        assert_eq!(id, 1);
        assert_eq!(m.apply_auto_repeat(1, 0, 4).unwrap(), 16);
        assert_eq!(m.layer(1).unwrap().pattern_blocks().len(), 16);
    }

    #[test]
    fn test_edit_unknown_layer_leaves_state() {
        let mut m = manager();
        m.add_layer(layer("a", 2)).unwrap();
        let before = m.snapshot();
        assert!(m.toggle_beat(42, 0).is_err());
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn test_add_layers_is_all_or_nothing() {
        // Room for one more identity: the second layer of the batch fails
        let mut m = LayerLifecycleManager::with_sequence(
            120.0,
            PatternScheduler::default(),
            IdSequence::starting_after(u32::MAX - 2),
        )
        .unwrap();

        let result = m.add_layers(vec![layer("ok", 1), layer("late", 2)]);
        assert!(matches!(result, Err(LoopdeckError::LayerIdsExhausted)));
        assert!(m.is_empty());
        // The failed batch did not consume identities
        assert_eq!(m.add_layer(layer("next", 1)).unwrap(), u32::MAX - 1);
    }

    #[test]
    fn test_id_exhaustion_is_an_error() {
        let mut m = LayerLifecycleManager::with_sequence(
            120.0,
            PatternScheduler::default(),
            IdSequence::starting_after(u32::MAX - 2),
        )
        .unwrap();
        assert_eq!(m.add_layer(layer("a", 1)).unwrap(), u32::MAX - 1);
        assert!(matches!(
            m.add_layer(layer("b", 1)),
            Err(LoopdeckError::LayerIdsExhausted)
        ));
        assert_eq!(m.len(), 1);

        let mut ids = IdSequence::starting_after(u32::MAX);
        assert!(ids.next_id().is_err());
    }

    #[test]
    fn test_bpm_validation() {
        let mut m = manager();
        assert!(m.set_bpm(0.0).is_err());
        assert!(m.set_bpm(f32::NAN).is_err());
        m.set_bpm(96.0).unwrap();
        assert_eq!(m.snapshot().bpm, 96.0);
        assert!(LayerLifecycleManager::new(-1.0, PatternScheduler::default()).is_err());
    }

    #[test]
    fn test_injected_sequence() {
        let mut m = LayerLifecycleManager::with_sequence(
            120.0,
            PatternScheduler::default(),
            IdSequence::starting_after(9),
        )
        .unwrap();
        assert_eq!(m.add_layer(layer("a", 1)).unwrap(), 10);
    }
}

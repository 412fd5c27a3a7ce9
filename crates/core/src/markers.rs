//! Per-layer marker and annotation collections.
//!
//! Markers are kept in insertion order and may contain near-duplicates; two
//! timestamps closer than [`MARKER_MATCH_TOLERANCE_MS`] are the same marker
//! for every lookup and removal.

use stemtap_project::{AnnotationData, ImportedMarker, LayerData};
use stemtap_transport::LayerId;

/// Distance below which two marker timestamps denote the same marker.
pub const MARKER_MATCH_TOLERANCE_MS: u64 = 100;

pub fn is_same_marker(a: u64, b: u64) -> bool {
    a.abs_diff(b) < MARKER_MATCH_TOLERANCE_MS
}

/// Number of stems exposed to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StemCount {
    Two,
    Four,
    #[default]
    Six,
}

impl StemCount {
    pub fn as_u8(&self) -> u8 {
        match self {
            StemCount::Two => 2,
            StemCount::Four => 4,
            StemCount::Six => 6,
        }
    }

    /// Layers in this stem set, in canonical order.
    pub fn layers(&self) -> &'static [LayerId] {
        match self {
            StemCount::Two => &[LayerId::Vocals, LayerId::Other],
            StemCount::Four => &[LayerId::Vocals, LayerId::Drums, LayerId::Bass, LayerId::Other],
            StemCount::Six => &LayerId::ALL,
        }
    }

    pub fn contains(&self, layer: LayerId) -> bool {
        self.layers().contains(&layer)
    }

    pub fn first(&self) -> LayerId {
        self.layers()[0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported stem count {0}, expected 2, 4 or 6")]
pub struct InvalidStemCount(pub u8);

impl TryFrom<u8> for StemCount {
    type Error = InvalidStemCount;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(StemCount::Two),
            4 => Ok(StemCount::Four),
            6 => Ok(StemCount::Six),
            other => Err(InvalidStemCount(other)),
        }
    }
}

/// Which layers marker navigation and undo look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationScope {
    ActiveLayer,
    /// Every layer of the stem set that is currently visible.
    #[default]
    AllLayers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub timestamp_ms: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub color: String,
    pub markers: Vec<u64>,
    pub annotations: Vec<Annotation>,
    pub is_visible: bool,
}

impl Layer {
    fn new(id: LayerId) -> Self {
        Self {
            id,
            name: id.display_name().to_string(),
            color: id.default_color().to_string(),
            markers: Vec::new(),
            annotations: Vec::new(),
            is_visible: true,
        }
    }

    pub fn has_marker_near(&self, timestamp_ms: u64) -> bool {
        self.markers.iter().any(|&m| is_same_marker(m, timestamp_ms))
    }

    /// Marker closest to `timestamp_ms` within tolerance.
    pub fn nearest_marker(&self, timestamp_ms: u64) -> Option<u64> {
        self.markers
            .iter()
            .copied()
            .filter(|&m| is_same_marker(m, timestamp_ms))
            .min_by_key(|&m| m.abs_diff(timestamp_ms))
    }

    pub fn annotation_at(&self, timestamp_ms: u64) -> Option<&str> {
        self.annotations
            .iter()
            .find(|a| is_same_marker(a.timestamp_ms, timestamp_ms))
            .map(|a| a.text.as_str())
    }

    fn take_annotation(&mut self, timestamp_ms: u64) -> Option<String> {
        let idx = self
            .annotations
            .iter()
            .position(|a| is_same_marker(a.timestamp_ms, timestamp_ms))?;
        Some(self.annotations.remove(idx).text)
    }

    fn upsert_annotation(&mut self, timestamp_ms: u64, text: String) {
        match self
            .annotations
            .iter_mut()
            .find(|a| is_same_marker(a.timestamp_ms, timestamp_ms))
        {
            Some(existing) => {
                existing.timestamp_ms = timestamp_ms;
                existing.text = text;
            }
            None => self.annotations.push(Annotation { timestamp_ms, text }),
        }
    }

    fn drop_orphaned_annotations(&mut self) {
        let markers = &self.markers;
        self.annotations
            .retain(|a| markers.iter().any(|&m| is_same_marker(m, a.timestamp_ms)));
    }

    fn clear(&mut self) {
        self.markers.clear();
        self.annotations.clear();
    }

    fn to_data(&self) -> LayerData {
        LayerData {
            id: self.id,
            name: self.name.clone(),
            color: self.color.clone(),
            markers: self.markers.clone(),
            annotations: self
                .annotations
                .iter()
                .map(|a| AnnotationData {
                    timestamp: a.timestamp_ms,
                    text: a.text.clone(),
                })
                .collect(),
            is_visible: self.is_visible,
        }
    }

    fn from_data(data: &LayerData) -> Self {
        Self {
            id: data.id,
            name: data.name.clone(),
            color: data.color.clone(),
            markers: data.markers.clone(),
            annotations: data
                .annotations
                .iter()
                .filter(|a| !a.text.trim().is_empty())
                .map(|a| Annotation {
                    timestamp_ms: a.timestamp,
                    text: a.text.clone(),
                })
                .collect(),
            is_visible: data.is_visible,
        }
    }
}

/// A marker taken out by [`MarkerStore::remove_last_marker_before`], kept for redo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedMarker {
    pub layer: LayerId,
    pub timestamp_ms: u64,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    /// Number of markers that matched within tolerance.
    Removed(usize),
}

#[derive(Debug, Clone)]
pub struct MarkerStore {
    layers: [Layer; 6],
    active: LayerId,
    stem_count: StemCount,
    undo_slot: Option<RemovedMarker>,
}

impl MarkerStore {
    pub fn new(stem_count: StemCount) -> Self {
        Self {
            layers: LayerId::ALL.map(Layer::new),
            active: stem_count.first(),
            stem_count,
            undo_slot: None,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> &Layer {
        &self.layers[id.index()]
    }

    fn layer_mut(&mut self, id: LayerId) -> &mut Layer {
        &mut self.layers[id.index()]
    }

    /// Layers of the current stem set that are visible.
    pub fn displayed_layers(&self) -> impl Iterator<Item = &Layer> {
        self.stem_count
            .layers()
            .iter()
            .map(|id| self.layer(*id))
            .filter(|layer| layer.is_visible)
    }

    fn scoped_layers(&self, scope: NavigationScope) -> Vec<&Layer> {
        match scope {
            NavigationScope::ActiveLayer => vec![self.layer(self.active)],
            NavigationScope::AllLayers => self.displayed_layers().collect(),
        }
    }

    pub fn active_layer(&self) -> LayerId {
        self.active
    }

    /// Returns false when the layer is outside the current stem set.
    pub fn set_active_layer(&mut self, id: LayerId) -> bool {
        if !self.stem_count.contains(id) {
            return false;
        }
        self.active = id;
        true
    }

    pub fn stem_count(&self) -> StemCount {
        self.stem_count
    }

    /// Change the exposed stem set. Marker data on layers that drop out of
    /// the set is kept.
    pub fn set_stem_count(&mut self, stem_count: StemCount) {
        self.stem_count = stem_count;
        if !stem_count.contains(self.active) {
            self.active = stem_count.first();
        }
    }

    pub fn add_marker(&mut self, layer: LayerId, timestamp_ms: u64) {
        self.layer_mut(layer).markers.push(timestamp_ms);
    }

    /// Remove every marker within tolerance of `timestamp_ms`, along with
    /// annotations that no longer belong to any marker.
    pub fn remove_marker(&mut self, layer: LayerId, timestamp_ms: u64) -> usize {
        let layer = self.layer_mut(layer);
        let before = layer.markers.len();
        layer.markers.retain(|&m| !is_same_marker(m, timestamp_ms));
        let removed = before - layer.markers.len();
        if removed > 0 {
            layer.drop_orphaned_annotations();
        }
        removed
    }

    pub fn toggle_marker_at_time(&mut self, layer: LayerId, timestamp_ms: u64) -> ToggleOutcome {
        if self.layer(layer).has_marker_near(timestamp_ms) {
            ToggleOutcome::Removed(self.remove_marker(layer, timestamp_ms))
        } else {
            self.add_marker(layer, timestamp_ms);
            ToggleOutcome::Added
        }
    }

    /// Remove the closest marker strictly before `current_ms` and remember it
    /// in the single-entry undo slot, replacing whatever was there.
    pub fn remove_last_marker_before(
        &mut self,
        current_ms: f64,
        scope: NavigationScope,
    ) -> Option<RemovedMarker> {
        let (layer_id, timestamp_ms) = self
            .scoped_layers(scope)
            .into_iter()
            .flat_map(|layer| layer.markers.iter().map(move |&m| (layer.id, m)))
            .filter(|&(_, m)| (m as f64) < current_ms)
            .max_by_key(|&(_, m)| m)?;

        let layer = self.layer_mut(layer_id);
        let idx = layer.markers.iter().position(|&m| m == timestamp_ms)?;
        layer.markers.remove(idx);
        let annotation = if layer.has_marker_near(timestamp_ms) {
            layer.annotation_at(timestamp_ms).map(str::to_string)
        } else {
            layer.take_annotation(timestamp_ms)
        };

        let removed = RemovedMarker {
            layer: layer_id,
            timestamp_ms,
            annotation,
        };
        self.undo_slot = Some(removed.clone());
        Some(removed)
    }

    /// Put back the marker held in the undo slot. No-op on an empty slot.
    pub fn redo_last_removed(&mut self) -> Option<RemovedMarker> {
        let removed = self.undo_slot.take()?;
        let layer = self.layer_mut(removed.layer);
        layer.markers.push(removed.timestamp_ms);
        if let Some(text) = &removed.annotation {
            layer.upsert_annotation(removed.timestamp_ms, text.clone());
        }
        Some(removed)
    }

    pub fn undo_slot(&self) -> Option<&RemovedMarker> {
        self.undo_slot.as_ref()
    }

    pub fn clear_undo_slot(&mut self) {
        self.undo_slot = None;
    }

    /// Closest navigation target left or right of `current_ms`.
    ///
    /// Candidates are the scoped markers, the ghost cursor and the song
    /// boundary in the search direction. Returns `None` when nothing lies
    /// strictly on that side.
    pub fn find_nearest(
        &self,
        direction: Direction,
        current_ms: f64,
        scope: NavigationScope,
        ghost_ms: Option<f64>,
        song_duration_ms: f64,
    ) -> Option<f64> {
        let sentinel = match direction {
            Direction::Left => 0.0,
            Direction::Right => song_duration_ms,
        };
        let candidates = self
            .scoped_layers(scope)
            .into_iter()
            .flat_map(|layer| layer.markers.iter().map(|&m| m as f64))
            .chain(ghost_ms)
            .chain(std::iter::once(sentinel))
            .filter(|t| t.is_finite());

        match direction {
            Direction::Left => candidates.filter(|&t| t < current_ms).reduce(f64::max),
            Direction::Right => candidates.filter(|&t| t > current_ms).reduce(f64::min),
        }
    }

    /// Returns the new visibility.
    pub fn toggle_visibility(&mut self, layer: LayerId) -> bool {
        let layer = self.layer_mut(layer);
        layer.is_visible = !layer.is_visible;
        layer.is_visible
    }

    /// Attach `text` to the marker nearest `timestamp_ms`; blank text deletes
    /// the annotation. Returns false when no marker is within tolerance.
    pub fn update_annotation(&mut self, layer: LayerId, timestamp_ms: u64, text: &str) -> bool {
        let layer = self.layer_mut(layer);
        let Some(marker) = layer.nearest_marker(timestamp_ms) else {
            return false;
        };

        let text = text.trim();
        if text.is_empty() {
            layer.take_annotation(marker);
        } else {
            layer.upsert_annotation(marker, text.to_string());
        }
        true
    }

    pub fn clear_layer(&mut self, layer: LayerId) {
        self.layer_mut(layer).clear();
    }

    pub fn clear_all(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
        self.undo_slot = None;
    }

    /// Append imported markers to the existing layer contents.
    pub fn merge_imported(&mut self, imported: &[ImportedMarker]) {
        for marker in imported {
            let layer = self.layer_mut(marker.layer);
            layer.markers.push(marker.timestamp_ms);
            let text = marker.annotation.as_deref().map(str::trim).unwrap_or_default();
            if !text.is_empty() {
                layer.upsert_annotation(marker.timestamp_ms, text.to_string());
            }
        }
    }

    pub fn marker_count(&self) -> usize {
        self.layers.iter().map(|l| l.markers.len()).sum()
    }

    pub fn to_layer_data(&self) -> Vec<LayerData> {
        self.layers.iter().map(Layer::to_data).collect()
    }

    /// Replace all layer contents from persisted data. Layers absent from
    /// `data` come back empty.
    pub fn restore(&mut self, data: &[LayerData], stem_count: StemCount) {
        self.layers = LayerId::ALL.map(Layer::new);
        for layer in data {
            self.layers[layer.id.index()] = Layer::from_data(layer);
        }
        self.undo_slot = None;
        self.set_stem_count(stem_count);
    }
}

impl Default for MarkerStore {
    fn default() -> Self {
        Self::new(StemCount::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut markers: Vec<u64>) -> Vec<u64> {
        markers.sort_unstable();
        markers
    }

    #[test]
    fn test_same_marker_tolerance_is_strict() {
        assert!(is_same_marker(1000, 1099));
        assert!(is_same_marker(1099, 1000));
        assert!(!is_same_marker(1000, 1100));
    }

    #[test]
    fn test_stem_sets() {
        assert_eq!(StemCount::Two.layers(), &[LayerId::Vocals, LayerId::Other]);
        assert_eq!(StemCount::Four.layers().len(), 4);
        assert_eq!(StemCount::Six.layers(), &LayerId::ALL);
        assert_eq!(StemCount::try_from(4), Ok(StemCount::Four));
        assert_eq!(StemCount::try_from(3), Err(InvalidStemCount(3)));
    }

    #[test]
    fn test_add_does_not_dedup() {
        let mut store = MarkerStore::default();
        store.add_marker(LayerId::Vocals, 1000);
        store.add_marker(LayerId::Vocals, 1000);
        assert_eq!(store.layer(LayerId::Vocals).markers, vec![1000, 1000]);
    }

    #[test]
    fn test_toggle_is_its_own_inverse_within_tolerance() {
        let mut store = MarkerStore::default();

        assert_eq!(store.toggle_marker_at_time(LayerId::Vocals, 5000), ToggleOutcome::Added);
        assert_eq!(store.layer(LayerId::Vocals).markers, vec![5000]);

        assert_eq!(
            store.toggle_marker_at_time(LayerId::Vocals, 5040),
            ToggleOutcome::Removed(1)
        );
        assert!(store.layer(LayerId::Vocals).markers.is_empty());
    }

    #[test]
    fn test_remove_marker_takes_every_match() {
        let mut store = MarkerStore::default();
        for t in [900, 1000, 1050, 1200] {
            store.add_marker(LayerId::Bass, t);
        }

        assert_eq!(store.remove_marker(LayerId::Bass, 1000), 3);
        assert_eq!(store.layer(LayerId::Bass).markers, vec![1200]);
    }

    #[test]
    fn test_remove_marker_drops_its_annotation() {
        let mut store = MarkerStore::default();
        store.add_marker(LayerId::Bass, 1000);
        store.add_marker(LayerId::Bass, 3000);
        store.update_annotation(LayerId::Bass, 1000, "drop");
        store.update_annotation(LayerId::Bass, 3000, "keep");

        store.remove_marker(LayerId::Bass, 1000);

        let layer = store.layer(LayerId::Bass);
        assert_eq!(layer.annotation_at(1000), None);
        assert_eq!(layer.annotation_at(3000), Some("keep"));
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut store = MarkerStore::default();
        store.set_active_layer(LayerId::Drums);
        for t in [1000, 2000, 3000] {
            store.add_marker(LayerId::Drums, t);
        }

        let removed = store
            .remove_last_marker_before(2500.0, NavigationScope::ActiveLayer)
            .expect("marker before 2500");
        assert_eq!(removed.timestamp_ms, 2000);
        assert_eq!(store.layer(LayerId::Drums).markers, vec![1000, 3000]);

        store.redo_last_removed().expect("slot filled");
        assert_eq!(sorted(store.layer(LayerId::Drums).markers.clone()), vec![1000, 2000, 3000]);
        assert!(store.undo_slot().is_none());
    }

    #[test]
    fn test_remove_last_before_is_strict() {
        let mut store = MarkerStore::default();
        store.add_marker(LayerId::Vocals, 2000);

        assert!(store.remove_last_marker_before(2000.0, NavigationScope::AllLayers).is_none());
        assert!(store.remove_last_marker_before(2000.5, NavigationScope::AllLayers).is_some());
    }

    #[test]
    fn test_undo_slot_is_overwritten() {
        let mut store = MarkerStore::default();
        store.add_marker(LayerId::Vocals, 1000);
        store.add_marker(LayerId::Drums, 2000);

        store.remove_last_marker_before(5000.0, NavigationScope::AllLayers);
        store.remove_last_marker_before(5000.0, NavigationScope::AllLayers);
        assert_eq!(store.undo_slot().map(|r| r.timestamp_ms), Some(1000));

        store.redo_last_removed();
        assert_eq!(store.layer(LayerId::Vocals).markers, vec![1000]);
        assert!(store.layer(LayerId::Drums).markers.is_empty());
        assert!(store.redo_last_removed().is_none());
    }

    #[test]
    fn test_undo_all_layers_skips_hidden() {
        let mut store = MarkerStore::default();
        store.add_marker(LayerId::Vocals, 1000);
        store.add_marker(LayerId::Piano, 2000);
        store.toggle_visibility(LayerId::Piano);

        let removed = store
            .remove_last_marker_before(5000.0, NavigationScope::AllLayers)
            .expect("vocals marker");
        assert_eq!(removed.layer, LayerId::Vocals);
        assert_eq!(store.layer(LayerId::Piano).markers, vec![2000]);
    }

    #[test]
    fn test_undo_restores_annotation() {
        let mut store = MarkerStore::default();
        store.add_marker(LayerId::Vocals, 1000);
        store.update_annotation(LayerId::Vocals, 1000, "verse");

        let removed = store
            .remove_last_marker_before(1500.0, NavigationScope::ActiveLayer)
            .expect("marker");
        assert_eq!(removed.annotation.as_deref(), Some("verse"));
        assert!(store.layer(LayerId::Vocals).annotations.is_empty());

        store.redo_last_removed();
        assert_eq!(store.layer(LayerId::Vocals).annotation_at(1000), Some("verse"));
    }

    #[test]
    fn test_find_nearest_sentinels() {
        let store = MarkerStore::default();

        let left = store.find_nearest(Direction::Left, 5000.0, NavigationScope::AllLayers, None, 180_000.0);
        let right = store.find_nearest(Direction::Right, 5000.0, NavigationScope::AllLayers, None, 180_000.0);

        assert_eq!(left, Some(0.0));
        assert_eq!(right, Some(180_000.0));
    }

    #[test]
    fn test_find_nearest_with_markers_and_ghost() {
        let mut store = MarkerStore::default();
        for t in [1000, 4000, 9000] {
            store.add_marker(LayerId::Drums, t);
        }
        store.add_marker(LayerId::Bass, 6000);

        let scope = NavigationScope::AllLayers;
        assert_eq!(store.find_nearest(Direction::Left, 5000.0, scope, None, 180_000.0), Some(4000.0));
        assert_eq!(store.find_nearest(Direction::Right, 5000.0, scope, None, 180_000.0), Some(6000.0));
        assert_eq!(
            store.find_nearest(Direction::Right, 5000.0, scope, Some(5500.0), 180_000.0),
            Some(5500.0)
        );

        store.set_active_layer(LayerId::Drums);
        assert_eq!(
            store.find_nearest(Direction::Right, 5000.0, NavigationScope::ActiveLayer, None, 180_000.0),
            Some(9000.0)
        );
    }

    #[test]
    fn test_find_nearest_at_boundaries_is_none() {
        let store = MarkerStore::default();
        let scope = NavigationScope::AllLayers;

        assert_eq!(store.find_nearest(Direction::Left, 0.0, scope, None, 180_000.0), None);
        assert_eq!(store.find_nearest(Direction::Right, 180_000.0, scope, None, 180_000.0), None);
    }

    #[test]
    fn test_stem_count_reassigns_active_layer() {
        let mut store = MarkerStore::default();
        store.set_active_layer(LayerId::Drums);
        store.add_marker(LayerId::Drums, 1234);

        store.set_stem_count(StemCount::Two);
        assert_eq!(store.active_layer(), LayerId::Vocals);
        assert_eq!(store.layer(LayerId::Drums).markers, vec![1234]);

        assert!(!store.set_active_layer(LayerId::Drums));
        store.set_stem_count(StemCount::Four);
        assert_eq!(store.active_layer(), LayerId::Vocals);
    }

    #[test]
    fn test_stem_count_keeps_active_layer_when_still_exposed() {
        let mut store = MarkerStore::default();
        store.set_active_layer(LayerId::Other);
        store.set_stem_count(StemCount::Two);
        assert_eq!(store.active_layer(), LayerId::Other);
    }

    #[test]
    fn test_visibility_keeps_markers() {
        let mut store = MarkerStore::default();
        store.add_marker(LayerId::Guitar, 10);

        assert!(!store.toggle_visibility(LayerId::Guitar));
        assert_eq!(store.layer(LayerId::Guitar).markers, vec![10]);
        assert!(store.displayed_layers().all(|l| l.id != LayerId::Guitar));
        assert!(store.toggle_visibility(LayerId::Guitar));
    }

    #[test]
    fn test_update_annotation() {
        let mut store = MarkerStore::default();
        store.add_marker(LayerId::Vocals, 1000);

        assert!(store.update_annotation(LayerId::Vocals, 1040, "  chorus "));
        assert_eq!(store.layer(LayerId::Vocals).annotations.len(), 1);
        assert_eq!(store.layer(LayerId::Vocals).annotations[0].timestamp_ms, 1000);
        assert_eq!(store.layer(LayerId::Vocals).annotation_at(1000), Some("chorus"));

        assert!(store.update_annotation(LayerId::Vocals, 1000, "bridge"));
        assert_eq!(store.layer(LayerId::Vocals).annotations.len(), 1);
        assert_eq!(store.layer(LayerId::Vocals).annotation_at(1000), Some("bridge"));

        assert!(store.update_annotation(LayerId::Vocals, 1000, ""));
        assert!(store.layer(LayerId::Vocals).annotations.is_empty());

        assert!(!store.update_annotation(LayerId::Vocals, 5000, "nothing here"));
        assert!(store.layer(LayerId::Vocals).annotations.is_empty());
    }

    #[test]
    fn test_merge_imported_appends() {
        let mut store = MarkerStore::default();
        store.add_marker(LayerId::Bass, 100);

        store.merge_imported(&[
            ImportedMarker {
                layer: LayerId::Bass,
                timestamp_ms: 2000,
                annotation: Some("riff".to_string()),
            },
            ImportedMarker {
                layer: LayerId::Vocals,
                timestamp_ms: 3000,
                annotation: None,
            },
        ]);

        assert_eq!(store.layer(LayerId::Bass).markers, vec![100, 2000]);
        assert_eq!(store.layer(LayerId::Bass).annotation_at(2000), Some("riff"));
        assert_eq!(store.layer(LayerId::Vocals).markers, vec![3000]);
    }

    #[test]
    fn test_layer_data_round_trip() {
        let mut store = MarkerStore::default();
        store.add_marker(LayerId::Drums, 500);
        store.update_annotation(LayerId::Drums, 500, "kick");
        store.toggle_visibility(LayerId::Piano);

        let data = store.to_layer_data();
        let mut restored = MarkerStore::default();
        restored.add_marker(LayerId::Other, 999);
        restored.restore(&data, StemCount::Four);

        assert_eq!(restored.layers(), store.layers());
        assert_eq!(restored.stem_count(), StemCount::Four);
    }

    #[test]
    fn test_clear_all() {
        let mut store = MarkerStore::default();
        store.add_marker(LayerId::Vocals, 1000);
        store.add_marker(LayerId::Drums, 1000);
        store.remove_last_marker_before(2000.0, NavigationScope::AllLayers);

        store.clear_all();
        assert_eq!(store.marker_count(), 0);
        assert!(store.undo_slot().is_none());
    }
}

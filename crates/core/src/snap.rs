use crate::markers::MarkerStore;
use crate::time::TimeContext;

/// Maximum on-screen distance for a candidate to be pulled onto a target.
/// The comparison is inclusive: a target exactly this far away still snaps.
pub const SNAP_THRESHOLD_PX: f64 = 50.0;

/// Resolve `candidate_ms` against `targets`.
///
/// Among the targets whose pixel distance is within [`SNAP_THRESHOLD_PX`],
/// returns the one closest in time; the first of equally close targets wins.
/// Falls back to the candidate when nothing qualifies or the scale is unusable.
pub fn resolve(candidate_ms: f64, targets: &[f64], pixels_per_ms: f64) -> f64 {
    if !candidate_ms.is_finite() || !pixels_per_ms.is_finite() || pixels_per_ms <= 0.0 {
        return candidate_ms;
    }

    let mut best: Option<(f64, f64)> = None;
    for &target in targets {
        if !target.is_finite() {
            continue;
        }
        let distance = (candidate_ms - target).abs();
        if distance * pixels_per_ms > SNAP_THRESHOLD_PX {
            continue;
        }
        if best.is_none_or(|(_, closest)| distance < closest) {
            best = Some((target, distance));
        }
    }

    best.map_or(candidate_ms, |(target, _)| target)
}

/// Build the snap target set for a visible window.
///
/// Grid lines come first, then the markers of every displayed layer that fall
/// inside the window, then the ghost cursor.
pub fn snap_targets(
    time: &TimeContext,
    markers: &MarkerStore,
    window_start_ms: f64,
    window_end_ms: f64,
    ghost_ms: Option<f64>,
) -> Vec<f64> {
    let mut targets = time.grid_lines(window_start_ms, window_end_ms);

    for layer in markers.displayed_layers() {
        targets.extend(
            layer
                .markers
                .iter()
                .map(|&m| m as f64)
                .filter(|&m| m >= window_start_ms && m <= window_end_ms),
        );
    }

    targets.extend(ghost_ms);
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::StemCount;
    use stemtap_transport::LayerId;

    const PX_PER_MS: f64 = 800.0 / 20_000.0;

    #[test]
    fn test_threshold_is_inclusive() {
        assert_eq!(resolve(8750.0, &[10_000.0], PX_PER_MS), 10_000.0);
        assert_eq!(resolve(11_250.0, &[10_000.0], PX_PER_MS), 10_000.0);
    }

    #[test]
    fn test_beyond_threshold_is_unchanged() {
        assert_eq!(resolve(8740.0, &[10_000.0], PX_PER_MS), 8740.0);
    }

    #[test]
    fn test_closest_target_wins() {
        let targets = [9000.0, 9600.0, 10_000.0];
        assert_eq!(resolve(9500.0, &targets, PX_PER_MS), 9600.0);
    }

    #[test]
    fn test_first_of_equal_targets_wins() {
        let targets = [9900.0, 10_100.0];
        assert_eq!(resolve(10_000.0, &targets, PX_PER_MS), 9900.0);
    }

    #[test]
    fn test_degenerate_input() {
        assert_eq!(resolve(5000.0, &[], PX_PER_MS), 5000.0);
        assert_eq!(resolve(5000.0, &[5010.0], 0.0), 5000.0);
        assert_eq!(resolve(5000.0, &[5010.0], f64::NAN), 5000.0);
        assert_eq!(resolve(5000.0, &[f64::NAN, 5010.0], PX_PER_MS), 5010.0);
        assert!(resolve(f64::NAN, &[5010.0], PX_PER_MS).is_nan());
    }

    #[test]
    fn test_targets_cover_grid_markers_and_ghost() {
        let mut store = MarkerStore::new(StemCount::Six);
        store.add_marker(LayerId::Drums, 5_000);
        store.add_marker(LayerId::Drums, 50_000);
        store.add_marker(LayerId::Bass, 6_000);
        store.add_marker(LayerId::Piano, 7_000);
        store.toggle_visibility(LayerId::Piano);

        let targets = snap_targets(&TimeContext::new(120.0), &store, 0.0, 10_000.0, Some(9_100.0));

        assert_eq!(targets, vec![0.0, 4000.0, 8000.0, 5000.0, 6000.0, 9100.0]);
    }

    #[test]
    fn test_targets_respect_stem_count() {
        let mut store = MarkerStore::new(StemCount::Six);
        store.add_marker(LayerId::Guitar, 1_000);
        store.set_stem_count(StemCount::Two);

        let targets = snap_targets(&TimeContext::new(0.0), &store, 0.0, 10_000.0, None);
        assert!(targets.is_empty());
    }
}

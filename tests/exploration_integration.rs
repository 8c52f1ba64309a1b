//! Integration tests for the exploration pipeline
//!
//! Positions flow through the session into the grid and metrics; overlays
//! are built from the resulting grid.

use fog_explorer::core::config::{ExplorationConfig, MetricsConfig};
use fog_explorer::core::geodesy::{self, METERS_PER_MILE};
use fog_explorer::core::types::{Coordinate, Position};
use fog_explorer::metrics::progress::ExplorationMetrics;
use fog_explorer::render::overlay::OverlayDetail;
use fog_explorer::render::viewport::Viewport;
use fog_explorer::{ExplorationSession, ExplorationState, SessionEvent};

const LA: Coordinate = Coordinate::new(34.0522, -118.2437);

fn position(c: Coordinate) -> Position {
    Position::at(c.lat, c.lon)
}

// ============================================================================
// Grid and distance
// ============================================================================

#[test]
fn test_single_position_marks_three_by_three() {
    let mut session = ExplorationSession::default();
    let snap = session.apply_position(&position(LA));

    assert_eq!(session.grid().len(), 9);
    assert_eq!(snap.visited_cell_count, 9);
    assert_eq!(snap.total_distance_miles, 0.0);
}

#[test]
fn test_same_cell_positions_add_nothing() {
    let mut session = ExplorationSession::default();
    let cell = session.grid().cell_for(LA);
    let b = cell.bounds(0.003);

    session.apply_position(&position(Coordinate::new(b.min_lat + 0.0005, b.min_lon + 0.0005)));
    session.apply_position(&position(Coordinate::new(b.max_lat - 0.0005, b.max_lon - 0.0005)));
    assert_eq!(session.grid().len(), 9);
}

/// A closed square loop with 1-mile sides sums to 4 miles. The corners are
/// placed with the equirectangular offset while distance is great-circle, so
/// allow 1%.
#[test]
fn test_closed_square_loop_distance() {
    let side = METERS_PER_MILE;
    let c0 = LA;
    let c1 = geodesy::offset(c0, side, 0.0);
    let c2 = geodesy::offset(c1, 0.0, side);
    let c3 = geodesy::offset(c2, -side, 0.0);

    let mut session = ExplorationSession::default();
    for corner in [c0, c1, c2, c3, c0] {
        session.apply_position(&position(corner));
    }

    let miles = session.snapshot().total_distance_miles;
    assert!((miles - 4.0).abs() < 0.04, "loop measured {} mi", miles);
}

#[test]
fn test_level_threshold_boundaries() {
    let mut metrics = ExplorationMetrics::new(&MetricsConfig { cells_per_level: 100 });

    metrics.record_visited_cell_count_change(100);
    assert_eq!(metrics.level(), 2);
    assert_eq!(metrics.cells_until_next_level(), 100);

    metrics.record_visited_cell_count_change(99);
    assert_eq!(metrics.level(), 1);
    assert_eq!(metrics.cells_until_next_level(), 1);
}

#[test]
fn test_walk_levels_up() {
    let mut session = ExplorationSession::default();
    // Walking east one cell at a time adds a 3-cell column per step
    for i in 0..40 {
        let c = Coordinate::new(LA.lat, LA.lon + i as f64 * 0.003);
        session.apply_position(&position(c));
    }
    let snap = session.snapshot();
    assert!(snap.visited_cell_count >= 100);
    assert_eq!(snap.level as usize, snap.visited_cell_count / 100 + 1);
}

// ============================================================================
// Viewport and overlay
// ============================================================================

#[test]
fn test_viewport_clamp_keeps_center() {
    let mut session = ExplorationSession::default();
    session.set_viewport(LA, 200.0, 200.0);

    let vp = session.viewport();
    assert_eq!(vp.lat_span, 75.0);
    assert_eq!(vp.lon_span, 75.0);
    assert_eq!(vp.center, LA);
}

#[test]
fn test_overlay_holes_inside_outer_ring() {
    let mut session = ExplorationSession::default();
    for i in 0..20 {
        let c = geodesy::offset(LA, i as f64 * 150.0, i as f64 * 90.0);
        session.apply_position(&position(c));
    }

    for span in [0.005, 0.02, 0.1, 1.0] {
        let overlay = session.build_overlay(&Viewport::around(LA, span));
        let b = overlay.bounds;
        for hole in &overlay.holes {
            assert_eq!(hole.0.first(), hole.0.last());
            for p in &hole.0 {
                assert!(p.y >= b.min_lat && p.y <= b.max_lat, "lat {} outside at span {}", p.y, span);
                assert!(p.x >= b.min_lon && p.x <= b.max_lon, "lon {} outside at span {}", p.x, span);
            }
        }
    }
}

#[test]
fn test_overlay_lod_breakpoints() {
    let mut session = ExplorationSession::default();
    session.apply_position(&position(LA));

    assert_eq!(
        session.build_overlay(&Viewport::around(LA, 0.05)).detail,
        OverlayDetail::PerCell
    );
    assert_eq!(
        session.build_overlay(&Viewport::around(LA, 5.0)).detail,
        OverlayDetail::Fogged
    );
}

// ============================================================================
// Persistence and reset
// ============================================================================

#[test]
fn test_serialize_restore_round_trip() {
    let mut session = ExplorationSession::default();
    for i in 0..25 {
        let c = geodesy::offset(LA, i as f64 * 200.0, (i % 5) as f64 * 300.0);
        session.apply_position(&position(c));
    }
    let state = session.serialize_state();
    let json = state.to_json().unwrap();

    let mut restored = ExplorationSession::default();
    restored.restore_state(ExplorationState::from_json(&json).unwrap()).unwrap();

    let mut original: Vec<_> = session.grid().iter().copied().collect();
    let mut copy: Vec<_> = restored.grid().iter().copied().collect();
    original.sort();
    copy.sort();
    assert_eq!(original, copy);
    assert!((restored.snapshot().total_distance_miles - session.snapshot().total_distance_miles).abs() < 1e-9);
    assert_eq!(restored.snapshot().level, session.snapshot().level);
}

#[test]
fn test_state_file_round_trip() {
    let mut session = ExplorationSession::default();
    session.apply_position(&position(LA));

    let path = std::env::temp_dir().join(format!("fog-explorer-state-{}.json", std::process::id()));
    session.serialize_state().save(&path).unwrap();
    let loaded = ExplorationState::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded, session.serialize_state());
}

#[test]
fn test_reset_clears_distance_and_cells() {
    let mut session = ExplorationSession::default();
    session.apply_position(&position(LA));
    session.apply_position(&position(geodesy::offset(LA, 1000.0, 0.0)));
    assert!(session.snapshot().total_distance_miles > 0.0);

    let mut events = session.subscribe();
    session.reset();

    let snap = session.snapshot();
    assert_eq!(snap.total_distance_miles, 0.0);
    assert_eq!(snap.visited_cell_count, 0);
    assert_eq!(snap.level, 1);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Reset);

    // No distance from the pre-reset position
    let snap = session.apply_position(&position(LA));
    assert_eq!(snap.total_distance_miles, 0.0);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_partial_toml_config() {
    let config = ExplorationConfig::from_toml_str(
        r#"
        [grid]
        max_cells = 20

        [metrics]
        cells_per_level = 10
        "#,
    )
    .unwrap();
    assert_eq!(config.grid.cell_size_deg, 0.003);

    let mut session = ExplorationSession::new(config).unwrap();
    session.apply_position(&position(LA));
    session.apply_position(&position(Coordinate::new(LA.lat + 0.03, LA.lon)));
    session.apply_position(&position(Coordinate::new(LA.lat + 0.06, LA.lon)));

    // Capped at 20 with oldest cells evicted first
    assert_eq!(session.grid().len(), 20);
    assert_eq!(session.snapshot().level, 3);
}

#[test]
fn test_inconsistent_config_rejected() {
    let result = ExplorationConfig::from_toml_str(
        r#"
        [location]
        accuracy_threshold_m = 800.0
        relaxed_accuracy_threshold_m = 400.0
        "#,
    );
    assert!(result.is_err());
}

//! End-to-end engine behavior through the public backend contract.

use std::collections::HashSet;

use stagedust::glam::Vec2;
use stagedust::{
    create_backend, AudioSnapshot, CellKey, FrameInput, GridEvent, GridSize, ParticleBackend,
    ParticleEngine, QualityTier, Tunables, NUM_BINS,
};

fn frame<'a>(
    selected: &'a HashSet<CellKey>,
    audio: &'a AudioSnapshot,
    is_playing: bool,
) -> FrameInput<'a> {
    FrameInput {
        dt: 1.0 / 60.0,
        is_playing,
        grid: GridSize::new(3, 4),
        selected,
        triggered: None,
        beat_index: 0,
        hovered: None,
        cursor: None,
        audio,
    }
}

fn busy_audio() -> AudioSnapshot {
    let mut audio = AudioSnapshot::silent();
    audio.active = true;
    for bin in 0..NUM_BINS {
        audio.magnitudes[bin] = 0.3 + 0.5 * ((bin as f32) * 0.4).sin().abs();
        audio.transients[bin] = if bin % 7 == 0 { 0.8 } else { 0.1 };
        audio.pans[bin] = ((bin as f32) * 0.23).sin();
    }
    audio.bass_magnitude = 0.7;
    audio.bass_transient = 0.6;
    audio.dominant_bass_hz = 45.0;
    audio
}

#[test]
fn test_population_and_buffers_stay_constant_and_finite() {
    let mut engine = ParticleEngine::with_seed(QualityTier::Medium, Tunables::default(), 1);
    let selected: HashSet<CellKey> = [CellKey::new(0, 0), CellKey::new(2, 1)].into();
    let audio = busy_audio();
    let count = engine.particle_count();

    for frame_index in 0..600 {
        // Alternate regimes, with a dt spike partway through
        let mut input = frame(&selected, &audio, frame_index % 200 < 140);
        if frame_index == 300 {
            input.dt = 2.5;
        }
        engine.update_frame(&input);

        assert_eq!(engine.particle_count(), count);
        let attributes = engine.attributes();
        assert_eq!(attributes.positions.len(), count * 3);
        assert_eq!(attributes.colors.len(), count * 3);
        assert_eq!(attributes.sizes.len(), count);
        assert_eq!(attributes.opacities.len(), count);
        assert!(attributes.positions.iter().all(|v| v.is_finite()));
        assert!(attributes.colors.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(attributes.opacities.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(attributes.sizes.iter().all(|v| v.is_finite() && *v >= 0.0));
    }
}

#[test]
fn test_transition_scenario_play_then_stop() {
    let mut engine = ParticleEngine::with_seed(QualityTier::Medium, Tunables::default(), 2);
    let selected = HashSet::new();
    let audio = busy_audio();

    let mut frames_up = 0;
    while engine.visual_weight() <= 0.99 {
        engine.update_frame(&frame(&selected, &audio, true));
        frames_up += 1;
        assert!(frames_up < 2_000, "transition never reached the visualizer");
    }

    let mut frames_down = 0;
    while engine.visual_weight() >= 0.01 {
        engine.update_frame(&frame(&selected, &audio, false));
        frames_down += 1;
        assert!(frames_down < 4_000, "transition never returned to the stage");
    }

    // Returning to the soundstage is the slower direction
    assert!(frames_down > frames_up);
}

#[test]
fn test_drag_gesture_via_backend_trait() {
    let mut backend = create_backend(QualityTier::Medium, Tunables::default());
    let selected = HashSet::new();
    let audio = AudioSnapshot::silent();
    backend.update_frame(&frame(&selected, &audio, false));

    let grid_tunables = Tunables::default().grid;
    let spacing = (grid_tunables.extent / 3.0).min(grid_tunables.max_spacing);
    let a = Vec2::new(-1.5 * spacing, -1.0 * spacing);
    let b = Vec2::new(-0.5 * spacing, -1.0 * spacing);

    let mut selects = 0;
    for event in backend.pointer_down(a) {
        if matches!(event, GridEvent::Select(_)) {
            selects += 1;
        }
    }
    for event in backend.pointer_move(b) {
        if matches!(event, GridEvent::Select(_)) {
            selects += 1;
        }
    }
    // Revisit the first cell: no third select
    for event in backend.pointer_move(a) {
        if matches!(event, GridEvent::Select(_)) {
            selects += 1;
        }
    }
    backend.pointer_up();

    assert_eq!(selects, 2);
}

#[test]
fn test_cursor_input_keeps_simulation_stable() {
    let mut engine = ParticleEngine::with_seed(QualityTier::Medium, Tunables::default(), 4);
    let selected = HashSet::new();
    let audio = AudioSnapshot::silent();

    for frame_index in 0..240 {
        let mut input = frame(&selected, &audio, false);
        input.cursor = Some([
            0.5 + 0.4 * (frame_index as f32 * 0.05).sin(),
            0.5 + 0.4 * (frame_index as f32 * 0.07).cos(),
        ]);
        engine.update_frame(&input);
    }
    assert!(engine.attributes().positions.iter().all(|v| v.is_finite()));
}

#[test]
fn test_grid_resize_and_empty_selection_do_not_disturb() {
    let mut engine = ParticleEngine::with_seed(QualityTier::Medium, Tunables::default(), 6);
    let selected = HashSet::new();
    let audio = AudioSnapshot::silent();

    for (rows, cols) in [(3, 4), (5, 5), (1, 1), (0, 0), (2, 8)] {
        let mut input = frame(&selected, &audio, false);
        input.grid = GridSize::new(rows, cols);
        input.triggered = Some(CellKey::new(0, 0));
        input.beat_index = rows as u64;
        for _ in 0..10 {
            engine.update_frame(&input);
        }
    }
    assert!(engine.attributes().positions.iter().all(|v| v.is_finite()));
}

#[test]
fn test_attribute_byte_views_match_buffer_sizes() {
    let mut engine = ParticleEngine::with_seed(QualityTier::Medium, Tunables::default(), 8);
    let selected = HashSet::new();
    let audio = AudioSnapshot::silent();
    engine.update_frame(&frame(&selected, &audio, false));

    let attributes = engine.attributes();
    let count = engine.particle_count();
    assert_eq!(attributes.position_bytes().len(), count * 3 * 4);
    assert_eq!(attributes.color_bytes().len(), count * 3 * 4);
    assert_eq!(attributes.size_bytes().len(), count * 4);
    assert_eq!(attributes.opacity_bytes().len(), count * 4);
}

#[test]
fn test_triggered_selected_cell_glows_brighter() {
    let mut engine = ParticleEngine::with_seed(QualityTier::Medium, Tunables::default(), 10);
    let cell = CellKey::new(1, 1);
    let selected: HashSet<CellKey> = [cell].into();
    let audio = AudioSnapshot::silent();

    // Settle on the grid first
    for _ in 0..120 {
        engine.update_frame(&frame(&selected, &audio, false));
    }
    let brightness = |engine: &ParticleEngine| {
        let attributes = engine.attributes();
        attributes.colors.iter().sum::<f32>()
    };
    let before = brightness(&engine);

    let mut input = frame(&selected, &audio, false);
    input.triggered = Some(cell);
    input.beat_index = 1;
    engine.update_frame(&input);
    engine.update_frame(&input);

    assert!(brightness(&engine) > before);
}

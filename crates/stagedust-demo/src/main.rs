//! Interactive demo for the stagedust engine.
//!
//! Drives the particle backend with a synthesized audio snapshot (no
//! analyzer needed) inside a nannou window. Space toggles playback,
//! click/drag paints grid cells, the mouse doubles as the attraction
//! cursor while the grid is showing.

use std::collections::HashSet;
use std::env;

use nannou::prelude::*;
use stagedust::glam;
use stagedust::{create_backend, QualityTier, Tunables};
use stagedust_api::{
    AudioSnapshot, CellKey, FrameInput, GridEvent, GridSize, ParticleBackend, NUM_BINS,
};

const GRID: GridSize = GridSize { rows: 3, cols: 4 };

fn main() {
    nannou::app(model).update(update).run();
}

struct Model {
    backend: Box<dyn ParticleBackend>,
    world_w: f32,
    world_h: f32,
    selected: HashSet<CellKey>,
    is_playing: bool,
    audio: AudioSnapshot,
    clock: f32,
    /// Soundstage test-signal cycling
    beat_index: u64,
    trigger_clock: f32,
    trigger_slot: usize,
    triggered: Option<CellKey>,
    hovered: Option<CellKey>,
}

fn model(app: &App) -> Model {
    let args: Vec<String> = env::args().collect();
    let tier = if args.contains(&"--low".to_string()) {
        QualityTier::Low
    } else {
        QualityTier::Medium
    };

    app.new_window()
        .view(view)
        .key_pressed(key_pressed)
        .mouse_pressed(mouse_pressed)
        .mouse_moved(mouse_moved)
        .mouse_released(mouse_released)
        .size(1280, 720)
        .build()
        .unwrap();

    let tunables = Tunables::load();
    let world_w = tunables.world.width;
    let world_h = tunables.world.height;
    println!("stagedust demo: {:?} tier, space toggles playback", tier);

    Model {
        backend: create_backend(tier, tunables),
        world_w,
        world_h,
        selected: HashSet::new(),
        is_playing: false,
        audio: AudioSnapshot::silent(),
        clock: 0.0,
        beat_index: 0,
        trigger_clock: 0.0,
        trigger_slot: 0,
        triggered: None,
        hovered: None,
    }
}

fn world_scale(model: &Model, bounds: Rect) -> f32 {
    (bounds.w() / model.world_w).min(bounds.h() / model.world_h)
}

fn to_world(model: &Model, bounds: Rect, screen: Point2) -> glam::Vec2 {
    let scale = world_scale(model, bounds);
    glam::Vec2::new(screen.x / scale, screen.y / scale)
}

/// Procedural stand-in for a real analyzer: a 120 BPM bass pulse, a
/// sweeping melodic bump, and hats in the top bins.
fn synthesize(clock: f32) -> AudioSnapshot {
    let mut audio = AudioSnapshot::silent();
    audio.active = true;

    let beat = clock * 2.0;
    let beat_phase = beat.fract();
    let bass_env = (1.0 - beat_phase * 3.0).max(0.0);
    audio.bass_magnitude = 0.35 + 0.6 * bass_env;
    audio.bass_transient = if beat_phase < 0.08 { 0.9 } else { 0.0 };
    audio.dominant_bass_hz = 38.0 + 18.0 * (clock * 0.13).sin();

    let sweep = (NUM_BINS as f32) * (0.3 + 0.2 * (clock * 0.21).sin());
    let hat = beat_phase > 0.5 && beat_phase < 0.56;
    for bin in 0..NUM_BINS {
        let b = bin as f32;
        let low_shelf = if bin < 6 { 0.7 * bass_env } else { 0.0 };
        let bump = 0.6 * (-((b - sweep) * 0.25).powi(2)).exp();
        audio.magnitudes[bin] = (low_shelf + bump + 0.05).min(1.0);
        audio.transients[bin] = if bin < 6 && beat_phase < 0.08 {
            0.9
        } else if bin >= 48 && hat {
            0.7
        } else {
            0.0
        };
        audio.pans[bin] = 0.8 * (b * 0.3 + clock * 0.5).sin();
    }
    audio
}

fn apply_events(selected: &mut HashSet<CellKey>, hovered: &mut Option<CellKey>, events: &[GridEvent]) {
    for event in events {
        match event {
            GridEvent::Select(key) => {
                selected.insert(*key);
            }
            GridEvent::Deselect(key) => {
                selected.remove(key);
            }
            GridEvent::HoverChange(key) => *hovered = *key,
        }
    }
}

fn update(app: &App, model: &mut Model, update: Update) {
    let dt = update.since_last.as_secs_f32();
    model.clock += dt;

    model.audio = if model.is_playing {
        synthesize(model.clock)
    } else {
        AudioSnapshot::silent()
    };

    // While the grid is showing, step the test signal through the
    // selection every half second.
    if !model.is_playing {
        model.trigger_clock += dt;
        if model.trigger_clock >= 0.5 && !model.selected.is_empty() {
            model.trigger_clock = 0.0;
            model.beat_index += 1;
            model.trigger_slot = (model.trigger_slot + 1) % model.selected.len();
            model.triggered = model.selected.iter().nth(model.trigger_slot).copied();
        }
        if model.selected.is_empty() {
            model.triggered = None;
        }
    } else {
        model.triggered = None;
    }

    let bounds = app.window_rect();
    let cursor = if model.is_playing {
        None
    } else {
        let mouse = app.mouse.position();
        let scale = world_scale(model, bounds);
        Some([
            (mouse.x / scale + model.world_w * 0.5) / model.world_w,
            (mouse.y / scale + model.world_h * 0.5) / model.world_h,
        ])
    };

    let input = FrameInput {
        dt,
        is_playing: model.is_playing,
        grid: GRID,
        selected: &model.selected,
        triggered: model.triggered,
        beat_index: model.beat_index,
        hovered: model.hovered,
        cursor,
        audio: &model.audio,
    };
    model.backend.update_frame(&input);
}

fn view(app: &App, model: &Model, frame: Frame) {
    let draw = app.draw();
    draw.background().color(BLACK);

    let bounds = app.window_rect();
    let scale = world_scale(model, bounds);
    let attributes = model.backend.attributes();

    let points = (0..model.backend.particle_count()).map(|i| {
        let x = attributes.positions[i * 3] * scale;
        let y = attributes.positions[i * 3 + 1] * scale;
        let color = srgba(
            attributes.colors[i * 3],
            attributes.colors[i * 3 + 1],
            attributes.colors[i * 3 + 2],
            attributes.opacities[i],
        );
        (pt3(x, y, 0.0), color)
    });
    draw.mesh().points_colored(points);

    draw.to_frame(app, &frame).unwrap();
}

fn key_pressed(app: &App, model: &mut Model, key: Key) {
    match key {
        Key::Space => model.is_playing = !model.is_playing,
        Key::Q | Key::Escape => app.quit(),
        _ => {}
    }
}

fn mouse_pressed(app: &App, model: &mut Model, button: MouseButton) {
    if button != MouseButton::Left {
        return;
    }
    let world = to_world(model, app.window_rect(), app.mouse.position());
    let events = model.backend.pointer_down(world).to_vec();
    apply_events(&mut model.selected, &mut model.hovered, &events);
}

fn mouse_moved(app: &App, model: &mut Model, position: Point2) {
    let world = to_world(model, app.window_rect(), position);
    let events = model.backend.pointer_move(world).to_vec();
    apply_events(&mut model.selected, &mut model.hovered, &events);
}

fn mouse_released(_app: &App, model: &mut Model, button: MouseButton) {
    if button != MouseButton::Left {
        return;
    }
    model.backend.pointer_up();
}

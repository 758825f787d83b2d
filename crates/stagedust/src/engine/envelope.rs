//! Per-cell trigger envelopes.
//!
//! Each selected cell that fires a test signal gets a flash-and-fade
//! envelope: a near-instant linear attack, then an exponential release.
//! The force pass reads the level to glow and jitter that cell's
//! particles.

use std::collections::HashMap;

use stagedust_api::CellKey;

/// Attack ramp length, seconds.
const ATTACK_SECS: f32 = 0.010;
/// Release time constant, seconds.
const RELEASE_TAU: f32 = 0.4;
/// Level below which a releasing envelope is dropped.
const IDLE_FLOOR: f32 = 0.01;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Stage {
    Attack,
    Release,
}

#[derive(Copy, Clone, Debug)]
struct Envelope {
    stage: Stage,
    /// Engine clock when the current stage began
    started: f32,
    /// Level the release decays from
    from: f32,
    value: f32,
}

pub struct EnvelopeTracker {
    envelopes: HashMap<CellKey, Envelope>,
    last_trigger: Option<(CellKey, u64)>,
}

impl EnvelopeTracker {
    pub fn new() -> Self {
        Self {
            envelopes: HashMap::new(),
            last_trigger: None,
        }
    }

    /// Advance all envelopes to `now`.
    ///
    /// A new (cell, beat) trigger restarts that cell's attack from zero and
    /// releases every other tracked cell from its current level. Envelopes
    /// for cells that left the selection are pruned.
    pub fn tick(
        &mut self,
        now: f32,
        triggered: Option<CellKey>,
        beat_index: u64,
        selected: &std::collections::HashSet<CellKey>,
    ) {
        let trigger = triggered.map(|key| (key, beat_index));
        if trigger != self.last_trigger {
            self.last_trigger = trigger;
            for (key, env) in self.envelopes.iter_mut() {
                if Some(*key) != triggered && env.stage == Stage::Attack {
                    env.stage = Stage::Release;
                    env.started = now;
                    env.from = env.value;
                }
            }
            if let Some(key) = triggered {
                self.envelopes.insert(
                    key,
                    Envelope {
                        stage: Stage::Attack,
                        started: now,
                        from: 0.0,
                        value: 0.0,
                    },
                );
            }
        }

        self.envelopes.retain(|key, env| {
            if !selected.contains(key) {
                return false;
            }
            let elapsed = (now - env.started).max(0.0);
            match env.stage {
                Stage::Attack => {
                    if elapsed >= ATTACK_SECS {
                        env.stage = Stage::Release;
                        env.started = now;
                        env.from = 1.0;
                        env.value = 1.0;
                    } else {
                        env.value = elapsed / ATTACK_SECS;
                    }
                    true
                }
                Stage::Release => {
                    env.value = env.from * (-elapsed / RELEASE_TAU).exp();
                    env.value >= IDLE_FLOOR
                }
            }
        });
    }

    /// Current envelope level for a cell, zero if untracked.
    pub fn level(&self, key: CellKey) -> f32 {
        self.envelopes.get(&key).map_or(0.0, |env| env.value)
    }

    pub fn tracked(&self) -> usize {
        self.envelopes.len()
    }
}

impl Default for EnvelopeTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn selection(keys: &[CellKey]) -> HashSet<CellKey> {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_attack_reaches_full_then_releases() {
        let mut tracker = EnvelopeTracker::new();
        let cell = CellKey::new(1, 1);
        let selected = selection(&[cell]);

        tracker.tick(0.0, Some(cell), 0, &selected);
        assert!(tracker.level(cell) < 1.0);

        tracker.tick(0.02, Some(cell), 0, &selected);
        // Past the attack, level is at or just below 1 and decaying
        let peak = tracker.level(cell);
        assert!(peak > 0.9);

        tracker.tick(0.5, Some(cell), 0, &selected);
        let decayed = tracker.level(cell);
        assert!(decayed < peak);
        assert!(decayed > 0.0);
    }

    #[test]
    fn test_release_removes_below_floor() {
        let mut tracker = EnvelopeTracker::new();
        let cell = CellKey::new(0, 0);
        let selected = selection(&[cell]);

        tracker.tick(0.0, Some(cell), 0, &selected);
        tracker.tick(0.02, Some(cell), 0, &selected);
        // Several time constants later the envelope is gone
        tracker.tick(5.0, Some(cell), 0, &selected);
        assert_eq!(tracker.level(cell), 0.0);
        assert_eq!(tracker.tracked(), 0);
    }

    #[test]
    fn test_new_trigger_releases_previous_cell() {
        let mut tracker = EnvelopeTracker::new();
        let a = CellKey::new(0, 0);
        let b = CellKey::new(1, 0);
        let selected = selection(&[a, b]);

        tracker.tick(0.0, Some(a), 0, &selected);
        tracker.tick(0.02, Some(a), 0, &selected);
        let a_peak = tracker.level(a);

        tracker.tick(0.04, Some(b), 1, &selected);
        assert!(tracker.level(a) <= a_peak);
        tracker.tick(0.06, Some(b), 1, &selected);
        assert!(tracker.level(b) > 0.9);
    }

    #[test]
    fn test_same_cell_retrigger_on_new_beat() {
        let mut tracker = EnvelopeTracker::new();
        let cell = CellKey::new(2, 2);
        let selected = selection(&[cell]);

        tracker.tick(0.0, Some(cell), 0, &selected);
        tracker.tick(1.0, Some(cell), 0, &selected);
        let faded = tracker.level(cell);

        // Same cell, next beat: envelope restarts from the attack
        tracker.tick(1.001, Some(cell), 1, &selected);
        tracker.tick(1.02, Some(cell), 1, &selected);
        assert!(tracker.level(cell) > faded);
    }

    #[test]
    fn test_deselected_cells_are_pruned() {
        let mut tracker = EnvelopeTracker::new();
        let cell = CellKey::new(3, 1);
        tracker.tick(0.0, Some(cell), 0, &selection(&[cell]));
        assert_eq!(tracker.tracked(), 1);

        tracker.tick(0.016, Some(cell), 0, &selection(&[]));
        assert_eq!(tracker.tracked(), 0);
        assert_eq!(tracker.level(cell), 0.0);
    }

    #[test]
    fn test_no_trigger_no_envelope() {
        let mut tracker = EnvelopeTracker::new();
        tracker.tick(0.0, None, 0, &selection(&[]));
        assert_eq!(tracker.tracked(), 0);
    }
}

//! Regime transition state.
//!
//! One scalar eased exponentially between soundstage (0) and visualizer
//! (1), plus a deploy ramp that staggers particle arrival whenever the
//! grid reforms after playback stops.

use crate::config::TransitionTunables;

pub struct TransitionController {
    value: f32,
    deploy: f32,
}

impl TransitionController {
    pub fn new() -> Self {
        Self {
            value: 0.0,
            deploy: 1.0,
        }
    }

    pub fn update(&mut self, dt: f32, is_playing: bool, tunables: &TransitionTunables) {
        let (target, rate) = if is_playing {
            (1.0, tunables.to_visual_rate)
        } else {
            (0.0, tunables.to_stage_rate)
        };

        self.value += (target - self.value) * (1.0 - (-rate * dt).exp());
        // Snap once close enough so the scalar settles instead of drifting
        // asymptotically forever.
        if (target - self.value).abs() < tunables.snap_epsilon {
            self.value = target;
        }

        if is_playing {
            self.deploy = 0.0;
        } else if self.deploy < 1.0 {
            self.deploy = (self.deploy + dt / tunables.deploy_secs).min(1.0);
        }
    }

    /// Blend weight of the visualizer regime.
    pub fn visual_weight(&self) -> f32 {
        self.value
    }

    /// Blend weight of the soundstage regime.
    pub fn stage_weight(&self) -> f32 {
        1.0 - self.value
    }

    /// Linear deploy progress in [0,1].
    pub fn deploy(&self) -> f32 {
        self.deploy
    }

    /// Ease-in-ease-out remap of the deploy ramp, for cosmetic scaling.
    pub fn deploy_eased(&self) -> f32 {
        let d = self.deploy;
        d * d * (3.0 - 2.0 * d)
    }

    /// Whether a particle with the given random phase has been seeded into
    /// its grid behavior yet. Phases are uniform in [0,1), so the share of
    /// seeded particles tracks the deploy ramp.
    pub fn is_seeded(&self, phase: f32) -> bool {
        phase <= self.deploy
    }
}

impl Default for TransitionController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converges_and_snaps_to_target() {
        let tunables = TransitionTunables::default();
        let mut transition = TransitionController::new();

        for _ in 0..600 {
            transition.update(1.0 / 60.0, true, &tunables);
        }
        assert_eq!(transition.visual_weight(), 1.0);

        for _ in 0..600 {
            transition.update(1.0 / 60.0, false, &tunables);
        }
        assert_eq!(transition.visual_weight(), 0.0);
    }

    #[test]
    fn test_monotonic_approach() {
        let tunables = TransitionTunables::default();
        let mut transition = TransitionController::new();
        let mut previous = transition.visual_weight();
        for _ in 0..200 {
            transition.update(1.0 / 60.0, true, &tunables);
            assert!(transition.visual_weight() >= previous);
            previous = transition.visual_weight();
        }
    }

    #[test]
    fn test_switch_to_visualizer_is_faster() {
        let tunables = TransitionTunables::default();

        let mut rising = TransitionController::new();
        let mut frames_up = 0;
        while rising.visual_weight() < 0.99 {
            rising.update(1.0 / 60.0, true, &tunables);
            frames_up += 1;
            assert!(frames_up < 10_000);
        }

        let mut falling = TransitionController::new();
        for _ in 0..1000 {
            falling.update(1.0 / 60.0, true, &tunables);
        }
        let mut frames_down = 0;
        while falling.visual_weight() > 0.01 {
            falling.update(1.0 / 60.0, false, &tunables);
            frames_down += 1;
            assert!(frames_down < 10_000);
        }

        assert!(frames_up < frames_down);
    }

    #[test]
    fn test_deploy_resets_during_playback_and_ramps_after() {
        let tunables = TransitionTunables::default();
        let mut transition = TransitionController::new();

        transition.update(1.0 / 60.0, true, &tunables);
        assert_eq!(transition.deploy(), 0.0);
        assert!(!transition.is_seeded(0.5));

        let frames = (tunables.deploy_secs * 60.0) as usize + 2;
        for _ in 0..frames {
            transition.update(1.0 / 60.0, false, &tunables);
        }
        assert_eq!(transition.deploy(), 1.0);
        assert!(transition.is_seeded(0.999));
        assert_eq!(transition.deploy_eased(), 1.0);
    }
}

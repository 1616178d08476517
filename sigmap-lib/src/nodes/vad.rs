use crate::graph::GraphError;

const KIND: &str = "VoiceActivityDetectorNode";

/// Tuning for the voice-activity detector.
///
/// The detector tracks a smoothed energy envelope with separate attack
/// (`tau_up`) and release (`tau_down`) time constants, compresses levels
/// above `large_input` by `gain_att`, normalises by `level_threshold` and
/// applies hysteresis between `threshold_down` and `threshold_up`.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceActivityDetectorParams {
    pub sample_rate: f64,
    /// Seconds covered by one input frame.
    pub frame_duration: f64,
    pub tau_up: f64,
    pub tau_down: f64,
    pub large_input: f64,
    pub gain_att: f64,
    pub threshold_up: f64,
    pub threshold_down: f64,
    pub level_threshold: f64,
}

impl Default for VoiceActivityDetectorParams {
    fn default() -> Self {
        Self {
            sample_rate: 8000.0,
            frame_duration: 0.032,
            tau_up: 1.54,
            tau_down: 0.074326,
            large_input: 2.400160,
            gain_att: 0.002885,
            threshold_up: 3.552713,
            threshold_down: 0.931252,
            level_threshold: 0.007885,
        }
    }
}

impl VoiceActivityDetectorParams {
    pub fn validate(&self) -> Result<(), GraphError> {
        let positive = [
            ("sample_rate", self.sample_rate),
            ("frame_duration", self.frame_duration),
            ("tau_up", self.tau_up),
            ("tau_down", self.tau_down),
            ("large_input", self.large_input),
            ("level_threshold", self.level_threshold),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(GraphError::invalid(
                    KIND,
                    format!("{name} must be positive, got {value}"),
                ));
            }
        }
        if !(self.gain_att.is_finite() && self.gain_att >= 0.0) {
            return Err(GraphError::invalid(
                KIND,
                format!("gain_att must be non-negative, got {}", self.gain_att),
            ));
        }
        if !(self.threshold_down <= self.threshold_up) {
            return Err(GraphError::invalid(
                KIND,
                format!(
                    "threshold_down ({}) must not exceed threshold_up ({})",
                    self.threshold_down, self.threshold_up
                ),
            ));
        }
        if self.frame_duration * self.sample_rate < 1.0 {
            return Err(GraphError::invalid(
                KIND,
                "frame_duration covers less than one sample",
            ));
        }
        Ok(())
    }
}

/// Mean squared value of a feature frame.
pub fn frame_energy(frame: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = frame
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), x| (sum + x * x, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Precomputed detector coefficients. Immutable once compiled; the
/// per-instance envelope lives in [`VadState`].
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceActivityDetector {
    params: VoiceActivityDetectorParams,
    alpha_up: f64,
    alpha_down: f64,
}

impl VoiceActivityDetector {
    pub fn new(params: VoiceActivityDetectorParams) -> Result<Self, GraphError> {
        params.validate()?;
        let alpha = |tau: f64| 1.0 - (-params.frame_duration / tau).exp();
        Ok(Self {
            alpha_up: alpha(params.tau_up),
            alpha_down: alpha(params.tau_down),
            params,
        })
    }

    pub fn params(&self) -> &VoiceActivityDetectorParams {
        &self.params
    }

    /// Maps a smoothed level onto the threshold scale.
    pub fn normalize(&self, level: f64) -> f64 {
        let p = &self.params;
        let compressed = if level > p.large_input {
            p.large_input + (level - p.large_input) * p.gain_att
        } else {
            level
        };
        compressed / p.level_threshold
    }

    /// Advances `state` by one frame and returns the new activity flag.
    pub fn process(&self, state: &mut VadState, frame: &[f64]) -> bool {
        self.update(state, frame_energy(frame.iter().copied()))
    }

    pub fn update(&self, state: &mut VadState, energy: f64) -> bool {
        let alpha = if energy > state.level {
            self.alpha_up
        } else {
            self.alpha_down
        };
        state.level += alpha * (energy - state.level);

        let normalized = self.normalize(state.level);
        if state.active {
            if normalized < self.params.threshold_down {
                state.active = false;
            }
        } else if normalized > self.params.threshold_up {
            state.active = true;
        }
        state.active
    }
}

/// Envelope and detection flag carried across frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VadState {
    level: f64,
    active: bool,
}

impl VadState {
    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    // Time constants small enough that the envelope follows the input exactly.
    fn instant_params() -> VoiceActivityDetectorParams {
        VoiceActivityDetectorParams {
            sample_rate: 8000.0,
            frame_duration: 0.032,
            tau_up: 1e-6,
            tau_down: 1e-6,
            large_input: 100.0,
            gain_att: 0.5,
            threshold_up: 3.0,
            threshold_down: 1.0,
            level_threshold: 1.0,
        }
    }

    #[test]
    fn test_frame_energy() {
        assert!(approx_eq!(f64, frame_energy([1.0, -1.0, 2.0, 0.0]), 1.5, ulps = 2));
        assert_eq!(frame_energy([]), 0.0);
    }

    #[test]
    fn test_hysteresis_holds_between_thresholds() {
        let vad = VoiceActivityDetector::new(instant_params()).unwrap();
        let mut state = VadState::default();

        assert!(!vad.update(&mut state, 2.0), "below threshold_up stays inactive");
        assert!(vad.update(&mut state, 5.0));
        // Dips below threshold_up but stays above threshold_down.
        assert!(vad.update(&mut state, 2.0));
        assert!(vad.update(&mut state, 1.5));
        assert!(!vad.update(&mut state, 0.5));
        // Back between the thresholds: no flip back to active.
        assert!(!vad.update(&mut state, 2.0));
    }

    #[test]
    fn test_asymmetric_smoothing() {
        let params = VoiceActivityDetectorParams {
            tau_up: 1.0,
            tau_down: 0.01,
            ..instant_params()
        };
        let vad = VoiceActivityDetector::new(params).unwrap();
        let mut state = VadState::default();

        vad.update(&mut state, 1.0);
        let after_attack = state.level();
        assert!(after_attack > 0.0 && after_attack < 0.05);

        vad.update(&mut state, 0.0);
        assert!(state.level() < after_attack * 0.1, "release is faster than attack");
    }

    #[test]
    fn test_large_input_is_compressed() {
        let vad = VoiceActivityDetector::new(VoiceActivityDetectorParams {
            large_input: 2.0,
            gain_att: 0.25,
            level_threshold: 0.5,
            ..instant_params()
        })
        .unwrap();
        assert!(approx_eq!(f64, vad.normalize(1.0), 2.0, ulps = 2));
        assert!(approx_eq!(f64, vad.normalize(6.0), 6.0, ulps = 2));
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let params = VoiceActivityDetectorParams {
            threshold_up: 0.5,
            threshold_down: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            VoiceActivityDetector::new(params),
            Err(GraphError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_rejects_non_positive_tau() {
        let params = VoiceActivityDetectorParams {
            tau_down: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        assert!(VoiceActivityDetectorParams::default().validate().is_ok());
    }
}

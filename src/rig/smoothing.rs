//! Landmark smoothing ahead of the rig solve.
//!
//! Wraps `motion_filter` primitives into a per-landmark smoother for the
//! world-space landmark stream. Each component is filtered independently;
//! image-space landmarks and visibility pass through untouched.

use std::collections::HashMap;

use motion_filter::{apply_deadzone, DampedSpring, OneEuroFilter};

use crate::config::RigTuning;
use crate::tracking::PoseReport;

/// Which smoothing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingMode {
    Spring,
    OneEuro,
    None,
}

impl SmoothingMode {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "spring" | "damped_spring" => Self::Spring,
            "one_euro" | "oneeuro" | "1euro" => Self::OneEuro,
            "none" | "off" | "disabled" => Self::None,
            _ => Self::Spring,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spring => "spring",
            Self::OneEuro => "one_euro",
            Self::None => "none",
        }
    }

    pub const ALL: [SmoothingMode; 3] = [Self::Spring, Self::OneEuro, Self::None];
}

/// Per-landmark-component smoother for world landmarks.
pub struct LandmarkSmoother {
    /// Keyed by landmark index; one filter per component
    springs: HashMap<usize, [DampedSpring; 3]>,
    euros: HashMap<usize, [OneEuroFilter; 3]>,
    mode: SmoothingMode,
}

impl LandmarkSmoother {
    pub fn new(mode: SmoothingMode) -> Self {
        Self {
            springs: HashMap::new(),
            euros: HashMap::new(),
            mode,
        }
    }

    /// Smooth a report's world landmarks. `dt` is the time since the
    /// previous report.
    pub fn smooth(&mut self, report: &PoseReport, dt: f32, tuning: &RigTuning) -> PoseReport {
        if !report.detected || self.mode == SmoothingMode::None {
            return report.clone();
        }

        let mut out = report.clone();
        for (idx, point) in out.world_landmarks.iter_mut().enumerate() {
            for c in 0..3 {
                let deadzoned = apply_deadzone(point[c], tuning.landmark_deadzone);
                point[c] = match self.mode {
                    SmoothingMode::Spring => {
                        let springs = self
                            .springs
                            .entry(idx)
                            .or_insert_with(|| std::array::from_fn(|_| DampedSpring::new(deadzoned)));
                        springs[c].update(deadzoned, tuning.landmark_halflife, dt)
                    }
                    SmoothingMode::OneEuro => {
                        let euros = self.euros.entry(idx).or_insert_with(|| {
                            std::array::from_fn(|_| {
                                OneEuroFilter::new(
                                    tuning.landmark_min_cutoff,
                                    tuning.landmark_beta,
                                )
                            })
                        });
                        euros[c].filter(deadzoned, dt)
                    }
                    SmoothingMode::None => deadzoned,
                };
            }
        }

        out
    }

    /// Change the smoothing mode, resetting all filter state.
    pub fn set_mode(&mut self, mode: SmoothingMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        self.springs.clear();
        self.euros.clear();
    }

    pub fn mode(&self) -> SmoothingMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::landmarks::{PoseLandmark, PosePacket};

    fn report_at(y: f32) -> PoseReport {
        let mut world = vec![[0.0f32, 0.0, 0.0, 1.0]; PoseLandmark::COUNT];
        world[0] = [0.0, y, 0.0, 1.0];
        PosePacket {
            pose_detected: true,
            landmarks: vec![[0.0f32; 4]; PoseLandmark::COUNT],
            world_landmarks: world,
        }
        .into_report()
        .unwrap()
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(SmoothingMode::from_str("spring"), SmoothingMode::Spring);
        assert_eq!(SmoothingMode::from_str("ONE_EURO"), SmoothingMode::OneEuro);
        assert_eq!(SmoothingMode::from_str("off"), SmoothingMode::None);
        assert_eq!(SmoothingMode::from_str("garbage"), SmoothingMode::Spring);
    }

    #[test]
    fn test_none_mode_passthrough() {
        let mut smoother = LandmarkSmoother::new(SmoothingMode::None);
        let report = report_at(1.0);
        let smoothed = smoother.smooth(&report, 1.0 / 30.0, &RigTuning::default());
        assert_eq!(smoothed, report);
    }

    #[test]
    fn test_spring_damps_jump() {
        let mut smoother = LandmarkSmoother::new(SmoothingMode::Spring);
        let tuning = RigTuning::default();

        // Settle at 0, then jump to 1
        smoother.smooth(&report_at(0.0), 1.0 / 30.0, &tuning);
        let smoothed = smoother.smooth(&report_at(1.0), 1.0 / 30.0, &tuning);

        let y = smoothed.world_landmarks[0][1];
        assert!(y > 0.0 && y < 1.0, "spring should only partially follow a jump, got {y}");
    }

    #[test]
    fn test_spring_converges() {
        let mut smoother = LandmarkSmoother::new(SmoothingMode::Spring);
        let tuning = RigTuning::default();

        let mut y = 0.0;
        for _ in 0..300 {
            y = smoother.smooth(&report_at(1.0), 1.0 / 30.0, &tuning).world_landmarks[0][1];
        }
        assert!((y - 1.0).abs() < 1e-2, "spring should converge, got {y}");
    }

    #[test]
    fn test_visibility_untouched() {
        let mut smoother = LandmarkSmoother::new(SmoothingMode::Spring);
        let smoothed = smoother.smooth(&report_at(1.0), 1.0 / 30.0, &RigTuning::default());
        assert_eq!(smoothed.world_landmarks[0][3], 1.0);
    }

    #[test]
    fn test_undetected_passthrough() {
        let mut smoother = LandmarkSmoother::new(SmoothingMode::Spring);
        let report = PoseReport::default();
        let smoothed = smoother.smooth(&report, 1.0 / 30.0, &RigTuning::default());
        assert!(!smoothed.detected);
    }

    #[test]
    fn test_set_mode_resets_state() {
        let mut smoother = LandmarkSmoother::new(SmoothingMode::Spring);
        let tuning = RigTuning::default();
        smoother.smooth(&report_at(5.0), 1.0 / 30.0, &tuning);

        smoother.set_mode(SmoothingMode::OneEuro);
        assert_eq!(smoother.mode(), SmoothingMode::OneEuro);

        // Fresh 1-Euro filters pass the first sample through unchanged
        let smoothed = smoother.smooth(&report_at(2.0), 1.0 / 30.0, &tuning);
        assert_eq!(smoothed.world_landmarks[0][1], 2.0);
    }
}

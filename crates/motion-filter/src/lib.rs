//! Scalar signal filters for motion-tracking data.
//!
//! Tracking output is noisy: raw landmark positions jitter at the millimeter
//! scale even when the subject holds still. This crate provides the small
//! filter toolbox used to tame that before the data drives a skeleton:
//!
//! - [`DampedSpring`]: critically damped spring with a halflife parameter,
//!   exact under variable timesteps.
//! - [`OneEuroFilter`]: the 1-Euro filter (Casiez et al.), which adapts its
//!   cutoff to signal speed: still signals are smoothed hard, fast motion
//!   passes through with little lag.
//! - [`apply_deadzone`]: zeroes values below a threshold.

use std::f32::consts::PI;

/// Zero out values whose magnitude is below `deadzone`.
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        value
    }
}

/// Critically damped spring toward a moving target.
///
/// `halflife` is the time for the remaining distance to the target to halve.
/// The update is the exact closed-form solution, so it behaves identically
/// under any timestep subdivision.
#[derive(Debug, Clone)]
pub struct DampedSpring {
    value: f32,
    velocity: f32,
}

impl DampedSpring {
    pub fn new(initial: f32) -> Self {
        Self {
            value: initial,
            velocity: 0.0,
        }
    }

    /// Advance `dt` seconds toward `target` and return the new value.
    pub fn update(&mut self, target: f32, halflife: f32, dt: f32) -> f32 {
        if halflife <= 0.0 || dt <= 0.0 {
            self.value = target;
            self.velocity = 0.0;
            return self.value;
        }

        // Critical damping coefficient from halflife. The extra epsilon keeps
        // the exponent finite for very small halflives.
        let y = (4.0 * std::f32::consts::LN_2) / (halflife + 1e-5) * 0.5;

        let j0 = self.value - target;
        let j1 = self.velocity + j0 * y;
        let eydt = (-y * dt).exp();

        self.value = eydt * (j0 + j1 * dt) + target;
        self.velocity = eydt * (self.velocity - j1 * y * dt);
        self.value
    }

    /// Snap to a value, zeroing velocity.
    pub fn set(&mut self, value: f32) {
        self.value = value;
        self.velocity = 0.0;
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// The 1-Euro filter: a low-pass filter whose cutoff rises with signal speed.
///
/// `min_cutoff` sets smoothing at rest (lower = smoother), `beta` sets how
/// aggressively the cutoff opens up during fast motion (higher = less lag).
#[derive(Debug, Clone)]
pub struct OneEuroFilter {
    min_cutoff: f32,
    beta: f32,
    d_cutoff: f32,
    prev_value: Option<f32>,
    prev_derivative: f32,
}

impl OneEuroFilter {
    pub fn new(min_cutoff: f32, beta: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff: 1.0,
            prev_value: None,
            prev_derivative: 0.0,
        }
    }

    /// Filter one sample taken `dt` seconds after the previous one.
    pub fn filter(&mut self, value: f32, dt: f32) -> f32 {
        let prev = match self.prev_value {
            Some(p) => p,
            None => {
                // First sample passes through unchanged.
                self.prev_value = Some(value);
                return value;
            }
        };

        if dt <= 0.0 {
            return prev;
        }

        // Derivative, smoothed at a fixed cutoff.
        let raw_derivative = (value - prev) / dt;
        let ad = smoothing_factor(self.d_cutoff, dt);
        let derivative = lerp(self.prev_derivative, raw_derivative, ad);

        // Speed-adaptive cutoff.
        let cutoff = self.min_cutoff + self.beta * derivative.abs();
        let a = smoothing_factor(cutoff, dt);
        let filtered = lerp(prev, value, a);

        self.prev_value = Some(filtered);
        self.prev_derivative = derivative;
        filtered
    }

    /// Forget all history; the next sample passes through unchanged.
    pub fn reset(&mut self) {
        self.prev_value = None;
        self.prev_derivative = 0.0;
    }
}

fn smoothing_factor(cutoff: f32, dt: f32) -> f32 {
    let r = 2.0 * PI * cutoff * dt;
    r / (r + 1.0)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadzone() {
        assert_eq!(apply_deadzone(0.003, 0.01), 0.0);
        assert_eq!(apply_deadzone(-0.003, 0.01), 0.0);
        assert_eq!(apply_deadzone(0.5, 0.01), 0.5);
        assert_eq!(apply_deadzone(-0.5, 0.01), -0.5);
    }

    #[test]
    fn test_spring_converges() {
        let mut spring = DampedSpring::new(0.0);
        for _ in 0..200 {
            spring.update(1.0, 0.05, 1.0 / 60.0);
        }
        assert!(
            (spring.value() - 1.0).abs() < 1e-3,
            "spring should converge to target, got {}",
            spring.value()
        );
    }

    #[test]
    fn test_spring_moves_toward_target() {
        let mut spring = DampedSpring::new(0.0);
        let v = spring.update(1.0, 0.1, 1.0 / 60.0);
        assert!(v > 0.0 && v < 1.0, "one step should land between start and target, got {v}");
    }

    #[test]
    fn test_spring_halflife() {
        // After one halflife the remaining distance should be roughly halved.
        let mut spring = DampedSpring::new(0.0);
        let halflife = 0.1;
        let steps = 100;
        for _ in 0..steps {
            spring.update(1.0, halflife, halflife / steps as f32);
        }
        let remaining = 1.0 - spring.value();
        // The critically damped response is not a pure exponential, so allow
        // a generous band around 0.5.
        assert!(
            remaining > 0.25 && remaining < 0.75,
            "after one halflife remaining distance should be near half, got {remaining}"
        );
    }

    #[test]
    fn test_spring_set_resets_velocity() {
        let mut spring = DampedSpring::new(0.0);
        spring.update(10.0, 0.05, 0.1);
        spring.set(3.0);
        assert_eq!(spring.value(), 3.0);
        // With the target equal to the value and zero velocity, it stays put.
        let v = spring.update(3.0, 0.05, 0.1);
        assert!((v - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_one_euro_first_sample_passthrough() {
        let mut f = OneEuroFilter::new(1.0, 0.1);
        assert_eq!(f.filter(0.7, 1.0 / 60.0), 0.7);
    }

    #[test]
    fn test_one_euro_smooths_jitter() {
        let mut f = OneEuroFilter::new(0.5, 0.0);
        f.filter(0.0, 1.0 / 60.0);
        // A sudden jump is only partially followed at low cutoff.
        let v = f.filter(1.0, 1.0 / 60.0);
        assert!(v < 0.5, "low cutoff should damp a jump, got {v}");
    }

    #[test]
    fn test_one_euro_beta_reduces_lag() {
        let mut slow = OneEuroFilter::new(0.5, 0.0);
        let mut fast = OneEuroFilter::new(0.5, 10.0);
        slow.filter(0.0, 1.0 / 60.0);
        fast.filter(0.0, 1.0 / 60.0);

        let mut v_slow = 0.0;
        let mut v_fast = 0.0;
        for i in 1..=30 {
            let target = i as f32 * 0.1;
            v_slow = slow.filter(target, 1.0 / 60.0);
            v_fast = fast.filter(target, 1.0 / 60.0);
        }
        assert!(
            v_fast > v_slow,
            "higher beta should track a ramp more closely ({v_fast} vs {v_slow})"
        );
    }

    #[test]
    fn test_one_euro_reset() {
        let mut f = OneEuroFilter::new(1.0, 0.1);
        f.filter(0.0, 1.0 / 60.0);
        f.filter(0.1, 1.0 / 60.0);
        f.reset();
        assert_eq!(f.filter(5.0, 1.0 / 60.0), 5.0);
    }

    #[test]
    fn test_spring_converges_under_subdivided_steps() {
        // The closed-form update should give the same result for one big step
        // and many small ones.
        let mut coarse = DampedSpring::new(0.0);
        let mut fine = DampedSpring::new(0.0);

        coarse.update(1.0, 0.1, 0.2);
        for _ in 0..100 {
            fine.update(1.0, 0.1, 0.2 / 100.0);
        }

        assert!(
            (coarse.value() - fine.value()).abs() < 1e-3,
            "subdivided steps should match a single step: {} vs {}",
            coarse.value(),
            fine.value()
        );
    }
}

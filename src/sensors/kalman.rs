//! Scalar Kalman filter for pressure smoothing.
//!
//! Random-walk model: predict `P += Q`, update
//! `K = P / (P + R)`, `x += K (z − x)`, `P *= 1 − K`.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanFilter {
    estimate: f32,
    error_covariance: f32,
    process_noise: f32,
    measurement_noise: f32,
}

impl KalmanFilter {
    pub fn new(initial_estimate: f32, initial_covariance: f32, process_noise: f32, measurement_noise: f32) -> Self {
        Self {
            estimate: initial_estimate,
            error_covariance: initial_covariance,
            process_noise,
            measurement_noise,
        }
    }

    /// Fold one measurement into the estimate and return it.
    pub fn update(&mut self, measurement: f32) -> f32 {
        self.error_covariance += self.process_noise;

        let gain = self.error_covariance / (self.error_covariance + self.measurement_noise);
        self.estimate += gain * (measurement - self.estimate);
        self.error_covariance *= 1.0 - gain;

        self.estimate
    }

    /// Explicit recalibration: restart from `estimate` with `covariance`.
    pub fn reset(&mut self, estimate: f32, covariance: f32) {
        self.estimate = estimate;
        self.error_covariance = covariance;
    }

    pub fn estimate(&self) -> f32 {
        self.estimate
    }

    pub fn error_covariance(&self) -> f32 {
        self.error_covariance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic noise in `[-amp, amp]` (LCG).
    fn noise(state: &mut u32, amp: f32) -> f32 {
        *state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let unit = (*state >> 8) as f32 / (1u32 << 24) as f32;
        (unit * 2.0 - 1.0) * amp
    }

    #[test]
    fn converges_on_constant_pressure() {
        let mut kf = KalmanFilter::new(0.0, 1.0, 0.002, 1.0);
        let mut seed = 7;
        for _ in 0..3_000 {
            kf.update(100.0 + noise(&mut seed, 2.0));
        }
        assert!(
            (kf.estimate() - 100.0).abs() < 0.6,
            "estimate {} should settle near 100",
            kf.estimate()
        );
    }

    #[test]
    fn covariance_non_increasing_after_convergence() {
        let mut kf = KalmanFilter::new(0.0, 1.0, 0.002, 1.0);
        let mut seed = 42;
        for _ in 0..500 {
            kf.update(80.0 + noise(&mut seed, 1.0));
        }
        let mut prev = kf.error_covariance();
        for _ in 0..500 {
            kf.update(80.0 + noise(&mut seed, 1.0));
            let p = kf.error_covariance();
            assert!(p <= prev + 1e-7, "covariance grew: {prev} -> {p}");
            prev = p;
        }
    }

    #[test]
    fn first_update_moves_halfway_with_equal_noise() {
        let mut kf = KalmanFilter::new(0.0, 1.0, 0.0, 1.0);
        let x = kf.update(10.0);
        assert!((x - 5.0).abs() < 1e-6);
        assert!((kf.error_covariance() - 0.5).abs() < 1e-6);
    }
}

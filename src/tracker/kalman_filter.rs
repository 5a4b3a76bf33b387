use log::warn;
use nalgebra::SMatrix;

/* -----------------------------------------------------------------------------
 * Type aliases
 * ----------------------------------------------------------------------------- */
// 1x2
pub(crate) type Measurement = SMatrix<f32, 1, 2>;
// 1x4
pub(crate) type StateMean = SMatrix<f32, 1, 4>;
// 4x4
pub(crate) type StateCov = SMatrix<f32, 4, 4>;
// 1x2
pub(crate) type StateHMean = SMatrix<f32, 1, 2>;
// 2x2
pub(crate) type StateHCov = SMatrix<f32, 2, 2>;

/* -----------------------------------------------------------------------------
 * Kalman Filter
 * ----------------------------------------------------------------------------- */

/// Constant-velocity filter over `[px, py, vx, vy]` observing position only.
#[derive(Debug, Clone)]
pub(crate) struct KalmanFilter {
    initial_position_variance: f32,
    initial_velocity_variance: f32,
    motion_mat: SMatrix<f32, 4, 4>, // F
    update_mat: SMatrix<f32, 2, 4>, // H
    process_cov: StateCov,          // Q
    measurement_cov: StateHCov,     // R
}

impl KalmanFilter {
    pub(crate) fn new(
        process_noise: f32,
        measurement_noise: f32,
        initial_position_variance: f32,
        initial_velocity_variance: f32,
    ) -> Self {
        let ndim = 2;
        let dt = 1.0;

        let mut motion_mat = SMatrix::<f32, 4, 4>::identity();
        for i in 0..ndim {
            motion_mat[(i, i + ndim)] = dt;
        }

        // 1.0, 0.0, 0.0, 0.0,
        // 0.0, 1.0, 0.0, 0.0,
        let mut update_mat = SMatrix::<f32, 2, 4>::zeros();
        update_mat[(0, 0)] = 1.0;
        update_mat[(1, 1)] = 1.0;

        Self {
            initial_position_variance,
            initial_velocity_variance,
            motion_mat,
            update_mat,
            process_cov: StateCov::identity() * process_noise,
            measurement_cov: StateHCov::identity() * measurement_noise,
        }
    }

    pub(crate) fn initiate(
        &self,
        mean: &mut StateMean,
        covariance: &mut StateCov,
        measurement: &Measurement,
    ) {
        *mean = StateMean::new(measurement[0], measurement[1], 0.0, 0.0);
        *covariance = StateCov::from_diagonal(&nalgebra::Vector4::new(
            self.initial_position_variance,
            self.initial_position_variance,
            self.initial_velocity_variance,
            self.initial_velocity_variance,
        ));
    }

    /// `x <- F x`, `P <- F P F^T + Q`.
    pub(crate) fn predict(&self, mean: &mut StateMean, covariance: &mut StateCov) {
        *mean = (self.motion_mat * mean.transpose()).transpose();
        *covariance =
            self.motion_mat * *covariance * self.motion_mat.transpose() + self.process_cov;
    }

    pub(crate) fn update(
        &self,
        mean: &mut StateMean,      // 1x4
        covariance: &mut StateCov, // 4x4
        measurement: &Measurement, // 1x2
    ) {
        let mut projected_mean = StateHMean::zeros();
        let mut projected_covariance = StateHCov::zeros();
        self.project(&mut projected_mean, &mut projected_covariance, mean, covariance);

        // b: 2x4 = (P H^T)^T
        let b = (*covariance * self.update_mat.transpose()).transpose();
        let Some(cholesky_factor) = projected_covariance.cholesky() else {
            warn!("innovation covariance is not positive definite, skipping update");
            return;
        };
        // kalman_gain^T: 2x4, solves S K^T = (P H^T)^T
        let kalman_gain = cholesky_factor.solve(&b);
        // innovation: 1x2
        let innovation = measurement - projected_mean;
        *mean += innovation * kalman_gain;
        // (I - K H) P == P - K S K^T
        *covariance -= kalman_gain.transpose() * projected_covariance * kalman_gain;
    }

    /// Projects the state into measurement space: `H x` and `H P H^T + R`.
    pub(crate) fn project(
        &self,
        projected_mean: &mut StateHMean,      // 1x2
        projected_covariance: &mut StateHCov, // 2x2
        mean: &StateMean,                     // 1x4
        covariance: &StateCov,                // 4x4
    ) {
        *projected_mean = mean * self.update_mat.transpose();
        *projected_covariance =
            self.update_mat * covariance * self.update_mat.transpose() + self.measurement_cov;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearly_eq::assert_nearly_eq;

    fn unit_filter() -> KalmanFilter {
        KalmanFilter::new(0.0, 1.0, 10.0, 100.0)
    }

    #[test]
    fn test_initiate() {
        let kalman_filter = unit_filter();
        let mut mean = StateMean::zeros();
        let mut covariance = StateCov::zeros();
        let measurement = Measurement::new(3.0, 4.0);

        kalman_filter.initiate(&mut mean, &mut covariance, &measurement);

        assert_eq!(mean, StateMean::new(3.0, 4.0, 0.0, 0.0));
        #[rustfmt::skip]
        let expected = StateCov::new(
            10.0, 0.0,  0.0,   0.0,
            0.0,  10.0, 0.0,   0.0,
            0.0,  0.0,  100.0, 0.0,
            0.0,  0.0,  0.0,   100.0,
        );
        assert_eq!(covariance, expected);
    }

    #[test]
    fn test_predict() {
        let kalman_filter = KalmanFilter::new(0.5, 1.0, 10.0, 100.0);
        let mut mean = StateMean::new(1.0, 2.0, 3.0, 4.0);
        let mut covariance = StateCov::identity();

        kalman_filter.predict(&mut mean, &mut covariance);

        assert_eq!(mean, StateMean::new(4.0, 6.0, 3.0, 4.0));
        #[rustfmt::skip]
        let expected = StateCov::new(
            2.5, 0.0, 1.0, 0.0,
            0.0, 2.5, 0.0, 1.0,
            1.0, 0.0, 1.5, 0.0,
            0.0, 1.0, 0.0, 1.5,
        );
        for (i, &v) in covariance.iter().enumerate() {
            assert_nearly_eq!(v, expected.iter().nth(i).unwrap(), 1e-5)
        }
    }

    #[test]
    fn test_project() {
        let kalman_filter = unit_filter();
        let mean = StateMean::new(1.0, 2.0, 3.0, 4.0);
        #[rustfmt::skip]
        let covariance = StateCov::new(
            2.0, 0.5, 1.0, 0.0,
            0.5, 3.0, 0.0, 1.0,
            1.0, 0.0, 4.0, 0.0,
            0.0, 1.0, 0.0, 5.0,
        );
        let mut projected_mean = StateHMean::zeros();
        let mut projected_covariance = StateHCov::zeros();

        kalman_filter.project(&mut projected_mean, &mut projected_covariance, &mean, &covariance);

        assert_eq!(projected_mean, StateHMean::new(1.0, 2.0));
        assert_eq!(projected_covariance, StateHCov::new(3.0, 0.5, 0.5, 4.0));
    }

    #[test]
    fn test_update() {
        let kalman_filter = unit_filter();
        let mut mean = StateMean::zeros();
        let mut covariance = StateCov::identity();
        let measurement = Measurement::new(2.0, 2.0);

        kalman_filter.update(&mut mean, &mut covariance, &measurement);

        // S = 2I so K = 0.5 on the position rows.
        let expected_mean = StateMean::new(1.0, 1.0, 0.0, 0.0);
        for (i, &v) in mean.iter().enumerate() {
            assert_nearly_eq!(v, expected_mean.iter().nth(i).unwrap(), 1e-5)
        }
        let expected_cov =
            StateCov::from_diagonal(&nalgebra::Vector4::new(0.5, 0.5, 1.0, 1.0));
        for (i, &v) in covariance.iter().enumerate() {
            assert_nearly_eq!(v, expected_cov.iter().nth(i).unwrap(), 1e-5)
        }
    }

    #[test]
    fn test_tracks_constant_velocity() {
        let kalman_filter = KalmanFilter::new(1e-2, 1.0, 10.0, 100.0);
        let mut mean = StateMean::zeros();
        let mut covariance = StateCov::zeros();
        kalman_filter.initiate(&mut mean, &mut covariance, &Measurement::new(0.0, 0.0));

        for step in 1..=30 {
            kalman_filter.predict(&mut mean, &mut covariance);
            let z = Measurement::new(5.0 * step as f32, -2.0 * step as f32);
            kalman_filter.update(&mut mean, &mut covariance, &z);
        }

        assert_nearly_eq!(mean[2], 5.0, 0.25);
        assert_nearly_eq!(mean[3], -2.0, 0.25);

        // One more prediction lands near the next measurement.
        kalman_filter.predict(&mut mean, &mut covariance);
        assert_nearly_eq!(mean[0], 155.0, 1.0);
        assert_nearly_eq!(mean[1], -62.0, 1.0);
    }
}

use libm::{acosf, cosf, sinf};
use nalgebra::{Quaternion, UnitQuaternion};

/// Gains for the linear complementary law.
///
/// `q` scales with elapsed time and stands in for process noise, `r` for
/// measurement noise. A larger `q / r` ratio trusts the accelerometer and
/// compass more.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearParams {
    pub q: f32,
    pub r: f32,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { q: 0.001, r: 0.0005 }
    }
}

impl LinearParams {
    /// Fraction of the error removed in one step of `dt` seconds.
    pub fn gain(&self, dt: f32) -> f32 {
        let qt = self.q * dt;
        let denominator = qt + self.r;
        if denominator > 0.0 { qt / denominator } else { 0.0 }
    }

    pub fn correct(
        &self,
        state: Quaternion<f32>,
        measured: &UnitQuaternion<f32>,
        dt: f32,
    ) -> CorrectionStep {
        let error = measured.into_inner() - state;
        let corrected = state + error * self.gain(dt);
        CorrectionStep {
            state: UnitQuaternion::try_new(corrected, f32::EPSILON).unwrap_or(*measured),
            error,
        }
    }
}

/// Power for the spherical correction law, in `[0, 1]`.
///
/// 0 ignores the measurement, 1 snaps to it.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlerpParams {
    pub power: f32,
}

impl Default for SlerpParams {
    fn default() -> Self {
        Self { power: 0.02 }
    }
}

impl SlerpParams {
    pub fn correct(&self, state: Quaternion<f32>, measured: &UnitQuaternion<f32>) -> CorrectionStep {
        let state = UnitQuaternion::new_normalize(state);
        let delta = state.conjugate() * measured;

        let Some(axis) = delta.imag().try_normalize(f32::EPSILON) else {
            return CorrectionStep {
                state,
                error: delta.into_inner(),
            };
        };

        // half-angle of the remaining rotation
        let theta = acosf(delta.scalar().clamp(-1.0, 1.0));
        let partial = Quaternion::from_parts(
            cosf(theta * self.power),
            axis * sinf(theta * self.power),
        );

        CorrectionStep {
            state: state * UnitQuaternion::new_normalize(partial),
            error: delta.into_inner(),
        }
    }
}

/// How the predicted state is pulled toward the measured orientation.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Correction {
    Linear(LinearParams),
    Slerp(SlerpParams),
}

impl Default for Correction {
    fn default() -> Self {
        Correction::Linear(LinearParams::default())
    }
}

/// Result of one update step.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CorrectionStep {
    /// Corrected, unit-length state.
    pub state: UnitQuaternion<f32>,
    /// Component-wise error in linear mode, relative rotation in slerp mode.
    pub error: Quaternion<f32>,
}

impl CorrectionStep {
    /// No measurement available: only renormalize the prediction.
    pub fn passthrough(state: Quaternion<f32>) -> Self {
        Self {
            state: UnitQuaternion::new_normalize(state),
            error: Quaternion::new(0.0, 0.0, 0.0, 0.0),
        }
    }
}

impl Correction {
    pub fn name(&self) -> &'static str {
        match self {
            Correction::Linear(_) => "linear",
            Correction::Slerp(_) => "slerp",
        }
    }

    pub fn apply(
        &self,
        state: Quaternion<f32>,
        measured: &UnitQuaternion<f32>,
        dt: f32,
    ) -> CorrectionStep {
        match self {
            Correction::Linear(params) => params.correct(state, measured, dt),
            Correction::Slerp(params) => params.correct(state, measured),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use approx::assert_relative_eq;

    fn tilted() -> UnitQuaternion<f32> {
        UnitQuaternion::from_euler_angles(0.2, -0.1, 0.4)
    }

    #[test]
    fn test_linear_gain() {
        let params = LinearParams::default();
        assert_relative_eq!(params.gain(0.01), 1e-5 / (1e-5 + 5e-4), epsilon = 1e-7);

        let frozen = LinearParams { q: 0.0, r: 0.0005 };
        assert_relative_eq!(frozen.gain(0.01), 0.0);

        let degenerate = LinearParams { q: 0.0, r: 0.0 };
        assert_relative_eq!(degenerate.gain(0.01), 0.0);
    }

    #[test]
    fn test_linear_zero_q_keeps_state() {
        let params = LinearParams { q: 0.0, r: 0.0005 };
        let step = params.correct(Quaternion::identity(), &tilted(), 0.01);
        assert_relative_eq!(step.state, UnitQuaternion::identity());
        assert_relative_eq!(step.error, tilted().into_inner() - Quaternion::identity());
    }

    #[test]
    fn test_linear_large_ratio_snaps_to_measurement() {
        let params = LinearParams { q: 1.0e9, r: 1.0e-9 };
        let step = params.correct(Quaternion::identity(), &tilted(), 0.01);
        assert_relative_eq!(step.state, tilted(), epsilon = 1e-6);
    }

    #[test]
    fn test_linear_moves_part_way() {
        let params = LinearParams::default();
        let step = params.correct(Quaternion::identity(), &tilted(), 0.01);
        let before = UnitQuaternion::identity().angle_to(&tilted());
        let after = step.state.angle_to(&tilted());
        assert!(after < before);
        assert!(after > 0.9 * before);
    }

    #[test]
    fn test_slerp_zero_power_keeps_state() {
        let params = SlerpParams { power: 0.0 };
        let step = params.correct(Quaternion::identity(), &tilted());
        assert_relative_eq!(step.state, UnitQuaternion::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_slerp_full_power_snaps_to_measurement() {
        let params = SlerpParams { power: 1.0 };
        let start = UnitQuaternion::from_euler_angles(-0.3, 0.2, -1.0);
        let step = params.correct(start.into_inner(), &tilted());
        assert_relative_eq!(step.state, tilted(), epsilon = 1e-5);
    }

    #[test]
    fn test_slerp_rotates_by_fraction_of_angle() {
        let params = SlerpParams { power: 0.25 };
        let step = params.correct(Quaternion::identity(), &tilted());
        let total = UnitQuaternion::identity().angle_to(&tilted());
        assert_relative_eq!(step.state.angle(), 0.25 * total, epsilon = 1e-5);
        assert_relative_eq!(step.state.angle_to(&tilted()), 0.75 * total, epsilon = 1e-5);
    }

    #[test]
    fn test_slerp_identical_orientation_is_stable() {
        let params = SlerpParams { power: 0.5 };
        let step = params.correct(tilted().into_inner(), &tilted());
        assert_relative_eq!(step.state, tilted(), epsilon = 1e-6);
        assert!(step.state.w.is_finite());
    }

    #[test]
    fn test_slerp_renormalizes_unscaled_state() {
        let params = SlerpParams { power: 0.0 };
        let step = params.correct(Quaternion::new(2.0, 0.0, 0.0, 0.0), &tilted());
        assert_relative_eq!(step.state.norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_passthrough_normalizes() {
        let step = CorrectionStep::passthrough(Quaternion::new(0.0, 0.0, 0.0, 3.0));
        assert_relative_eq!(step.state.norm(), 1.0);
        assert_relative_eq!(step.error.norm(), 0.0);
    }

    #[test]
    fn test_names() {
        assert_eq!(Correction::default().name(), "linear");
        assert_eq!(Correction::Slerp(SlerpParams::default()).name(), "slerp");
    }
}

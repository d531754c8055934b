use core::fmt;

use log::{debug, trace};
use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3, Vector4};

use crate::correction::{Correction, CorrectionStep};
use crate::pose::{MeasuredPose, euler_from_quaternion, measure_pose};
use crate::sample::ImuSample;
use crate::traits::FusionSettings;

const MICROS_PER_SECOND: f32 = 1_000_000.0;

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FusionParams {
    pub correction: Correction,
    pub enable_gyro: bool,
    pub enable_accel: bool,
    pub enable_compass: bool,
    /// Emit per-sample trace lines through `log`.
    pub debug: bool,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            correction: Correction::default(),
            enable_gyro: true,
            enable_accel: true,
            enable_compass: true,
            debug: false,
        }
    }
}

/// What [`QuaternionFusion::ingest`] did with a sample.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FusionStatus {
    /// First sample: the state was seeded from the measured pose.
    Initialized,
    /// Predict and update ran.
    Fused,
    /// Timestamp did not advance; nothing changed.
    Discarded,
}

/// Quaternion predict/update orientation filter.
///
/// Each sample integrates the gyroscope rate into the state quaternion, then
/// pulls the prediction toward the orientation measured from the
/// accelerometer and compass using the configured [`Correction`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuaternionFusion {
    correction: Correction,
    enable_gyro: bool,
    enable_accel: bool,
    enable_compass: bool,
    debug: bool,

    state_q: Quaternion<f32>,
    state_error: Quaternion<f32>,
    transition: Matrix4<f32>,

    fusion_pose: Vector3<f32>,
    fusion_qpose: UnitQuaternion<f32>,
    measured: MeasuredPose,

    gyro: Vector3<f32>,
    accel: Vector3<f32>,
    compass: Vector3<f32>,
    compass_valid: bool,

    time_delta: f32,
    last_fusion_time: u64,
    sample_number: u64,
    first_time: bool,
}

impl Default for QuaternionFusion {
    fn default() -> QuaternionFusion {
        QuaternionFusion::new(FusionParams::default())
    }
}

impl QuaternionFusion {
    pub fn new(params: FusionParams) -> Self {
        let mut fusion = QuaternionFusion {
            correction: params.correction,
            enable_gyro: params.enable_gyro,
            enable_accel: params.enable_accel,
            enable_compass: params.enable_compass,
            debug: params.debug,
            state_q: Quaternion::identity(),
            state_error: Quaternion::new(0.0, 0.0, 0.0, 0.0),
            transition: Matrix4::zeros(),
            fusion_pose: Vector3::zeros(),
            fusion_qpose: UnitQuaternion::identity(),
            measured: MeasuredPose::default(),
            gyro: Vector3::zeros(),
            accel: Vector3::zeros(),
            compass: Vector3::zeros(),
            compass_valid: false,
            time_delta: 0.0,
            last_fusion_time: 0,
            sample_number: 0,
            first_time: true,
        };
        fusion.reset();
        fusion
    }

    /// Forgets all history; the next sample bootstraps the state again.
    pub fn reset(&mut self) {
        self.first_time = true;
        self.fusion_pose = Vector3::zeros();
        self.fusion_qpose = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.0);
        self.state_q = self.fusion_qpose.into_inner();
        self.state_error = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        self.transition = Matrix4::zeros();
        self.gyro = Vector3::zeros();
        self.accel = Vector3::zeros();
        self.compass = Vector3::zeros();
        self.compass_valid = false;
        self.measured = MeasuredPose::default();
        self.time_delta = 0.0;
        self.last_fusion_time = 0;
        self.sample_number = 0;
    }

    /// Fuses one sample and writes the fused pose back into it.
    ///
    /// A sample whose timestamp does not advance past the previous one is
    /// dropped without touching the filter or the record.
    pub fn ingest<S>(&mut self, sample: &mut ImuSample, settings: &S) -> FusionStatus
    where
        S: FusionSettings + ?Sized,
    {
        if self.first_time {
            self.sample_number += 1;
            self.store_inputs(sample);
            self.last_fusion_time = sample.timestamp;
            self.calculate_pose(settings.compass_declination());
            self.transition = Matrix4::zeros();

            self.state_q = self.measured.quaternion.into_inner();
            self.fusion_qpose = self.measured.quaternion;
            self.fusion_pose = self.measured.euler;
            self.first_time = false;

            if self.debug {
                debug!("{} fusion initialized, sample {}", self.fusion_name(), self.sample_number);
                debug!("Measured pose: {}", Degrees(&self.measured.euler));
            }
            self.publish(sample);
            return FusionStatus::Initialized;
        }

        if sample.timestamp <= self.last_fusion_time {
            if self.debug {
                trace!(
                    "Discarding sample at {} us, last fusion at {} us",
                    sample.timestamp,
                    self.last_fusion_time
                );
            }
            return FusionStatus::Discarded;
        }

        self.time_delta = (sample.timestamp - self.last_fusion_time) as f32 / MICROS_PER_SECOND;
        self.last_fusion_time = sample.timestamp;
        self.sample_number += 1;
        self.store_inputs(sample);

        if self.debug {
            debug!(
                "IMU update delta time: {}, sample {}",
                self.time_delta, self.sample_number
            );
        }

        self.calculate_pose(settings.compass_declination());
        self.predict();
        self.update();

        self.fusion_qpose = UnitQuaternion::new_unchecked(self.state_q);
        self.fusion_pose = euler_from_quaternion(&self.fusion_qpose);

        if self.debug {
            debug!("Measured pose: {}", Degrees(&self.measured.euler));
            debug!("Fusion pose: {}", Degrees(&self.fusion_pose));
            debug!("Measured quat: {}", Quat(self.measured.quaternion.as_ref()));
            debug!("Fusion quat: {}", Quat(&self.state_q));
            debug!("Error quat: {}", Quat(&self.state_error));
        }

        self.publish(sample);
        FusionStatus::Fused
    }

    /// Integrates the latest gyro rate over the latest time delta.
    ///
    /// First-order step of `q' = 0.5 * q * (0, w)`; the result is not
    /// renormalized until [`update`](Self::update).
    pub fn predict(&mut self) {
        let x2 = self.gyro.x / 2.0;
        let y2 = self.gyro.y / 2.0;
        let z2 = self.gyro.z / 2.0;

        // rows and columns ordered (w, x, y, z)
        #[rustfmt::skip]
        let transition = Matrix4::new(
            0.0, -x2, -y2, -z2,
            x2, 0.0, z2, -y2,
            y2, -z2, 0.0, x2,
            z2, y2, -x2, 0.0,
        );
        self.transition = transition;

        let q = &self.state_q;
        let q_dot = self.transition * Vector4::new(q.w, q.i, q.j, q.k) * self.time_delta;
        self.state_q += Quaternion::new(q_dot[0], q_dot[1], q_dot[2], q_dot[3]);
    }

    /// Pulls the predicted state toward the measured pose and renormalizes.
    ///
    /// With both accelerometer and compass disabled the prediction is kept.
    pub fn update(&mut self) {
        let step = if self.enable_accel || self.enable_compass {
            self.correction
                .apply(self.state_q, &self.measured.quaternion, self.time_delta)
        } else {
            CorrectionStep::passthrough(self.state_q)
        };
        self.state_error = step.error;
        self.state_q = step.state.into_inner();
    }

    fn store_inputs(&mut self, sample: &ImuSample) {
        self.gyro = if self.enable_gyro {
            sample.gyro
        } else {
            Vector3::zeros()
        };
        self.accel = sample.accel;
        self.compass = sample.compass;
        self.compass_valid = sample.compass_valid;
    }

    fn calculate_pose(&mut self, declination: f32) {
        let accel = self.enable_accel.then_some(&self.accel);
        let compass = (self.enable_compass && self.compass_valid).then_some(&self.compass);
        self.measured = measure_pose(
            accel,
            compass,
            declination,
            &self.fusion_pose,
            &self.fusion_qpose,
        );
    }

    fn publish(&self, sample: &mut ImuSample) {
        sample.fusion_pose = self.fusion_pose;
        sample.fusion_qpose = self.fusion_qpose;
        sample.fusion_pose_valid = true;
        sample.fusion_qpose_valid = true;
    }

    pub fn fusion_name(&self) -> &'static str {
        self.correction.name()
    }

    pub fn correction(&self) -> Correction {
        self.correction
    }

    pub fn fusion_pose(&self) -> Vector3<f32> {
        self.fusion_pose
    }

    pub fn fusion_quaternion(&self) -> UnitQuaternion<f32> {
        self.fusion_qpose
    }

    pub fn measured_pose(&self) -> Vector3<f32> {
        self.measured.euler
    }

    pub fn measured_quaternion(&self) -> UnitQuaternion<f32> {
        self.measured.quaternion
    }

    /// Raw state; unit length after every completed `ingest`.
    pub fn state_quaternion(&self) -> Quaternion<f32> {
        self.state_q
    }

    /// Error from the last update: component-wise difference in linear
    /// mode, relative rotation in slerp mode.
    pub fn correction_error(&self) -> Quaternion<f32> {
        self.state_error
    }

    pub fn transition(&self) -> &Matrix4<f32> {
        &self.transition
    }

    pub fn gyro(&self) -> Vector3<f32> {
        self.gyro
    }

    pub fn accel(&self) -> Vector3<f32> {
        self.accel
    }

    pub fn compass(&self) -> Vector3<f32> {
        self.compass
    }

    /// Seconds between the last two accepted samples.
    pub fn time_delta(&self) -> f32 {
        self.time_delta
    }

    pub fn sample_number(&self) -> u64 {
        self.sample_number
    }

    pub fn is_initialized(&self) -> bool {
        !self.first_time
    }

    pub fn gyro_enabled(&self) -> bool {
        self.enable_gyro
    }

    pub fn set_gyro_enable(&mut self, enable: bool) {
        self.enable_gyro = enable;
    }

    pub fn accel_enabled(&self) -> bool {
        self.enable_accel
    }

    pub fn set_accel_enable(&mut self, enable: bool) {
        self.enable_accel = enable;
    }

    pub fn compass_enabled(&self) -> bool {
        self.enable_compass
    }

    pub fn set_compass_enable(&mut self, enable: bool) {
        self.enable_compass = enable;
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    pub fn set_debug_enable(&mut self, enable: bool) {
        self.debug = enable;
    }
}

struct Degrees<'a>(&'a Vector3<f32>);

impl fmt::Display for Degrees<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "roll: {:.2} pitch: {:.2} yaw: {:.2}",
            self.0.x.to_degrees(),
            self.0.y.to_degrees(),
            self.0.z.to_degrees()
        )
    }
}

struct Quat<'a>(&'a Quaternion<f32>);

impl fmt::Display for Quat<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scalar: {:.4} x: {:.4} y: {:.4} z: {:.4}",
            self.0.w, self.0.i, self.0.j, self.0.k
        )
    }
}

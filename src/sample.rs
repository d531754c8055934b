use nalgebra::{UnitQuaternion, Vector3};

/// One IMU reading handed to the filter, plus the fused output written back
/// by [`QuaternionFusion::ingest`](crate::QuaternionFusion::ingest).
#[derive(Debug, Clone, PartialEq)]
pub struct ImuSample {
    /// Microseconds, expected to be non-decreasing between calls.
    pub timestamp: u64,
    /// rad/s
    pub gyro: Vector3<f32>,
    pub accel: Vector3<f32>,
    pub compass: Vector3<f32>,
    pub compass_valid: bool,

    /// Fused (roll, pitch, yaw) in radians.
    pub fusion_pose: Vector3<f32>,
    pub fusion_qpose: UnitQuaternion<f32>,
    pub fusion_pose_valid: bool,
    pub fusion_qpose_valid: bool,
}

impl ImuSample {
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            gyro: Vector3::zeros(),
            accel: Vector3::zeros(),
            compass: Vector3::zeros(),
            compass_valid: false,
            fusion_pose: Vector3::zeros(),
            fusion_qpose: UnitQuaternion::identity(),
            fusion_pose_valid: false,
            fusion_qpose_valid: false,
        }
    }

    #[must_use]
    pub fn with_gyro(mut self, gyro: Vector3<f32>) -> Self {
        self.gyro = gyro;
        self
    }

    #[must_use]
    pub fn with_accel(mut self, accel: Vector3<f32>) -> Self {
        self.accel = accel;
        self
    }

    /// Sets the compass reading and marks it valid.
    #[must_use]
    pub fn with_compass(mut self, compass: Vector3<f32>) -> Self {
        self.compass = compass;
        self.compass_valid = true;
        self
    }
}

//! Orientation measured directly from the accelerometer and compass.
//!
//! Euler angles are `(roll, pitch, yaw)` in radians using nalgebra's
//! [`UnitQuaternion::from_euler_angles`] convention. The world frame is
//! x north, y west, z up, so a level, north-facing sensor reads gravity on
//! +z and the magnetic field along +x.

use libm::{atan2f, sqrtf};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MeasuredPose {
    pub euler: Vector3<f32>,
    pub quaternion: UnitQuaternion<f32>,
}

impl Default for MeasuredPose {
    fn default() -> Self {
        Self {
            euler: Vector3::zeros(),
            quaternion: quaternion_from_euler(&Vector3::zeros()),
        }
    }
}

/// Roll and pitch of the gravity vector, yaw left at zero.
///
/// Returns `None` for a zero-length reading.
pub fn accel_to_euler(accel: &Vector3<f32>) -> Option<Vector3<f32>> {
    let a = accel.try_normalize(f32::EPSILON)?;
    Some(Vector3::new(
        atan2f(a.y, a.z),
        -atan2f(a.x, sqrtf(a.y * a.y + a.z * a.z)),
        0.0,
    ))
}

/// Tilt-compensated heading in radians with `declination` removed.
///
/// Returns `None` for a zero-length reading.
pub fn compass_heading(tilt: &Vector3<f32>, compass: &Vector3<f32>, declination: f32) -> Option<f32> {
    let mag = compass.try_normalize(f32::EPSILON)?;
    let level = UnitQuaternion::from_euler_angles(tilt.x, tilt.y, 0.0) * mag;
    Some(-atan2f(level.y, level.x) - declination)
}

pub fn quaternion_from_euler(euler: &Vector3<f32>) -> UnitQuaternion<f32> {
    UnitQuaternion::from_euler_angles(euler.x, euler.y, euler.z)
}

pub fn euler_from_quaternion(quat: &UnitQuaternion<f32>) -> Vector3<f32> {
    let (roll, pitch, yaw) = quat.euler_angles();
    Vector3::new(roll, pitch, yaw)
}

/// Flips `quat` onto the same hemisphere as `reference`.
///
/// Both signs describe the same rotation, but the additive correction and the
/// slerp angle need the short arc. The largest component of `quat` decides.
pub fn align_sign(quat: UnitQuaternion<f32>, reference: &Quaternion<f32>) -> UnitQuaternion<f32> {
    let index = quat.coords.iamax();
    let value = quat.coords[index];
    let other = reference.coords[index];
    if (value < 0.0 && other > 0.0) || (value > 0.0 && other < 0.0) {
        UnitQuaternion::new_unchecked(-quat.into_inner())
    } else {
        quat
    }
}

/// Computes the measured pose from the sources that are currently usable.
///
/// `accel` and `compass` are `None` when the source is disabled or its reading
/// is invalid. Missing tilt falls back to the fused tilt; a missing heading
/// falls back to the fused yaw, leaving heading to gyro integration.
pub fn measure_pose(
    accel: Option<&Vector3<f32>>,
    compass: Option<&Vector3<f32>>,
    declination: f32,
    fused_pose: &Vector3<f32>,
    fused_quaternion: &UnitQuaternion<f32>,
) -> MeasuredPose {
    let mut euler = accel
        .and_then(accel_to_euler)
        .unwrap_or_else(|| Vector3::new(fused_pose.x, fused_pose.y, 0.0));

    euler.z = compass
        .and_then(|mag| compass_heading(&euler, mag, declination))
        .unwrap_or(fused_pose.z);

    let quaternion = align_sign(quaternion_from_euler(&euler), fused_quaternion.as_ref());
    MeasuredPose {
        euler: euler_from_quaternion(&quaternion),
        quaternion,
    }
}

#![no_std]
#![doc = include_str!("../README.md")]

mod correction;
mod fusion;
mod pose;
mod sample;
mod traits;

pub use correction::{Correction, CorrectionStep, LinearParams, SlerpParams};
pub use fusion::{FusionParams, FusionStatus, QuaternionFusion};
pub use pose::{
    MeasuredPose, accel_to_euler, align_sign, compass_heading, euler_from_quaternion,
    measure_pose, quaternion_from_euler,
};
pub use sample::ImuSample;
pub use traits::FusionSettings;

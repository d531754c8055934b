use nalgebra::Vector3;
use qf_ahrs::{
    Correction, FusionParams, ImuSample, LinearParams, QuaternionFusion, SlerpParams,
};

fn main() {
    let period_us = 10_000; // 100 Hz
    let declination = 0.0_f32;

    let mut linear = QuaternionFusion::new(FusionParams {
        correction: Correction::Linear(LinearParams::default()),
        ..FusionParams::default()
    });
    let mut slerp = QuaternionFusion::new(FusionParams {
        correction: Correction::Slerp(SlerpParams::default()),
        ..FusionParams::default()
    });

    // Sensor data: level, facing north, slowly turning left
    let gyr = Vector3::new(0.0, 0.0, 0.1);
    let acc = Vector3::new(0.0, 0.0, 9.81);
    let mag = Vector3::new(20.0, 0.0, -40.0);

    for i in 0..500u64 {
        let mut sample = ImuSample::new(i * period_us)
            .with_gyro(gyr)
            .with_accel(acc)
            .with_compass(mag);
        linear.ingest(&mut sample, &declination);
        slerp.ingest(&mut sample.clone(), &declination);
    }

    println!("Linear: {:?}", linear.fusion_quaternion().euler_angles());
    println!("Slerp:  {:?}", slerp.fusion_quaternion().euler_angles());
}

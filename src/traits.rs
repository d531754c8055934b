/// Source of the settings the filter reads on every sample.
pub trait FusionSettings {
    /// Angle between magnetic north and true north in radians, east positive.
    /// Subtracted from the compass heading.
    fn compass_declination(&self) -> f32;
}

impl FusionSettings for f32 {
    fn compass_declination(&self) -> f32 {
        *self
    }
}

impl<T: FusionSettings + ?Sized> FusionSettings for &T {
    fn compass_declination(&self) -> f32 {
        (**self).compass_declination()
    }
}

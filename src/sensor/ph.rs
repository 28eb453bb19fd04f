/// Linear mapping from raw ADC counts to pH.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhCalibration {
    pub slope: f32,
    pub intercept: f32,
}

impl PhCalibration {
    pub const DEFAULT: Self = Self { slope: -0.0051, intercept: 15.449 };

    pub fn ph(&self, raw: u16) -> f32 {
        f32::from(raw) * self.slope + self.intercept
    }
}

impl Default for PhCalibration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

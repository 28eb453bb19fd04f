// The register drivers only talk to real chips on the device build.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
pub mod bme280;
mod ph;
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
pub mod tsl2591;

#[cfg(target_os = "espidf")]
pub use bme280::Bme280;
pub use ph::PhCalibration;
#[cfg(target_os = "espidf")]
pub use tsl2591::Tsl2591;

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("i2c transfer to {addr:#04x} failed: {reason}")]
    Bus { addr: u8, reason: String },
    #[error("adc read failed: {0}")]
    Adc(String),
    #[error("unexpected chip id {found:#04x} at {addr:#04x}, expected {expected:#04x}")]
    ChipId { addr: u8, expected: u8, found: u8 },
    #[error("light sensor channel saturated")]
    Saturated,
    #[error("sensor at {addr:#04x} has no completed measurement yet")]
    NotReady { addr: u8 },
}

/// Register-level access to an I²C bus.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
pub trait Bus {
    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), SensorError>;
    fn write_read(&mut self, addr: u8, bytes: &[u8], buf: &mut [u8]) -> Result<(), SensorError>;
}

/// The non-flow readings on the dashboard.
pub trait Sensors {
    /// Degrees Celsius.
    fn temperature(&mut self) -> Result<f32, SensorError>;
    fn ph(&mut self) -> Result<f32, SensorError>;
    /// Lux.
    fn luminosity(&mut self) -> Result<f32, SensorError>;
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{Bus, SensorError};

    /// One device worth of registers, addressed by the first byte of each transfer.
    pub struct FakeBus {
        pub addr: u8,
        pub regs: [u8; 256],
        pub writes: Vec<Vec<u8>>,
        pub broken: bool,
    }

    impl FakeBus {
        pub fn new(addr: u8) -> Self {
            Self { addr, regs: [0; 256], writes: Vec::new(), broken: false }
        }

        pub fn set(&mut self, reg: u8, bytes: &[u8]) {
            let start = usize::from(reg);
            self.regs[start..start + bytes.len()].copy_from_slice(bytes);
        }

        fn check(&self, addr: u8) -> Result<(), SensorError> {
            if self.broken || addr != self.addr {
                return Err(SensorError::Bus { addr, reason: "no ack".into() });
            }
            Ok(())
        }
    }

    impl Bus for FakeBus {
        fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), SensorError> {
            self.check(addr)?;
            if let [reg, data @ ..] = bytes {
                self.set(*reg, data);
            }
            self.writes.push(bytes.to_vec());
            Ok(())
        }

        fn write_read(&mut self, addr: u8, bytes: &[u8], buf: &mut [u8]) -> Result<(), SensorError> {
            self.check(addr)?;
            let start = usize::from(bytes[0]);
            buf.copy_from_slice(&self.regs[start..start + buf.len()]);
            Ok(())
        }
    }
}

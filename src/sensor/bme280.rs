//! BME280 temperature readout.
//!
//! Runs the part in normal mode with 1× oversampling and applies the integer
//! compensation from the Bosch datasheet (section 4.2.3). Humidity and pressure
//! are sampled by the chip but never read.

use super::{Bus, SensorError};

/// SDO tied to ground.
pub const ADDRESS: u8 = 0x76;

const REG_CALIB_T: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_TEMP: u8 = 0xFA;

const CHIP_ID: u8 = 0x60;

/// osrs_h = ×1. Must be written before `ctrl_meas` to take effect.
const CTRL_HUM: u8 = 0b001;
/// osrs_t = ×1, osrs_p = ×1, mode = normal.
const CTRL_MEAS: u8 = 0b001_001_11;

/// Reset value of the temperature registers, left in place until the first
/// conversion after `ctrl_meas` is written.
const TEMP_SKIPPED: i32 = 0x80000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Calibration {
    t1: u16,
    t2: i16,
    t3: i16,
}

impl Calibration {
    fn from_le_bytes(b: [u8; 6]) -> Self {
        Self {
            t1: u16::from_le_bytes([b[0], b[1]]),
            t2: i16::from_le_bytes([b[2], b[3]]),
            t3: i16::from_le_bytes([b[4], b[5]]),
        }
    }

    /// Hundredths of a degree Celsius for a 20-bit raw sample.
    fn centi_celsius(&self, raw: i32) -> i32 {
        let raw = i64::from(raw);
        let t1 = i64::from(self.t1);
        let var1 = (((raw >> 3) - (t1 << 1)) * i64::from(self.t2)) >> 11;
        let delta = (raw >> 4) - t1;
        let var2 = (((delta * delta) >> 12) * i64::from(self.t3)) >> 14;
        let t_fine = var1 + var2;
        ((t_fine * 5 + 128) >> 8) as i32
    }
}

pub struct Bme280<B> {
    bus: B,
    addr: u8,
    calibration: Option<Calibration>,
}

impl<B: Bus> Bme280<B> {
    /// Does no I/O; call [`Bme280::init`] at boot. A reading on an
    /// uninitialized or failed driver probes the chip again first.
    pub fn new(bus: B, addr: u8) -> Self {
        Self { bus, addr, calibration: None }
    }

    /// Checks the chip id, reads the temperature trimming and starts normal mode.
    pub fn init(&mut self) -> Result<(), SensorError> {
        self.configure().map(drop)
    }

    fn configure(&mut self) -> Result<Calibration, SensorError> {
        let mut id = [0];
        self.bus.write_read(self.addr, &[REG_CHIP_ID], &mut id)?;
        if id[0] != CHIP_ID {
            return Err(SensorError::ChipId { addr: self.addr, expected: CHIP_ID, found: id[0] });
        }

        let mut raw = [0; 6];
        self.bus.write_read(self.addr, &[REG_CALIB_T], &mut raw)?;
        let calibration = Calibration::from_le_bytes(raw);

        self.bus.write(self.addr, &[REG_CTRL_HUM, CTRL_HUM])?;
        self.bus.write(self.addr, &[REG_CTRL_MEAS, CTRL_MEAS])?;
        log::info!("bme280 at {:#04x} ready with {calibration:?}", self.addr);

        self.calibration = Some(calibration);
        Ok(calibration)
    }

    pub fn temperature(&mut self) -> Result<f32, SensorError> {
        let calibration = match self.calibration {
            Some(calibration) => calibration,
            None => self.configure()?,
        };

        let mut buf = [0; 3];
        if let Err(err) = self.bus.write_read(self.addr, &[REG_TEMP], &mut buf) {
            self.calibration = None;
            return Err(err);
        }
        let raw = (i32::from(buf[0]) << 12) | (i32::from(buf[1]) << 4) | (i32::from(buf[2]) >> 4);
        if raw == TEMP_SKIPPED {
            return Err(SensorError::NotReady { addr: self.addr });
        }
        Ok(calibration.centi_celsius(raw) as f32 / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::fake::FakeBus;

    /// Worked example from the datasheet: T1 = 27504, T2 = 26435, T3 = -1000.
    fn datasheet_chip() -> FakeBus {
        let mut bus = FakeBus::new(ADDRESS);
        bus.set(REG_CHIP_ID, &[CHIP_ID]);
        bus.set(REG_CALIB_T, &[0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC]);
        // adc_T = 519888
        bus.set(REG_TEMP, &[0x7E, 0xED, 0x00]);
        bus
    }

    #[test]
    fn compensation_matches_datasheet() {
        let calibration = Calibration { t1: 27504, t2: 26435, t3: -1000 };
        assert_eq!(calibration.centi_celsius(519_888), 2508);
    }

    #[test]
    fn reads_celsius() {
        let mut sensor = Bme280::new(datasheet_chip(), ADDRESS);
        let t = sensor.temperature().unwrap();
        assert!((t - 25.08).abs() < 1e-4, "got {t}");
    }

    #[test]
    fn init_configures_normal_mode_up_front() {
        let mut sensor = Bme280::new(datasheet_chip(), ADDRESS);
        sensor.init().unwrap();
        assert_eq!(sensor.bus.writes, vec![vec![REG_CTRL_HUM, CTRL_HUM], vec![REG_CTRL_MEAS, CTRL_MEAS]]);

        // Reads after init do not reconfigure the chip.
        sensor.temperature().unwrap();
        assert_eq!(sensor.bus.writes.len(), 2);
    }

    #[test]
    fn reset_value_is_not_a_temperature() {
        let mut bus = datasheet_chip();
        bus.set(REG_TEMP, &[0x80, 0x00, 0x00]);
        let mut sensor = Bme280::new(bus, ADDRESS);
        sensor.init().unwrap();
        assert!(matches!(sensor.temperature(), Err(SensorError::NotReady { addr: ADDRESS })));

        // The first conversion lands without another init.
        sensor.bus.set(REG_TEMP, &[0x7E, 0xED, 0x00]);
        let t = sensor.temperature().unwrap();
        assert!((t - 25.08).abs() < 1e-4, "got {t}");
        assert_eq!(sensor.bus.writes.len(), 2);
    }

    #[test]
    fn first_read_configures_normal_mode() {
        let mut sensor = Bme280::new(datasheet_chip(), ADDRESS);
        sensor.temperature().unwrap();
        sensor.temperature().unwrap();
        assert_eq!(sensor.bus.writes, vec![vec![REG_CTRL_HUM, CTRL_HUM], vec![REG_CTRL_MEAS, CTRL_MEAS]]);
    }

    #[test]
    fn wrong_chip_is_rejected() {
        let mut bus = datasheet_chip();
        bus.set(REG_CHIP_ID, &[0x58]); // BMP280
        let mut sensor = Bme280::new(bus, ADDRESS);
        assert!(matches!(sensor.temperature(), Err(SensorError::ChipId { found: 0x58, .. })));
    }

    #[test]
    fn recovers_after_bus_failure() {
        let mut sensor = Bme280::new(datasheet_chip(), ADDRESS);
        sensor.temperature().unwrap();

        sensor.bus.broken = true;
        assert!(matches!(sensor.temperature(), Err(SensorError::Bus { .. })));
        assert!(sensor.calibration.is_none());

        sensor.bus.broken = false;
        assert!(sensor.temperature().is_ok());
    }
}

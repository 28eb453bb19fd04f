//! TSL2591 two-channel light sensor.
//!
//! The sensor integrates continuously once enabled (AEN), so a reading is a
//! plain register read of the last completed cycle. STATUS.AVALID stays clear
//! until the first cycle after power-on completes.

use super::{Bus, SensorError};

pub const ADDRESS: u8 = 0x29;

/// Every register access carries the command bit and normal-operation type.
const COMMAND: u8 = 0xA0;
const REG_ENABLE: u8 = 0x00;
const REG_CONTROL: u8 = 0x01;
const REG_ID: u8 = 0x12;
const REG_STATUS: u8 = 0x13;

const DEVICE_ID: u8 = 0x50;
const ENABLE_POWERON: u8 = 0x01;
const ENABLE_AEN: u8 = 0x02;
/// Set once an integration cycle has completed since the ADCs were enabled.
const STATUS_AVALID: u8 = 0x01;

// Lux coefficients from the vendor's application note.
const LUX_DF: f32 = 408.0;
const LUX_COEF_B: f32 = 1.64;
const LUX_COEF_C: f32 = 0.59;
const LUX_COEF_D: f32 = 0.86;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Gain {
    #[default]
    Low,
    Medium,
    High,
    Max,
}

impl Gain {
    /// `low`, `medium`, `high` or `max`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Self::Low => 0x00,
            Self::Medium => 0x10,
            Self::High => 0x20,
            Self::Max => 0x30,
        }
    }

    fn factor(self) -> f32 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 25.0,
            Self::High => 428.0,
            Self::Max => 9876.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegrationTime {
    #[default]
    Ms100,
    Ms200,
    Ms300,
    Ms400,
    Ms500,
    Ms600,
}

impl IntegrationTime {
    pub fn from_millis(ms: u32) -> Option<Self> {
        match ms {
            100 => Some(Self::Ms100),
            200 => Some(Self::Ms200),
            300 => Some(Self::Ms300),
            400 => Some(Self::Ms400),
            500 => Some(Self::Ms500),
            600 => Some(Self::Ms600),
            _ => None,
        }
    }

    fn bits(self) -> u8 {
        self as u8
    }

    fn millis(self) -> f32 {
        f32::from(self.bits() + 1) * 100.0
    }
}

/// Gain and integration time, which together set the counts per lux.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LightTiming {
    pub gain: Gain,
    pub integration: IntegrationTime,
}

/// Converts raw full-spectrum and infrared counts into lux.
pub fn lux(full: u16, ir: u16, gain: Gain, integration: IntegrationTime) -> Result<f32, SensorError> {
    if full == u16::MAX || ir == u16::MAX {
        return Err(SensorError::Saturated);
    }

    let (full, ir) = (f32::from(full), f32::from(ir));
    let cpl = integration.millis() * gain.factor() / LUX_DF;
    let lux1 = (full - LUX_COEF_B * ir) / cpl;
    let lux2 = (LUX_COEF_C * full - LUX_COEF_D * ir) / cpl;
    // IR-heavy light can drive both estimates negative.
    Ok(lux1.max(lux2).max(0.0))
}

pub struct Tsl2591<B> {
    bus: B,
    addr: u8,
    gain: Gain,
    integration: IntegrationTime,
    enabled: bool,
}

impl<B: Bus> Tsl2591<B> {
    /// Does no I/O; call [`Tsl2591::init`] to power the chip on.
    pub fn new(bus: B, addr: u8, timing: LightTiming) -> Self {
        let LightTiming { gain, integration } = timing;
        Self { bus, addr, gain, integration, enabled: false }
    }

    /// Checks the device id, programs gain and integration time and starts
    /// continuous integration. Reads that find the chip disabled call this again.
    pub fn init(&mut self) -> Result<(), SensorError> {
        let mut id = [0];
        self.bus.write_read(self.addr, &[COMMAND | REG_ID], &mut id)?;
        if id[0] != DEVICE_ID {
            return Err(SensorError::ChipId { addr: self.addr, expected: DEVICE_ID, found: id[0] });
        }

        let control = self.gain.bits() | self.integration.bits();
        self.bus.write(self.addr, &[COMMAND | REG_CONTROL, control])?;
        self.bus.write(self.addr, &[COMMAND | REG_ENABLE, ENABLE_POWERON | ENABLE_AEN])?;
        log::info!("tsl2591 at {:#04x} enabled with {:?} gain over {:?}", self.addr, self.gain, self.integration);

        self.enabled = true;
        Ok(())
    }

    /// Raw (full spectrum, infrared) counts of the last completed cycle.
    pub fn channels(&mut self) -> Result<(u16, u16), SensorError> {
        if !self.enabled {
            self.init()?;
        }

        // STATUS and both channels are adjacent, so one transfer covers all three.
        let mut buf = [0; 5];
        if let Err(err) = self.bus.write_read(self.addr, &[COMMAND | REG_STATUS], &mut buf) {
            self.enabled = false;
            return Err(err);
        }
        if buf[0] & STATUS_AVALID == 0 {
            return Err(SensorError::NotReady { addr: self.addr });
        }
        Ok((u16::from_le_bytes([buf[1], buf[2]]), u16::from_le_bytes([buf[3], buf[4]])))
    }

    pub fn luminosity(&mut self) -> Result<f32, SensorError> {
        let (full, ir) = self.channels()?;
        log::debug!("tsl2591 full={full} ir={ir}");
        lux(full, ir, self.gain, self.integration)
    }
}

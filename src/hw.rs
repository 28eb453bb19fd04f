//! Board wiring: the two I²C buses, the pH probe's ADC channel and the flow
//! sensor interrupt.

use esp_idf_hal::{
    adc::{attenuation, config::Config as AdcConfig, AdcChannelDriver, AdcDriver, ADC1},
    delay::BLOCK,
    gpio::{Gpio18, Gpio19, Gpio21, Gpio22, Gpio36, Gpio39, Input, InterruptType, PinDriver},
    i2c::{I2cConfig, I2cDriver, I2C0, I2C1},
    units::FromValueType as _,
};
use esp_idf_sys::{self as sys, EspError};

use crate::{
    flow,
    sensor::{
        bme280,
        tsl2591::{self, LightTiming},
        Bme280, Bus, PhCalibration, SensorError, Sensors, Tsl2591,
    },
};

impl Bus for I2cDriver<'_> {
    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), SensorError> {
        I2cDriver::write(self, addr, bytes, BLOCK).map_err(|err| SensorError::Bus { addr, reason: err.to_string() })
    }

    fn write_read(&mut self, addr: u8, bytes: &[u8], buf: &mut [u8]) -> Result<(), SensorError> {
        I2cDriver::write_read(self, addr, bytes, buf, BLOCK).map_err(|err| SensorError::Bus { addr, reason: err.to_string() })
    }
}

/// Peripherals the sensors are soldered to.
pub struct Wiring {
    /// BME280 on SDA 21, SCL 22.
    pub i2c0: I2C0,
    pub sda0: Gpio21,
    pub scl0: Gpio22,
    /// TSL2591 on SDA 19, SCL 18.
    pub i2c1: I2C1,
    pub sda1: Gpio19,
    pub scl1: Gpio18,
    pub adc1: ADC1,
    pub ph: Gpio36,
}

pub struct Board {
    thermometer: Bme280<I2cDriver<'static>>,
    light: Tsl2591<I2cDriver<'static>>,
    adc: AdcDriver<'static, ADC1>,
    // 11 dB gives the full 0-3.3 V swing of the probe amplifier.
    ph: AdcChannelDriver<'static, { attenuation::DB_11 }, Gpio36>,
    calibration: PhCalibration,
}

impl Board {
    /// Brings up the buses and starts both I²C sensors converting, so the
    /// first page load finds a completed measurement. A sensor that is absent
    /// now is retried on every read.
    pub fn new(wiring: Wiring, calibration: PhCalibration, timing: LightTiming) -> Result<Self, EspError> {
        let Wiring { i2c0, sda0, scl0, i2c1, sda1, scl1, adc1, ph } = wiring;
        let config = I2cConfig::new().baudrate(100.kHz().into());
        let bus0 = I2cDriver::new(i2c0, sda0, scl0, &config)?;
        let bus1 = I2cDriver::new(i2c1, sda1, scl1, &config)?;

        let mut thermometer = Bme280::new(bus0, bme280::ADDRESS);
        if let Err(err) = thermometer.init() {
            log::warn!("bme280 not ready at boot: {err}");
        }
        let mut light = Tsl2591::new(bus1, tsl2591::ADDRESS, timing);
        if let Err(err) = light.init() {
            log::warn!("tsl2591 not ready at boot: {err}");
        }

        Ok(Self {
            thermometer,
            light,
            adc: AdcDriver::new(adc1, &AdcConfig::new())?,
            ph: AdcChannelDriver::new(ph)?,
            calibration,
        })
    }
}

impl Sensors for Board {
    fn temperature(&mut self) -> Result<f32, SensorError> {
        self.thermometer.temperature()
    }

    fn ph(&mut self) -> Result<f32, SensorError> {
        let raw = self.adc.read(&mut self.ph).map_err(|err| SensorError::Adc(err.to_string()))?;
        log::debug!("pH probe raw={raw}");
        Ok(self.calibration.ph(raw))
    }

    fn luminosity(&mut self) -> Result<f32, SensorError> {
        self.light.luminosity()
    }
}

/// Routes rising edges on the flow sensor line into [`flow::PULSES`]. The
/// returned driver must be kept alive for as long as pulses should count.
pub fn attach_flow_sensor(pin: Gpio39) -> Result<PinDriver<'static, Gpio39, Input>, EspError> {
    // GPIO34-39 have no internal pulls, the pull-down is on the board.
    let mut pin = PinDriver::input(pin)?;
    pin.set_interrupt_type(InterruptType::PosEdge)?;
    let gpio = pin.pin();

    // SAFETY: the callback runs in interrupt context and only touches an
    // atomic counter and this pin's interrupt enable bit.
    unsafe {
        pin.subscribe(move || {
            flow::PULSES.record();
            // The driver masks the line after each edge it dispatches.
            sys::gpio_intr_enable(gpio);
        })?;
    }
    pin.enable_interrupt()?;

    log::info!("flow sensor armed on GPIO{gpio}");
    Ok(pin)
}

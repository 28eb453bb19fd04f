//! Simulated sensors for running the dashboard on a development machine.
//!
//! Each reading is a bounded random walk so consecutive page loads look like
//! a real tank: slow temperature drift, a pH probe that wanders around
//! neutral-acidic water, and daylight that flickers a little. Light is walked
//! in raw sensor counts and converted with the configured timing, the way the
//! real TSL2591 reading is. The pH probe also glitches now and then so the
//! placeholder path gets exercised.

use std::{
    io,
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    flow::PulseCounter,
    sensor::{
        tsl2591::{self, LightTiming},
        PhCalibration, SensorError, Sensors,
    },
};

/// Roughly one failed pH read in a hundred.
const GLITCH_PERCENT: u8 = 1;
/// Infrared share of the simulated daylight.
const IR_FRACTION: f32 = 0.25;

fn walk(value: &mut f32, step: f32, min: f32, max: f32) -> f32 {
    *value = (*value + step * (fastrand::f32() * 2.0 - 1.0)).clamp(min, max);
    *value
}

pub struct Simulated {
    celsius: f32,
    ph_raw: f32,
    full_counts: f32,
    calibration: PhCalibration,
    light: LightTiming,
}

impl Simulated {
    pub fn new(calibration: PhCalibration, light: LightTiming) -> Self {
        Self { celsius: 21.0, ph_raw: 1896.0, full_counts: 125.0, calibration, light }
    }
}

impl Sensors for Simulated {
    fn temperature(&mut self) -> Result<f32, SensorError> {
        // The BME280 resolves hundredths of a degree.
        Ok((walk(&mut self.celsius, 0.2, 5.0, 40.0) * 100.0).round() / 100.0)
    }

    fn ph(&mut self) -> Result<f32, SensorError> {
        if fastrand::u8(..100) < GLITCH_PERCENT {
            return Err(SensorError::Adc("simulated probe glitch".into()));
        }
        let raw = walk(&mut self.ph_raw, 12.0, 0.0, 4095.0) as u16;
        Ok(self.calibration.ph(raw))
    }

    fn luminosity(&mut self) -> Result<f32, SensorError> {
        let full = walk(&mut self.full_counts, 6.0, 0.0, 800.0);
        let ir = full * IR_FRACTION;
        tsl2591::lux(full as u16, ir as u16, self.light.gain, self.light.integration)
    }
}

/// Feeds `pulses` from a background thread, one pulse per `period` give or
/// take 20 %, standing in for the flow sensor interrupt.
pub fn spawn_flow(pulses: &'static PulseCounter, period: Duration) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("flow-sim".into()).spawn(move || loop {
        let jitter = 0.8 + fastrand::f32() * 0.4;
        thread::sleep(period.mul_f32(jitter));
        pulses.record();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_stay_in_range() {
        let mut sim = Simulated::new(PhCalibration::DEFAULT, LightTiming::default());
        for _ in 0..1_000 {
            let t = sim.temperature().unwrap();
            assert!((5.0..=40.0).contains(&t), "temperature {t}");
            let lux = sim.luminosity().unwrap();
            assert!((0.0..=2000.0).contains(&lux), "lux {lux}");
            if let Ok(ph) = sim.ph() {
                assert!((PhCalibration::DEFAULT.ph(4095)..=PhCalibration::DEFAULT.ph(0)).contains(&ph), "pH {ph}");
            }
        }
    }

    #[test]
    fn higher_gain_reads_fewer_lux_for_the_same_counts() {
        let mut low = Simulated::new(PhCalibration::DEFAULT, LightTiming::default());
        let high_timing = LightTiming { gain: tsl2591::Gain::High, ..LightTiming::default() };
        let mut high = Simulated::new(PhCalibration::DEFAULT, high_timing);
        fastrand::seed(7);
        let low_lux = low.luminosity().unwrap();
        fastrand::seed(7);
        let high_lux = high.luminosity().unwrap();
        assert!(low_lux > 0.0);
        assert!((low_lux / high_lux - 428.0).abs() < 1.0, "low {low_lux}, high {high_lux}");
    }

    #[test]
    fn flow_thread_records_pulses() {
        static PULSES: PulseCounter = PulseCounter::new();
        spawn_flow(&PULSES, Duration::from_millis(1)).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while PULSES.peek() < 10 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(PULSES.peek() >= 10);
    }
}

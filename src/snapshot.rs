use std::time::Instant;

use crate::{
    flow::{FlowDisplay, PulseCounter, RateWindow},
    sensor::{SensorError, Sensors},
};

/// One reading of every sensor. A failed sensor reads as `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub temperature: Option<f32>,
    pub ph: Option<f32>,
    /// Liters per hour.
    pub flow: u32,
    pub luminosity: Option<f32>,
}

/// Owns the sensors and the flow window, and produces a snapshot per request.
pub struct Dashboard<'c, S> {
    sensors: S,
    pulses: &'c PulseCounter,
    window: RateWindow,
    display: FlowDisplay,
}

impl<'c, S: Sensors> Dashboard<'c, S> {
    pub fn new(sensors: S, pulses: &'c PulseCounter, window: RateWindow, display: FlowDisplay) -> Self {
        Self { sensors, pulses, window, display }
    }

    pub fn snapshot(&mut self, now: Instant) -> Snapshot {
        let temperature = best_effort("temperature", self.sensors.temperature());
        let ph = best_effort("pH", self.sensors.ph());
        let fresh = self.window.evaluate(self.pulses, now);
        let flow = match self.display {
            FlowDisplay::Window => fresh,
            FlowDisplay::Hold => self.window.last_rate(),
        };
        let luminosity = best_effort("luminosity", self.sensors.luminosity());
        Snapshot { temperature, ph, flow, luminosity }
    }
}

fn best_effort(name: &str, reading: Result<f32, SensorError>) -> Option<f32> {
    reading.map_err(|err| log::warn!("{name} reading failed: {err}")).ok()
}

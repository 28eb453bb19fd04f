use core::{
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};
use std::time::Instant;

/// Pulses seen on the flow sensor line since the last window close.
pub static PULSES: PulseCounter = PulseCounter::new();

/// Pulse count shared between the interrupt handler and the main loop.
pub struct PulseCounter(AtomicU32);

impl PulseCounter {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Safe to call from interrupt context: no locks, no allocation, no logging.
    pub fn record(&self) {
        // NOTE: We do not guard against integer overflow, but we do expect
        // the counter to be reset every window by the evaluator.
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads and clears the counter in one step.
    pub fn take(&self) -> u32 {
        self.0.swap(0, Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn peek(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Sensor calibration in tenths of a pulse per liter, so 7.5 is stored as 75.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PulsesPerLiter(u32);

impl PulsesPerLiter {
    pub const DEFAULT: Self = Self(75);

    /// Returns `None` unless the factor is positive and has at most one
    /// decimal place, e.g. 7.5 but not 7.25.
    pub fn new(pulses: f32) -> Option<Self> {
        let scaled = f64::from(pulses) * 10.0;
        let tenths = scaled.round();
        if (scaled - tenths).abs() > 1e-3 {
            return None;
        }
        (1.0..=f64::from(u32::MAX)).contains(&tenths).then(|| Self(tenths as u32))
    }

    /// `pulses * 60 / factor`, truncated.
    fn liters_per_hour(self, pulses: u32) -> u32 {
        let rate = u64::from(pulses) * 60 * 10 / u64::from(self.0);
        rate.try_into().unwrap_or(u32::MAX)
    }
}

impl Default for PulsesPerLiter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Which flow figure the dashboard shows between window closes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlowDisplay {
    /// Exactly what the evaluator returned for this request, so 0 until the next close.
    #[default]
    Window,
    /// The rate of the most recently closed window.
    Hold,
}

/// Converts accumulated pulses into a flow rate once per fixed window.
pub struct RateWindow {
    window: Duration,
    calibration: PulsesPerLiter,
    start: Instant,
    last_rate: u32,
}

impl RateWindow {
    pub const DEFAULT_WINDOW: Duration = Duration::from_millis(10_000);

    pub fn new(window: Duration, calibration: PulsesPerLiter, start: Instant) -> Self {
        Self { window, calibration, start, last_rate: 0 }
    }

    /// Closes the window if it has run its full length and returns the new rate
    /// in liters per hour. Returns 0 without touching the counter otherwise.
    pub fn evaluate(&mut self, counter: &PulseCounter, now: Instant) -> u32 {
        if now.saturating_duration_since(self.start) < self.window {
            return 0;
        }

        let pulses = counter.take();
        let rate = self.calibration.liters_per_hour(pulses);
        log::info!("{pulses} pulses closed the window at {rate} L/h");

        self.start = now;
        self.last_rate = rate;
        rate
    }

    /// Rate of the most recently closed window, 0 before the first close.
    pub fn last_rate(&self) -> u32 {
        self.last_rate
    }

    #[cfg(test)]
    pub fn window_start(&self) -> Instant {
        self.start
    }
}

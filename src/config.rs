use core::{str::FromStr, time::Duration};

use crate::{
    flow::{FlowDisplay, PulsesPerLiter, RateWindow},
    net::RetryPolicy,
    sensor::{
        tsl2591::{Gain, IntegrationTime, LightTiming},
        PhCalibration,
    },
};

/// Limits of the station configuration in the Wi-Fi driver.
const MAX_SSID_LEN: usize = 32;
const MAX_PASSWORD_LEN: usize = 64;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} is not set")]
    Missing { key: &'static str },
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} must be at most {max} bytes")]
    TooLong { key: &'static str, max: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub wifi_ssid: String,
    pub wifi_password: String,
    pub http_port: u16,
    pub flow_window: Duration,
    pub pulses_per_liter: PulsesPerLiter,
    pub flow_display: FlowDisplay,
    pub ph: PhCalibration,
    pub light: LightTiming,
    pub retry: RetryPolicy,
}

impl Config {
    /// Values baked in at compile time, e.g. `WIFI_SSID=... cargo build`.
    #[cfg(target_os = "espidf")]
    pub fn from_build_env() -> Result<Self, ConfigError> {
        Self::from_lookup(build_env)
    }

    /// The process environment first, then the compile-time values.
    #[cfg(not(target_os = "espidf"))]
    pub fn from_process_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| build_env(key)))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let wifi_ssid = lookup("WIFI_SSID").unwrap_or_default();
        if wifi_ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::TooLong { key: "WIFI_SSID", max: MAX_SSID_LEN });
        }
        let wifi_password = lookup("WIFI_PASSWORD").unwrap_or_default();
        if wifi_password.len() > MAX_PASSWORD_LEN {
            return Err(ConfigError::TooLong { key: "WIFI_PASSWORD", max: MAX_PASSWORD_LEN });
        }

        let window_ms: u64 = parse(&lookup, "FLOW_WINDOW_MS", 10_000)?;
        if window_ms == 0 {
            return Err(invalid("FLOW_WINDOW_MS", window_ms));
        }

        let pulses: f32 = parse(&lookup, "FLOW_PULSES_PER_LITER", 7.5)?;
        let pulses_per_liter = PulsesPerLiter::new(pulses).ok_or_else(|| invalid("FLOW_PULSES_PER_LITER", pulses))?;

        let flow_display = match lookup("FLOW_DISPLAY").as_deref().map(str::trim) {
            None | Some("window") => FlowDisplay::Window,
            Some("hold") => FlowDisplay::Hold,
            Some(other) => return Err(invalid("FLOW_DISPLAY", other)),
        };

        let ph = PhCalibration {
            slope: parse(&lookup, "PH_SLOPE", PhCalibration::DEFAULT.slope)?,
            intercept: parse(&lookup, "PH_INTERCEPT", PhCalibration::DEFAULT.intercept)?,
        };

        let light = LightTiming {
            gain: match lookup("LIGHT_GAIN") {
                Some(name) => Gain::from_name(name.trim()).ok_or_else(|| invalid("LIGHT_GAIN", &name))?,
                None => Gain::default(),
            },
            integration: {
                let ms: u32 = parse(&lookup, "LIGHT_INTEGRATION_MS", 100)?;
                IntegrationTime::from_millis(ms).ok_or_else(|| invalid("LIGHT_INTEGRATION_MS", ms))?
            },
        };

        let retry_ms: u64 = parse(&lookup, "WIFI_RETRY_MS", 1_000)?;
        let retry_max_ms: u64 = parse(&lookup, "WIFI_RETRY_MAX_MS", retry_ms)?;
        let mut retry = RetryPolicy::fixed(Duration::from_millis(retry_ms));
        if retry_max_ms > retry_ms {
            retry = retry.with_backoff(Duration::from_millis(retry_max_ms));
        }
        if let Some(attempts) = lookup("WIFI_MAX_ATTEMPTS") {
            let attempts: u32 = attempts.trim().parse().map_err(|_| invalid("WIFI_MAX_ATTEMPTS", &attempts))?;
            retry = retry.with_max_attempts(attempts);
        }

        Ok(Self {
            wifi_ssid,
            wifi_password,
            http_port: parse(&lookup, "HTTP_PORT", 80)?,
            flow_window: Duration::from_millis(window_ms),
            pulses_per_liter,
            flow_display,
            ph,
            light,
            retry,
        })
    }

    /// The station cannot associate without an SSID.
    #[cfg(any(target_os = "espidf", test))]
    pub fn require_wifi(&self) -> Result<(), ConfigError> {
        if self.wifi_ssid.is_empty() {
            return Err(ConfigError::Missing { key: "WIFI_SSID" });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            http_port: 80,
            flow_window: RateWindow::DEFAULT_WINDOW,
            pulses_per_liter: PulsesPerLiter::DEFAULT,
            flow_display: FlowDisplay::Window,
            ph: PhCalibration::DEFAULT,
            light: LightTiming::default(),
            retry: RetryPolicy::default(),
        }
    }
}

fn invalid(key: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid { key, value: value.to_string() }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| invalid(key, value)),
        None => Ok(default),
    }
}

fn build_env(key: &str) -> Option<String> {
    let value = match key {
        "WIFI_SSID" => option_env!("WIFI_SSID"),
        "WIFI_PASSWORD" => option_env!("WIFI_PASSWORD"),
        "HTTP_PORT" => option_env!("HTTP_PORT"),
        "FLOW_WINDOW_MS" => option_env!("FLOW_WINDOW_MS"),
        "FLOW_PULSES_PER_LITER" => option_env!("FLOW_PULSES_PER_LITER"),
        "FLOW_DISPLAY" => option_env!("FLOW_DISPLAY"),
        "PH_SLOPE" => option_env!("PH_SLOPE"),
        "PH_INTERCEPT" => option_env!("PH_INTERCEPT"),
        "LIGHT_GAIN" => option_env!("LIGHT_GAIN"),
        "LIGHT_INTEGRATION_MS" => option_env!("LIGHT_INTEGRATION_MS"),
        "WIFI_RETRY_MS" => option_env!("WIFI_RETRY_MS"),
        "WIFI_RETRY_MAX_MS" => option_env!("WIFI_RETRY_MAX_MS"),
        "WIFI_MAX_ATTEMPTS" => option_env!("WIFI_MAX_ATTEMPTS"),
        _ => None,
    };
    value.map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(config(&[]).unwrap(), Config::default());
    }

    #[test]
    fn reads_every_key() {
        let config = config(&[
            ("WIFI_SSID", "greenhouse"),
            ("WIFI_PASSWORD", "hunter22"),
            ("HTTP_PORT", "8080"),
            ("FLOW_WINDOW_MS", "5000"),
            ("FLOW_PULSES_PER_LITER", "5.5"),
            ("FLOW_DISPLAY", "hold"),
            ("PH_SLOPE", "-0.006"),
            ("PH_INTERCEPT", "16"),
            ("LIGHT_GAIN", "high"),
            ("LIGHT_INTEGRATION_MS", "300"),
            ("WIFI_RETRY_MS", "500"),
            ("WIFI_RETRY_MAX_MS", "8000"),
            ("WIFI_MAX_ATTEMPTS", "12"),
        ])
        .unwrap();

        assert_eq!(config.wifi_ssid, "greenhouse");
        assert_eq!(config.wifi_password, "hunter22");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.flow_window, Duration::from_secs(5));
        assert_eq!(config.pulses_per_liter, PulsesPerLiter::new(5.5).unwrap());
        assert_eq!(config.flow_display, FlowDisplay::Hold);
        assert_eq!(config.ph, PhCalibration { slope: -0.006, intercept: 16.0 });
        assert_eq!(config.light, LightTiming { gain: Gain::High, integration: IntegrationTime::Ms300 });
        assert_eq!(
            config.retry,
            RetryPolicy::fixed(Duration::from_millis(500))
                .with_backoff(Duration::from_secs(8))
                .with_max_attempts(12)
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            config(&[("HTTP_PORT", "eighty")]),
            Err(ConfigError::Invalid { key: "HTTP_PORT", value: "eighty".into() })
        );
        assert!(matches!(config(&[("FLOW_WINDOW_MS", "0")]), Err(ConfigError::Invalid { key: "FLOW_WINDOW_MS", .. })));
        assert!(matches!(
            config(&[("FLOW_PULSES_PER_LITER", "-1")]),
            Err(ConfigError::Invalid { key: "FLOW_PULSES_PER_LITER", .. })
        ));
        assert!(matches!(config(&[("FLOW_DISPLAY", "cached")]), Err(ConfigError::Invalid { key: "FLOW_DISPLAY", .. })));
    }

    #[test]
    fn calibration_must_fit_in_tenths() {
        assert_eq!(
            config(&[("FLOW_PULSES_PER_LITER", "7.25")]),
            Err(ConfigError::Invalid { key: "FLOW_PULSES_PER_LITER", value: "7.25".into() })
        );
        assert!(config(&[("FLOW_PULSES_PER_LITER", "7.5")]).is_ok());
    }

    #[test]
    fn rejects_unsupported_light_timing() {
        assert_eq!(
            config(&[("LIGHT_GAIN", "ultra")]),
            Err(ConfigError::Invalid { key: "LIGHT_GAIN", value: "ultra".into() })
        );
        assert_eq!(
            config(&[("LIGHT_INTEGRATION_MS", "250")]),
            Err(ConfigError::Invalid { key: "LIGHT_INTEGRATION_MS", value: "250".into() })
        );
    }

    #[test]
    fn rejects_oversized_credentials() {
        let ssid = "x".repeat(33);
        assert_eq!(
            config(&[("WIFI_SSID", &ssid)]),
            Err(ConfigError::TooLong { key: "WIFI_SSID", max: 32 })
        );
    }

    #[test]
    fn station_needs_an_ssid() {
        assert_eq!(Config::default().require_wifi(), Err(ConfigError::Missing { key: "WIFI_SSID" }));
        let config = config(&[("WIFI_SSID", "greenhouse")]).unwrap();
        assert!(config.require_wifi().is_ok());
    }
}

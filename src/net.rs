use core::time::Duration;

/// Where the station is in its association lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
}

/// How long to wait between association attempts and when to stop trying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
    max_interval: Duration,
    factor: u32,
    max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retries forever at a constant interval.
    pub const fn fixed(interval: Duration) -> Self {
        Self { interval, max_interval: interval, factor: 1, max_attempts: None }
    }

    /// Doubles the interval after every failure, up to `max_interval`.
    pub const fn with_backoff(self, max_interval: Duration) -> Self {
        Self { max_interval, factor: 2, ..self }
    }

    pub const fn with_max_attempts(self, attempts: u32) -> Self {
        Self { max_attempts: Some(attempts), ..self }
    }

    /// Delay after the `failures`-th consecutive failure, `None` to give up.
    pub fn delay(&self, failures: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| failures >= max) {
            return None;
        }
        let scale = self.factor.saturating_pow(failures.saturating_sub(1));
        Some(self.interval.saturating_mul(scale).min(self.max_interval.max(self.interval)))
    }
}

impl Default for RetryPolicy {
    /// Once per second, no limit.
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

/// Reconnect state machine. The caller performs the actual association and
/// reports the outcome back.
#[derive(Debug)]
pub struct Link {
    state: LinkState,
    policy: RetryPolicy,
}

impl Link {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { state: LinkState::Disconnected, policy }
    }

    #[cfg(test)]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Begins (or continues) connecting and returns the current attempt number.
    pub fn start(&mut self) -> u32 {
        let attempt = match self.state {
            LinkState::Connecting { attempt } => attempt,
            LinkState::Disconnected | LinkState::Connected => 1,
        };
        self.state = LinkState::Connecting { attempt };
        attempt
    }

    /// Returns how long to wait before the next attempt, or `None` once the
    /// policy gives up, in which case the link falls back to disconnected.
    pub fn attempt_failed(&mut self) -> Option<Duration> {
        let LinkState::Connecting { attempt } = self.state else {
            return None;
        };
        match self.policy.delay(attempt) {
            Some(delay) => {
                self.state = LinkState::Connecting { attempt: attempt + 1 };
                Some(delay)
            }
            None => {
                self.state = LinkState::Disconnected;
                None
            }
        }
    }

    pub fn associated(&mut self) {
        self.state = LinkState::Connected;
    }

    pub fn lost(&mut self) {
        if self.state == LinkState::Connected {
            log::warn!("wi-fi link lost");
            self.state = LinkState::Disconnected;
        }
    }
}

#[cfg(target_os = "espidf")]
pub use self::station::{associate, ensure, start};

#[cfg(target_os = "espidf")]
mod station {
    use embedded_svc::{ipv4, wifi};
    use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
    use std::thread;

    use super::Link;
    use crate::{config::Config, error::Error};

    pub type Wifi = BlockingWifi<EspWifi<'static>>;

    pub fn start(wifi: &mut Wifi, config: &Config) -> Result<(), Error> {
        config.require_wifi()?;
        wifi.set_configuration(&wifi::Configuration::Client(wifi::ClientConfiguration {
            ssid: config.wifi_ssid.as_str().into(),
            password: config.wifi_password.as_str().into(),
            auth_method: if config.wifi_password.is_empty() { wifi::AuthMethod::None } else { wifi::AuthMethod::WPA2Personal },
            ..Default::default()
        }))?;
        wifi.start()?;
        log::info!("Wi-Fi started");
        Ok(())
    }

    /// Blocks until associated or until the link's policy gives up.
    pub fn associate(wifi: &mut Wifi, link: &mut Link) -> Result<(), Error> {
        loop {
            let attempt = link.start();
            log::info!("connecting to Wi-Fi (attempt {attempt})");
            match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
                Ok(()) => break,
                Err(err) => {
                    let _ = wifi.disconnect();
                    let Some(delay) = link.attempt_failed() else {
                        return Err(Error::LinkGaveUp { attempts: attempt });
                    };
                    log::warn!("association failed: {err}; retrying in {delay:?}");
                    thread::sleep(delay);
                }
            }
        }
        link.associated();

        let netif = wifi.wifi().sta_netif();
        let ipv4::IpInfo { ip, subnet, dns, secondary_dns } = netif.get_ip_info()?;
        match (dns, secondary_dns) {
            (Some(a), Some(b)) => log::info!("{ip} connected to {subnet} with DNS providers {a} and {b}"),
            (Some(dns), None) | (None, Some(dns)) => log::info!("{ip} connected to {subnet} with DNS provider {dns}"),
            _ => log::info!("{ip} connected to {subnet} without DNS providers"),
        }
        Ok(())
    }

    /// Re-associates if the station dropped off since the last check.
    pub fn ensure(wifi: &mut Wifi, link: &mut Link) -> Result<(), Error> {
        if wifi.is_connected()? {
            return Ok(());
        }
        link.lost();
        associate(wifi, link)
    }
}

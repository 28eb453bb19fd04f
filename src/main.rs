mod config;
mod error;
mod flow;
mod http;
// The reconnect machine only runs against the device's Wi-Fi driver.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
mod net;
mod page;
mod sensor;
mod snapshot;

#[cfg(target_os = "espidf")]
mod hw;
#[cfg(not(target_os = "espidf"))]
mod sim;

use std::{
    net::{Ipv4Addr, TcpListener},
    time::Instant,
};

use config::Config;
use error::Error;
use flow::{RateWindow, PULSES};
use snapshot::Dashboard;

#[cfg(target_os = "espidf")]
fn main() -> Result<(), Error> {
    use esp_idf_hal::{gpio::Pins, peripherals::Peripherals};
    use esp_idf_svc::{
        eventloop::EspSystemEventLoop,
        nvs::EspDefaultNvsPartition,
        wifi::{BlockingWifi, EspWifi},
    };
    use esp_idf_sys::EspError;

    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_sys::link_patches();

    esp_idf_svc::log::EspLogger::initialize_default();

    let config = Config::from_build_env()?;

    let Peripherals {
        modem,
        i2c0,
        i2c1,
        adc1,
        pins: Pins {
            gpio18: scl1,
            gpio19: sda1,
            gpio21: sda0,
            gpio22: scl0,
            gpio36: ph_pin,
            gpio39: flow_pin,
            ..
        },
        ..
    } = Peripherals::take().ok_or_else(EspError::from_infallible::<-1>)?;

    // Start counting before anything slow happens so the first window is full.
    let _flow = hw::attach_flow_sensor(flow_pin)?;
    let window = RateWindow::new(config.flow_window, config.pulses_per_liter, Instant::now());

    let wiring = hw::Wiring { i2c0, sda0, scl0, i2c1, sda1, scl1, adc1, ph: ph_pin };
    let board = hw::Board::new(wiring, config.ph, config.light)?;

    // Set up Wi-Fi driver
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), Some(nvs))?, sysloop)?;
    let mut link = net::Link::new(config.retry);
    net::start(&mut wifi, &config)?;
    net::associate(&mut wifi, &mut link)?;

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.http_port))?;
    let mut dashboard = Dashboard::new(board, &PULSES, window, config.flow_display);
    match http::serve(&listener, &mut dashboard, || net::ensure(&mut wifi, &mut link))? {}
}

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<(), Error> {
    use core::time::Duration;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("no ESP-IDF target, serving simulated sensors");

    let config = Config::from_process_env()?;

    // 125 pulses per 10 s window reads as 1000 L/h.
    let _flow = sim::spawn_flow(&PULSES, Duration::from_millis(80))?;
    let window = RateWindow::new(config.flow_window, config.pulses_per_liter, Instant::now());

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.http_port))?;
    let mut dashboard = Dashboard::new(sim::Simulated::new(config.ph, config.light), &PULSES, window, config.flow_display);
    match http::serve(&listener, &mut dashboard, || Ok(()))? {}
}

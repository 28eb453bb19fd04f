fn main() -> Result<(), Box<dyn std::error::Error>> {
    for key in [
        "WIFI_SSID",
        "WIFI_PASSWORD",
        "HTTP_PORT",
        "FLOW_WINDOW_MS",
        "FLOW_PULSES_PER_LITER",
        "FLOW_DISPLAY",
        "PH_SLOPE",
        "PH_INTERCEPT",
        "LIGHT_GAIN",
        "LIGHT_INTEGRATION_MS",
        "WIFI_RETRY_MS",
        "WIFI_RETRY_MAX_MS",
        "WIFI_MAX_ATTEMPTS",
    ] {
        println!("cargo:rerun-if-env-changed={key}");
    }

    // Host builds run the simulator and have no ESP-IDF to link against.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("espidf") {
        return Ok(());
    }

    embuild::build::CfgArgs::output_propagated("ESP_IDF")?;
    embuild::build::LinkArgs::output_propagated("ESP_IDF")?;
    Ok(())
}

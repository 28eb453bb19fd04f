use core::fmt;

use crate::snapshot::Snapshot;

/// A reading as it appears on the page, `--` when the sensor failed.
/// Without fixed decimals the shortest exact form is used, always with a
/// fractional part, so 25 degrees reads `25.0`.
struct Reading {
    value: Option<f32>,
    decimals: Option<usize>,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.value, self.decimals) {
            (Some(value), Some(decimals)) => write!(f, "{value:.decimals$}"),
            (Some(value), None) => write!(f, "{value:?}"),
            (None, _) => f.write_str("--"),
        }
    }
}

pub fn render(snapshot: &Snapshot) -> String {
    let temp = Reading { value: snapshot.temperature, decimals: None };
    let ph = Reading { value: snapshot.ph, decimals: Some(2) };
    let flow = snapshot.flow;
    let lux = Reading { value: snapshot.luminosity, decimals: Some(2) };
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>ESP32 Sensor Dashboard</title>
    <style>
        body {{ font-family: Arial, sans-serif; text-align: center; }}
        .data-box {{ margin: 20px; padding: 10px; border: 1px solid #ccc; display: inline-block; }}
    </style>
</head>
<body>
    <h1>ESP32 Sensor Dashboard</h1>
    <div class="data-box">
        <h2>Temperature</h2>
        <p>{temp} °C</p>
    </div>
    <div class="data-box">
        <h2>pH</h2>
        <p>{ph}</p>
    </div>
    <div class="data-box">
        <h2>Flow Rate</h2>
        <p>{flow} L/h</p>
    </div>
    <div class="data-box">
        <h2>Luminosity</h2>
        <p>{lux} Lux</p>
    </div>
</body>
</html>
"#
    )
}

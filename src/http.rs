use std::{
    convert::Infallible,
    io::{self, Read, Write},
    net::TcpListener,
    time::Instant,
};

use crate::{error::Error, page, sensor::Sensors, snapshot::Dashboard};

/// Requests are read once into a buffer this size and never parsed.
pub const REQUEST_LIMIT: usize = 1024;

/// Reads (and ignores) the request, then answers with the rendered page.
pub fn respond<S: Read + Write>(stream: &mut S, render: impl FnOnce() -> String) -> io::Result<()> {
    let mut buf = [0; REQUEST_LIMIT];
    let count = stream.read(&mut buf)?;
    let request = String::from_utf8_lossy(&buf[..count]);
    log::debug!("request: {}", request.lines().next().unwrap_or_default());

    let body = render();
    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )?;
    stream.write_all(body.as_bytes())?;
    stream.flush()
}

/// Serves one client at a time, forever. `before_accept` runs ahead of every
/// blocking accept, e.g. to bring a dropped link back up.
pub fn serve<S: Sensors>(
    listener: &TcpListener,
    dashboard: &mut Dashboard<'_, S>,
    mut before_accept: impl FnMut() -> Result<(), Error>,
) -> Result<Infallible, Error> {
    log::info!("dashboard listening on {}", listener.local_addr()?);
    loop {
        before_accept()?;
        let (mut stream, peer) = listener.accept()?;
        log::info!("client connected from {peer}");
        if let Err(err) = respond(&mut stream, || page::render(&dashboard.snapshot(Instant::now()))) {
            log::warn!("dropped response to {peer}: {err}");
        }
    }
}

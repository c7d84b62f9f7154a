//! HTTP readiness probe against the local server port.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::poll::Probe;

/// Per-request timeout. Startup probes should fail fast; the poll loop owns
/// the overall budget.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes a URL with a GET request. Any response counts as ready, whatever
/// the status code; the WebUI answers probes long before it serves real
/// pages without error.
#[derive(Debug)]
pub struct HttpProbe {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build http client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Probe the loopback address on `port`.
    pub fn for_port(port: u16) -> Result<Self> {
        Self::new(format!("http://127.0.0.1:{port}/"))
    }
}

impl Probe for HttpProbe {
    fn check(&self) -> bool {
        match self.client.get(&self.url).send() {
            Ok(response) => {
                debug!(url = %self.url, status = %response.status(), "probe answered");
                true
            }
            Err(err) => {
                debug!(url = %self.url, err = %err, "probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Accept one connection and answer with a minimal HTTP response.
    fn one_shot_server(status_line: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let response = format!("{status_line}\r\nContent-Length: 0\r\n\r\n");
                let _ = stream.write_all(response.as_bytes());
            }
        });
        port
    }

    #[test]
    fn answered_probe_is_ready() {
        let port = one_shot_server("HTTP/1.1 200 OK");
        let probe = HttpProbe::for_port(port).expect("probe");
        assert!(probe.check());
    }

    #[test]
    fn any_status_code_counts_as_ready() {
        let port = one_shot_server("HTTP/1.1 502 Bad Gateway");
        let probe = HttpProbe::for_port(port).expect("probe");
        assert!(probe.check());
    }

    #[test]
    fn refused_connection_is_not_ready() {
        // Bind then drop to get a port nothing is listening on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let probe = HttpProbe::for_port(port).expect("probe");
        assert!(!probe.check());
    }
}

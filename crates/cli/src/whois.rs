//! Port 43 whois client for the opaque-id report.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use sibas_sources::whois::WhoisLookup;

pub const WHOIS_PORT: u16 = 43;

pub struct TcpWhois {
    port: u16,
    timeout: Duration,
}

impl TcpWhois {
    pub fn new(timeout: Duration) -> Self {
        Self {
            port: WHOIS_PORT,
            timeout,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn exchange(&self, host: &str, query: &str) -> std::io::Result<String> {
        let addr = (host, self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address"))?;
        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.write_all(format!("{query}\r\n").as_bytes())?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

impl WhoisLookup for TcpWhois {
    fn query(&self, host: &str, query: &str) -> Option<String> {
        match self.exchange(host, query) {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::debug!("whois {host} {query}: {e}");
                None
            }
        }
    }
}

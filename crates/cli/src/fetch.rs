//! Source downloads for `sibas run`.
//!
//! `FetchClient` wraps a blocking reqwest client with retry, backoff and
//! status classification. `read_location` and `read_location_bytes` decide
//! between HTTP and disk.

use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::exit_codes;
use crate::CliError;

// ── Constants ───────────────────────────────────────────────────────

pub const MAX_RETRIES: u32 = 3;
const USER_AGENT: &str = concat!("sibas/", env!("CARGO_PKG_VERSION"));
// Delegation files and the PeeringDB net table are tens of megabytes.
const TIMEOUT_SECS: u64 = 300;

// ── FetchClient ─────────────────────────────────────────────────────

/// HTTP client shared by every remote source location.
pub struct FetchClient {
    http: reqwest::blocking::Client,
    backoff: Duration,
}

impl FetchClient {
    pub fn new() -> Result<Self, CliError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CliError {
                code: exit_codes::EXIT_ERROR,
                message: format!("cannot build HTTP client: {e}"),
                hint: None,
            })?;
        Ok(Self {
            http,
            backoff: Duration::from_secs(1),
        })
    }

    /// First wait between attempts; doubles after each retry.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// GET `url` and return the body as text.
    pub fn get_text(&self, url: &str) -> Result<String, CliError> {
        let text = self
            .send(url)?
            .text()
            .map_err(|e| fetch_err(format!("{url}: cannot read body: {e}")))?;
        tracing::debug!("fetched {url} ({} bytes)", text.len());
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }

    /// GET `url` and return the raw body, e.g. a gzipped dump.
    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>, CliError> {
        let bytes = self
            .send(url)?
            .bytes()
            .map_err(|e| fetch_err(format!("{url}: cannot read body: {e}")))?;
        tracing::debug!("fetched {url} ({} bytes)", bytes.len());
        Ok(bytes.to_vec())
    }

    /// Send a GET until it succeeds.
    ///
    /// 429, 5xx and network errors are retried up to [`MAX_RETRIES`]
    /// times. Any other 4xx fails at once.
    fn send(&self, url: &str) -> Result<reqwest::blocking::Response, CliError> {
        let mut backoff = self.backoff;

        for attempt in 0..=MAX_RETRIES {
            match self.http.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if (400..500).contains(&status) && status != 429 {
                        return Err(fetch_err(format!("{url}: HTTP {status}")));
                    }

                    if status == 429 || status >= 500 {
                        if attempt == MAX_RETRIES {
                            return Err(fetch_err(format!(
                                "{url}: HTTP {status} after {} attempts",
                                MAX_RETRIES + 1,
                            )));
                        }

                        // Respect Retry-After for 429
                        let wait = if status == 429 {
                            resp.headers()
                                .get("retry-after")
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.parse::<u64>().ok())
                                .map(Duration::from_secs)
                                .unwrap_or(backoff)
                        } else {
                            backoff
                        };

                        tracing::warn!(
                            "retry {}/{} for {url} in {:?} (HTTP {status})",
                            attempt + 1,
                            MAX_RETRIES,
                            wait,
                        );
                        thread::sleep(wait);
                        backoff *= 2;
                        continue;
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    if attempt == MAX_RETRIES {
                        return Err(fetch_err(format!(
                            "{url}: failed after {} attempts: {e}",
                            MAX_RETRIES + 1,
                        )));
                    }
                    tracing::warn!(
                        "retry {}/{} for {url} in {:?} ({e})",
                        attempt + 1,
                        MAX_RETRIES,
                        backoff,
                    );
                    thread::sleep(backoff);
                    backoff *= 2;
                }
            }
        }

        Err(fetch_err(format!("{url}: no attempts made")))
    }
}

fn fetch_err(message: String) -> CliError {
    CliError {
        code: exit_codes::EXIT_FETCH,
        message,
        hint: None,
    }
}

// ── Locations ───────────────────────────────────────────────────────

/// Fetch a remote location, or read a local one relative to `base_dir`.
pub fn read_location(
    client: &FetchClient,
    base_dir: &Path,
    location: &str,
) -> Result<String, CliError> {
    if sibas_recon::config::is_remote(location) {
        return client.get_text(location);
    }
    let path = base_dir.join(location);
    std::fs::read_to_string(&path).map_err(|e| local_err(&path, e))
}

/// Like [`read_location`], without decoding the body.
pub fn read_location_bytes(
    client: &FetchClient,
    base_dir: &Path,
    location: &str,
) -> Result<Vec<u8>, CliError> {
    if sibas_recon::config::is_remote(location) {
        return client.get_bytes(location);
    }
    let path = base_dir.join(location);
    std::fs::read(&path).map_err(|e| local_err(&path, e))
}

fn local_err(path: &Path, e: std::io::Error) -> CliError {
    fetch_err(format!("cannot read {}: {e}", path.display()))
        .with_hint("relative locations resolve against the config file's directory")
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client() -> FetchClient {
        FetchClient::new().unwrap().with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_get_text_ok() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/asns.txt");
            then.status(200).body("\u{feff}3356,3549|Level3\n");
        });

        let body = client().get_text(&server.url("/asns.txt")).unwrap();
        assert_eq!(body, "3356,3549|Level3\n");
        mock.assert();
    }

    #[test]
    fn test_not_found_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let err = client().get_text(&server.url("/missing")).unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_FETCH);
        assert!(err.message.contains("HTTP 404"), "message: {}", err.message);
        mock.assert_hits(1);
    }

    #[test]
    fn test_server_error_retried_then_fails() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/flaky");
            then.status(503);
        });

        let err = client().get_text(&server.url("/flaky")).unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_FETCH);
        assert!(err.message.contains("after 4 attempts"), "message: {}", err.message);
        mock.assert_hits(4);
    }

    #[test]
    fn test_rate_limit_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/limited");
            then.status(429).header("retry-after", "0");
        });

        let err = client().get_text(&server.url("/limited")).unwrap_err();
        assert!(err.message.contains("HTTP 429"));
        mock.assert_hits(4);
    }

    #[test]
    fn test_get_bytes_keeps_body_verbatim() {
        let server = MockServer::start();
        let body: &[u8] = &[0x1f, 0x8b, 0x08, 0x00, 0xe9];
        let mock = server.mock(|when, then| {
            when.method(GET).path("/ripe.db.aut-num.gz");
            then.status(200).body(body);
        });

        let bytes = client().get_bytes(&server.url("/ripe.db.aut-num.gz")).unwrap();
        assert_eq!(bytes, body);
        mock.assert();
    }

    #[test]
    fn test_local_bytes_location() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dump"), [b'a', 0xe9, b'\n']).unwrap();

        let bytes = read_location_bytes(&client(), dir.path(), "dump").unwrap();
        assert_eq!(bytes, vec![b'a', 0xe9, b'\n']);
        let err = read_location_bytes(&client(), dir.path(), "missing").unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_FETCH);
    }

    #[test]
    fn test_local_location_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("asns.txt"), "1,2|X\n").unwrap();

        let text = read_location(&client(), dir.path(), "asns.txt").unwrap();
        assert_eq!(text, "1,2|X\n");

        let err = read_location(&client(), dir.path(), "nope.txt").unwrap_err();
        assert_eq!(err.code, exit_codes::EXIT_FETCH);
        assert!(err.hint.is_some());
    }
}

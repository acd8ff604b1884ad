use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

const APP_USER_AGENT: &str = concat!("ModInstaller/", env!("CARGO_PKG_VERSION"));

/// Build the single HTTP client used for a run.
///
/// Connect and read timeouts bound every network suspension point; there is
/// no overall request timeout so large artifacts can still stream in.
pub fn build_http_client(
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    // ETag verification hashes the raw body, so the server must not re-encode it.
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .build()
}

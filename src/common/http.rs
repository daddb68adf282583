use std::time::Duration;

use reqwest::{Client, Error};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";

/// A current desktop browser user agent, for upstreams that reject anything
/// without a plausible browser fingerprint.
pub fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Client for manifest/API requests: small JSON bodies, bounded overall
/// timeout.
pub fn manifest_client(user_agent: &str, timeout: Duration) -> Result<Client, Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
}

/// Client for byte-stream transfers: only the connect phase is bounded, the
/// body transfer runs as long as the relay session does.
pub fn stream_client(user_agent: &str) -> Result<Client, Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .build()
}

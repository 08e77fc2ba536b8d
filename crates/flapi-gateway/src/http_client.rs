//! The gateway's default outbound HTTP client: every collaborator that
//! talks to an external service (OIDC discovery/JWKS, remote file
//! backends) builds its `reqwest::Client` through here so they share one
//! timeout policy (spec §5: 10s connect, 30s total).

use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a `reqwest::Client` with the gateway's default connect/request
/// timeouts applied.
#[must_use]
pub fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .expect("default http client configuration is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_builds_successfully() {
        let _client = default_http_client();
    }
}

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_PER_HOST: usize = 5;
const TRANSIENT_RETRIES: u32 = 2;

/// Builds the HTTP client every upstream adapter shares.
///
/// The middleware only re-sends requests that failed at the transport
/// level (connect errors, 5xx); deciding that a provider is unhealthy and
/// moving to the next one is the source chain's job, not this layer's.
pub struct HttpClientFactory;

impl HttpClientFactory {
    pub fn create_client() -> ClientWithMiddleware {
        let backoff = ExponentialBackoff::builder().build_with_max_retries(TRANSIENT_RETRIES);

        let inner = Client::builder()
            .pool_max_idle_per_host(POOL_IDLE_PER_HOST)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(backoff))
            .build()
    }
}

use reqwest::ClientBuilder;
use std::time::Duration;

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Default request timeout applied by provider HTTP clients.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// Client builder shared by the HTTP based providers.
///
/// The timeout is the only deadline a provider call gets; the aggregation
/// layer does not impose one of its own. `None` leaves the overall request
/// unbounded, for long-lived media responses.
pub fn create_client_builder(timeout: Option<Duration>) -> ClientBuilder {
    let builder = reqwest::Client::builder()
        .user_agent(DEFAULT_UA)
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(8);
    match timeout {
        Some(timeout) => builder.timeout(timeout),
        None => builder,
    }
}

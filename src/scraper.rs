use crate::errors::DealError;
use crate::parser;
use reqwest::blocking::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const LAZY_LOAD_ACTION: &str = "photonic_lazy_load";

/// Builds the HTTP client shared by every collaborator of a run.
///
/// Requests must time out so a hung server cannot block the next scheduled run.
pub fn build_client(timeout: Duration) -> Result<Client, DealError> {
    client_builder(timeout)
        .build()
        .map_err(|e| DealError::Config(format!("failed to build http client: {}", e)))
}

fn client_builder(timeout: Duration) -> ClientBuilder {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout)
}

/// Same settings as [`build_client`], but never routed through a proxy so
/// tests can talk to a local server.
#[cfg(test)]
pub(crate) fn local_client() -> Client {
    client_builder(Duration::from_secs(5))
        .no_proxy()
        .build()
        .unwrap()
}

/// Where the current deal image urls come from.
#[cfg_attr(test, mockall::automock)]
pub trait DealSource {
    fn name(&self) -> &'static str;
    fn fetch_deal_urls(&self) -> Result<Vec<String>, DealError>;
}

/// Downloads a deal image.
#[cfg_attr(test, mockall::automock)]
pub trait ImageFetcher {
    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, DealError>;
}

/// A WordPress Photonic gallery: the landing page embeds a shortcode that has
/// to be posted back to `admin-ajax.php` to get the actual images.
pub struct PhotonicSource {
    client: Client,
    landing_url: String,
    ajax_url: String,
}

impl PhotonicSource {
    pub fn new(client: Client, landing_url: impl Into<String>, ajax_url: impl Into<String>) -> Self {
        Self {
            client,
            landing_url: landing_url.into(),
            ajax_url: ajax_url.into(),
        }
    }

    fn fetch_shortcode(&self) -> Result<String, DealError> {
        info!("Getting short code from {}", self.landing_url);
        let response = self
            .client
            .get(&self.landing_url)
            .send()
            .map_err(|e| DealError::network(&self.landing_url, e))?;

        if !response.status().is_success() {
            return Err(DealError::network(
                &self.landing_url,
                format!("HTTP {}", response.status()),
            ));
        }

        let html = response
            .text()
            .map_err(|e| DealError::network(&self.landing_url, e))?;
        parser::extract_shortcode(&html)
    }
}

impl DealSource for PhotonicSource {
    fn name(&self) -> &'static str {
        "photonic"
    }

    fn fetch_deal_urls(&self) -> Result<Vec<String>, DealError> {
        let shortcode = self.fetch_shortcode()?;
        debug!("Short code: {}", shortcode);

        info!("Getting deals from {}", self.ajax_url);
        let form = [("action", LAZY_LOAD_ACTION), ("shortcode", shortcode.as_str())];
        let response = self
            .client
            .post(&self.ajax_url)
            .form(&form)
            .send()
            .map_err(|e| DealError::network(&self.ajax_url, e))?;

        if !response.status().is_success() {
            return Err(DealError::network(
                &self.ajax_url,
                format!("HTTP {}", response.status()),
            ));
        }

        let html = response
            .text()
            .map_err(|e| DealError::network(&self.ajax_url, e))?;
        let urls = parser::extract_deal_urls(&html, &self.landing_url)?;
        info!("Found {} deal images", urls.len());
        Ok(urls)
    }
}

pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, DealError> {
        info!("Downloading image from: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| DealError::network(url, e))?;

        if !response.status().is_success() {
            return Err(DealError::network(url, format!("HTTP {}", response.status())));
        }

        let bytes = response.bytes().map_err(|e| DealError::network(url, e))?;
        Ok(bytes.to_vec())
    }
}

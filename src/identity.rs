use crate::errors::DealError;
use crate::models::{Deal, IdentityPolicy};
use crate::scraper::ImageFetcher;
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Final non-empty path segment of `url`, ignoring query and fragment.
///
/// Relative urls are accepted as well since the page sometimes serves them.
pub fn filename_identity(url: &str) -> Result<String, DealError> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DealError::MalformedUrl(url.to_string()))
}

pub fn content_identity(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Deals identified on the page, plus how many could not be identified.
#[derive(Debug, Default)]
pub struct ExtractedDeals {
    pub deals: Vec<Deal>,
    pub skipped: usize,
}

impl ExtractedDeals {
    /// True when some live deals are missing from `deals`.
    pub fn is_incomplete(&self) -> bool {
        self.skipped > 0
    }
}

/// Turns scraped urls into deals, keeping page order.
///
/// A url whose identity cannot be derived is logged, counted in `skipped`
/// and left out. Repeats of an identity already seen on the page are dropped.
pub fn build_deals<F: ImageFetcher + ?Sized>(
    urls: &[String],
    policy: IdentityPolicy,
    fetcher: &F,
) -> ExtractedDeals {
    let mut seen = HashSet::new();
    let mut deals = Vec::with_capacity(urls.len());
    let mut skipped = 0;

    for url in urls {
        let deal = match policy {
            IdentityPolicy::Filename => filename_identity(url).map(|id| Deal::new(url.as_str(), id)),
            IdentityPolicy::ContentHash => fetcher
                .fetch_image(url)
                .map(|bytes| Deal::new(url.as_str(), content_identity(&bytes)).with_image(bytes)),
        };

        match deal {
            Ok(deal) => {
                if seen.insert(deal.identity.clone()) {
                    deals.push(deal);
                } else {
                    debug!("Skipping duplicate deal {} ({})", deal.identity, url);
                }
            }
            Err(e) => {
                warn!("Skipping deal {}: {}", url, e);
                skipped += 1;
            }
        }
    }

    ExtractedDeals { deals, skipped }
}

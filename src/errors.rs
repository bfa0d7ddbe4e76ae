use thiserror::Error;

/// Failure taxonomy for a single run.
///
/// `SourceFormat`, `Network` on the landing/AJAX fetch, `Persistence` on save
/// and `Config` are fatal. Per-deal `Network` and every `Sink` error are
/// isolated to the deal they happened on.
#[derive(Debug, Error)]
pub enum DealError {
    #[error("unexpected source format: {0}")]
    SourceFormat(String),

    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("no path segment in url: {0}")]
    MalformedUrl(String),

    #[error("deal store error: {0}")]
    Persistence(String),

    #[error("{sink} rejected announcement: {reason}")]
    Sink { sink: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DealError {
    pub fn network(url: &str, reason: impl ToString) -> Self {
        DealError::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn sink(sink: &'static str, reason: impl ToString) -> Self {
        DealError::Sink {
            sink,
            reason: reason.to_string(),
        }
    }
}

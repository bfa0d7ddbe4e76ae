use crate::errors::DealError;
use std::collections::HashSet;
use std::fmt;

/// A promotional listing scraped from the deals page.
///
/// Rebuilt on every run; only `identity` outlives the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deal {
    pub url: String,
    pub identity: String,
    /// Image bytes, when they were already downloaded to derive the identity.
    pub image: Option<Vec<u8>>,
}

impl Deal {
    pub fn new(url: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            identity: identity.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    /// File name used for attachments, taken from the last url segment.
    pub fn file_name(&self) -> String {
        self.url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').find(|segment| !segment.is_empty()))
            .unwrap_or("image.png")
            .to_string()
    }
}

/// How a deal's identity is derived from its scraped url.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityPolicy {
    /// Final path segment of the image url.
    #[default]
    Filename,
    /// Hex SHA-256 of the downloaded image bytes.
    ContentHash,
}

/// What counts as a change between two runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeSemantics {
    /// Changed iff at least one identity is new.
    #[default]
    Asymmetric,
    /// Changed iff the identity sets differ in any way.
    Symmetric,
}

impl std::str::FromStr for IdentityPolicy {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "filename" => Ok(IdentityPolicy::Filename),
            "content-hash" | "content_hash" | "hash" => Ok(IdentityPolicy::ContentHash),
            other => Err(DealError::Config(format!("unknown identity policy '{}'", other))),
        }
    }
}

impl std::str::FromStr for ChangeSemantics {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asymmetric" | "additions" => Ok(ChangeSemantics::Asymmetric),
            "symmetric" | "any" => Ok(ChangeSemantics::Symmetric),
            other => Err(DealError::Config(format!("unknown change semantics '{}'", other))),
        }
    }
}

impl fmt::Display for IdentityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityPolicy::Filename => write!(f, "filename"),
            IdentityPolicy::ContentHash => write!(f, "content-hash"),
        }
    }
}

/// Comparison of the current scrape against the stored history.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub current: HashSet<String>,
    pub previous: HashSet<String>,
    /// New deals, oldest first.
    pub new_deals: Vec<Deal>,
    pub changed: bool,
}

/// Pipeline stage at which a single deal's announcement failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Summary,
    Download,
    Announce,
    SocialPost,
}

#[derive(Debug)]
pub struct ItemFailure {
    /// `None` for the summary message.
    pub identity: Option<String>,
    pub stage: FailureStage,
    pub error: DealError,
}

#[derive(Debug)]
pub enum RunOutcome {
    NoChanges,
    /// History was updated but nothing new needed announcing.
    Persisted,
    Announced {
        new_deals: usize,
        failures: Vec<ItemFailure>,
    },
}

//! Runtime configuration, read once at startup from the environment.
//!
//! A `.env` file in the working directory is honoured; real environment
//! variables win over it.

use crate::errors::DealError;
use crate::models::{ChangeSemantics, IdentityPolicy};
use crate::notifier::Messages;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LANDING_URL: &str = "https://flcannabisdeals.org/todays-florida-dispensary-deals/";
pub const DEFAULT_AJAX_URL: &str = "https://flcannabisdeals.org/wp-admin/admin-ajax.php";

#[derive(Clone, PartialEq, Eq)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub webhook_url: String,
    pub bot_name: String,
    pub avatar_url: String,
    pub messages: Messages,
    /// JSON file with the identities of already announced deals
    pub state_file: PathBuf,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub request_timeout: Duration,
    pub landing_url: String,
    pub ajax_url: String,
    pub identity_policy: IdentityPolicy,
    pub change_semantics: ChangeSemantics,
    /// Social posting is enabled only when all four credentials are set
    pub twitter: Option<TwitterCredentials>,
}

impl Config {
    pub fn from_env() -> Result<Self, DealError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DealError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let webhook_url = get("DEALS_WEBHOOK_URL")
            .ok_or_else(|| DealError::Config("DEALS_WEBHOOK_URL is required".to_string()))?;

        let request_timeout = match get("DEALS_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    DealError::Config(format!("DEALS_REQUEST_TIMEOUT_SECS must be a number, got '{}'", raw))
                })?;
                if secs == 0 {
                    return Err(DealError::Config(
                        "DEALS_REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(30),
        };

        let identity_policy = match get("DEALS_IDENTITY_POLICY") {
            Some(raw) => raw.parse()?,
            None => IdentityPolicy::default(),
        };
        let change_semantics = match get("DEALS_CHANGE_SEMANTICS") {
            Some(raw) => raw.parse()?,
            None => ChangeSemantics::default(),
        };

        let twitter_keys = [
            get("DEALS_TWITTER_CONSUMER_KEY"),
            get("DEALS_TWITTER_CONSUMER_SECRET"),
            get("DEALS_TWITTER_ACCESS_TOKEN"),
            get("DEALS_TWITTER_ACCESS_TOKEN_SECRET"),
        ];
        let twitter = match twitter_keys {
            [Some(consumer_key), Some(consumer_secret), Some(access_token), Some(access_token_secret)] => {
                Some(TwitterCredentials {
                    consumer_key,
                    consumer_secret,
                    access_token,
                    access_token_secret,
                })
            }
            [None, None, None, None] => None,
            _ => {
                return Err(DealError::Config(
                    "either all four DEALS_TWITTER_* credentials must be set or none".to_string(),
                ))
            }
        };

        let log_file = match get("DEALS_LOG_FILE") {
            Some(path) if path.eq_ignore_ascii_case("none") => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from("bot.log")),
        };

        Ok(Self {
            webhook_url,
            bot_name: or("DEALS_BOT_NAME", "Deals Bot"),
            avatar_url: or("DEALS_AVATAR_URL", ""),
            messages: Messages {
                summary: or("DEALS_UPDATED_MESSAGE", "Today's deals have been updated!"),
                image_title: or("DEALS_IMAGE_TITLE", "New Deal"),
                social_caption: or("DEALS_SOCIAL_CAPTION", "New deal just posted"),
            },
            state_file: PathBuf::from(or("DEALS_STATE_FILE", "deals.json")),
            log_file,
            log_level: or("DEALS_LOG_LEVEL", "info"),
            request_timeout,
            landing_url: or("DEALS_LANDING_URL", DEFAULT_LANDING_URL),
            ajax_url: or("DEALS_AJAX_URL", DEFAULT_AJAX_URL),
            identity_policy,
            change_semantics,
            twitter,
        })
    }
}

use crate::errors::DealError;
use crate::models::{Deal, FailureStage, ItemFailure};
use crate::scraper::ImageFetcher;
use reqwest::blocking::{multipart, Client};
use serde_json::json;
use tracing::{error, info, warn};

/// Discord rejects messages above 2000 characters.
pub const MESSAGE_LIMIT: usize = 1999;

const SINK: &str = "discord";

/// Chat sink that receives the summary text and one embed per deal.
#[cfg_attr(test, mockall::automock)]
pub trait Announcer {
    fn send_text(&self, message: &str) -> Result<(), DealError>;
    fn send_image(&self, image: &[u8], file_name: &str, title: &str) -> Result<(), DealError>;
}

/// Optional second sink that posts each deal image with a caption.
#[cfg_attr(test, mockall::automock)]
pub trait SocialPoster {
    fn post(&self, image: &[u8], file_name: &str, caption: &str) -> Result<(), DealError>;
}

/// Cuts `message` to at most `limit` characters without splitting a char.
pub fn truncate_message(message: &str, limit: usize) -> &str {
    match message.char_indices().nth(limit) {
        Some((idx, _)) => &message[..idx],
        None => message,
    }
}

/// Attachment names end up in `attachment://` urls, so keep them plain.
fn attachment_name(deal: &Deal) -> String {
    let name = deal.file_name();
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        name
    } else {
        "image.png".to_string()
    }
}

pub struct DiscordWebhook {
    client: Client,
    url: String,
    username: String,
    avatar_url: String,
}

impl DiscordWebhook {
    pub fn new(
        client: Client,
        url: impl Into<String>,
        username: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            username: username.into(),
            avatar_url: avatar_url.into(),
        }
    }

    fn check(response: reqwest::blocking::Response) -> Result<(), DealError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().unwrap_or_default();
            Err(DealError::sink(SINK, format!("HTTP {}: {}", status, body)))
        }
    }
}

impl Announcer for DiscordWebhook {
    fn send_text(&self, message: &str) -> Result<(), DealError> {
        let payload = json!({
            "content": truncate_message(message, MESSAGE_LIMIT),
            "username": self.username,
            "avatar_url": self.avatar_url,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .map_err(|e| DealError::sink(SINK, e))?;
        Self::check(response)
    }

    fn send_image(&self, image: &[u8], file_name: &str, title: &str) -> Result<(), DealError> {
        let payload = json!({
            "username": self.username,
            "avatar_url": self.avatar_url,
            "embeds": [{
                "title": title,
                "image": { "url": format!("attachment://{}", file_name) },
            }],
        });
        let file = multipart::Part::bytes(image.to_vec()).file_name(file_name.to_string());
        let form = multipart::Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", file);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(|e| DealError::sink(SINK, e))?;
        Self::check(response)
    }
}

/// Texts used when announcing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
    pub summary: String,
    pub image_title: String,
    pub social_caption: String,
}

/// Sends the announcements for one run's new deals.
pub struct Notifier<'a> {
    announcer: &'a dyn Announcer,
    fetcher: &'a dyn ImageFetcher,
    social: Option<&'a dyn SocialPoster>,
    messages: &'a Messages,
}

impl<'a> Notifier<'a> {
    pub fn new(
        announcer: &'a dyn Announcer,
        fetcher: &'a dyn ImageFetcher,
        social: Option<&'a dyn SocialPoster>,
        messages: &'a Messages,
    ) -> Self {
        Self {
            announcer,
            fetcher,
            social,
            messages,
        }
    }

    /// Announces `deals` in the given order and returns whatever failed.
    ///
    /// A failure only affects the deal it happened on; the remaining deals are
    /// still announced. Nothing is sent for an empty list.
    pub fn announce(&self, deals: &[Deal]) -> Vec<ItemFailure> {
        let mut failures = Vec::new();
        if deals.is_empty() {
            return failures;
        }

        let summary = truncate_message(&self.messages.summary, MESSAGE_LIMIT);
        if let Err(e) = self.announcer.send_text(summary) {
            error!("Failed to send deals summary: {}", e);
            failures.push(ItemFailure {
                identity: None,
                stage: FailureStage::Summary,
                error: e,
            });
        }

        for deal in deals {
            if let Err(failure) = self.announce_deal(deal, &mut failures) {
                error!("Failed to announce deal {}: {}", deal.identity, failure.error);
                failures.push(failure);
            }
        }

        info!(
            "Announced {} deals with {} failures",
            deals.len(),
            failures.len()
        );
        failures
    }

    fn announce_deal(&self, deal: &Deal, failures: &mut Vec<ItemFailure>) -> Result<(), ItemFailure> {
        let fail = |stage, error| ItemFailure {
            identity: Some(deal.identity.clone()),
            stage,
            error,
        };

        let downloaded;
        let image: &[u8] = match &deal.image {
            Some(bytes) => bytes,
            None => {
                downloaded = self
                    .fetcher
                    .fetch_image(&deal.url)
                    .map_err(|e| fail(FailureStage::Download, e))?;
                &downloaded
            }
        };
        let file_name = attachment_name(deal);

        let announced = self
            .announcer
            .send_image(image, &file_name, &self.messages.image_title);

        if let Some(social) = self.social {
            if let Err(e) = social.post(image, &file_name, &self.messages.social_caption) {
                warn!("Error when posting deal {}: {}", deal.identity, e);
                failures.push(fail(FailureStage::SocialPost, e));
            }
        }

        announced.map_err(|e| fail(FailureStage::Announce, e))
    }
}

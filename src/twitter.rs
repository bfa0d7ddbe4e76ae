//! Posting deal images to Twitter with OAuth 1.0a user credentials.

use crate::config::TwitterCredentials;
use crate::errors::DealError;
use crate::notifier::SocialPoster;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::blocking::{multipart, Client};
use serde::Deserialize;
use serde_json::json;
use sha1::Sha1;
use tracing::info;

type HmacSha1 = Hmac<Sha1>;

const MEDIA_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";
const CREATE_TWEET_URL: &str = "https://api.twitter.com/2/tweets";
const SINK: &str = "twitter";

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

pub struct TwitterPoster {
    client: Client,
    credentials: TwitterCredentials,
}

impl TwitterPoster {
    pub fn new(client: Client, credentials: TwitterCredentials) -> Self {
        Self { client, credentials }
    }

    fn authorization(&self, method: &str, url: &str) -> Result<String, DealError> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        // Multipart and JSON bodies are not part of the signature base.
        authorization_header(method, url, &[], &self.credentials, &nonce, &timestamp)
    }

    fn upload_media(&self, image: &[u8], file_name: &str) -> Result<String, DealError> {
        let part = multipart::Part::bytes(image.to_vec()).file_name(file_name.to_string());
        let form = multipart::Form::new().part("media", part);

        let response = self
            .client
            .post(MEDIA_UPLOAD_URL)
            .header("Authorization", self.authorization("POST", MEDIA_UPLOAD_URL)?)
            .multipart(form)
            .send()
            .map_err(|e| DealError::sink(SINK, e))?;

        if !response.status().is_success() {
            return Err(DealError::sink(SINK, format!("media upload HTTP {}", response.status())));
        }

        let uploaded: MediaUploadResponse = response.json().map_err(|e| DealError::sink(SINK, e))?;
        Ok(uploaded.media_id_string)
    }
}

impl SocialPoster for TwitterPoster {
    fn post(&self, image: &[u8], file_name: &str, caption: &str) -> Result<(), DealError> {
        let media_id = self.upload_media(image, file_name)?;

        let body = json!({
            "text": caption,
            "media": { "media_ids": [media_id] },
        });
        let response = self
            .client
            .post(CREATE_TWEET_URL)
            .header("Authorization", self.authorization("POST", CREATE_TWEET_URL)?)
            .json(&body)
            .send()
            .map_err(|e| DealError::sink(SINK, e))?;

        if !response.status().is_success() {
            return Err(DealError::sink(SINK, format!("create tweet HTTP {}", response.status())));
        }

        let created: CreateTweetResponse = response.json().map_err(|e| DealError::sink(SINK, e))?;
        info!("Posted tweet {} for {}", created.data.id, file_name);
        Ok(())
    }
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// HMAC-SHA1 signature over the OAuth signature base string.
///
/// `params` are the request's query and form parameters; the oauth_* ones
/// are added here.
pub fn signature(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    credentials: &TwitterCredentials,
    nonce: &str,
    timestamp: &str,
) -> Result<String, DealError> {
    let mut all: Vec<(String, String)> = oauth_params(credentials, nonce, timestamp)
        .into_iter()
        .chain(params.iter().map(|(k, v)| (k.to_string(), v.to_string())))
        .map(|(k, v)| (encode(&k), encode(&v)))
        .collect();
    all.sort();

    let parameter_string = all
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    let base = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(url),
        encode(&parameter_string)
    );
    let key = format!(
        "{}&{}",
        encode(&credentials.consumer_secret),
        encode(&credentials.access_token_secret)
    );

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| DealError::sink(SINK, format!("invalid signing key: {}", e)))?;
    mac.update(base.as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn authorization_header(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    credentials: &TwitterCredentials,
    nonce: &str,
    timestamp: &str,
) -> Result<String, DealError> {
    let signature = signature(method, url, params, credentials, nonce, timestamp)?;
    let mut fields = oauth_params(credentials, nonce, timestamp);
    fields.push(("oauth_signature".to_string(), signature));
    fields.sort();

    let header = fields
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {}", header))
}

fn oauth_params(credentials: &TwitterCredentials, nonce: &str, timestamp: &str) -> Vec<(String, String)> {
    vec![
        ("oauth_consumer_key".to_string(), credentials.consumer_key.clone()),
        ("oauth_nonce".to_string(), nonce.to_string()),
        ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
        ("oauth_timestamp".to_string(), timestamp.to_string()),
        ("oauth_token".to_string(), credentials.access_token.clone()),
        ("oauth_version".to_string(), "1.0".to_string()),
    ]
}

// # HTTP Notification Targets
//
// This crate provides notification targets that deliver over HTTP.
//
// ## Targets
//
// - `webhook`: POST `{"subject": ..., "message": ...}` as JSON to `url`
// - `ifttt`: POST `{"value1": subject, "value2": message}` to an IFTTT
//   Maker webhook, given either a full `url` or `event_name` plus `key`
//
// ## Behaviour
//
// - One request per notification, no retries
// - Requests time out after `timeout_secs` (default 30 seconds)
// - Non-2xx responses are errors carrying the status and response body
//
// ## Security
//
// The IFTTT key is part of the request URL. It never appears in logs or
// error messages.

use async_trait::async_trait;
use frame_core::{Error, Notification, NotificationTarget, Plugins, Result, Settings};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Default HTTP timeout for notification requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// IFTTT Maker webhook endpoint
const IFTTT_BASE: &str = "https://maker.ifttt.com/trigger";

fn client_for(settings: &Settings) -> Result<reqwest::Client> {
    let timeout = settings
        .get_f64("timeout_secs")
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(DEFAULT_HTTP_TIMEOUT);

    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// POST `body` as JSON and fail on a non-success status
///
/// `label` names the target in errors instead of the URL.
async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    label: &str,
    body: &B,
) -> Result<()> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| Error::http(format!("{}: request failed: {}", label, e.without_url())))?;

    let status = response.status();
    if status.is_success() {
        debug!("{}: delivered ({})", label, status);
        return Ok(());
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    match status.as_u16() {
        429 => Err(Error::http(format!("{}: rate limited: {}", label, error_text))),
        _ => Err(Error::http(format!("{}: HTTP {}: {}", label, status, error_text))),
    }
}

/// Generic JSON webhook
pub struct WebhookTarget {
    url: String,
    client: reqwest::Client,
}

impl WebhookTarget {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = settings.require_str("url")?;
        reqwest::Url::parse(url)
            .map_err(|e| Error::invalid_settings(format!("webhook 'url' is invalid: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            client: client_for(settings)?,
        })
    }
}

#[async_trait]
impl NotificationTarget for WebhookTarget {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        post_json(&self.client, &self.url, "webhook", notification).await
    }
}

#[derive(Serialize)]
struct IftttPayload<'a> {
    value1: &'a str,
    value2: &'a str,
}

/// IFTTT Maker webhook
pub struct IftttTarget {
    /// ⚠️ Contains the account key; NEVER log this value
    url: String,
    client: reqwest::Client,
}

impl IftttTarget {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = match settings.get_str("url") {
            Some(url) => url.to_string(),
            None => {
                let event = settings.require_str("event_name")?;
                let key = settings.require_str("key")?;
                if key.is_empty() {
                    return Err(Error::invalid_settings("IFTTT 'key' cannot be empty"));
                }
                format!("{}/{}/json/with/key/{}", IFTTT_BASE, event, key)
            }
        };

        Ok(Self {
            url,
            client: client_for(settings)?,
        })
    }
}

#[async_trait]
impl NotificationTarget for IftttTarget {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let payload = IftttPayload {
            value1: &notification.subject,
            value2: &notification.message,
        };
        post_json(&self.client, &self.url, "ifttt", &payload).await
    }
}

/// Register the HTTP targets
pub fn register(plugins: &Plugins) {
    plugins.targets.register("webhook", |settings| {
        Ok(Box::new(WebhookTarget::from_settings(settings)?) as Box<dyn NotificationTarget>)
    });
    plugins.targets.register("ifttt", |settings| {
        Ok(Box::new(IftttTarget::from_settings(settings)?) as Box<dyn NotificationTarget>)
    });
}

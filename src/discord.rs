use crate::commit::CommitInfo;
use crate::config::{AppSettings, AuthorMapping};
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Attempts made before a rate-limited post is given up.
pub const MAX_WEBHOOK_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Webhook error: {status} - {body}")]
    Api { status: StatusCode, body: String },
    #[error("Webhook still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

/// Email between the first `<` and the following `>` of a git author string.
pub fn author_email(author: &str) -> Option<&str> {
    let (_, rest) = author.split_once('<')?;
    Some(rest.split_once('>').map_or(rest, |(email, _)| email))
}

/// Look up the Discord user id for a `Name <email>` author string.
pub fn find_discord_id<'a>(author: &str, mapping: &'a AuthorMapping) -> Option<&'a str> {
    author_email(author).and_then(|email| mapping.get(email))
}

pub fn format_review_message(commit: &CommitInfo, review: &str, mapping: &AuthorMapping) -> String {
    let author_line = match find_discord_id(&commit.author, mapping) {
        Some(discord_id) => format!("<@{}>", discord_id),
        None => commit.author.clone(),
    };

    format!(
        "**Code Review for commit {}**\nAuthor: {}\n```\n{}\n```",
        commit.short_hash(),
        author_line,
        review
    )
}

#[derive(Debug)]
pub struct DiscordWebhookClient {
    client: Client,
    webhook_url: Url,
}

impl DiscordWebhookClient {
    pub fn new(webhook_url: &str) -> Result<Self, WebhookError> {
        Ok(Self {
            client: Client::new(),
            webhook_url: Url::parse(webhook_url)?,
        })
    }

    /// Post `content`, waiting out HTTP 429 responses for up to [`MAX_WEBHOOK_ATTEMPTS`] attempts.
    #[instrument(skip(self, content), fields(content_len = content.len()))]
    pub async fn execute(&self, content: &str) -> Result<(), WebhookError> {
        // Delays come from the server's retry_after, the policy only supplies the sleeper
        let policy = ExponentialBackoff {
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        let mut attempt = 0;
        retry_notify(
            policy,
            || {
                attempt += 1;
                let current = attempt;
                async move { self.post_once(content, current).await }
            },
            |err: WebhookError, wait: Duration| {
                warn!("Discord webhook rate limited ({}), retrying in {:?}", err, wait);
            },
        )
        .await
    }

    async fn post_once(
        &self,
        content: &str,
        attempt: u32,
    ) -> Result<(), backoff::Error<WebhookError>> {
        debug!(attempt, "Posting review to Discord webhook");

        let response = self
            .client
            .post(self.webhook_url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&WebhookPayload { content })
            .send()
            .await
            .map_err(|e| backoff::Error::permanent(WebhookError::Request(e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            if attempt >= MAX_WEBHOOK_ATTEMPTS {
                return Err(backoff::Error::permanent(WebhookError::RateLimited {
                    attempts: attempt,
                }));
            }
            let wait = retry_after(response).await;
            return Err(backoff::Error::retry_after(
                WebhookError::Api {
                    status,
                    body: format!("attempt {attempt}"),
                },
                wait,
            ));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
        Err(backoff::Error::permanent(WebhookError::Api { status, body }))
    }
}

/// Delay requested by a 429 response: the JSON `retry_after` (seconds), then the
/// `Retry-After` header, then a one second default. Capped at one minute.
async fn retry_after(response: Response) -> Duration {
    let header_secs = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok());

    let body_secs = response
        .json::<RateLimitBody>()
        .await
        .ok()
        .map(|body| body.retry_after);

    body_secs
        .or(header_secs)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_RETRY_AFTER)
        .min(MAX_RETRY_AFTER)
}

/// Format the review message, log it, and post it when a webhook is configured.
///
/// Returns whether a post was made.
pub async fn notify_discord(
    settings: &AppSettings,
    commit: &CommitInfo,
    review: &str,
) -> Result<bool, WebhookError> {
    let message = format_review_message(commit, review, &settings.author_mapping);
    info!("Review result: {}\n\n", message);

    let Some(webhook_url) = settings.webhook_url() else {
        debug!("No Discord webhook configured, skipping notification");
        return Ok(false);
    };

    DiscordWebhookClient::new(webhook_url)?
        .execute(&message)
        .await?;
    Ok(true)
}

use crate::config::AppSettings;
use crate::models::{OpenAIChatMessage, OpenAIChatRequest, OpenAIChatResponse};
use reqwest::{header, Client, StatusCode};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

pub const OPENAI_CHAT_COMPLETIONS_PATH: &str = "chat/completions";

#[derive(Error, Debug)]
pub enum OpenAIClient {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {body}")]
    Api { status: StatusCode, body: String },
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("Failed to deserialize response: {0}")]
    Deserialization(reqwest::Error),
    #[error("API response contained no review text")]
    EmptyResponse,
}

#[derive(Debug)]
pub struct OpenAIApiClient {
    client: Client,
    completions_url: Url,
    api_key: String,
}

impl OpenAIApiClient {
    pub fn new(settings: &AppSettings) -> Result<Self, OpenAIClient> {
        // Url::join drops the last path segment unless the base ends with '/'
        let mut base = settings.api_endpoint.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let completions_url = Url::parse(&base)?.join(OPENAI_CHAT_COMPLETIONS_PATH)?;

        Ok(Self {
            client: Client::new(),
            completions_url,
            api_key: settings.api_key.clone(),
        })
    }

    pub fn completions_url(&self) -> &Url {
        &self.completions_url
    }

    #[instrument(skip(self, request_payload), fields(model = %request_payload.model))]
    pub async fn send_chat_completion(
        &self,
        request_payload: &OpenAIChatRequest,
    ) -> Result<OpenAIChatResponse, OpenAIClient> {
        debug!(
            "Sending chat completion request to: {}",
            self.completions_url
        );

        let response = self
            .client
            .post(self.completions_url.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(request_payload)
            .send()
            .await
            .map_err(OpenAIClient::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            error!("OpenAI API Error: {} - {}", status, body);
            return Err(OpenAIClient::Api { status, body });
        }

        response
            .json::<OpenAIChatResponse>()
            .await
            .map_err(OpenAIClient::Deserialization)
    }

    /// Ask the model to review `prompt` and return the first completion's text.
    pub async fn request_review(
        &self,
        settings: &AppSettings,
        prompt: &str,
    ) -> Result<String, OpenAIClient> {
        let request_payload = build_review_request(settings, prompt);

        let start_time = Instant::now();
        let response = self.send_chat_completion(&request_payload).await?;
        let elapsed = start_time.elapsed();

        info!(
            "AI Model {} - Response: {}",
            settings.model_name,
            describe_response(&response)
        );

        let mut summary = format!(
            "AI Model {} - Response time: {:.3}s",
            settings.model_name,
            elapsed.as_secs_f64()
        );
        if let Some(usage) = &response.usage {
            summary.push_str(&format!(
                " - Tokens: {} (request) {} (response)",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0)
            ));
        }
        info!("{}", summary);

        if let Some(reasoning) = response
            .choices
            .first()
            .and_then(|choice| choice.message.reasoning_content.as_deref())
        {
            debug!(reasoning_len = reasoning.len(), "Model returned reasoning content");
        }

        response
            .first_content()
            .map(str::to_string)
            .ok_or(OpenAIClient::EmptyResponse)
    }
}

/// Chat request for a review: reviewer persona as the system message, then the prompt.
pub fn build_review_request(settings: &AppSettings, prompt: &str) -> OpenAIChatRequest {
    OpenAIChatRequest {
        model: settings.model_name.clone(),
        messages: vec![
            OpenAIChatMessage::system(settings.system_prompt.clone()),
            OpenAIChatMessage::user(prompt),
        ],
        temperature: Some(settings.temperature),
        max_tokens: settings.max_tokens_limit(),
    }
}

/// Response metadata without the choices, for the log.
fn describe_response(response: &OpenAIChatResponse) -> String {
    format!(
        "id={} object={} created={} model={} choices={} usage={:?}",
        response.id,
        response.object,
        response.created,
        response.model,
        response.choices.len(),
        response.usage
    )
}

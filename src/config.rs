use clap::Parser;
use serde_json::Value;
use std::collections::HashMap;
use std::ffi::OsString;
use url::Url;

pub const DEFAULT_LOG_FILE: &str = "/tmp/code-reviewer-ai.log";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a senior software engineer reviewing a single git commit. \
Point out bugs, security problems, risky changes and unclear code. \
Be concise and concrete, reference file names and lines from the diff, \
and say so plainly when the change looks fine.";

/// Maps a commit author's email address to a Discord user id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorMapping(HashMap<String, String>);

impl AuthorMapping {
    pub fn get(&self, email: &str) -> Option<&str> {
        self.0.get(email).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AuthorMapping {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, Parser)]
#[command(
    author,
    version,
    about = "Reviews a git commit with an LLM and posts the result to a Discord webhook"
)]
pub struct AppSettings {
    /// Commit to review. When omitted, a formatted commit record is read from stdin
    #[arg(value_name = "COMMIT")]
    pub commit_hash: Option<String>,

    /// API key for the chat-completion endpoint
    #[arg(long, env = "API_KEY", hide_env_values = true, value_parser = validate_non_empty)]
    pub api_key: String,

    /// Discord webhook that receives the review (posting is skipped when unset)
    #[arg(long, env = "DISCORD_WEBHOOK_URL")]
    pub discord_webhook_url: Option<String>,

    /// Model to request the review from
    #[arg(long, env = "MODEL_NAME", default_value = "deepseek-reasoner")]
    pub model_name: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "API_ENDPOINT", default_value = "https://api.deepseek.com/v1")]
    pub api_endpoint: String,

    /// JSON object mapping author emails to Discord user ids
    #[arg(long, env = "AUTHOR_MAPPING", default_value = "{}", value_parser = parse_author_mapping)]
    pub author_mapping: AuthorMapping,

    /// Append-only log file
    #[arg(long, env = "LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: String,

    /// Prompt template file; the built-in template is used when it does not exist
    #[arg(long, env = "PROMPT_FILE", default_value = "prompt.txt")]
    pub prompt_file: String,

    /// Lines of context around each diff hunk
    #[arg(long, env = "DIFF_CONTEXT", default_value_t = 10)]
    pub diff_context: u32,

    /// Sampling temperature (0.0 to 2.0)
    #[arg(long, env = "TEMPERATURE", default_value_t = 0.2, value_parser = validate_temperature)]
    pub temperature: f32,

    /// Maximum number of tokens in the review; 0 leaves the limit to the API
    #[arg(long, env = "MAX_TOKENS", default_value_t = 0)]
    pub max_tokens: u32,

    /// System message describing the reviewer persona
    #[arg(long, env = "SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_PROMPT, hide_default_value = true)]
    pub system_prompt: String,

    /// Repository that git is run in
    #[arg(long, env = "REPO_DIR", default_value = ".")]
    pub repo_dir: String,

    /// Log level for the log file (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl AppSettings {
    /// Token limit to send, `None` when the limit is disabled.
    pub fn max_tokens_limit(&self) -> Option<u32> {
        (self.max_tokens > 0).then_some(self.max_tokens)
    }

    /// Webhook URL, treating an empty value as unset.
    pub fn webhook_url(&self) -> Option<&str> {
        self.discord_webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

fn validate_non_empty(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("value must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

/// Validate that temperature is within the range accepted by chat-completion APIs
fn validate_temperature(value: &str) -> Result<f32, String> {
    const MIN_TEMPERATURE: f32 = 0.0;
    const MAX_TEMPERATURE: f32 = 2.0;

    let temperature: f32 = value
        .trim()
        .parse()
        .map_err(|e| format!("temperature must be a number, got '{value}': {e}"))?;
    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(format!(
            "temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}, got {temperature}"
        ));
    }
    Ok(temperature)
}

/// Parse the AUTHOR_MAPPING JSON object. Ids may be given as strings or numbers.
fn parse_author_mapping(value: &str) -> Result<AuthorMapping, String> {
    let raw = if value.trim().is_empty() { "{}" } else { value };
    let parsed: HashMap<String, Value> = serde_json::from_str(raw)
        .map_err(|e| format!("author mapping must be a JSON object: {e}"))?;

    parsed
        .into_iter()
        .map(|(email, id)| match id {
            Value::String(id) => Ok((email, id)),
            Value::Number(id) => Ok((email, id.to_string())),
            other => Err(format!(
                "author mapping value for '{email}' must be a string or number, got {other}"
            )),
        })
        .collect()
}

fn validate_webhook_url(settings: &AppSettings) -> anyhow::Result<()> {
    if let Some(webhook_url) = settings.webhook_url() {
        Url::parse(webhook_url)
            .map_err(|e| anyhow::anyhow!("DISCORD_WEBHOOK_URL is not a valid URL: {e}"))?;
    }
    Ok(())
}

/// Log file for failures that happen before the settings exist: `LOG_FILE` or the default.
pub fn fallback_log_file() -> String {
    std::env::var("LOG_FILE")
        .ok()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
}

/// First line of a configuration error, without clap's `error: ` prefix.
pub fn describe_config_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<clap::Error>() {
        Some(clap_err) => {
            let rendered = clap_err.to_string();
            let first_line = rendered.lines().next().unwrap_or_default();
            first_line
                .strip_prefix("error: ")
                .unwrap_or(first_line)
                .trim()
                .to_string()
        }
        None => format!("{:#}", err),
    }
}

pub fn load_config() -> anyhow::Result<AppSettings> {
    // Variables already set in the environment win over .env entries
    dotenvy::dotenv().ok();
    load_config_from(std::env::args_os())
}

pub fn load_config_from<I, T>(args: I) -> anyhow::Result<AppSettings>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let app_settings = AppSettings::try_parse_from(args)?;
    validate_webhook_url(&app_settings)?;
    Ok(app_settings)
}

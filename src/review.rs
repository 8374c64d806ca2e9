use crate::commit::{parse_commit_record, ParseError};
use crate::config::AppSettings;
use crate::discord::notify_discord;
use crate::git::{read_commit_record, CommitSource, SourceError};
use crate::openai::{OpenAIApiClient, OpenAIClient};
use crate::prompt::{build_prompt, PromptError};
use std::io::{self, Read, Write};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Failures that abort a review run with a non-zero exit code.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Failed to parse commit record: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Review(#[from] OpenAIClient),
    #[error("Failed to write review: {0}")]
    Output(#[from] io::Error),
}

/// Review one commit: read and parse it, ask the model, print the review to
/// `output`, then notify Discord.
///
/// `input` is only read when no commit hash was given. A failed notification is
/// logged and does not fail the run.
pub async fn run<R: Read, W: Write>(
    settings: &AppSettings,
    input: R,
    output: &mut W,
) -> Result<String, AppError> {
    let client = OpenAIApiClient::new(settings)?;
    debug!(endpoint = %client.completions_url(), "Review requests go to the chat completions endpoint");

    let source = CommitSource::from_settings(settings);
    let record = read_commit_record(&source, settings, input)?;
    let commit = parse_commit_record(&record).map_err(|e| {
        error!("Failed to parse commit record ({}):\n{}", e, record);
        e
    })?;

    info!("Processing commit {}", source.describe());
    info!("Author: {}", commit.author);
    info!("Subject: {}", commit.subject);

    let prompt = build_prompt(&settings.prompt_file, &commit)?;
    let review = client.request_review(settings, &prompt).await?;

    // Printed before notifying so callers get the review even if Discord is down
    writeln!(output, "{}", review)?;
    output.flush()?;

    match notify_discord(settings, &commit, &review).await {
        Ok(true) => info!("Posted review of {} to Discord", commit.short_hash()),
        Ok(false) => {}
        Err(e) => warn!("Failed to notify Discord about {}: {}", commit.short_hash(), e),
    }

    Ok(review)
}

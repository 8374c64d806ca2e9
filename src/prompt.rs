use crate::commit::CommitInfo;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Perform a GIT code review.

Commit {hash} from {author}

Code Diff:
{diff}

Commit Message:
{subject}
{body}
";

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to read prompt template {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Unknown placeholder '{{{0}}}' in prompt template")]
    UnknownPlaceholder(String),
    #[error("Unterminated placeholder starting at byte {0} in prompt template")]
    Unterminated(usize),
    #[error("Single '}}' at byte {0} in prompt template")]
    UnmatchedBrace(usize),
}

/// Where the template came from, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(String),
    Default,
}

/// Read the template at `path`, falling back to [`DEFAULT_PROMPT_TEMPLATE`] when the file is missing.
pub fn load_template(path: &str) -> Result<(String, TemplateSource), PromptError> {
    if Path::new(path).is_file() {
        let template = fs::read_to_string(path).map_err(|source| PromptError::Read {
            path: path.to_string(),
            source,
        })?;
        info!("Loaded prompt from {}", path);
        Ok((template, TemplateSource::File(path.to_string())))
    } else {
        info!("Using default prompt");
        Ok((DEFAULT_PROMPT_TEMPLATE.to_string(), TemplateSource::Default))
    }
}

fn field<'a>(commit: &'a CommitInfo, name: &str) -> Option<&'a str> {
    match name {
        "hash" => Some(&commit.hash),
        "author" => Some(&commit.author),
        "subject" => Some(&commit.subject),
        "body" => Some(&commit.body),
        "diff" => Some(&commit.diff),
        _ => None,
    }
}

/// Substitute `{hash}`, `{author}`, `{subject}`, `{body}` and `{diff}`.
///
/// `{{` and `}}` produce literal braces. Substituted values are inserted as-is
/// and never scanned for placeholders themselves.
pub fn render_prompt(template: &str, commit: &CommitInfo) -> Result<String, PromptError> {
    let mut rendered = String::with_capacity(template.len() + commit.diff.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(pos) = rest.find(['{', '}']) {
        rendered.push_str(&rest[..pos]);
        let brace = rest.as_bytes()[pos];
        let after = &rest[pos + 1..];

        if after.as_bytes().first() == Some(&brace) {
            rendered.push(brace as char);
            rest = &after[1..];
            offset += pos + 2;
            continue;
        }

        if brace == b'}' {
            return Err(PromptError::UnmatchedBrace(offset + pos));
        }

        let end = after
            .find('}')
            .ok_or(PromptError::Unterminated(offset + pos))?;
        let name = &after[..end];
        let value = field(commit, name)
            .ok_or_else(|| PromptError::UnknownPlaceholder(name.to_string()))?;
        rendered.push_str(value);

        rest = &after[end + 1..];
        offset += pos + end + 2;
    }

    rendered.push_str(rest);
    Ok(rendered)
}

/// Load the configured template and fill it in for `commit`.
pub fn build_prompt(prompt_file: &str, commit: &CommitInfo) -> Result<String, PromptError> {
    let (template, source) = load_template(prompt_file)?;
    let prompt = render_prompt(&template, commit)?;
    debug!(?source, prompt_len = prompt.len(), "Rendered review prompt");
    Ok(prompt)
}

use crate::config::AppSettings;
use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, instrument};

/// `git show` format producing `<hash>\n<author> <<email>>\n<subject>\n<body>`.
pub const COMMIT_RECORD_FORMAT: &str = "--pretty=format:%H%n%an <%aE>%n%s%n%b";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Invalid revision '{0}'")]
    InvalidRevision(String),
    #[error("Failed to run git in {dir}: {source}")]
    Spawn {
        dir: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} failed: {details}")]
    Git { command: String, details: String },
    #[error("Failed to read commit record from stdin: {0}")]
    Stdin(#[from] io::Error),
}

/// Where the commit record for this run comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitSource {
    Git { revision: String },
    Stdin,
}

impl CommitSource {
    pub fn from_settings(settings: &AppSettings) -> Self {
        match &settings.commit_hash {
            Some(revision) => CommitSource::Git {
                revision: revision.clone(),
            },
            None => CommitSource::Stdin,
        }
    }

    /// Name used in log lines.
    pub fn describe(&self) -> &str {
        match self {
            CommitSource::Git { revision } => revision,
            CommitSource::Stdin => "<stdin>",
        }
    }
}

/// Produce the raw commit record, either from git or from `input`.
///
/// `input` is only read for [`CommitSource::Stdin`]; git is never started in that case.
pub fn read_commit_record<R: Read>(
    source: &CommitSource,
    settings: &AppSettings,
    mut input: R,
) -> Result<String, SourceError> {
    match source {
        CommitSource::Git { revision } => {
            show_commit(revision, settings.diff_context, Path::new(&settings.repo_dir))
        }
        CommitSource::Stdin => {
            let mut record = String::new();
            input.read_to_string(&mut record)?;
            debug!(bytes = record.len(), "Read commit record from stdin");
            Ok(record)
        }
    }
}

#[instrument(skip(repo_dir))]
pub fn show_commit(
    revision: &str,
    diff_context: u32,
    repo_dir: &Path,
) -> Result<String, SourceError> {
    if revision.trim().is_empty() || revision.starts_with('-') {
        return Err(SourceError::InvalidRevision(revision.to_string()));
    }

    let header = run_git_text(
        ["show", "-s", "--no-color", COMMIT_RECORD_FORMAT, revision],
        repo_dir,
    )?;
    let context = format!("-U{diff_context}");
    let patch = run_git_text(
        [
            "show",
            "--no-color",
            "--pretty=format:",
            context.as_str(),
            revision,
        ],
        repo_dir,
    )?;

    Ok(assemble_record(&header, &patch))
}

/// Join the `-s` header and the patch into `<hash>\n<author>\n<subject>\n<body>\n\n<diff>`.
///
/// git omits the body line entirely for one-line messages, so the body is
/// always re-emitted (possibly empty) before the blank separator.
fn assemble_record(header: &str, patch: &str) -> String {
    let mut lines = header.splitn(4, '\n');
    let hash = lines.next().unwrap_or_default();
    let author = lines.next().unwrap_or_default();
    let subject = lines.next().unwrap_or_default();
    let body = lines.next().unwrap_or_default().trim_end_matches('\n');
    let diff = patch.trim_start_matches('\n');

    format!("{hash}\n{author}\n{subject}\n{body}\n\n{diff}")
}

fn run_git<I, S>(args: I, cwd: &Path) -> Result<Vec<u8>, SourceError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args_vec: Vec<OsString> = args
        .into_iter()
        .map(|arg| arg.as_ref().to_os_string())
        .collect();

    let output = Command::new("git")
        .arg("-C")
        .arg(cwd)
        .args(&args_vec)
        .output()
        .map_err(|source| SourceError::Spawn {
            dir: cwd.display().to_string(),
            source,
        })?;

    if !output.status.success() {
        let command = format!(
            "git {}",
            args_vec
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let stderr_text = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let details = if stderr_text.is_empty() {
            format!("exit status {}", output.status)
        } else {
            stderr_text
        };

        return Err(SourceError::Git { command, details });
    }

    Ok(output.stdout)
}

fn run_git_text<I, S>(args: I, cwd: &Path) -> Result<String, SourceError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run_git(args, cwd)?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

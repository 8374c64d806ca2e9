use thiserror::Error;

/// One commit as printed by `git show --pretty=format:%H%n%an <%aE>%n%s%n%b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String, // "Name <email>"
    pub subject: String,
    pub body: String,
    pub diff: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("commit record has {found} section(s), expected hash, author, subject and message")]
    MissingSections { found: usize },
    #[error("commit record starts with an empty hash line")]
    EmptyHash,
}

impl CommitInfo {
    /// First seven characters of the hash, as git abbreviates it.
    pub fn short_hash(&self) -> &str {
        match self.hash.char_indices().nth(7) {
            Some((end, _)) => &self.hash[..end],
            None => &self.hash,
        }
    }
}

/// Parse `<hash>\n<author>\n<subject>\n<body>\n\n<diff>`.
///
/// Only the first blank line after the subject separates the message body from
/// the diff; blank lines inside the diff are kept as they are.
pub fn parse_commit_record(text: &str) -> Result<CommitInfo, ParseError> {
    let sections: Vec<&str> = text.splitn(4, '\n').collect();
    let &[hash, author, subject, remainder] = sections.as_slice() else {
        return Err(ParseError::MissingSections {
            found: sections.len(),
        });
    };

    let hash = hash.trim();
    if hash.is_empty() {
        return Err(ParseError::EmptyHash);
    }

    let (body, diff) = remainder.split_once("\n\n").unwrap_or((remainder, ""));

    Ok(CommitInfo {
        hash: hash.to_string(),
        author: author.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        diff: diff.to_string(),
    })
}

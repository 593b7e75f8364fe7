//! Submission preconditions.
//!
//! A fragment may only be submitted from a bootstrapped anonymous session,
//! and never with blank content. Both checks run before any transport is
//! touched, so a rejected submission costs nothing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::SUBMISSION_SOURCE;

/// Anonymous identity obtained once per process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub token: String,
}

impl Identity {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// A validated outbound write. The server assigns id and timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub content: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Content is empty or whitespace only.
    EmptyContent,
    /// The identity bootstrap has not completed.
    NotAuthenticated,
    /// The feed refused the write or could not be reached.
    Transport(String),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::EmptyContent => write!(f, "nothing to transmit: content is empty"),
            SubmitError::NotAuthenticated => {
                write!(f, "still connecting to the void, no session yet")
            }
            SubmitError::Transport(msg) => write!(f, "transmission failed: {msg}"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Validate a submission. Content is sent as typed; only the emptiness
/// check looks at the trimmed form.
pub fn prepare_submission(
    identity: Option<&Identity>,
    content: &str,
) -> Result<Submission, SubmitError> {
    if content.trim().is_empty() {
        return Err(SubmitError::EmptyContent);
    }
    if identity.is_none() {
        return Err(SubmitError::NotAuthenticated);
    }
    Ok(Submission {
        content: content.to_string(),
        source: SUBMISSION_SOURCE.to_string(),
    })
}

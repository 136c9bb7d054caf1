//! Failures that end a single workflow iteration.

use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;

/// Maximum number of characters of a response body included in an error.
const SNIPPET_LEN: usize = 200;

/// One of the three HTTP steps of an iteration.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Step {
    /// `POST {base_url}` creating the object.
    Create,
    /// `PUT {base_url}/{id}` replacing the object.
    Update,
    /// `GET {base_url}/{id}` reading the object back.
    Read,
}

impl Step {
    /// All steps in execution order.
    pub const ALL: [Step; 3] = [Step::Create, Step::Update, Step::Read];

    /// A short lowercase name used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Create => "create",
            Step::Update => "update",
            Step::Read => "read",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reason an iteration failed.
///
/// Every variant is local to one iteration and is never retried.
#[derive(Debug, thiserror::Error)]
pub enum IterationError {
    /// The server answered with a status other than `200 OK`.
    #[error("{step}: unexpected status {status}")]
    Status {
        /// The step that received the response.
        step: Step,
        /// The observed status code.
        status: StatusCode,
    },
    /// A required field was missing from, or could not be read out of, a response.
    #[error("{step}: failed to extract `{field}` from response: {snippet}")]
    Extraction {
        /// The step whose response was inspected.
        step: Step,
        /// The JSON field that was expected.
        field: &'static str,
        /// The beginning of the raw response body.
        snippet: String,
    },
    /// The object read back does not match the object written.
    #[error("{field} mismatch: update returned {put}, read returned {get}")]
    Consistency {
        /// The JSON field that differs.
        field: &'static str,
        /// The value from the update response.
        put: Value,
        /// The value from the read response.
        get: Value,
    },
    /// The request never produced a response.
    #[error("{step}: request failed")]
    Transport {
        /// The step that issued the request.
        step: Step,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },
}

impl IterationError {
    pub(crate) fn extraction(step: Step, field: &'static str, body: &str) -> Self {
        Self::Extraction {
            step,
            field,
            snippet: snippet(body),
        }
    }

    /// The category of this failure, used to aggregate results.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Status { .. } => FailureKind::Status,
            Self::Extraction { .. } => FailureKind::Extraction,
            Self::Consistency { .. } => FailureKind::Consistency,
            Self::Transport { .. } => FailureKind::Transport,
        }
    }

    /// The step that failed, or `None` for the final consistency check.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Status { step, .. }
            | Self::Extraction { step, .. }
            | Self::Transport { step, .. } => Some(*step),
            Self::Consistency { .. } => None,
        }
    }
}

/// Coarse classification of an [`IterationError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FailureKind {
    /// See [`IterationError::Status`].
    Status,
    /// See [`IterationError::Extraction`].
    Extraction,
    /// See [`IterationError::Consistency`].
    Consistency,
    /// See [`IterationError::Transport`].
    Transport,
}

fn snippet(body: &str) -> String {
    match body.char_indices().nth(SNIPPET_LEN) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_long_bodies() {
        let body = "x".repeat(SNIPPET_LEN + 50);
        let err = IterationError::extraction(Step::Create, "id", &body);

        let IterationError::Extraction { snippet, .. } = &err else {
            panic!("expected extraction error");
        };
        assert_eq!(snippet.len(), SNIPPET_LEN + 3);
        assert!(snippet.ends_with("..."));
        assert_eq!(err.kind(), FailureKind::Extraction);
        assert_eq!(err.step(), Some(Step::Create));
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let body = "ü".repeat(SNIPPET_LEN + 1);
        let err = IterationError::extraction(Step::Read, "name", &body);
        let IterationError::Extraction { snippet, .. } = err else {
            panic!("expected extraction error");
        };
        assert_eq!(snippet.chars().count(), SNIPPET_LEN + 3);
    }

    #[test]
    fn consistency_has_no_step() {
        let err = IterationError::Consistency {
            field: "name",
            put: "a".into(),
            get: "b".into(),
        };
        assert_eq!(err.step(), None);
        assert_eq!(
            err.to_string(),
            r#"name mismatch: update returned "a", read returned "b""#
        );
    }
}

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationErrorKind {
    Authentication,
    RateLimited,
    ContentPolicy,
    Failed,
}

/// Which user-facing operation an invocation belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Extraction,
    Generation,
}

const AUTH_MARKERS: &[&str] = &[
    "authentication",
    "unauthenticated",
    "unauthorized",
    "invalid api",
    "invalid token",
];
const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "rate_limit", "too many requests", "throttl"];
const CONTENT_POLICY_MARKERS: &[&str] = &[
    "content policy",
    "content_policy",
    "safety",
    "nsfw",
    "sensitive",
    "moderation",
    "flagged",
];

static STATUS_401_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:status|code|http)(?: code)?[ :=]*401\b").unwrap());

/// Single place where status codes and provider error text are turned into
/// an error kind.
pub fn classify_error(status: Option<u16>, message: &str) -> InvocationErrorKind {
    let lowered = message.to_lowercase();

    if matches!(status, Some(401) | Some(403))
        || (status.is_none() && STATUS_401_RE.is_match(&lowered))
        || AUTH_MARKERS.iter().any(|marker| lowered.contains(marker))
    {
        return InvocationErrorKind::Authentication;
    }
    if status == Some(429) || RATE_LIMIT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return InvocationErrorKind::RateLimited;
    }
    if CONTENT_POLICY_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return InvocationErrorKind::ContentPolicy;
    }
    InvocationErrorKind::Failed
}

impl InvocationErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, InvocationErrorKind::RateLimited | InvocationErrorKind::Failed)
    }

    pub fn http_status(self) -> u16 {
        match self {
            InvocationErrorKind::Authentication => 401,
            InvocationErrorKind::RateLimited => 429,
            InvocationErrorKind::ContentPolicy => 400,
            InvocationErrorKind::Failed => 502,
        }
    }

    pub fn user_message(self, operation: Operation) -> &'static str {
        match (self, operation) {
            (InvocationErrorKind::Authentication, _) => {
                "Invalid API key. Please check your Replicate API key."
            }
            (InvocationErrorKind::RateLimited, _) => {
                "Rate limit exceeded. Please wait a moment and try again."
            }
            (InvocationErrorKind::ContentPolicy, Operation::Extraction) => {
                "The image could not be analyzed due to content policy."
            }
            (InvocationErrorKind::ContentPolicy, Operation::Generation) => {
                "Image could not be generated due to content policy. Try adjusting your prompt."
            }
            (InvocationErrorKind::Failed, Operation::Extraction) => {
                "Failed to extract style. Please try again."
            }
            (InvocationErrorKind::Failed, Operation::Generation) => {
                "Failed to generate image. Please try again."
            }
        }
    }
}

impl fmt::Display for InvocationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InvocationErrorKind::Authentication => "authentication",
            InvocationErrorKind::RateLimited => "rate_limited",
            InvocationErrorKind::ContentPolicy => "content_policy",
            InvocationErrorKind::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} invocation error (status={status:?}): {message}")]
pub struct InvocationError {
    pub kind: InvocationErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl InvocationError {
    pub fn classify(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        InvocationError {
            kind: classify_error(status, &message),
            status,
            message,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        InvocationError {
            kind: InvocationErrorKind::Failed,
            status: None,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_status_first() {
        assert_eq!(classify_error(Some(401), ""), InvocationErrorKind::Authentication);
        assert_eq!(classify_error(Some(429), "slow down"), InvocationErrorKind::RateLimited);
        assert_eq!(classify_error(Some(500), "boom"), InvocationErrorKind::Failed);
    }

    #[test]
    fn classifies_by_message_text() {
        assert_eq!(
            classify_error(None, "Invalid API token provided"),
            InvocationErrorKind::Authentication
        );
        assert_eq!(
            classify_error(None, "Request failed with status 401"),
            InvocationErrorKind::Authentication
        );
        assert_eq!(
            classify_error(None, "You hit the Rate Limit"),
            InvocationErrorKind::RateLimited
        );
        assert_eq!(
            classify_error(Some(422), "NSFW content detected"),
            InvocationErrorKind::ContentPolicy
        );
        assert_eq!(
            classify_error(None, "flagged by safety checker"),
            InvocationErrorKind::ContentPolicy
        );
    }

    #[test]
    fn digits_in_request_urls_are_not_auth_failures() {
        let message = "Replicate request error: error sending request for url \
                       (https://api.replicate.com/v1/predictions/x401abc)";
        assert_eq!(classify_error(None, message), InvocationErrorKind::Failed);
        assert!(InvocationError::classify(None, message).is_retryable());
        assert_eq!(
            classify_error(Some(500), "upstream returned status 401"),
            InvocationErrorKind::Failed
        );
        assert_eq!(
            classify_error(None, "HTTP status code: 401"),
            InvocationErrorKind::Authentication
        );
    }

    #[test]
    fn generic_content_word_is_not_a_policy_violation() {
        assert_eq!(
            classify_error(Some(500), "failed to read content length"),
            InvocationErrorKind::Failed
        );
    }

    #[test]
    fn only_transient_kinds_are_retryable() {
        assert!(InvocationErrorKind::Failed.is_retryable());
        assert!(InvocationErrorKind::RateLimited.is_retryable());
        assert!(!InvocationErrorKind::ContentPolicy.is_retryable());
        assert!(!InvocationErrorKind::Authentication.is_retryable());
    }

    #[test]
    fn maps_kinds_to_statuses() {
        assert_eq!(InvocationErrorKind::Authentication.http_status(), 401);
        assert_eq!(InvocationErrorKind::RateLimited.http_status(), 429);
        assert_eq!(InvocationErrorKind::ContentPolicy.http_status(), 400);
        assert_eq!(InvocationErrorKind::Failed.http_status(), 502);
    }
}

use std::fmt;

use thiserror::Error;

/// How a remote service failure should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP 429 or an explicit rate-limit message. Retried with long backoff.
    RateLimited,
    /// HTTP 402, payment required or out of credits. Switches to placeholders.
    QuotaExhausted,
    /// Success status but the payload is missing the expected data.
    Malformed,
    /// Anything else.
    Fatal,
}

impl ErrorKind {
    /// Classify a failed response from its status code and error body.
    ///
    /// Quota indicators win over rate-limit indicators, since some providers
    /// answer an exhausted balance with a 429 whose body mentions credits.
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        let lower = message.to_lowercase();

        let quota = status == Some(402)
            || lower.contains("402")
            || lower.contains("payment required")
            || lower.contains("payment_required")
            || lower.contains("insufficient_quota")
            || lower.contains("credits");
        if quota {
            return ErrorKind::QuotaExhausted;
        }

        let rate_limited = status == Some(429)
            || lower.contains("429")
            || (lower.contains("rate") && lower.contains("limit"));
        if rate_limited {
            return ErrorKind::RateLimited;
        }

        ErrorKind::Fatal
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::QuotaExhausted => "quota exhausted",
            ErrorKind::Malformed => "malformed response",
            ErrorKind::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// A failure reported by one of the remote generation services.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Build an error from a non-success HTTP response.
    pub fn from_response(status: u16, body: &str) -> Self {
        Self {
            kind: ErrorKind::classify(Some(status), body),
            status: Some(status),
            message: format!("HTTP {}: {}", status, body.trim()),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, message)
    }

    pub fn is_quota(&self) -> bool {
        self.kind == ErrorKind::QuotaExhausted
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let message = err.to_string();
        Self {
            kind: ErrorKind::classify(status, &message),
            status,
            message,
        }
    }
}

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("No scenes could be parsed from the script")]
    NoScenes,

    #[error("Scene processing error: {0}")]
    SceneError(String),

    #[error("Image service error for scene {scene}: {source}")]
    ImageService {
        scene: usize,
        #[source]
        source: ServiceError,
    },

    #[error("Text service error: {0}")]
    TextService(#[from] ServiceError),

    #[error("Incomplete image set: expected {expected} images, got {actual}")]
    IncompleteImages { expected: usize, actual: usize },

    #[error("Transcoding engine error: {0}")]
    EngineError(String),

    #[error("Image decode error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Job store error: {0}")]
    JobError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VideoError>;

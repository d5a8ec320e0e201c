use reqwest::StatusCode;
use thiserror::Error;

/// Server-assigned failure categories for a summarize attempt, each with a
/// short user-facing status and a longer hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    AuthRequired,
    AuthInvalid,
    CreditsExceeded,
    DownloadFailed,
    SummaryFailed,
    InternalError,
    Unknown,
}

impl ErrorCode {
    pub fn from_wire(code: &str) -> Option<Self> {
        match code {
            "AUTH_REQUIRED" => Some(ErrorCode::AuthRequired),
            "AUTH_INVALID" => Some(ErrorCode::AuthInvalid),
            "CREDITS_EXCEEDED" => Some(ErrorCode::CreditsExceeded),
            "DOWNLOAD_FAILED" => Some(ErrorCode::DownloadFailed),
            "SUMMARY_FAILED" => Some(ErrorCode::SummaryFailed),
            "INTERNAL_ERROR" => Some(ErrorCode::InternalError),
            _ => None,
        }
    }

    pub fn status(self) -> &'static str {
        match self {
            ErrorCode::AuthRequired => "Sign-in required",
            ErrorCode::AuthInvalid => "Session expired",
            ErrorCode::CreditsExceeded => "Out of credits",
            ErrorCode::DownloadFailed => "Video download failed",
            ErrorCode::SummaryFailed => "Summarization failed",
            ErrorCode::InternalError => "Server error",
            ErrorCode::Unknown => "Request failed",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCode::AuthRequired => "Sign in to summarize videos, then try again",
            ErrorCode::AuthInvalid => "Your session is no longer valid; sign in again",
            ErrorCode::CreditsExceeded => "This account has used up its summarization credits",
            ErrorCode::DownloadFailed => "The video could not be fetched; check that the link is public",
            ErrorCode::SummaryFailed => "The model could not produce a summary for this video",
            ErrorCode::InternalError => "Something went wrong on the server; try again shortly",
            ErrorCode::Unknown => "An unexpected error ended this attempt",
        }
    }
}

/// Classify a terminal server error, preferring the explicit wire code and
/// falling back to message substrings.
pub fn classify_error(code: Option<&str>, message: &str) -> ErrorCode {
    if let Some(known) = code.and_then(ErrorCode::from_wire) {
        return known;
    }
    let lower = message.to_lowercase();
    if lower.contains("credit") || lower.contains("quota") {
        ErrorCode::CreditsExceeded
    } else if lower.contains("expired") || lower.contains("invalid token") {
        ErrorCode::AuthInvalid
    } else if lower.contains("login")
        || lower.contains("sign in")
        || lower.contains("unauthorized")
        || lower.contains("auth")
    {
        ErrorCode::AuthRequired
    } else if lower.contains("download") {
        ErrorCode::DownloadFailed
    } else if lower.contains("summar") {
        ErrorCode::SummaryFailed
    } else if lower.contains("internal") {
        ErrorCode::InternalError
    } else {
        ErrorCode::Unknown
    }
}

/// Classification for stream requests the server rejects outright.
pub fn classify_http_status(status: StatusCode) -> ErrorCode {
    match status.as_u16() {
        401 => ErrorCode::AuthRequired,
        403 => ErrorCode::AuthInvalid,
        402 | 429 => ErrorCode::CreditsExceeded,
        500..=599 => ErrorCode::InternalError,
        _ => ErrorCode::Unknown,
    }
}

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("video url must not be empty")]
    EmptyUrl,

    #[error("stream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{status}: {message}")]
    Server {
        code: ErrorCode,
        status: String,
        hint: String,
        /// Original server message, preserved for diagnostics.
        message: String,
    },

    #[error("stream interrupted: {message}")]
    Stream { message: String },

    #[error("stream closed before a terminal event")]
    Disconnected,

    #[error("attempt superseded by a newer start")]
    Superseded,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("history endpoint returned {status}")]
    Status { status: StatusCode },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_take_precedence() {
        assert_eq!(
            classify_error(Some("CREDITS_EXCEEDED"), "anything at all"),
            ErrorCode::CreditsExceeded
        );
        assert_eq!(
            classify_error(Some("DOWNLOAD_FAILED"), "no credits left"),
            ErrorCode::DownloadFailed
        );
    }

    #[test]
    fn unknown_wire_code_falls_back_to_message() {
        assert_eq!(
            classify_error(Some("SOMETHING_NEW"), "download timed out"),
            ErrorCode::DownloadFailed
        );
    }

    #[test]
    fn message_substrings_classify() {
        assert_eq!(
            classify_error(None, "Insufficient credits"),
            ErrorCode::CreditsExceeded
        );
        assert_eq!(
            classify_error(None, "please login first"),
            ErrorCode::AuthRequired
        );
        assert_eq!(
            classify_error(None, "token expired"),
            ErrorCode::AuthInvalid
        );
        assert_eq!(
            classify_error(None, "summarization pipeline crashed"),
            ErrorCode::SummaryFailed
        );
        assert_eq!(classify_error(None, "weird"), ErrorCode::Unknown);
    }

    #[test]
    fn http_statuses_classify() {
        assert_eq!(
            classify_http_status(StatusCode::UNAUTHORIZED),
            ErrorCode::AuthRequired
        );
        assert_eq!(
            classify_http_status(StatusCode::PAYMENT_REQUIRED),
            ErrorCode::CreditsExceeded
        );
        assert_eq!(
            classify_http_status(StatusCode::INTERNAL_SERVER_ERROR),
            ErrorCode::InternalError
        );
        assert_eq!(classify_http_status(StatusCode::IM_A_TEAPOT), ErrorCode::Unknown);
    }
}

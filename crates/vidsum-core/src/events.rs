use serde::Deserialize;

use crate::types::UsageInfo;

/// One server-push payload, normalized across both protocol generations.
///
/// Newer servers send `{"type": "...", ...}` tagged objects; older ones send
/// bare `{"status": ...}` lines with the result fields inlined on the final
/// `"complete"` status. Both parse into this union.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    Status {
        text: String,
    },
    VideoDownloaded {
        file: Option<String>,
    },
    TranscriptComplete {
        transcript: String,
    },
    SummaryComplete {
        summary: String,
        transcript: Option<String>,
        video_file: Option<String>,
        usage: Option<UsageInfo>,
    },
    Error {
        code: Option<String>,
        message: String,
    },
    /// Event types this client does not know about. Logged and skipped.
    Unrecognized {
        raw: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Status {
        #[serde(default, alias = "data")]
        status: String,
    },
    VideoDownloaded {
        #[serde(default)]
        video_file: Option<String>,
    },
    TranscriptComplete {
        #[serde(default, alias = "data")]
        transcript: String,
    },
    SummaryComplete {
        #[serde(default)]
        summary: String,
        #[serde(default)]
        usage: Option<UsageInfo>,
    },
    Error {
        #[serde(default)]
        code: Option<String>,
        #[serde(default, alias = "message")]
        error: Option<String>,
    },
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyLine {
    status: Option<String>,
    summary: Option<String>,
    transcript: Option<String>,
    video_file: Option<String>,
    usage: Option<UsageInfo>,
    error: Option<String>,
}

/// Parse one line from the push stream.
///
/// Strips optional SSE `data:` framing and scans to the first `{`, so both
/// event-stream and newline-delimited JSON servers are accepted. Returns
/// `None` for lines carrying no payload (blank lines, SSE comments).
pub fn parse_line(line: &str) -> Option<Result<ProgressEvent, serde_json::Error>> {
    let line = line.trim();
    let line = line
        .strip_prefix("data:")
        .map(str::trim_start)
        .unwrap_or(line);
    let start = line.find('{')?;
    Some(parse_payload(&line[start..]))
}

fn parse_payload(json: &str) -> Result<ProgressEvent, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if value.get("type").is_some() {
        let raw = json.to_string();
        let event = match serde_json::from_value::<WireEvent>(value)? {
            WireEvent::Status { status } => ProgressEvent::Status { text: status },
            WireEvent::VideoDownloaded { video_file } => {
                ProgressEvent::VideoDownloaded { file: video_file }
            }
            WireEvent::TranscriptComplete { transcript } => {
                ProgressEvent::TranscriptComplete { transcript }
            }
            WireEvent::SummaryComplete { summary, usage } => ProgressEvent::SummaryComplete {
                summary,
                transcript: None,
                video_file: None,
                usage,
            },
            WireEvent::Error { code, error } => ProgressEvent::Error {
                code,
                message: error.unwrap_or_else(|| "unknown error".to_string()),
            },
            WireEvent::Unrecognized => ProgressEvent::Unrecognized { raw },
        };
        return Ok(event);
    }

    let legacy: LegacyLine = serde_json::from_value(value)?;
    if let Some(message) = legacy.error {
        return Ok(ProgressEvent::Error {
            code: None,
            message,
        });
    }
    match legacy.status {
        Some(status) => {
            // The old protocol ships the whole result on its final status.
            if status.trim().eq_ignore_ascii_case("complete") && legacy.summary.is_some() {
                Ok(ProgressEvent::SummaryComplete {
                    summary: legacy.summary.unwrap_or_default(),
                    transcript: legacy.transcript,
                    video_file: legacy.video_file,
                    usage: legacy.usage,
                })
            } else {
                Ok(ProgressEvent::Status { text: status })
            }
        }
        None => Ok(ProgressEvent::Unrecognized {
            raw: json.to_string(),
        }),
    }
}

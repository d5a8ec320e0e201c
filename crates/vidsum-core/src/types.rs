use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the server should look at the video.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Let the server pick the cheapest signal (subtitles, audio, frames).
    #[default]
    Smart,
    /// Force full video analysis.
    Video,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Smart => "smart",
            Mode::Video => "video",
        }
    }
}

/// Angle the summary is written from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Focus {
    #[default]
    Default,
    Study,
    Gossip,
    Business,
}

impl Focus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Focus::Default => "default",
            Focus::Study => "study",
            Focus::Gossip => "gossip",
            Focus::Business => "business",
        }
    }
}

/// One summarization job. `url` must be non-empty; no other field is
/// cross-validated.
#[derive(Clone, Debug, Serialize)]
pub struct SummarizeRequest {
    pub url: String,
    pub mode: Mode,
    pub focus: Focus,
    pub skip_cache: bool,
    pub template_id: Option<String>,
    pub output_language: Option<String>,
    pub enable_cot: bool,
}

impl SummarizeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: Mode::default(),
            focus: Focus::default(),
            skip_cache: false,
            template_id: None,
            output_language: None,
            enable_cot: false,
        }
    }
}

/// Token accounting reported with a finished summary. The annex fields are
/// passed through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    #[serde(default, alias = "prompt_tokens", skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(
        default,
        alias = "completion_tokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cot_steps: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charts: Option<serde_json::Value>,
}

/// Outcome of one summarize attempt. Created empty when the attempt starts,
/// filled field by field as events arrive, frozen at the terminal event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    pub transcript: String,
    pub video_file: Option<String>,
    pub usage: Option<UsageInfo>,
}

/// One summary record, local or cloud. Records are matched across stores by
/// `(video_url, mode, focus)`, not by `id` — see [`HistoryItem::merge_key`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub video_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_thumbnail: Option<String>,
    pub mode: String,
    pub focus: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mindmap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl HistoryItem {
    /// Semantic identity of a summary: two records with the same key are the
    /// same logical summary at possibly different versions.
    pub fn merge_key(&self) -> String {
        format!("{}|{}|{}", self.video_url, self.mode, self.focus)
    }
}

/// Metadata probe result for a video URL. Every field is best-effort.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub view_count: Option<u64>,
}

/// Stages of one summarize attempt, in order. `Error` is the parallel
/// terminal stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    #[default]
    Idle,
    Connecting,
    Downloading,
    Transcript,
    Summarizing,
    Finalizing,
    Complete,
    Error,
}

impl Phase {
    /// Upper bound for displayed progress while this phase is active.
    pub fn ceiling(self) -> f32 {
        match self {
            Phase::Idle => 0.0,
            Phase::Connecting => 12.0,
            Phase::Downloading => 45.0,
            Phase::Transcript => 60.0,
            Phase::Summarizing => 85.0,
            Phase::Finalizing => 95.0,
            Phase::Complete => 100.0,
            Phase::Error => 100.0,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Connecting => "connecting",
            Phase::Downloading => "downloading",
            Phase::Transcript => "transcript",
            Phase::Summarizing => "summarizing",
            Phase::Finalizing => "finalizing",
            Phase::Complete => "complete",
            Phase::Error => "error",
        }
    }
}

/// A status line classified into a phase transition. `label` of `None` means
/// the raw server text is worth showing as-is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusClass {
    pub phase: Phase,
    pub progress: f32,
    pub label: Option<&'static str>,
}

const fn class(phase: Phase, progress: f32, label: Option<&'static str>) -> StatusClass {
    StatusClass {
        phase,
        progress,
        label,
    }
}

/// Classify loose server status text by ordered substring rules; the first
/// match wins. Text matching no rule leaves the phase alone and is shown
/// verbatim.
pub fn classify_status(text: &str) -> Option<StatusClass> {
    if text.contains("Found in cache") {
        return Some(class(
            Phase::Finalizing,
            92.0,
            Some("Found in cache, loading…"),
        ));
    }
    if text.contains("Downloading") {
        // "Downloading video: 42.5%" interpolates into the download band.
        let progress = embedded_number(text)
            .map(|pct| 10.0 + pct.clamp(0.0, 100.0) * 0.35)
            .unwrap_or(10.0);
        return Some(class(Phase::Downloading, progress, None));
    }
    if text.contains("Uploading") {
        return Some(class(
            Phase::Summarizing,
            55.0,
            Some("Uploading for analysis…"),
        ));
    }
    if text.contains("Parallel Analysis") {
        return Some(class(
            Phase::Summarizing,
            75.0,
            Some("Summarizing and transcribing in parallel…"),
        ));
    }
    if text.contains("processing") {
        return Some(class(Phase::Summarizing, 70.0, None));
    }
    if text.contains("analyzing") {
        return Some(class(Phase::Finalizing, 90.0, None));
    }
    None
}

/// Mode hints derived from status text, independent of phase tracking.
pub fn classify_hint(text: &str) -> Option<&'static str> {
    if text.contains("subtitle") {
        Some("subtitle fast path")
    } else if text.contains("audio") {
        Some("audio fast path")
    } else if text.contains("visual") || text.contains("video") {
        Some("visual analysis")
    } else {
        None
    }
}

/// Some server modes push a detached `"complete"` status instead of (or in
/// addition to) a `summary_complete` event. Both are valid terminal signals.
pub fn is_complete_marker(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("complete")
}

fn embedded_number(text: &str) -> Option<f32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let number: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.parse().ok()
}

use crate::types::SummaryResult;

/// Title for a history record: first markdown heading or non-empty line of
/// the summary, truncated, with the URL as fallback.
pub fn title_from_summary(summary: &str, fallback: &str) -> String {
    for line in summary.lines() {
        let line = line.trim().trim_start_matches('#').trim();
        if !line.is_empty() {
            return truncate_chars(line, 50);
        }
    }
    fallback.to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Format a finished summary as human-readable markdown.
pub fn render_result(result: &SummaryResult) -> String {
    let mut output = String::new();

    output.push_str(result.summary.trim_end());
    output.push('\n');

    if let Some(usage) = &result.usage {
        let mut parts = Vec::new();
        if let Some(n) = usage.input_tokens {
            parts.push(format!("input {n}"));
        }
        if let Some(n) = usage.output_tokens {
            parts.push(format!("output {n}"));
        }
        if let Some(n) = usage.total_tokens {
            parts.push(format!("total {n}"));
        }
        if !parts.is_empty() {
            output.push_str(&format!("\n**Tokens:** {}\n", parts.join(" | ")));
        }
    }

    if let Some(file) = &result.video_file {
        output.push_str(&format!("\n**Video file:** {file}\n"));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UsageInfo;

    #[test]
    fn title_prefers_the_first_heading() {
        let title = title_from_summary("# A Great Video\n\nBody text", "https://example.com/v");
        assert_eq!(title, "A Great Video");
    }

    #[test]
    fn title_skips_blank_lines() {
        let title = title_from_summary("\n\nplain opener", "fallback");
        assert_eq!(title, "plain opener");
    }

    #[test]
    fn title_falls_back_to_the_url() {
        assert_eq!(title_from_summary("   \n\n", "https://example.com/v"), "https://example.com/v");
    }

    #[test]
    fn title_truncates_without_splitting_characters() {
        let long = "标题".repeat(40);
        let title = title_from_summary(&long, "fallback");
        assert_eq!(title.chars().count(), 50);
    }

    #[test]
    fn render_includes_usage_when_present() {
        let result = SummaryResult {
            summary: "# Title\n\nBody".to_string(),
            transcript: String::new(),
            video_file: Some("v.mp4".to_string()),
            usage: Some(UsageInfo {
                input_tokens: Some(10),
                output_tokens: Some(5),
                total_tokens: Some(15),
                ..Default::default()
            }),
        };
        let rendered = render_result(&result);
        assert!(rendered.contains("# Title"));
        assert!(rendered.contains("**Tokens:** input 10 | output 5 | total 15"));
        assert!(rendered.contains("**Video file:** v.mp4"));
    }

    #[test]
    fn render_is_just_the_summary_without_extras() {
        let result = SummaryResult {
            summary: "plain".to_string(),
            ..Default::default()
        };
        assert_eq!(render_result(&result), "plain\n");
    }
}

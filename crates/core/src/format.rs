use crate::types::AnalysisResult;

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format an analysis result as human-readable markdown
pub fn format_report_readable(result: &AnalysisResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", result.title));

    output.push_str("## Summary\n\n");
    output.push_str(&result.summary);
    output.push_str("\n\n");

    if !result.key_topics.is_empty() {
        output.push_str("## Key Topics\n\n");
        for topic in &result.key_topics {
            output.push_str(&format!("• {}\n", topic));
        }
        output.push('\n');
    }

    if !result.key_moments.is_empty() {
        output.push_str("## Key Moments\n\n");
        for moment in &result.key_moments {
            output.push_str(&format!(
                "**[{}]** {}\n",
                moment.timestamp_description, moment.event_summary
            ));
        }
        output.push('\n');
    }

    output
}

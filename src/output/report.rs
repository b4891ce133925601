use crate::verify::{CompletionReport, FileState};

fn state_icon(state: FileState) -> &'static str {
    match state {
        FileState::Valid => "✅",
        FileState::Invalid => "⚠️",
        FileState::Missing => "❌",
    }
}

/// Markdown table of a completion report
pub fn render_report(report: &CompletionReport) -> String {
    let mut content = String::new();

    content.push_str("| Metric | Value |\n");
    content.push_str("|--------|-------|\n");
    content.push_str(&format!(
        "| Valid | {}/{} |\n",
        report.valid_count, report.total_planned
    ));
    content.push_str(&format!("| Missing | {} |\n", report.missing.len()));
    content.push_str(&format!("| Invalid | {} |\n", report.invalid.len()));
    content.push_str(&format!(
        "| Complete | {} |\n\n",
        if report.complete { "yes" } else { "no" }
    ));

    if report.files.is_empty() {
        content.push_str("No files planned.\n");
        return content;
    }

    content.push_str("| File | State | Reason |\n");
    content.push_str("|------|-------|--------|\n");
    for status in &report.files {
        content.push_str(&format!(
            "| {} | {} | {} |\n",
            status.resolved,
            state_icon(status.state),
            status.reason
        ));
    }

    content
}

mod report;
mod summary;

pub use report::render_report;
pub use summary::{build_summary_markdown, RunSummary};

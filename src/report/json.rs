//! JSON output for a pass report, for scripting and piping.

use crate::archive::PassReport;

pub fn render(report: &PassReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

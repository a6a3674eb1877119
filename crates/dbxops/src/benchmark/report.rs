//! Average duration report over the run log.

use dbxops_db::ConfigAverage;

pub const REPORT_HEADERS: &[&str] = &[
    "Config",
    "Use case",
    "Type",
    "Sizing",
    "Runs",
    "Avg duration",
];

/// `m:ss`, or `h:mm:ss` from one hour on.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

pub fn report_rows(averages: &[ConfigAverage]) -> Vec<Vec<String>> {
    averages
        .iter()
        .map(|a| {
            vec![
                a.config_id.to_string(),
                a.use_case.clone(),
                a.sizing.run_type().to_string(),
                a.sizing.describe(),
                a.successful_runs.to_string(),
                format_duration(a.avg_duration_seconds),
            ]
        })
        .collect()
}

//! Quartz cron expression check.
//!
//! The pattern is a syntactic filter only: it does not check ranges such as
//! day 31 in February. Some alternatives are concatenated rather than
//! alternated (`(\d+L)(\*/\d+)`), matching what existing configs were
//! validated against.

use regex::Regex;
use std::sync::OnceLock;

const QUARTZ_PATTERN: &str = concat!(
    // second
    r"^(\*|\?|0|[1-5]?\d|L|W|(\d+(/|-|#)\d+)|(\d+L)|(\*/\d+)|(\d+(\s*,\s*\d+)*)) ",
    // minute
    r"(\*|\?|0|[1-5]?\d|L|W|(\d+(/|-|#)\d+)|(\d+L)|(\*/\d+)|(\d+(\s*,\s*\d+)*)) ",
    // hour
    r"(\*|\?|0|1?\d|2[0-3]|L|W|(\d+(/|-|#)\d+)|(\d+L)|(\*/\d+)|(\d+(\s*,\s*\d+)*)) ",
    // day of month
    r"(\*|\?|L|LW|W|\d{1,2}|L-\d{1,2}|(\d+(/|-|#|L)\d+)|(\d+L)(\*/\d+)|(\d+(\s*,\s*\d+)*)) ",
    // month
    r"(\*|\?|1?\d|2[0-3]|JAN|FEB|MAR|APR|MAY|JUN|JUL|AUG|SEP|OCT|NOV|DEC|",
    r"(\d+(/|-|#)\d+)|(\*/\d+)|(\d+(\s*,\s*\d+)*)) ",
    // day of week
    r"(\*|\?|L|\d{1,2}|MON|TUE|WED|THU|FRI|SAT|SUN|",
    r"(MON|TUE|WED|THU|FRI|SAT|SUN)-(MON|TUE|WED|THU|FRI|SAT|SUN)|",
    r"(\d+(/|-|#|L)\d+)|(\d+L)|(\*/\d+)(\d+(\s*,\s*\d+)*))",
    // optional year, optional trailing *
    r"(\s+\d{4}(-\d{4})?)?(\s+\*)?$",
);

fn quartz() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(QUARTZ_PATTERN).unwrap_or_else(|e| panic!("quartz pattern: {e}")))
}

pub(crate) fn is_valid_quartz(expr: &str) -> bool {
    quartz().is_match(expr)
}

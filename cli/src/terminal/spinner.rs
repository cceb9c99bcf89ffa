use colored::*;
use indicatif::ProgressStyle;
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use pifleet_common::models::scan::ScanProgress;

const TICK_STRINGS: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
    "▁▁▁▁▁",
];

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICK_STRINGS)
}

/// A span that renders as a spinner for as long as it is entered.
pub fn activity(name: &'static str, msg: &str) -> Span {
    let span = info_span!("activity", indicatif.pb_show = true, task = name);
    span.pb_set_style(&style("{spinner:.blue} {msg}"));
    span.pb_set_message(msg);
    span
}

/// Spinner with a host counter for a scan pass.
pub fn scan(range: &str) -> Span {
    let span = info_span!("scan", indicatif.pb_show = true);
    span.pb_set_style(&style("{spinner:.blue} {msg} {pos}/{len}"));
    span.pb_set_message(&format!("Scanning {}", range.bold()));
    span
}

pub fn report_scan_progress(span: &Span, progress: ScanProgress) {
    span.pb_set_length(progress.total as u64);
    span.pb_set_position(progress.done as u64);
    span.pb_set_message(&format!(
        "Reconciled {} players so far",
        progress.reconciled.to_string().green().bold()
    ));
}

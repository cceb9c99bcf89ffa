use std::sync::Arc;

use colored::*;
use tracing::Instrument;

use pifleet_common::models::scan::ScanReport;
use pifleet_core::fleet::Fleet;

use crate::commands::Output;
use crate::fprint;
use crate::terminal::{colors, print, spinner};

pub async fn scan(fleet: Fleet, range: &str, out: Output) -> anyhow::Result<()> {
    let span = spinner::scan(range);
    let progress_span = span.clone();
    let fleet = fleet.on_scan_progress(Arc::new(move |progress| {
        spinner::report_scan_progress(&progress_span, progress);
    }));

    let report = fleet.scan(range).instrument(span).await?;

    if out.json {
        return print::json(&report);
    }
    print_report(&report, out);
    Ok(())
}

fn print_report(report: &ScanReport, out: Output) {
    if out.quiet < 2 {
        for mac in &report.reconciled {
            print::print_status(format!("{} {}", "found".color(colors::OK), mac));
        }
        for mac in &report.absent {
            let state = if report.flagged_missing.contains(mac) {
                "missing".color(colors::FAIL)
            } else {
                "absent".color(colors::WARN)
            };
            print::print_status(format!("{state} {mac}"));
        }
    }

    if out.quiet == 0 {
        fprint!();
        print::aligned_line("Range", report.range.color(colors::IPV4_ADDR));
        print::aligned_line("Candidates", report.probed);
        print::aligned_line("Alive", report.alive);
        print::fat_separator();
    }

    let players = format!("{} players", report.reconciled.len()).bold().green();
    let missing = format!("{} missing", report.flagged_missing.len()).bold().red();
    let time = format!("{:.2}s", report.elapsed_ms as f64 / 1_000.0).bold().yellow();
    print::centerln(&format!("Scan complete: {players}, {missing} in {time}"));
}

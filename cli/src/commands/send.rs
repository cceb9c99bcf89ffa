use std::net::Ipv4Addr;

use anyhow::bail;
use colored::*;
use tracing::Instrument;

use pifleet_common::models::dispatch::{DispatchMode, DispatchResult};
use pifleet_core::fleet::Fleet;

use crate::commands::Output;
use crate::terminal::{colors, format, print, spinner};

pub async fn send(fleet: &Fleet, ip: Ipv4Addr, command: &str, out: Output) -> anyhow::Result<()> {
    let result = fleet
        .dispatch(ip, command)
        .instrument(spinner::activity("send", &format!("Sending '{command}' to {ip}")))
        .await?;

    if out.json {
        print::json(&result)?;
    } else {
        print_result(&result);
    }

    if !result.success {
        bail!("{command} failed on {ip}");
    }
    Ok(())
}

pub async fn send_all(
    fleet: &Fleet,
    range: &str,
    command: &str,
    mode: DispatchMode,
    out: Output,
) -> anyhow::Result<()> {
    let results = fleet
        .dispatch_all(range, command, mode)
        .instrument(spinner::activity("send-all", &format!("Sending '{command}' to {range}")))
        .await?;

    if out.json {
        print::json(&results)?;
    } else {
        print::header(&format!("{command} on {range}"), out.quiet);
        if results.is_empty() {
            print::no_results("players in this range");
        }
        for result in &results {
            print_result(result);
        }
    }

    if mode == DispatchMode::Detached {
        fleet
            .settle()
            .instrument(spinner::activity("settle", "Waiting for detached sends"))
            .await;
    }

    let failed = results.iter().filter(|r| !r.success).count();
    if !out.json {
        let ok = format!("{} ok", results.len() - failed).bold().green();
        let bad = format!("{failed} failed").bold().red();
        print::fat_separator();
        print::centerln(&format!("{ok}, {bad}"));
    }
    if failed > 0 {
        bail!("{failed} of {} players did not accept '{command}'", results.len());
    }
    Ok(())
}

fn print_result(result: &DispatchResult) {
    print::print_status(format::dispatch_line(result));
    if let Some(output) = &result.output {
        for line in output.lines() {
            print::print(&format!("    {}", line.color(colors::SEPARATOR)));
        }
    }
}

use std::net::Ipv4Addr;

use tracing::Instrument;

use pifleet_core::fleet::Fleet;

use crate::commands::Output;
use crate::terminal::{format, print, spinner};

pub async fn metrics(fleet: &Fleet, ip: Ipv4Addr, out: Output) -> anyhow::Result<()> {
    let info = fleet
        .metrics(ip)
        .instrument(spinner::activity("metrics", &format!("Reading {ip}")))
        .await?;

    if out.json {
        return print::json(&info);
    }
    print::header(&format!("metrics of {ip}"), out.quiet);
    print::as_tree_one_level(&format::info_details(&info));
    Ok(())
}

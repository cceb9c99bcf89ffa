use std::net::Ipv4Addr;

use serde_json::json;
use tracing::Instrument;

use pifleet_core::fleet::Fleet;

use crate::commands::Output;
use crate::terminal::{format, print, spinner};

pub async fn lag(fleet: &Fleet, ip: Ipv4Addr, out: Output) -> anyhow::Result<()> {
    let lag = fleet
        .lag(ip)
        .instrument(spinner::activity("lag", &format!("Pinging master from {ip}")))
        .await?;

    if out.json {
        return print::json(&json!({ "ip": ip, "lag": lag }));
    }
    print::aligned_line(&ip.to_string(), format::lag(Some(&lag)));
    Ok(())
}

use std::net::Ipv4Addr;

use pifleet_common::network::range::Subnet24;
use pifleet_core::fleet::Fleet;

use crate::commands::Output;
use crate::terminal::{format, print};

pub async fn master(fleet: &Fleet, ip: Ipv4Addr, out: Output) -> anyhow::Result<()> {
    let device = fleet.set_master(ip).await?;

    if out.json {
        return print::json(&device);
    }
    print::print_status(format!(
        "{} is now master of {}",
        device.name,
        Subnet24::of(ip)
    ));
    print::as_tree_one_level(&format::device_details(&device));
    Ok(())
}

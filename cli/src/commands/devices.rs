use pifleet_core::fleet::Fleet;

use crate::commands::Output;
use crate::fprint;
use crate::terminal::{format, print};

pub async fn devices(fleet: &Fleet, range: Option<&str>, out: Output) -> anyhow::Result<()> {
    let devices = fleet.devices(range).await?;
    if out.json {
        return print::json(&devices);
    }

    print::header(range.unwrap_or("all players"), out.quiet);
    if devices.is_empty() {
        print::no_results("players");
        return Ok(());
    }

    for (idx, device) in devices.iter().enumerate() {
        print::tree_head(idx, &format::device_title(device));
        if out.quiet < 2 {
            print::as_tree_one_level(&format::device_details(device));
        }
        if idx + 1 != devices.len() {
            fprint!();
        }
    }
    print::end_of_program(out.quiet);
    Ok(())
}

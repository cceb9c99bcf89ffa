use pifleet_core::fleet::Fleet;

use crate::commands::Output;
use crate::terminal::{format, print};

pub async fn register(fleet: &Fleet, name: &str, cidr: &str, out: Output) -> anyhow::Result<()> {
    let setup = fleet.register_setup(name, cidr).await?;
    if out.json {
        return print::json(&setup);
    }
    print::print_status(format::setup_line(&setup));
    Ok(())
}

pub async fn list(fleet: &Fleet, out: Output) -> anyhow::Result<()> {
    let setups = fleet.setups().await?;
    if out.json {
        return print::json(&setups);
    }
    if setups.is_empty() {
        print::no_results("setups");
    }
    for setup in &setups {
        print::print_status(format::setup_line(setup));
    }
    Ok(())
}

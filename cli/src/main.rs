mod commands;
mod terminal;

use commands::{CommandLine, Commands, Output, devices, lag, master, metrics, scan, send, setup};
use pifleet_common::models::dispatch::DispatchMode;
use pifleet_core::fleet::Fleet;
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();
    logging::init(commands.global.verbose, commands.global.quiet);

    let out = Output::from(&commands.global);
    let config = commands.global.load_config()?;
    let fleet = Fleet::open(config).await?;

    match commands.command {
        Commands::Scan { range } => {
            print::header("scanning for players", out.quiet);
            scan::scan(fleet, &range, out).await
        }
        Commands::Send { ip, command } => send::send(&fleet, ip, &command, out).await,
        Commands::SendAll {
            range,
            command,
            detach,
        } => {
            let mode = if detach {
                DispatchMode::Detached
            } else {
                DispatchMode::Wait
            };
            send::send_all(&fleet, &range, &command, mode, out).await
        }
        Commands::RebootSetup { range } => {
            send::send_all(&fleet, &range, "reboot", DispatchMode::Wait, out).await
        }
        Commands::Lag { ip } => lag::lag(&fleet, ip, out).await,
        Commands::Master { ip } => master::master(&fleet, ip, out).await,
        Commands::Metrics { ip } => metrics::metrics(&fleet, ip, out).await,
        Commands::Setup { name, cidr } => setup::register(&fleet, &name, &cidr, out).await,
        Commands::Setups => setup::list(&fleet, out).await,
        Commands::Devices { range } => devices::devices(&fleet, range.as_deref(), out).await,
    }
}

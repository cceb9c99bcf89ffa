pub mod devices;
pub mod lag;
pub mod master;
pub mod metrics;
pub mod scan;
pub mod send;
pub mod setup;

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pifleet_common::config::Config;

#[derive(Parser)]
#[command(name = "pifleet")]
#[command(version, about = "Finds Raspberry Pi players on the network and tells them what to do.")]
pub struct CommandLine {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// TOML configuration file
    #[arg(long, global = true, env = "PIFLEET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Device database, overrides the configuration
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Concurrent scan workers, overrides the configuration
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// More log output (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Less output (-q, -qq)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, conflicts_with = "verbose")]
    pub quiet: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover players in a range and reconcile them with the database
    #[command(alias = "s")]
    Scan {
        /// CIDR block, or the name or slug of a setup
        range: String,
    },
    /// Send a command to one player
    Send {
        ip: Ipv4Addr,
        /// pause, mute, unmute, reboot or show-message:<text>
        command: String,
    },
    /// Send a command to every known player of a range
    SendAll {
        range: String,
        command: String,
        /// Return as soon as the command is sent
        #[arg(long)]
        detach: bool,
    },
    /// Measure a player's latency to the master of its subnet
    Lag { ip: Ipv4Addr },
    /// Make a player the master of its subnet
    Master { ip: Ipv4Addr },
    /// Read a player's telemetry now
    #[command(alias = "m")]
    Metrics { ip: Ipv4Addr },
    /// Create a setup for a range, or rename it
    Setup { name: String, cidr: String },
    /// List known setups
    Setups,
    /// List known players
    #[command(alias = "ls")]
    Devices { range: Option<String> },
    /// Reboot every known player of a range
    RebootSetup { range: String },
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl GlobalArgs {
    /// File and environment first, then whatever was given on the command line.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(db) = &self.db {
            config.database = db.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        Ok(config)
    }
}

/// How results are rendered.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: u8,
}

impl From<&GlobalArgs> for Output {
    fn from(args: &GlobalArgs) -> Self {
        Self {
            json: args.json,
            quiet: args.quiet,
        }
    }
}

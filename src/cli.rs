use std::net::Ipv4Addr;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// Layer-2 ARP discovery and selective gateway-blocking tool.
#[derive(Parser, Debug)]
#[command(name = "arpcage", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Network interface to bind to (e.g. "eth0").
    #[arg(long, global = true)]
    pub interface: Option<String>,

    /// Default gateway IP, if it should not be auto-detected.
    #[arg(long, global = true)]
    pub gateway: Option<Ipv4Addr>,

    /// Output format for all subcommands.
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sweep the bound subnet and print discovered devices.
    Scan(ScanArgs),

    /// Block a single device by MAC address, then exit.
    Block(MacArg),

    /// Unblock a single device by MAC address, then exit.
    Unblock(MacArg),

    /// Scan once, then block/unblock devices interactively while the
    /// periodic spoof loop and live log stream run in the background.
    Watch,
}

#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Also attempt reverse-DNS hostname resolution for discovered devices.
    #[arg(long, default_value_t = false)]
    pub resolve_hostnames: bool,
}

#[derive(clap::Args, Debug)]
pub struct MacArg {
    /// Target device's MAC address, e.g. "aa:bb:cc:dd:ee:ff".
    pub mac: String,
}

mod cli;
mod output;

use std::net::Ipv4Addr;
use std::process::ExitCode;

use clap::Parser;
use ipnetwork::IpNetwork;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use arpcage::{ArpEngine, CoreError, Device, InterfaceBinding};
use cli::{Cli, Command, MacArg, ScanArgs};

#[derive(Debug, Serialize)]
struct DeviceOutput {
    ip: String,
    mac: String,
    hostname: Option<String>,
    is_gateway: bool,
    is_blocked: bool,
}

impl From<Device> for DeviceOutput {
    fn from(d: Device) -> Self {
        Self {
            ip: d.ip.to_string(),
            mac: d.mac.to_string(),
            hostname: d.hostname,
            is_gateway: d.is_gateway,
            is_blocked: d.is_blocked,
        }
    }
}

/// Resolves the `InterfaceBinding` for `interface_name` (or the first
/// non-loopback interface carrying an IPv4 address, if none is given).
/// Mirrors `spec.md` §6: interface selection is a UI concern, not C1-C4's.
fn resolve_binding(
    interface_name: Option<&str>,
    gateway_ip: Ipv4Addr,
) -> Result<InterfaceBinding, CoreError> {
    let interfaces = pnet_datalink::interfaces();

    let interface = match interface_name {
        Some(name) => interfaces
            .into_iter()
            .find(|i| i.name == name)
            .ok_or_else(|| CoreError::NoInterface(name.to_string()))?,
        None => interfaces
            .into_iter()
            .find(|i| {
                !i.is_loopback()
                    && i.mac.is_some()
                    && i.ips.iter().any(|ip| ip.is_ipv4())
            })
            .ok_or_else(|| CoreError::NoInterface("<auto>".to_string()))?,
    };

    let own_mac = interface.mac.ok_or(CoreError::NoMacAddress)?;
    let (own_ip, netmask) = interface
        .ips
        .iter()
        .find_map(|ip| match ip {
            IpNetwork::V4(v4) => Some((v4.ip(), v4.mask())),
            _ => None,
        })
        .ok_or(CoreError::NoIpv4Address)?;

    Ok(InterfaceBinding::new(
        interface.name,
        own_ip,
        own_mac,
        netmask,
        gateway_ip,
    ))
}

async fn run_scan(engine: &ArpEngine, args: ScanArgs) -> Result<serde_json::Value, CoreError> {
    let cancel = CancellationToken::new();
    engine.scan(None, cancel).await;
    if args.resolve_hostnames {
        engine.resolve_hostnames().await;
    }
    let devices: Vec<DeviceOutput> = engine.devices().into_iter().map(DeviceOutput::from).collect();
    Ok(serde_json::json!({ "devices": devices }))
}

async fn run_block(engine: &ArpEngine, args: MacArg) -> Result<serde_json::Value, CoreError> {
    let cancel = CancellationToken::new();
    engine.scan(None, cancel).await;
    let gateway = engine
        .resolve_gateway()
        .await
        .ok_or(CoreError::NoGateway)?;
    let blocking = engine.blocking_engine(gateway)?;
    blocking.start();

    let target = engine
        .devices()
        .into_iter()
        .find(|d| d.mac.to_string().eq_ignore_ascii_case(&args.mac))
        .ok_or_else(|| CoreError::UnknownDevice(args.mac.clone()))?;

    blocking.block(&target)?;
    // Hold the spoof loop open briefly so the first tick lands before exit;
    // `watch` is the subcommand meant for a long-running block.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    blocking.stop().await;

    Ok(serde_json::json!({ "blocked": target.mac.to_string() }))
}

async fn run_unblock(engine: &ArpEngine, args: MacArg) -> Result<serde_json::Value, CoreError> {
    let cancel = CancellationToken::new();
    engine.scan(None, cancel).await;
    let gateway = engine
        .resolve_gateway()
        .await
        .ok_or(CoreError::NoGateway)?;
    let blocking = engine.blocking_engine(gateway)?;

    let target = engine
        .devices()
        .into_iter()
        .find(|d| d.mac.to_string().eq_ignore_ascii_case(&args.mac))
        .ok_or_else(|| CoreError::UnknownDevice(args.mac.clone()))?;

    blocking.unblock(&target).await;
    Ok(serde_json::json!({ "unblocked": target.mac.to_string() }))
}

async fn run_watch(engine: &ArpEngine) -> Result<serde_json::Value, CoreError> {
    let cancel = CancellationToken::new();
    engine.scan(None, cancel).await;
    let gateway = engine
        .resolve_gateway()
        .await
        .ok_or(CoreError::NoGateway)?;
    let blocking = engine.blocking_engine(gateway.clone())?;
    blocking.start();

    let mut log = engine.subscribe();
    eprintln!("watching on {} (gateway {}); Ctrl-C to stop", engine.binding().interface_name, gateway.ip);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = async {
            while let Ok(event) = log.recv().await {
                eprintln!("{} {}", event.timestamp.to_rfc3339(), event.message);
            }
        } => {}
    }

    blocking.stop().await;
    Ok(serde_json::json!({ "status": "stopped" }))
}

async fn dispatch(cli: &Cli) -> Result<serde_json::Value, CoreError> {
    let gateway_ip = cli.gateway.ok_or(CoreError::NoGateway)?;
    let binding = resolve_binding(cli.interface.as_deref(), gateway_ip)?;
    let engine = ArpEngine::new(binding, arpcage::Config::default())?;
    engine.start();

    let result = match &cli.command {
        Command::Scan(args) => {
            run_scan(
                &engine,
                ScanArgs {
                    resolve_hostnames: args.resolve_hostnames,
                },
            )
            .await
        }
        Command::Block(args) => {
            run_block(
                &engine,
                MacArg {
                    mac: args.mac.clone(),
                },
            )
            .await
        }
        Command::Unblock(args) => {
            run_unblock(
                &engine,
                MacArg {
                    mac: args.mac.clone(),
                },
            )
            .await
        }
        Command::Watch => run_watch(&engine).await,
    };

    engine.close().await;
    result
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            output::emit_error(cli.output, 2, &format!("failed to start runtime: {e}"));
            return ExitCode::from(2);
        }
    };

    match runtime.block_on(dispatch(&cli)) {
        Ok(value) => {
            output::emit(cli.output, &value);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = e.exit_code();
            output::emit_error(cli.output, code, &e.to_string());
            ExitCode::from(code)
        }
    }
}

//! Drive the bridge against the simulated stack from the command line.
//!
//! ```text
//! wifi-bridge-sim --role station --ssid home --auto-ip 10.0.0.5 \
//!     --events sta_disconnected,sta_got_ip=10.0.0.7
//! wifi-bridge-sim --role access-point --ssid esp32-ap \
//!     --events ap_sta_connected=aa:bb:cc:11:22:33,raw=42
//! ```

use clap::{Parser, ValueEnum};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use wifi_event_bridge::runtime::{NativeClosure, NativeRuntime};
use wifi_event_bridge::stack::{AccessPointConfig, SimulatedStack};
use wifi_event_bridge::tasks::CooperativeScheduler;
use wifi_event_bridge::types::MacAddress;
use wifi_event_bridge::{AccessPoint, Config, Error, Station, WifiBridge, WifiEvent};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Station,
    AccessPoint,
}

/// Replay a scripted sequence of WiFi lifecycle events through the bridge
#[derive(Parser, Debug)]
#[command(name = "wifi-bridge-sim")]
#[command(version, long_about = None)]
struct Args {
    /// Which role object to create
    #[arg(short, long, value_enum, default_value = "station")]
    role: RoleArg,

    /// JSON config file
    #[arg(short, long, value_name = "FILE", env = "WIFI_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Network name; bring the radio up before replaying events
    #[arg(long)]
    ssid: Option<String>,

    #[arg(long, default_value = "")]
    password: String,

    /// Answer station connect requests with this address
    #[arg(long, value_name = "IP")]
    auto_ip: Option<Ipv4Addr>,

    /// Comma-separated events, `name` or `name=arg`; `raw=ID` posts an unnamed id
    #[arg(short, long, value_delimiter = ',')]
    events: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    wifi_event_bridge::observability::init_tracing_with(&config.observability);

    let script = args
        .events
        .iter()
        .map(|step| parse_step(step))
        .collect::<wifi_event_bridge::Result<Vec<_>>>()?;

    let stack = Arc::new(match args.auto_ip {
        Some(ip) => SimulatedStack::with_auto_address(ip)?,
        None => SimulatedStack::new()?,
    });
    let scheduler = Arc::new(CooperativeScheduler::new());
    let runtime = Arc::new(NativeRuntime::new());
    let bridge = WifiBridge::with_config(stack.clone(), scheduler, runtime.clone(), config);

    let connected = match args.role {
        RoleArg::Station => {
            let mut station = Station::new(&bridge)?;
            station
                .on_connected(Some(printer("on_connected")))
                .on_disconnected(Some(printer("on_disconnected")));
            if let Some(ssid) = &args.ssid {
                station.connect(ssid, &args.password)?;
            }
            replay(&stack, &script)?;
            station.is_connected()
        }
        RoleArg::AccessPoint => {
            let mut ap = AccessPoint::new(&bridge)?;
            ap.on_station_joined(Some(printer("on_station_joined")))
                .on_station_left(Some(printer("on_station_left")));
            if let Some(ssid) = &args.ssid {
                let mut ap_config = AccessPointConfig::new(ssid);
                ap_config.password = args.password.clone();
                ap.start(ap_config)?;
            }
            replay(&stack, &script)?;
            bridge.readiness().is_set()
        }
    };

    let runtime_stats = runtime.stats();
    let report = serde_json::json!({
        "connected": connected,
        "dispatch": bridge.dispatcher().stats(),
        "stack": stack.stats(),
        "runtime": {
            "calls": runtime_stats.calls,
            "peak_allocations": runtime_stats.peak_allocations,
            "reported_errors": runtime_stats.reported_errors,
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    stack.shutdown();
    Ok(())
}

fn replay(stack: &SimulatedStack, script: &[WifiEvent]) -> wifi_event_bridge::Result<()> {
    for event in script {
        stack.post(*event)?;
    }
    stack.flush()
}

fn printer(slot: &'static str) -> NativeClosure {
    NativeClosure::new(slot, move |args| {
        println!("{}({})", slot, args.join(", "));
        Ok(())
    })
}

fn parse_step(step: &str) -> wifi_event_bridge::Result<WifiEvent> {
    let (name, arg) = match step.split_once('=') {
        Some((name, arg)) => (name.trim(), Some(arg.trim())),
        None => (step.trim(), None),
    };
    let ip = || -> wifi_event_bridge::Result<Ipv4Addr> {
        arg.ok_or_else(|| Error::validation(format!("{} needs an address", name)))?
            .parse()
            .map_err(|e| Error::validation(format!("{}: {}", name, e)))
    };
    let mac = || -> wifi_event_bridge::Result<MacAddress> {
        arg.ok_or_else(|| Error::validation(format!("{} needs a MAC", name)))?
            .parse()
            .map_err(|e: &str| Error::validation(format!("{}: {}", name, e)))
    };

    let event = match name {
        "wifi_ready" => WifiEvent::WifiReady,
        "scan_done" => WifiEvent::ScanDone,
        "sta_start" => WifiEvent::StationStart,
        "sta_stop" => WifiEvent::StationStop,
        "sta_connected" => WifiEvent::StationConnected,
        "sta_disconnected" => WifiEvent::StationDisconnected,
        "sta_got_ip" => WifiEvent::StationGotIp { ip: ip()? },
        "sta_lost_ip" => WifiEvent::StationLostIp,
        "ap_start" => WifiEvent::ApStart,
        "ap_stop" => WifiEvent::ApStop,
        "ap_sta_connected" => WifiEvent::ApStationConnected { mac: mac()? },
        "ap_sta_disconnected" => WifiEvent::ApStationDisconnected { mac: mac()? },
        "ap_sta_ip_assigned" => WifiEvent::ApStationIpAssigned { ip: ip()? },
        "ap_probe_request" => WifiEvent::ApProbeRequest,
        "raw" => {
            let id = arg
                .ok_or_else(|| Error::validation("raw needs an event id"))?
                .parse()
                .map_err(|e| Error::validation(format!("raw: {}", e)))?;
            WifiEvent::from_raw(id, Default::default())
        }
        other => return Err(Error::validation(format!("unknown event '{}'", other))),
    };
    Ok(event)
}

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

mod api;
mod app;
mod config;
mod framing;
mod prefs;
mod protocol;
mod transport;
mod ws;

use api::DeviceClient;
use app::Console;
use config::DeviceEndpoint;
use prefs::{FilePrefs, MemPrefs, PrefStore};
use protocol::ConnectRequest;
use transport::{RetryPolicy, SerialStream};
use ws::WsDialer;

#[derive(Parser)]
#[command(name = "wifimon", version, about = "Serial monitor and WiFi setup for ModernWifi devices")]
struct Cli {
    /// Device address, e.g. 192.168.4.1 or https://device.local
    #[arg(
        long,
        global = true,
        env = "WIFIMON_DEVICE",
        default_value = config::DEFAULT_DEVICE_URL
    )]
    device: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Attach the interactive serial monitor
    Monitor {
        /// Baud rate to request from the device
        #[arg(long)]
        baud: Option<u32>,

        /// Prefix every line with the local time
        #[arg(long)]
        timestamps: bool,

        /// Reconnect attempts before giving up
        #[arg(long, default_value_t = 5)]
        retry_limit: u32,

        /// Seconds between reconnect attempts
        #[arg(long, default_value_t = 5)]
        retry_delay: u64,

        /// Preference file (defaults to the user config dir)
        #[arg(long)]
        prefs: Option<PathBuf>,

        /// Keep settings and history in memory only
        #[arg(long, conflicts_with = "prefs")]
        no_prefs: bool,
    },
    /// Show the device's connection status
    Status,
    /// Show the portal's custom parameters
    Params,
    /// Scan for nearby networks
    Scan,
    /// Submit WiFi credentials to the device
    Connect {
        ssid: String,

        #[arg(long, default_value = "")]
        password: String,

        /// Extra portal parameter, as key=value; repeatable
        #[arg(long = "param", value_parser = parse_kv)]
        params: Vec<(String, String)>,
    },
    /// Clear the device's stored WiFi settings
    Reset,
}

fn parse_kv(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

fn prefs_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wifimon")
        .join("prefs.json")
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let endpoint = DeviceEndpoint::new(&cli.device)?;

    match cli.command {
        Command::Monitor {
            baud,
            timestamps,
            retry_limit,
            retry_delay,
            prefs,
            no_prefs,
        } => {
            let prefs: Box<dyn PrefStore> = if no_prefs {
                Box::new(MemPrefs::default())
            } else {
                Box::new(FilePrefs::load(prefs.unwrap_or_else(prefs_path)))
            };
            let mut console = Console::new(prefs);
            if let Some(baud) = baud {
                console.set_baud_rate(baud);
            }
            if timestamps {
                console.set_timestamps(true);
            }

            let policy = RetryPolicy {
                max_attempts: retry_limit,
                retry_delay: Duration::from_secs(retry_delay),
            };
            let url = endpoint.serial_ws_url();
            console
                .run(move |handler| SerialStream::open(WsDialer::new(url.clone()), policy, handler))
                .await
        }
        Command::Status => {
            let status = DeviceClient::new(endpoint)?.status().await?;
            println!("status: {}", status.status);
            println!("ip:     {}", status.ip);
            for param in &status.params {
                println!("{}: {}", param.label, param.value);
            }
            Ok(())
        }
        Command::Params => {
            let params = DeviceClient::new(endpoint)?.params().await?;
            if params.is_empty() {
                println!("no custom parameters");
                return Ok(());
            }
            for param in &params {
                println!("{:24} {}", param.label, param.value);
            }
            Ok(())
        }
        Command::Scan => {
            let networks = DeviceClient::new(endpoint)?.scan().await?;
            if networks.is_empty() {
                println!("no networks found");
                return Ok(());
            }
            for net in &networks {
                println!(
                    "{:32} {:>4} dBm  [{:<4}] {}",
                    net.ssid,
                    net.rssi,
                    "#".repeat(net.signal_level() as usize),
                    if net.is_open() { "open" } else { "secured" },
                );
            }
            Ok(())
        }
        Command::Connect {
            ssid,
            password,
            params,
        } => {
            let req = ConnectRequest {
                ssid: ssid.clone(),
                password,
                extra: params.into_iter().collect(),
            };
            let result = DeviceClient::new(endpoint)?.connect(&req).await?;
            if result.connected() {
                println!("connected to {}", ssid);
                Ok(())
            } else {
                anyhow::bail!("device reports: {}", result.result)
            }
        }
        Command::Reset => {
            let result = DeviceClient::new(endpoint)?.reset().await?;
            println!("{}", result.result);
            Ok(())
        }
    }
}

//! `fabric-pulse` command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::debug;

use fabric_pulse::tools::{self, PingOptions};
use fabric_pulse::{
    BaselineStore, Console, ExitPolicy, FleetConnector, HostKeyVerification, InventorySource,
    Pulse, PulseOptions, RunStatus, SessionConfig, StagingArea, TransportKind,
};

/// Arista fabric health dashboard and configuration drift warden
#[derive(Parser)]
#[command(name = "fabric-pulse")]
#[command(version)]
struct Cli {
    /// Path to the Ansible inventory (a .json file is read as rendered output)
    #[arg(long, global = true, default_value = "inventory/inventory.yml")]
    inventory: PathBuf,

    /// Device username
    #[arg(long, global = true, env = "FABRIC_PULSE_USERNAME", default_value = "admin")]
    username: String,

    /// Device password
    #[arg(
        long,
        global = true,
        env = "FABRIC_PULSE_PASSWORD",
        default_value = "admin",
        hide_env_values = true
    )]
    password: String,

    /// Session transport
    #[arg(long, global = true, value_enum, default_value_t = Transport::Https)]
    transport: Transport,

    /// Port (defaults to 443 for https, 80 for http, 22 for ssh)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    /// Network timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    /// Devices contacted at once
    #[arg(long, global = true, default_value_t = 8)]
    concurrency: usize,

    /// SSH host key checking
    #[arg(long, global = true, value_enum, default_value_t = HostKeys::AcceptNew)]
    host_key_checking: HostKeys,

    /// known_hosts file for SSH (defaults to ~/.ssh/known_hosts)
    #[arg(long, global = true)]
    known_hosts: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Health dashboard, then drift detection and optional restore
    Pulse {
        /// Inventory group
        #[arg(long, default_value = "FABRIC")]
        group: String,

        /// Directory of golden configs (<name>.cfg)
        #[arg(long, default_value = "build/configs")]
        golden_dir: PathBuf,

        /// Root of the per-device flash directories
        #[arg(long, default_value = "clab-dc1_fabric")]
        flash_dir: PathBuf,

        /// Refresh the dashboard until Ctrl+C before checking drift
        #[arg(long)]
        watch: bool,

        /// Refresh interval in seconds for --watch
        #[arg(long, default_value = "3", value_parser = parse_interval)]
        interval: Duration,

        /// Report drift without offering a restore
        #[arg(long)]
        no_restore: bool,

        /// Max diff lines shown per device
        #[arg(long, default_value_t = 120)]
        max_diff_lines: usize,

        /// Restore without asking
        #[arg(long)]
        yes: bool,

        /// Exit non-zero when a device's drift state is unknown
        #[arg(long)]
        fail_on_unknown: bool,
    },

    /// Hostname and EOS version of every device
    Inventory {
        /// Inventory group
        #[arg(long, default_value = "FABRIC")]
        group: String,
    },

    /// Ping all Loopback0 addresses between leaves
    PingLoopbacks {
        /// Inventory group with leaf devices
        #[arg(long, default_value = "DC1_L3_LEAVES")]
        group: String,

        /// Ping repeat count
        #[arg(long, default_value_t = 3)]
        repeat: u32,

        /// Ping timeout in seconds
        #[arg(long, default_value_t = 2)]
        ping_timeout: u32,
    },

    /// Run 'show vlan brief' on all leaves
    Vlans {
        /// Inventory group with leaf devices
        #[arg(long, default_value = "DC1_L3_LEAVES")]
        group: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    Http,
    Https,
    Ssh,
}

impl From<Transport> for TransportKind {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Http => Self::Http,
            Transport::Https => Self::Https,
            Transport::Ssh => Self::Ssh,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum HostKeys {
    Strict,
    AcceptNew,
    Disabled,
}

impl From<HostKeys> for HostKeyVerification {
    fn from(mode: HostKeys) -> Self {
        match mode {
            HostKeys::Strict => Self::Strict,
            HostKeys::AcceptNew => Self::AcceptNew,
            HostKeys::Disabled => Self::Disabled,
        }
    }
}

/// Seconds as a float, at least 0.1.
fn parse_interval(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|e| format!("invalid number '{value}': {e}"))?;
    let interval = Duration::try_from_secs_f64(seconds).map_err(|e| e.to_string())?;
    if interval < MIN_INTERVAL {
        return Err(format!("interval must be at least {}s", MIN_INTERVAL.as_secs_f64()));
    }
    Ok(interval)
}

const MIN_INTERVAL: Duration = Duration::from_millis(100);

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn session_config(cli: &Cli) -> SessionConfig {
    let transport = TransportKind::from(cli.transport);
    let mut config = SessionConfig::new(transport, cli.username.as_str(), cli.password.as_str())
        .with_port(cli.port.unwrap_or(transport.default_port()))
        .with_timeout(Duration::from_secs(cli.timeout.max(1)))
        .with_insecure(cli.insecure)
        .with_host_key_verification(cli.host_key_checking.into());
    if let Some(path) = &cli.known_hosts {
        config = config.with_known_hosts(path);
    }
    debug!("{} sessions on port {}", config.transport, config.port);
    config
}

async fn dispatch(cli: Cli) -> fabric_pulse::Result<RunStatus> {
    let connector = FleetConnector::new(session_config(&cli))?;
    let source = InventorySource::from_path(&cli.inventory);
    let mut console = Console::stdio(!cli.no_color);
    let concurrency = cli.concurrency.max(1);

    let status = match cli.command {
        Command::Pulse {
            group,
            golden_dir,
            flash_dir,
            watch,
            interval,
            no_restore,
            max_diff_lines,
            yes,
            fail_on_unknown,
        } => {
            let options = PulseOptions {
                group,
                watch,
                interval,
                restore: !no_restore,
                assume_yes: yes,
                max_diff_lines,
                concurrency,
                exit_policy: ExitPolicy {
                    unknown_fails: fail_on_unknown,
                },
            };
            Pulse::new(
                &connector,
                BaselineStore::new(golden_dir),
                StagingArea::new(flash_dir),
                options,
            )
            .run(&mut console, &source)
            .await?
        }
        Command::Inventory { group } => {
            tools::inventory_check(&connector, &mut console, &source, &group, concurrency).await?
        }
        Command::PingLoopbacks {
            group,
            repeat,
            ping_timeout,
        } => {
            let options = PingOptions {
                repeat,
                timeout: ping_timeout,
                concurrency,
            };
            tools::ping_loopbacks(&connector, &mut console, &source, &group, options).await?
        }
        Command::Vlans { group } => {
            tools::vlan_brief(&connector, &mut console, &source, &group, concurrency).await?
        }
    };

    console.flush()?;
    Ok(status)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli).await {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("fabric-pulse: {e}");
            RunStatus::SetupFailure.into()
        }
    }
}

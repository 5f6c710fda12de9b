//! HomeButtons connectivity daemon
//!
//! Runs the connectivity manager on a host against a real broker.

use clap::{Parser, Subcommand};
use homebuttons_net::clock::SystemClock;
use homebuttons_net::config::PanelConfig;
use homebuttons_net::connectivity::{Command, ConnectivityManager, ConnectivityState, Phase};
use homebuttons_net::net_span;
use homebuttons_net::observability::{init_default_logging, init_logging, LogFormat};
use homebuttons_net::store::FileStore;
use homebuttons_net::topics::{ButtonAction, TopicBuilder, PRESS_PAYLOAD};
use homebuttons_net::transport::{HostLink, MqttSession};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Level};

type HostManager = ConnectivityManager<HostLink, MqttSession, FileStore, SystemClock>;

/// HomeButtons panel connectivity
#[derive(Parser)]
#[command(name = "homebuttons-net")]
#[command(about = "Wi-Fi and MQTT connectivity manager for a HomeButtons panel")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stay connected and log commands addressed to the panel
    Run,
    /// Connect, report one button press and disconnect
    Press {
        /// Button number, 1-6
        #[arg(short, long)]
        button: u8,
        /// single, double, triple or quad
        #[arg(short, long, default_value = "single")]
        action: ButtonAction,
    },
    /// Disconnect and erase stored link credentials and the fast path
    Forget,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.verbose {
        0 => init_default_logging(),
        1 => init_logging(Level::DEBUG, LogFormat::Compact, false),
        _ => init_logging(Level::TRACE, LogFormat::Compact, true),
    }

    info!("Starting homebuttons-net v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_panel(config),
        Commands::Press { button, action } => press_button(config, button, action),
        Commands::Forget => forget_network(config),
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<PanelConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(PanelConfig::load_from_file(path)?);
    }

    for path_str in ["homebuttons.toml", "config/homebuttons.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(PanelConfig::load_from_file(&path)?);
        }
    }

    Err("No configuration file found. Provide one with -c/--config or create homebuttons.toml".into())
}

/// Bootstrap: assemble the manager with host adapters
fn build_manager(config: &PanelConfig) -> Result<HostManager, Box<dyn std::error::Error>> {
    let link = HostLink::from_config(config)?;
    let session = MqttSession::new(config.timing.session_poll_timeout());
    let store = FileStore::open(&config.storage.state_file, config.broker()?)?;

    Ok(ConnectivityManager::new(
        link,
        session,
        store,
        SystemClock,
        config.timing,
    ))
}

fn install_shutdown_flag() -> Result<Arc<AtomicBool>, Box<dyn std::error::Error>> {
    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&flag))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&flag))?;
    Ok(flag)
}

/// Tick until `done` holds, the deadline passes or a shutdown is requested.
/// Returns whether `done` was reached.
fn drive_until(
    manager: &mut HostManager,
    deadline: Duration,
    shutdown: Option<&AtomicBool>,
    done: impl Fn(&HostManager) -> bool,
) -> bool {
    let started = Instant::now();
    let tick_interval = manager.policy().tick_interval();

    while started.elapsed() < deadline {
        manager.tick();
        if done(manager) {
            return true;
        }
        if shutdown.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return false;
        }
        std::thread::sleep(tick_interval);
    }
    false
}

fn is_fully_disconnected(manager: &HostManager) -> bool {
    manager.phase() == Phase::Idle
        && manager.state() == ConnectivityState::Disconnected
        && manager.pending_command() == Command::None
}

/// Disconnect and wait for teardown to finish
fn shut_down(manager: &mut HostManager, erase: bool) {
    manager.disconnect(erase);
    // Drain plus forced teardown, with slack for the last ticks
    let budget = manager.policy().drain_timeout() * 4 + Duration::from_secs(1);
    if !drive_until(manager, budget, None, is_fully_disconnected) {
        warn!(phase = %manager.phase(), "Teardown did not finish in time");
    }
}

fn run_panel(config: PanelConfig) -> Result<(), Box<dyn std::error::Error>> {
    let _span = net_span!(device = %config.device.id).entered();
    info!("Panel starting");
    let shutdown = install_shutdown_flag()?;
    let topics = TopicBuilder::new(&config.mqtt.base_topic, &config.device.name);
    let mut manager = build_manager(&config)?;

    let cmd_filter = topics.cmd_filter();
    manager.on_connected(move |session| {
        if let Err(e) = session.subscribe(&cmd_filter) {
            warn!(error = %e, "Command subscription failed");
        }
    });
    let command_topics = topics.clone();
    manager.on_message(move |topic, payload| match command_topics.command_name(topic) {
        Some(command) => info!(command, payload, "Command received"),
        None => info!(topic, payload, "Message received"),
    });

    manager.connect();
    info!("Panel running, waiting for commands...");

    let tick_interval = config.timing.tick_interval();
    while !shutdown.load(Ordering::Relaxed) {
        manager.tick();
        std::thread::sleep(tick_interval);
    }

    info!("Received shutdown signal, disconnecting...");
    shut_down(&mut manager, false);
    Ok(())
}

fn press_button(
    config: PanelConfig,
    button: u8,
    action: ButtonAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let topics = TopicBuilder::new(&config.mqtt.base_topic, &config.device.name);
    let topic = topics.button(button, action)?;
    let shutdown = install_shutdown_flag()?;
    let mut manager = build_manager(&config)?;

    manager.connect();
    let timing = &config.timing;
    let budget = timing.fast_link_timeout()
        + timing.normal_link_timeout() * 2
        + timing.session_timeout() * 2;
    let connected = drive_until(&mut manager, budget, Some(&shutdown), |m| {
        m.state() == ConnectivityState::SessionUp
    });

    let result: Result<(), Box<dyn std::error::Error>> = if connected {
        info!(
            connect_ms = manager.connect_duration().map(|d| d.as_millis() as u64),
            "Connected, reporting press"
        );
        manager
            .publish(&topic, PRESS_PAYLOAD, false)
            .map_err(Into::into)
    } else {
        let reason = manager
            .last_failure()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "interrupted".to_string());
        Err(format!("not connected within {}s: {reason}", budget.as_secs()).into())
    };

    shut_down(&mut manager, false);
    result
}

fn forget_network(config: PanelConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut manager = build_manager(&config)?;
    shut_down(&mut manager, true);
    info!("Stored link credentials and fast path erased");
    Ok(())
}

fn handle_config_command(
    config: PanelConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}

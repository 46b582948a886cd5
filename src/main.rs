mod acu;
mod astro;
mod attribute;
mod config;
mod console;
mod telescope;
mod web;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;

use crate::acu::SimulatedAcu;
use crate::attribute::TelemetryEvent;
use crate::config::{Config, HardwareConfig};
use crate::telescope::Telescope;
use crate::web::AppState;

#[derive(Parser)]
#[command(name = "antenna-tcs")]
#[command(about = "Control computer for an ACU-driven antenna")]
struct Cli {
    /// Log at debug level, including every ACU frame
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Log errors only
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Do not read commands from stdin
        #[arg(long)]
        no_console: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Serve the ACU protocol from a simulated mount
    Simulate {
        #[arg(long, default_value = "127.0.0.1:4001")]
        bind: String,
        /// Degrees per second; jumps to the target when omitted
        #[arg(long)]
        slew_rate: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run { config, no_console } => run(&config, !no_console).await,
        Commands::Validate { config } => validate(&config),
        Commands::Simulate { bind, slew_rate } => simulate(&bind, slew_rate).await,
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else if quiet {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn validate(path: &Path) -> ExitCode {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let pointing = match config.pointing_model() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error loading pointing model: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Configuration is valid");
    if let Ok(site) = config.site() {
        println!(
            "  site: {} lon {:.6} lat {:.6} h {:.1} m",
            config.site.name.as_deref().unwrap_or("unnamed"),
            site.longitude_deg,
            site.latitude_deg,
            site.height_m
        );
    }
    match &config.hardware {
        HardwareConfig::Acu {
            host,
            port,
            timeout,
        } => println!(
            "  hardware: acu at {}:{} (timeout {})",
            host,
            port,
            humantime::format_duration(*timeout)
        ),
        HardwareConfig::Simulated { slew_rate_deg_s } => match slew_rate_deg_s {
            Some(rate) => println!("  hardware: simulated, {} deg/s", rate),
            None => println!("  hardware: simulated, instant"),
        },
    }
    println!(
        "  control: tick {}, elevation floor {} deg",
        humantime::format_duration(config.control.tick),
        config.control.elevation_floor_deg
    );
    println!("  pointing: {}", pointing.describe());
    match &config.web {
        Some(web) => println!("  web: {} ({} API keys)", web.bind, web.api_keys.len()),
        None => println!("  web: disabled"),
    }
    ExitCode::SUCCESS
}

async fn run(path: &Path, console_enabled: bool) -> ExitCode {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut telescope = match Telescope::from_config(&config).await {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error creating controller: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match telescope.initialize().await {
        Ok(status) => log::info!("Controller initialized in {}", status),
        Err(e) => {
            log::error!("Initialization failed: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let events = telescope.subscribe().await;
    tokio::spawn(log_telemetry(events, config.telemetry.log_updates));

    let config = Arc::new(config);
    let telescope = Arc::new(Mutex::new(telescope));

    if let Some(web) = config.web.clone() {
        let state = AppState {
            config: config.clone(),
            telescope: telescope.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = web::run_server(&web.bind, state).await {
                log::error!("Web server failed: {}", e);
            }
        });
    }

    let console = async {
        if console_enabled {
            console::run(telescope.clone()).await
        } else {
            std::future::pending::<std::io::Result<()>>().await
        }
    };
    tokio::select! {
        result = console => {
            if let Err(e) = result {
                log::error!("Console failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => log::info!("Interrupted"),
    }

    match telescope.lock().await.shutdown().await {
        Ok(status) => log::info!("Controller stopped in {}", status),
        Err(e) => log::warn!("Shutdown failed: {}", e),
    }
    ExitCode::SUCCESS
}

async fn log_telemetry(mut events: broadcast::Receiver<TelemetryEvent>, log_updates: bool) {
    loop {
        match events.recv().await {
            Ok(event) if log_updates => log::info!("{} = {}", event.key, event.value),
            Ok(event) => log::debug!("{} = {}", event.key, event.value),
            Err(RecvError::Lagged(n)) => log::warn!("Telemetry log skipped {} updates", n),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn simulate(bind: &str, slew_rate: Option<f64>) -> ExitCode {
    let listener = match TcpListener::bind(bind).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Cannot bind {}: {}", bind, e);
            return ExitCode::FAILURE;
        }
    };
    match acu::serve(listener, SimulatedAcu::new(slew_rate)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Simulator failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

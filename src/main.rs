//! THR30II pedalboard companion.
//!
//! Mirrors a Yamaha THR-II desktop amplifier over USB MIDI: activates
//! library patches, streams edits live and writes user memory slots.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thr30ii_pedal::config::{self, AppConfig};
use thr30ii_pedal::console::{self, ConsoleCommand};
use thr30ii_pedal::engine::Engine;
use thr30ii_pedal::midi::MidiConnection;
use thr30ii_pedal::monitor;
use thr30ii_pedal::patchlib::LibraryWatcher;
use thr30ii_pedal::protocol::serialize::PatchTarget;

/// THR30II pedalboard - patch switching and live control for Yamaha THR-II amps
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (./config.yaml or the user data dir when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Print classified amp traffic without driving the amp
    #[arg(long)]
    monitor: bool,

    /// Keep edits local instead of streaming them while editing
    #[arg(long)]
    no_send: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("Starting THR30II pedalboard...");

    // Handle list ports
    if args.list_ports {
        return monitor::list_ports();
    }

    let config_path = args.config.unwrap_or_else(config::default_location);
    let mut config = AppConfig::load_or_default(&config_path.to_string_lossy()).await?;
    info!("Configuration file: {}", config_path.display());

    if args.no_send {
        config.behavior.immediate_send = false;
    }

    // Handle monitor mode
    if args.monitor {
        return monitor::run_monitor(&config.midi.port_match).await;
    }

    run_app(config, shutdown_signal()).await?;

    info!("Pedalboard shutdown complete");
    Ok(())
}

async fn run_app(config: AppConfig, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
    // Patch library with hot reload
    let (mut library_watcher, library) = LibraryWatcher::new(&config.patches.dir).await?;
    info!("Patch library loaded: {} patches", library.len());

    // Amp connection
    let mut midi = MidiConnection::new(&config.midi.port_match);
    midi.connect()?;

    let mut chunk_rx = midi
        .take_chunk_receiver()
        .ok_or_else(|| anyhow::anyhow!("Chunk receiver already taken"))?;
    let transport = midi.sender()?;

    let mut engine = Engine::new(Box::new(transport), library, config.behavior.immediate_send);
    engine
        .start_handshake()
        .context("queueing the handshake")?;

    // Console input
    let (command_tx, mut command_rx) = mpsc::channel::<ConsoleCommand>(32);
    console::spawn(command_tx);

    let mut tick =
        tokio::time::interval(std::time::Duration::from_millis(config.behavior.tick_ms));

    // Main event loop
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // One inbound message and one outbound transition per tick
            _ = tick.tick() => {
                if let Err(e) = engine.work_cycle() {
                    warn!("Work cycle failed: {e:#}");
                }
            }

            // Raw SysEx chunks from the amp
            Some(chunk) = chunk_rx.recv() => {
                engine.feed_chunk(&chunk);
            }

            // Console commands
            Some(command) = command_rx.recv() => {
                if dispatch(&mut engine, command) {
                    break;
                }
            }

            // Handle patch directory changes
            Some(library) = library_watcher.next_library() => {
                info!("Patch library reloaded: {} patches", library.len());
                engine.set_library(library);
            }

            // Handle shutdown signal
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    midi.disconnect();

    Ok(())
}

/// Apply one console command to the engine. Returns true on quit.
fn dispatch(engine: &mut Engine, command: ConsoleCommand) -> bool {
    match command {
        ConsoleCommand::Quit => return true,
        ConsoleCommand::Help => console::print_help(),
        ConsoleCommand::ShowStatus => console::print_status(&engine.status()),
        ConsoleCommand::ListPatches => {
            console::print_patches(engine.library(), engine.active_patch())
        }
        ConsoleCommand::ActivatePatch(id) => report(engine.activate_patch(id)),
        ConsoleCommand::Deactivate => report(engine.deactivate_patch()),
        ConsoleCommand::SaveSlot(slot) => report(engine.save_to_slot(slot)),
        ConsoleCommand::RequestDump => report(engine.request_dump().map_err(Into::into)),
        ConsoleCommand::Restart => report(engine.start_handshake().map_err(Into::into)),
        ConsoleCommand::PushPatch => engine.settings_mut().create_patch(PatchTarget::Active),
        ConsoleCommand::SetControl(control, value) => {
            engine.settings_mut().set_control(control, value)
        }
        ConsoleCommand::SelectAmp(collection, model) => {
            engine.settings_mut().set_collection_amp(collection, model)
        }
        ConsoleCommand::SelectCabinet(cab) => engine.settings_mut().set_cabinet(cab),
        ConsoleCommand::SwitchUnit(unit, on) => engine.settings_mut().switch_unit(unit, on),
        ConsoleCommand::SelectEffect(ty) => engine.settings_mut().set_effect_type(ty),
        ConsoleCommand::SetEffect(param, value) => {
            let ty = engine.settings().effect.active;
            engine.settings_mut().set_effect_param(ty, param, value);
        }
        ConsoleCommand::SelectEcho(ty) => engine.settings_mut().set_echo_type(ty),
        ConsoleCommand::SetEcho(param, value) => {
            let ty = engine.settings().echo.active;
            engine.settings_mut().set_echo_param(ty, param, value);
        }
        ConsoleCommand::SelectReverb(ty) => engine.settings_mut().set_reverb_type(ty),
        ConsoleCommand::SetReverb(param, value) => {
            let ty = engine.settings().reverb.active;
            engine.settings_mut().set_reverb_param(ty, param, value);
        }
        ConsoleCommand::SetCompressor(param, value) => {
            engine.settings_mut().set_compressor_param(param, value)
        }
        ConsoleCommand::SetGate(param, value) => engine.settings_mut().set_gate_param(param, value),
        ConsoleCommand::Boost(true) => engine.settings_mut().apply_gain_boost(),
        ConsoleCommand::Boost(false) => engine.settings_mut().remove_gain_boost(),
        ConsoleCommand::Rename(name) => engine.settings_mut().set_patch_name(&name, 0),
    }
    false
}

fn report(result: Result<()>) {
    if let Err(e) = result {
        println!("{}", e.to_string().red());
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}

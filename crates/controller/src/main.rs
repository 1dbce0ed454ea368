//! mesh-ctl
//!
//! Command-line front end for the Bluetooth-mesh controller dongle. Each
//! subcommand sends one command; `listen` streams events until Ctrl+C.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use common::{EventStream, setup_logging};
use mesh_controller::{AutoResponder, Controller, ControllerConfig, ListenSettings, load_config};
use protocol::{
    Address, AppKeyIndex, Command, DeviceUuid, SceneNumber, SceneOp, StateValue, dispatch_event,
};
use std::path::PathBuf;
use tokio::signal;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "mesh-ctl")]
#[command(
    author,
    version,
    about = "Drive a Bluetooth-mesh controller dongle over USB"
)]
#[command(long_about = "
Sends mesh commands to a USB Bluetooth-mesh controller dongle and prints the
events it reports.

EXAMPLES:
    # Create a network and stream events, configuring nodes as they join
    mesh-ctl setup
    mesh-ctl listen --auto-setup --auto-provision

    # Turn node 0x000a on, using app key 0
    mesh-ctl send 1 0x000a

    # Recall scene 3 on group 0xc000
    mesh-ctl scene recall 3 0xc000

    # Wipe the dongle
    mesh-ctl reset && mesh-ctl reboot

CONFIGURATION:
    The tool looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/mesh-controller/controller.toml
    3. /etc/mesh-controller/controller.toml
    4. Built-in defaults

Numbers may be given in decimal or as 0x-prefixed hex.
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Create a new mesh network
    Setup,

    /// Generate an application key
    AddKey {
        /// App key slot
        #[arg(default_value = "0")]
        app_idx: AppKeyIndex,
    },

    /// Provision an unprovisioned device
    Provision {
        /// Device UUID as 32 hex digits (dashes allowed)
        uuid: DeviceUuid,
    },

    /// Bind an app key to a provisioned node
    ConfigureNode {
        addr: Address,
        #[arg(long, default_value = "0")]
        app_idx: AppKeyIndex,
    },

    /// Subscribe a node element to a group address
    ConfigureElement {
        group_addr: Address,
        node_addr: Address,
        elem_addr: Address,
        #[arg(long, default_value = "0")]
        app_idx: AppKeyIndex,
    },

    /// Send a state value to a node or group
    Send {
        state: StateValue,
        addr: Address,
        #[arg(long, default_value = "0")]
        app_idx: AppKeyIndex,
    },

    /// Recall, store, delete or bind a scene
    Scene {
        #[arg(value_enum)]
        action: SceneAction,
        scene: SceneNumber,
        addr: Address,
        #[arg(long, default_value = "0")]
        app_idx: AppKeyIndex,
    },

    /// Remove a node from the network
    ResetNode { addr: Address },

    /// Erase all mesh data from the dongle (reboot afterwards)
    Reset,

    /// Reboot the dongle
    Reboot,

    /// Print events until Ctrl+C
    Listen {
        /// One JSON object per line instead of text
        #[arg(long)]
        json: bool,

        /// Add an app key after setup and configure every node that joins
        #[arg(long)]
        auto_setup: bool,

        /// Provision every device that sends an unprovisioned beacon
        #[arg(long)]
        auto_provision: bool,
    },

    /// Write the default configuration and exit
    SaveConfig {
        /// Destination (defaults to the per-user config path)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SceneAction {
    Recall,
    Store,
    Delete,
    Bind,
}

impl From<SceneAction> for SceneOp {
    fn from(action: SceneAction) -> Self {
        match action {
            SceneAction::Recall => SceneOp::Recall,
            SceneAction::Store => SceneOp::Store,
            SceneAction::Delete => SceneOp::Delete,
            SceneAction::Bind => SceneOp::Bind,
        }
    }
}

impl CliCommand {
    /// The single mesh command this subcommand sends, if any
    fn to_command(&self) -> Option<Command> {
        let command = match *self {
            CliCommand::Setup => Command::Setup,
            CliCommand::AddKey { app_idx } => Command::AddKey { app_idx },
            CliCommand::Provision { uuid } => Command::Provision { uuid },
            CliCommand::ConfigureNode { addr, app_idx } => Command::ConfigureNode { addr, app_idx },
            CliCommand::ConfigureElement {
                group_addr,
                node_addr,
                elem_addr,
                app_idx,
            } => Command::ConfigureElement {
                group_addr,
                node_addr,
                elem_addr,
                app_idx,
            },
            CliCommand::Send {
                state,
                addr,
                app_idx,
            } => Command::SendMessage {
                state,
                addr,
                app_idx,
            },
            CliCommand::Scene {
                action,
                scene,
                addr,
                app_idx,
            } => Command::Scene {
                op: action.into(),
                scene,
                addr,
                app_idx,
            },
            CliCommand::ResetNode { addr } => Command::ResetNode { addr },
            CliCommand::Reset => Command::Reset,
            CliCommand::Reboot => Command::Reboot,
            CliCommand::Listen { .. } | CliCommand::SaveConfig { .. } => return None,
        };
        Some(command)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle save-config early (before loading config)
    if let CliCommand::SaveConfig { path } = &args.command {
        let config = ControllerConfig::default();
        let path = path.clone().unwrap_or_else(ControllerConfig::default_path);
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        load_config(path).context("Failed to load configuration")?
    } else {
        ControllerConfig::load_or_default()
    };

    // Use CLI log level if specified, otherwise use config value
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.controller.log_level);

    setup_logging(log_level).context("Failed to setup logging")?;
    debug!("mesh-ctl v{}, log level {}", env!("CARGO_PKG_VERSION"), log_level);

    let controller = Controller::open(&config).context("Failed to open mesh controller")?;

    if let Some(command) = args.command.to_command() {
        controller
            .issuer()
            .issue(&command)
            .with_context(|| format!("Failed to send {:?}", command))?;
        println!("Sent {:?}", command);
        return Ok(());
    }

    if let CliCommand::Listen {
        json,
        auto_setup,
        auto_provision,
    } = args.command
    {
        config.listen.auto_setup |= auto_setup;
        config.listen.auto_provision |= auto_provision;
        run_listen(controller, &config.listen, json).await?;
    }

    Ok(())
}

/// Stream events to stdout until Ctrl+C or until the dispatcher stops
async fn run_listen(
    mut controller: Controller,
    settings: &ListenSettings,
    json: bool,
) -> Result<()> {
    let events = controller.listen().context("Failed to start event listener")?;
    let mut responder = AutoResponder::new(controller.issuer().clone(), settings);

    info!("Listening for events, press Ctrl+C to stop");
    let stream_result = stream_events(&events, json, &mut responder).await;

    // Nobody reads past this point; the dispatcher must not wait on a full channel
    drop(events);

    if responder.pending() > 0 {
        info!("Waiting for {} automatic command(s)", responder.pending());
    }
    let failures = responder.finish().await;
    if failures > 0 {
        warn!("{} automatic command(s) failed", failures);
    }

    // Shutdown blocks for up to one read timeout
    let shutdown = tokio::task::spawn_blocking(move || controller.shutdown())
        .await
        .context("Shutdown task failed")?;

    let stats = shutdown.context("Event listener failed")?;
    info!(
        "Listener stopped after {} frames ({} events)",
        stats.frames, stats.delivered
    );
    stream_result
}

async fn stream_events(
    events: &EventStream,
    json: bool,
    responder: &mut AutoResponder,
) -> Result<()> {
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                return Ok(());
            }
            event = events.recv() => {
                let Ok(event) = event else {
                    debug!("Event stream closed");
                    return Ok(());
                };

                if json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    println!("{}", event);
                }
                dispatch_event(&event, responder);
            }
        }
    }
}

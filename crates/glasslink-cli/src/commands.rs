//! Command handlers for the glasslink CLI

use std::sync::Arc;
use std::time::Duration;

use glasslink_ble::discovery::Scanner;
use glasslink_ble::{BleConfig, GlassesController, GlassesEvent, PairingStore, SideResult};
use glasslink_cloud::CloudSession;
use glasslink_core::protocol::commands;
use glasslink_core::protocol::{layout, serial::decode_serial};
use glasslink_core::{BufferedCommand, GlassesInfo};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// How long a query waits for a fresh reply before using the cached value
const REPLY_WAIT: Duration = Duration::from_secs(3);

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Run { no_cloud } => Self::handle_run(config, no_cloud).await,
            Commands::Scan { seconds } => Self::handle_scan(config.ble, seconds).await,
            Commands::Text { text } => {
                let command = commands::text(&layout::text_wall(&text), config.ble.max_frame_size)?;
                Self::handle_one_shot(config, command).await
            }
            Commands::Brightness { percent, auto } => {
                Self::handle_one_shot(config, commands::brightness(percent, auto)?).await
            }
            Commands::HeadUpAngle { degrees } => {
                Self::handle_one_shot(config, commands::head_up_angle(degrees)?).await
            }
            Commands::Dashboard { height, depth } => {
                let command = commands::dashboard_position(height, depth)?;
                Self::handle_one_shot(config, command).await
            }
            Commands::Mic { state } => Self::handle_one_shot(config, commands::mic(state)).await,
            Commands::Battery => Self::handle_battery(config).await,
            Commands::Serial => Self::handle_serial(config).await,
            Commands::Forget => Self::handle_forget(config.ble),
            Commands::Status => Self::handle_status(&config),
            Commands::InitConfig { .. } => Err(CliError::Config(
                "init-config is handled before configuration is loaded".into(),
            )),
        }
    }

    // ------------------------------------------------------------------------
    // Long-running
    // ------------------------------------------------------------------------

    /// Connect everything and bridge until Ctrl+C
    async fn handle_run(config: AppConfig, no_cloud: bool) -> Result<()> {
        let controller = Arc::new(GlassesController::start(config.ble.clone()).await?);
        let glasses_events = controller.subscribe();
        controller.start_discovery()?;

        let cloud = CloudSession::new(config.cloud.clone());
        if no_cloud {
            info!("Cloud session disabled");
        } else if config.cloud.core_token.is_none() {
            warn!("No cloud.core_token configured, running without the relay");
        } else if let Err(e) = cloud.start().await {
            // The session keeps retrying on its own
            warn!("Relay not reachable yet: {}", e);
        }

        let bridge = Bridge::new(controller.clone(), cloud.clone());
        info!("Bridging glasses and relay, press Ctrl+C to stop");
        bridge
            .run(glasses_events, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;

        cloud.disconnect();
        drop(bridge);
        match Arc::try_unwrap(controller) {
            Ok(controller) => controller.shutdown().await,
            Err(_) => warn!("Controller still shared, skipping orderly shutdown"),
        }
        Ok(())
    }

    /// Print every arm that advertises within the window
    async fn handle_scan(config: BleConfig, seconds: u64) -> Result<()> {
        let scanner = Scanner::new(&config).await?;
        let found = scanner
            .survey(Duration::from_secs(seconds), config.search_filter.as_deref())
            .await?;

        if found.is_empty() {
            println!("No glasses found");
        }
        for advertisement in found {
            let details = advertisement
                .serial
                .as_deref()
                .and_then(decode_serial)
                .map(|info| format!("  {}", info))
                .unwrap_or_default();
            println!(
                "{:<5} {}{}",
                advertisement.side, advertisement.identity.name, details
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // One-shot
    // ------------------------------------------------------------------------

    async fn connect_ready(config: &AppConfig) -> Result<GlassesController> {
        let controller = GlassesController::start(config.ble.clone()).await?;
        controller.start_discovery()?;
        info!("Waiting for both arms...");
        controller.wait_until_ready(config.app.ready_timeout()).await?;
        Ok(controller)
    }

    /// Send one command and report what each arm said
    async fn handle_one_shot(config: AppConfig, command: BufferedCommand) -> Result<()> {
        let controller = Self::connect_ready(&config).await?;
        let outcome = controller
            .queue()
            .enqueue_tracked(command)?
            .await
            .map_err(|_| CliError::CommandFailed("dispatcher stopped".into()))?;
        controller.shutdown().await;

        for (side, result) in &outcome.results {
            let verdict = match result {
                SideResult::Acknowledged => "ok",
                SideResult::Sent => "sent",
                SideResult::Unresponsive => "no response",
            };
            println!("{:<5} {}", side, verdict);
        }
        if outcome.is_delivered() {
            Ok(())
        } else {
            Err(CliError::CommandFailed("not acknowledged by every arm".into()))
        }
    }

    async fn handle_battery(config: AppConfig) -> Result<()> {
        let controller = Self::connect_ready(&config).await?;
        let mut events = controller.subscribe();
        controller.query_battery()?;

        let telemetry = timeout(REPLY_WAIT, async {
            loop {
                match events.recv().await {
                    Ok(GlassesEvent::TelemetryChanged(t))
                        if t.left_battery.is_some() && t.right_battery.is_some() =>
                    {
                        return Some(t)
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(_) => return None,
                }
            }
        })
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| controller.status().telemetry);
        controller.shutdown().await;

        let percent = |value: Option<u8>| value.map_or("-".to_string(), |v| format!("{}%", v));
        println!("left  {}", percent(telemetry.left_battery));
        println!("right {}", percent(telemetry.right_battery));
        if let Some(case) = telemetry.case_battery {
            println!("case  {}%", case);
        }
        Ok(())
    }

    async fn handle_serial(config: AppConfig) -> Result<()> {
        let controller = Self::connect_ready(&config).await?;
        let mut events = controller.subscribe();
        if let Some(info) = controller.status().telemetry.info {
            controller.shutdown().await;
            print_info(&info);
            return Ok(());
        }
        controller.query_serial()?;

        let info = timeout(REPLY_WAIT, async {
            loop {
                match events.recv().await {
                    Ok(GlassesEvent::InfoDecoded(info)) => return Some(info),
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(_) => return None,
                }
            }
        })
        .await
        .ok()
        .flatten()
        .or_else(|| controller.status().telemetry.info);
        controller.shutdown().await;

        match info {
            Some(info) => {
                print_info(&info);
                Ok(())
            }
            None => Err(CliError::CommandFailed("glasses did not report a serial number".into())),
        }
    }

    // ------------------------------------------------------------------------
    // Offline
    // ------------------------------------------------------------------------

    fn handle_forget(config: BleConfig) -> Result<()> {
        let store = PairingStore::new(config.pairing_file);
        let mut record = store.load()?;
        if !record.is_paired() && record.glasses.is_none() {
            println!("No glasses paired");
            return Ok(());
        }
        record.forget();
        store.save(&record)?;
        println!("Pairing forgotten");
        Ok(())
    }

    fn handle_status(config: &AppConfig) -> Result<()> {
        let store = PairingStore::new(config.ble.pairing_file.clone());
        let record = store.load()?;
        let report = serde_json::json!({
            "config_file": AppConfig::default_config_path(),
            "pairing_file": store.path(),
            "pairing": record,
            "cloud": {
                "server_url": config.cloud.server_url,
                "token_configured": config.cloud.core_token.is_some(),
            },
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}

fn print_info(info: &GlassesInfo) {
    println!("serial {}", info.serial_number);
    println!("style  {:?}", info.style);
    println!("color  {:?}", info.color);
}

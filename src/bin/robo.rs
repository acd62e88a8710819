use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use robo::{
    config::{SystemConfig, TickerConfig},
    devices::{relay_actuator, DigitalMode},
    logging::{init_logging, LogLevel},
    native_feature::{NativeFeature, Ticker},
    transport::{TransportBridge, UdpTransport},
    AgentBehavior, Component, Error, Event, EventPayload, EventType, InternalResult,
    RuntimeAgent, SimpleRule,
};
use tracing::{debug, info};

const RELAY: &str = "pump";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Enable debug mode
    #[arg(short, long)]
    verbose: bool,

    /// Exit after this many ticks instead of waiting for Ctrl+C
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Mirror the controller's events to the configured UDP peer
    #[arg(short, long)]
    udp: bool,
}

/// Toggles the relay on every tick.
#[derive(Default)]
struct Controller {
    relay_on: bool,
}

impl AgentBehavior for Controller {
    fn kind(&self) -> &str {
        "Controller"
    }
}

fn build_controller(config: &SystemConfig) -> InternalResult<Arc<Component<Controller>>> {
    let controller = Component::with_config("controller", Controller::default(), config.agent.clone());

    let relay = Arc::new(relay_actuator(RELAY, DigitalMode::PullUp)?);
    controller.add_listener(relay.listener());
    controller.add_component(relay, true);

    controller.add_rule(
        SimpleRule::<Controller>::on(EventType::PeriodicTime)
            .named("toggle")
            .always(|cx| {
                cx.agent.relay_on = !cx.agent.relay_on;
                let relay = RELAY.to_string();
                let command = if cx.agent.relay_on {
                    EventPayload::EnableRelay { relay }
                } else {
                    EventPayload::DisableRelay { relay }
                };
                Ok(vec![Event::new(command)])
            }),
    )?;
    for event_type in [EventType::RelayEnabled, EventType::RelayDisabled] {
        controller.add_rule(
            SimpleRule::<Controller>::on(event_type)
                .named("report")
                .always(|cx| {
                    info!(event = %cx.event.event_type(), "Relay switched");
                    Ok(Vec::new())
                }),
        )?;
    }
    Ok(Arc::new(controller))
}

/// A tick limit only ends the run when the ticker is producing ticks.
fn tick_limit(ticks: Option<u64>, ticker: &TickerConfig) -> InternalResult<Option<u64>> {
    match ticks {
        Some(_) if !ticker.enabled => Err(Error::Config(
            "--ticks requires ticker.enabled = true".to_string(),
        )),
        ticks => Ok(ticks),
    }
}

async fn wait_for_ticks(ticker: &Ticker, limit: Option<u64>) -> InternalResult<()> {
    match limit {
        Some(limit) => {
            while ticker.ticks() < limit {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            Ok(())
        }
        None => tokio::signal::ctrl_c()
            .await
            .map_err(|e| Error::Internal(format!("Failed to wait for Ctrl+C: {}", e))),
    }
}

async fn run(cli: &Cli) -> InternalResult<()> {
    let config = if cli.config.exists() {
        SystemConfig::from_file(&cli.config)?
    } else {
        SystemConfig::default()
    };
    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        config.logging.level
    };
    init_logging(level);

    info!("config loaded.");
    debug!("config: {:?}", config);

    let limit = tick_limit(cli.ticks, &config.ticker)?;
    let controller = build_controller(&config)?;

    let bridge = if cli.udp {
        let transport = UdpTransport::connect(&config.transport).await?;
        let bridge = TransportBridge::spawn(Arc::new(transport), controller.listener());
        controller.add_listener(bridge.clone());
        Some(bridge)
    } else {
        None
    };

    controller.start()?;
    let ticker = Ticker::new(controller.listener(), config.ticker.clone())?;
    if config.ticker.enabled {
        ticker.start().await?;
    }

    // Message to user as UI.
    println!("Controller started. Press Ctrl+C to shutdown.");

    tokio::select! {
        res = wait_for_ticks(&ticker, limit) => res?,
        res = controller.join() => res?,
    }

    println!("Shutting down...");
    ticker.stop().await?;
    controller.shutdown().await?;
    if let Some(bridge) = bridge {
        bridge.close();
    }

    println!("Shutdown completed.");
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

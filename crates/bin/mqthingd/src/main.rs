//! # mqthingd — mqthing daemon
//!
//! Composition root that wires all adapters together and runs the thing
//! adapter until interrupted.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialise logging
//! - Resolve the host identity from the network interface
//! - Construct the MQTT connector and the sensor sources
//! - Run the thing adapter, handling graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod identity;

use mqthing_adapter_mqtt::MqttConnector;
use mqthing_adapter_virtual::VirtualSource;
use mqthing_app::services::thing_adapter::ThingAdapter;
use tracing_subscriber::EnvFilter;

use config::Config;
use identity::InterfaceIdentity;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let filter = EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {:?}: {err}", config.logging.filter);
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let identity = InterfaceIdentity::new(config.identity.interface.clone(), config.mac_override()?);
    let connector = MqttConnector::new(config.mqtt.clone());
    let mut adapter = ThingAdapter::new(connector, identity, config.adapter_settings());

    if config.virtual_devices.enabled {
        adapter.add_source(Box::new(VirtualSource::new(&config.virtual_devices)))?;
    }

    tracing::info!(
        broker = %config.mqtt.broker_uri(),
        devices = adapter.devices().len(),
        "mqthingd starting"
    );
    adapter.begin().await?;
    adapter.run(shutdown_signal()).await?;
    tracing::info!("mqthingd stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

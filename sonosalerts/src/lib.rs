//! Startup shared by the `doorbell-alerts` and `incident-alerts` services.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use saconfig::{Config, Variant};
use sacontrol::{AlertController, AlertTimings, SonosSpeaker};
use saserver::{Server, doorbell_router, incident_router, init_logging};
use tracing::info;

#[derive(Parser, Debug)]
#[command(version)]
#[command(
    about = "Interrupts a Sonos speaker with an alert sound when a webhook arrives, then resumes the music"
)]
pub struct Args {
    /// Path to the INI configuration file
    pub config: PathBuf,
}

/// Loads the configuration, connects to the speaker and serves the webhook
/// route of `variant` until Ctrl+C.
///
/// Configuration and speaker lookup failures return before anything listens.
pub async fn run(variant: Variant, args: Args) -> Result<()> {
    let logs = init_logging("INFO")?;

    let config = Config::load(&args.config, variant)
        .with_context(|| format!("Cannot load {}", args.config.display()))?;
    logs.set_level(&config.log_level)?;

    let speaker = connect_speaker(&config).await?;
    info!(
        "Connected to {} ({}) at {}",
        speaker.room_name(),
        speaker.uid(),
        speaker.location()
    );

    let controller = Arc::new(AlertController::new(
        Arc::new(speaker),
        config.alert_sound_url.clone(),
        alert_timings(&config),
    ));

    let router = match variant {
        Variant::Doorbell => doorbell_router(controller),
        Variant::Incident => {
            let webhook = config
                .webhook
                .clone()
                .context("Incident service needs alertWebhookURLRoot and alertWebhookAuthKey")?;
            incident_router(controller, webhook)
        }
    };

    let mut server = Server::new(service_name(variant), config.listen_port);
    server.add_router(router);
    server
        .start()
        .await
        .with_context(|| format!("Cannot listen on port {}", config.listen_port))?;
    server.wait().await;

    info!("{} stopped", service_name(variant));
    Ok(())
}

pub fn service_name(variant: Variant) -> &'static str {
    match variant {
        Variant::Doorbell => "doorbell-alerts",
        Variant::Incident => "incident-alerts",
    }
}

fn alert_timings(config: &Config) -> AlertTimings {
    AlertTimings {
        padding: config.alert_padding,
        fallback_wait: config.fallback_wait,
        max_wait: config.max_wait,
        ..AlertTimings::default()
    }
}

/// Resolves the configured player off the runtime threads: discovery and the
/// description fetch are blocking.
async fn connect_speaker(config: &Config) -> Result<SonosSpeaker> {
    let player = config.speaker.clone();
    let timeout = config.discovery_timeout;

    tokio::task::spawn_blocking(move || SonosSpeaker::resolve(&player, timeout))
        .await
        .context("Speaker lookup task failed")?
        .with_context(|| format!("Cannot reach Sonos player '{}'", config.speaker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn config_path_is_required() {
        assert!(Args::try_parse_from(["incident-alerts"]).is_err());

        let args = Args::try_parse_from(["incident-alerts", "/etc/sonos-alerts.ini"]).unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/sonos-alerts.ini"));
    }

    #[test]
    fn timings_follow_configuration() {
        let config = Config::from_ini_str(
            "[vo-sonos-alerts]\n\
             sonosPlayer = Office\n\
             alertSoundURL = http://nas/klaxon.mp3\n\
             alertWebhookURLRoot = https://hooks.example.org/sonos\n\
             alertWebhookAuthKey = secret\n\
             listenPort = 8080\n\
             maxWaitSeconds = 60\n",
            Variant::Incident,
        )
        .unwrap();

        let timings = alert_timings(&config);
        assert_eq!(timings.padding, Duration::from_secs(2));
        assert_eq!(timings.fallback_wait, Duration::from_secs(10));
        assert_eq!(timings.max_wait, Duration::from_secs(60));
        assert_eq!(timings.command_timeout, AlertTimings::default().command_timeout);
    }
}

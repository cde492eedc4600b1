use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use geo_tracker_rust::domain::models::SessionState;
use geo_tracker_rust::domain::settings::SettingsService;
use geo_tracker_rust::infrastructure::bluetooth::{BleCentral, SessionConfig, SessionManager};
use geo_tracker_rust::infrastructure::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let mut settings = SettingsService::new()?;
    let _logging_guard = logging::init_logger(&settings.get().log_settings)?;
    info!("Starting GeoTracker client");

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let transport = Arc::new(BleCentral::new(event_tx).await?);
    let config = SessionConfig::from_settings(settings.get())?;
    let mut manager = SessionManager::new(transport, config);
    manager.start(event_rx);

    // Companion flow when a tracker is already associated, full scan
    // otherwise.
    let direct = manager.connect_associated().await?;
    if !direct {
        while manager.is_scanning() {
            if !manager.step().await {
                break;
            }
        }

        let candidates = manager.peripherals();
        if candidates.is_empty() {
            warn!("no trackers found");
            return Ok(());
        }
        for p in &candidates {
            info!("found {} ({}), rssi {:?}", p.name, p.id, p.rssi);
        }

        let target = candidates[0].id.clone();
        manager.connect(&target).await?;
        settings.set_associated_peripheral(&target)?;
        manager.request_telemetry().await?;
    }

    info!("streaming, press Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            alive = manager.step() => {
                if !alive {
                    break;
                }
                if manager.state() == SessionState::Idle {
                    warn!("session ended by the tracker");
                    break;
                }
            }
        }
    }

    for record in manager.records() {
        println!(
            "{} {} {} {},{}",
            record.seq, record.date, record.time, record.lat, record.lon
        );
    }

    let _ = manager.disconnect().await;
    manager.stop();
    Ok(())
}

use std::sync::Arc;

use ban_warden::ban::{BanEvent, BanService, BanStore, ChannelSink, MigrationEngine, SweepRequest};
use ban_warden::config::{CONFIG_FILE, WardenConfig};
use ban_warden::{CONSOLE_TARGET, Error, logging};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Main function to run the ban warden
async fn async_main() -> Result<(), Error> {
    // Initialize logging
    logging::init()?;

    let config = WardenConfig::load(CONFIG_FILE).await?;
    info!(target: CONSOLE_TARGET, data_dir = %config.data_dir.display(), "Configuration loaded");

    let store = Arc::new(BanStore::open(&config.data_dir).await?);

    // The legacy migration must complete before any ban operation is served;
    // a fault here is fatal so we never run against a half-upgraded store.
    let migrated = MigrationEngine::new(Arc::clone(&store)).run().await?;
    if migrated > 0 {
        info!(target: CONSOLE_TARGET, migrated, "Migrated legacy ban records");
    }

    // Ban/pardon events flow into this channel; the consumer task stands in
    // for the enforcement/messaging collaborator.
    let (event_tx, mut event_rx) = mpsc::channel::<BanEvent>(100);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match &event {
                BanEvent::Created { ban, notify } => {
                    info!(
                        target: CONSOLE_TARGET,
                        subject = %ban.subject(),
                        issuer = %ban.issuer(),
                        notify,
                        "Ban created event"
                    );
                }
                BanEvent::Pardoned { ban, notify } => {
                    info!(
                        target: CONSOLE_TARGET,
                        subject = %ban.subject(),
                        notify,
                        "Ban pardoned event"
                    );
                }
            }
        }
    });

    let service = BanService::new(store, Arc::new(ChannelSink::new(event_tx)));
    service.reload_cache();

    let (sweep_tx, sweep_rx) = mpsc::channel::<SweepRequest>(100);
    service.start_sweep_task(sweep_rx, config.sweep_interval_seconds);

    info!(target: CONSOLE_TARGET, "Ban warden started");
    tokio::signal::ctrl_c().await?;

    info!(target: CONSOLE_TARGET, "Shutting down");
    if let Err(err) = sweep_tx.send(SweepRequest::Shutdown).await {
        error!(target: CONSOLE_TARGET, "Failed to stop sweep task: {err}");
    }

    Ok(())
}

fn main() {
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
        .block_on(async_main());

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

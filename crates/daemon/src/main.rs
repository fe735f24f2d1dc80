use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portage_core::admission::AdmissionController;
use portage_core::alert::{create_alert_system, AlertEvent};
use portage_core::capacity::SshProber;
use portage_core::metrics::all_metrics;
use portage_core::resolver::{
    AccountProvisioner, DestinationResolver, NoopProvisioner, SshProvisioner,
};
use portage_core::transfer::{ScpExecutor, TransferExecutor};
use portage_core::{
    load_config, validate_config, Ledger, RetentionReaper, SqliteLedger, StagingOrchestrator,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the alert channel
const ALERT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("PORTAGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!(
        "Destinations: web={} federated={} sftp={}",
        config.destinations.web.host, config.destinations.federated.host, config.destinations.sftp.host
    );

    // Register metrics so an embedding scraper can collect them
    for metric in all_metrics() {
        let _ = prometheus::default_registry().register(metric);
    }

    // Open the request ledger
    let ledger: Arc<SqliteLedger> = Arc::new(
        SqliteLedger::new(&config.database.path).context("Failed to open request ledger")?,
    );
    let ledger_dyn: Arc<dyn Ledger> = ledger.clone();
    info!("Request ledger opened");

    // Create alert system
    let (alert_handle, alert_writer) = create_alert_system(ALERT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(alert_writer.run());

    alert_handle
        .emit(AlertEvent::ServiceStarted {
            version: VERSION.to_string(),
        })
        .await;

    // Remote plumbing shared by probes, transfers and provisioning
    let shell = config.remote_shell();
    let prober = Arc::new(SshProber::new(shell.clone()));
    let executor: Arc<dyn TransferExecutor> = Arc::new(ScpExecutor::new(
        shell.clone(),
        config.remote.recall_hint_cmd.clone(),
    ));

    let provisioner: Arc<dyn AccountProvisioner> =
        match (&config.remote.provision_admin, &config.remote.provision_cmd) {
            (Some(admin), Some(cmd)) => {
                info!("Account provisioning enabled (admin: {})", admin);
                Arc::new(SshProvisioner::new(shell, admin.clone(), cmd.clone()))
            }
            _ => {
                info!("Account provisioning not configured, assuming accounts exist");
                Arc::new(NoopProvisioner)
            }
        };

    // Resolver with quota ceilings from the ledger constants row
    let resolver = Arc::new(
        DestinationResolver::from_ledger(config.resolver_profiles(), &*ledger_dyn)
            .context("Failed to load quota constants")?,
    );
    info!("Quota constants: {:?}", resolver.quotas());

    let admission = Arc::new(AdmissionController::new(prober));

    // Start the orchestrator
    let orchestrator = StagingOrchestrator::new(
        config.orchestrator.clone(),
        Arc::clone(&ledger_dyn),
        Arc::clone(&resolver),
        provisioner,
        admission,
        Arc::clone(&executor),
        Some(alert_handle.clone()),
    );
    if config.orchestrator.enabled {
        orchestrator.start().await;
    } else {
        info!("Orchestrator disabled in config");
    }

    // Start the reaper
    let reaper = RetentionReaper::new(
        config.reaper.clone(),
        ledger_dyn,
        resolver,
        executor,
        Some(alert_handle.clone()),
    );
    if config.reaper.enabled {
        reaper.start().await;
    } else {
        info!("Reaper disabled in config");
    }

    info!("portaged running (poll every {}s)", config.orchestrator.poll_interval_secs);

    // Run until signalled
    shutdown_signal().await;

    info!("Shutting down...");
    orchestrator.stop().await;
    reaper.stop().await;

    alert_handle
        .emit(AlertEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // Drop the orchestrator and reaper so their AlertHandle clones close
    // the channel, then drop ours and wait for the writer to drain.
    drop(orchestrator);
    drop(reaper);
    drop(alert_handle);

    let _ = writer_handle.await;
    info!("Alert writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, path::PathBuf, process::ExitCode, sync::Arc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use datacollector::{
    collector::{Collector, LineReader},
    config::CollectorConfig,
    constants::MONITOR_INTERVAL,
    flusher::FlushWorkerPool,
    influxdb::InfluxDbClient,
    monitor::SelfMonitor,
    pseudonymizer::Pseudonymizer,
    registry::DestinationRegistry,
    router::Router,
    storage::StorageClient,
    supervisor::supervise,
    tailer::{find_newest_log, LogTailer},
};

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("DC_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,reqwest=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match CollectorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    debug!("Loaded {config:?}");

    let log_path = match find_newest_log(&config.log_dir) {
        Ok(path) => path,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let pseudonymizer = match Pseudonymizer::new(&config.username_hash_secret) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            error!("Error creating pseudonymizer: {e}");
            return ExitCode::FAILURE;
        }
    };

    let storage: Arc<dyn StorageClient> = match InfluxDbClient::new(config.influxdb()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Error creating storage client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let registry = Arc::new(DestinationRegistry::new(config.max_queue_len));
    let router = Router::new(
        Arc::clone(&registry),
        pseudonymizer,
        config.machine_name.clone(),
    );
    let cancel_token = CancellationToken::new();

    let flush_handles =
        FlushWorkerPool::new(&config.flush_workers(), Arc::clone(&registry), storage)
            .spawn(&cancel_token);
    info!(
        "Started {} flush workers, flushing at {} points",
        flush_handles.len(),
        config.flush_threshold
    );

    let monitor = SelfMonitor::new(router.clone(), MONITOR_INTERVAL);
    let monitor_token = cancel_token.clone();
    let monitor_handle = supervise("self-monitor".to_string(), cancel_token.clone(), move || {
        monitor.clone().run(monitor_token.clone())
    });

    let mut collector_handle = start_collector(router, log_path, &cancel_token);

    let collector_stopped = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {e}");
            }
            info!("Shutting down");
            false
        }
        _ = &mut collector_handle => {
            error!("Collector stopped unexpectedly, shutting down");
            true
        }
    };

    cancel_token.cancel();
    if !collector_stopped {
        let _ = collector_handle.await;
    }
    let _ = monitor_handle.await;
    for handle in flush_handles {
        let _ = handle.await;
    }

    let unflushed = registry.total_queued();
    if unflushed > 0 {
        info!("{unflushed} points below flush threshold were not written");
    }
    ExitCode::SUCCESS
}

/// Tails `log_path` under supervision; a restart reopens the file at its current end.
fn start_collector(
    router: Router,
    log_path: PathBuf,
    cancel_token: &CancellationToken,
) -> JoinHandle<()> {
    let token = cancel_token.clone();
    supervise("collector".to_string(), cancel_token.clone(), move || {
        let router = router.clone();
        let log_path = log_path.clone();
        let token = token.clone();
        async move {
            match LogTailer::open(&log_path).await {
                Ok(tailer) => {
                    Collector::new(router, LineReader::Tail(tailer), token)
                        .spin()
                        .await;
                }
                Err(e) => error!("Failed to open {}: {e}", log_path.display()),
            }
        }
    })
}

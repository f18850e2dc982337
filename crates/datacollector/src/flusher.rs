// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pool of workers that move queued points into storage.
//!
//! Every worker scans all known destinations over and over. A destination is flushed only
//! once its queue holds at least `threshold` points; smaller queues wait for a later pass.
//! The drain, the bucket provisioning and the write for one destination all run inside that
//! destination's flush section, so two workers never work on the same destination at once,
//! while different destinations flush in parallel.
//!
//! Delivery is at most once: a batch whose write fails is logged and dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::registry::{Destination, DestinationRegistry};
use crate::storage::StorageClient;
use crate::supervisor::supervise;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Below threshold, nothing to do yet.
    Skipped,
    /// Another worker is flushing this destination.
    Busy,
    Flushed(usize),
    /// The batch was dropped.
    WriteFailed(usize),
}

pub struct FlushWorkerConfig {
    pub workers: usize,
    pub threshold: usize,
    pub scan_interval: Duration,
}

#[derive(Clone)]
pub struct FlushWorker {
    id: usize,
    registry: Arc<DestinationRegistry>,
    storage: Arc<dyn StorageClient>,
    threshold: usize,
    scan_interval: Duration,
}

impl FlushWorker {
    pub fn new(
        id: usize,
        registry: Arc<DestinationRegistry>,
        storage: Arc<dyn StorageClient>,
        threshold: usize,
        scan_interval: Duration,
    ) -> Self {
        FlushWorker {
            id,
            registry,
            storage,
            threshold,
            scan_interval,
        }
    }

    /// Scans destinations until cancelled.
    pub async fn run(self, cancel_token: CancellationToken) {
        debug!("Flush worker {} started", self.id);
        loop {
            self.flush_pass().await;
            tokio::select! {
                () = tokio::time::sleep(self.scan_interval) => {}
                () = cancel_token.cancelled() => {
                    debug!("Flush worker {} shutting down", self.id);
                    break;
                }
            }
        }
    }

    /// One scan over a snapshot of the known destinations.
    pub async fn flush_pass(&self) -> Vec<FlushOutcome> {
        let mut outcomes = Vec::new();
        for destination in self.registry.snapshot() {
            outcomes.push(self.flush_destination(&destination).await);
        }
        outcomes
    }

    pub async fn flush_destination(&self, destination: &Destination) -> FlushOutcome {
        if destination.len() < self.threshold {
            return FlushOutcome::Skipped;
        }
        let Some(_section) = destination.try_enter_flush() else {
            return FlushOutcome::Busy;
        };
        let Some(batch) = destination.drain_if_threshold(self.threshold) else {
            return FlushOutcome::Skipped;
        };
        let id = destination.id();
        let n_points = batch.len();

        if !destination.is_provisioned() {
            match self.storage.ensure_destination(id).await {
                Ok(provisioning) => {
                    debug!("Destination {id} confirmed ({provisioning:?})");
                    destination.mark_provisioned();
                }
                Err(e) => warn!("Failed to provision destination {id}, will retry: {e}"),
            }
        }

        debug!("Worker {} writing {n_points} points to {id}", self.id);
        match self.storage.write_batch(id, &batch).await {
            Ok(()) => {
                debug!("Flushed {n_points} points to {id}");
                FlushOutcome::Flushed(n_points)
            }
            Err(e) => {
                error!("Error writing {n_points} points to {id}, batch dropped: {e}");
                FlushOutcome::WriteFailed(n_points)
            }
        }
    }
}

pub struct FlushWorkerPool {
    workers: Vec<FlushWorker>,
}

impl FlushWorkerPool {
    pub fn new(
        config: &FlushWorkerConfig,
        registry: Arc<DestinationRegistry>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        let workers = (0..config.workers)
            .map(|id| {
                FlushWorker::new(
                    id,
                    Arc::clone(&registry),
                    Arc::clone(&storage),
                    config.threshold,
                    config.scan_interval,
                )
            })
            .collect();
        FlushWorkerPool { workers }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Starts every worker under supervision. A panicking worker is restarted.
    pub fn spawn(self, cancel_token: &CancellationToken) -> Vec<JoinHandle<()>> {
        self.workers
            .into_iter()
            .map(|worker| {
                let name = format!("flush-worker-{}", worker.id);
                let token = cancel_token.clone();
                supervise(name, cancel_token.clone(), move || {
                    worker.clone().run(token.clone())
                })
            })
            .collect()
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::constants::RESTART_BACKOFF;

/// Runs the task produced by `make_task` until it returns or `cancel_token` fires.
///
/// If the task panics it is logged and started again after [`RESTART_BACKOFF`], so one
/// misbehaving background loop cannot silently disappear or take the others down.
pub fn supervise<F, Fut>(name: String, cancel_token: CancellationToken, make_task: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let task = tokio::spawn(make_task());
            match task.await {
                Ok(()) => {
                    debug!("{name} finished");
                    break;
                }
                Err(e) if e.is_panic() => {
                    error!("{name} panicked, restarting: {e}");
                }
                Err(e) => {
                    debug!("{name} cancelled: {e}");
                    break;
                }
            }
            tokio::select! {
                () = tokio::time::sleep(RESTART_BACKOFF) => {}
                () = cancel_token.cancelled() => break,
            }
        }
    })
}

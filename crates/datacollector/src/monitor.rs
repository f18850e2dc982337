// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic `points_in_queue` measurement.
//!
//! The point goes through the same queues as everything else, so while storage is down it
//! piles up along with the data it describes. That backlog is the signal operators look for.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::point::{now_unix_nanos, MetricPoint};
use crate::router::Router;

#[derive(Clone)]
pub struct SelfMonitor {
    router: Router,
    period: Duration,
}

impl SelfMonitor {
    pub fn new(router: Router, period: Duration) -> Self {
        SelfMonitor { router, period }
    }

    /// Measures the backlog once and queues the point. Returns the measured count.
    pub fn tick(&self) -> usize {
        let total = self.router.registry().total_queued();
        self.router.route_system(
            MetricPoint::measurement("points_in_queue")
                .tag("machine", self.router.machine())
                .field("value", total)
                .timestamp(now_unix_nanos()),
        );
        total
    }

    pub async fn run(self, cancel_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                () = cancel_token.cancelled() => {
                    debug!("Self monitor shutting down");
                    break;
                }
            }
        }
    }
}

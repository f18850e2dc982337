// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Marker the game client writes in front of every telemetry payload.
pub const SENTINEL: &str = "DATACOLLECTOR_JSON";

/// Bucket that receives points about the collector itself.
pub const SYSTEM_DESTINATION: &str = "system_monitoring";

/// Number of concurrent flush workers.
pub const FLUSH_WORKERS: usize = 10;

/// Queue length at which a destination is drained and written.
pub const FLUSH_THRESHOLD: usize = 1000;

/// Pause between two scans of the destination set by a flush worker.
pub const FLUSH_SCAN_INTERVAL: Duration = Duration::from_millis(10);

/// Period of the queued-points measurement.
pub const MONITOR_INTERVAL: Duration = Duration::from_millis(100);

/// How long the tailer waits at end of file before looking again.
pub const TAIL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Delay before a panicked background task is started again.
pub const RESTART_BACKOFF: Duration = Duration::from_millis(500);

pub const LOG_FILE_PREFIX: &str = "output_log_";
pub const LOG_FILE_SUFFIX: &str = ".txt";

pub const DEFAULT_INFLUXDB_URL: &str = "http://influxdb2:8086";
pub const DEFAULT_INFLUXDB_ORG: &str = "org";
pub const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 10;

/// Offset between .NET ticks (0001-01-01) and the unix epoch, in ticks.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Nanoseconds per .NET tick.
pub const NANOS_PER_TICK: i64 = 100;

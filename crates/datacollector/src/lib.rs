// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ingestion pipeline that tails a live game-client log, pseudonymizes the player telemetry
//! embedded in it and ships the resulting points to InfluxDB buckets.
//!
//! ```text
//!   LogTailer -> extract_payload -> decode -> Router -> DestinationRegistry
//!                                               ^              |
//!                                  SelfMonitor -+              v
//!                                                       FlushWorkerPool -> StorageClient
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod collector;
pub mod config;
pub mod constants;
pub mod errors;
pub mod event;
pub mod extractor;
pub mod flusher;
pub mod influxdb;
pub mod monitor;
pub mod point;
pub mod pseudonymizer;
pub mod registry;
pub mod router;
pub mod storage;
pub mod supervisor;
pub mod tailer;

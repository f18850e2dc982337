// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Reasons a payload could not be turned into an event. None of them stop the tailer.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload has an empty world id")]
    EmptyDestination,
    #[error("utc time {0} cannot be represented in nanoseconds since the unix epoch")]
    TimestampOutOfRange(i64),
}

#[derive(Debug, thiserror::Error)]
pub enum PseudonymizeError {
    #[error("pseudonymization key is missing")]
    MissingKey,
    #[error("pseudonymization key rejected: {0}")]
    InvalidKey(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("event for world {world_id} dropped: {source}")]
    Pseudonymize {
        world_id: String,
        #[source]
        source: PseudonymizeError,
    },
    #[error("event for world {world_id} dropped: timestamp {ticks} out of range")]
    Timestamp { world_id: String, ticks: i64 },
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("request to storage failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("storage answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("storage token is not a valid header value")]
    InvalidToken,
    #[error("organization {0} not found")]
    OrganizationNotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TailerError {
    #[error("no log file matching {pattern} in {dir}")]
    NoLogFile { dir: String, pattern: String },
    #[error("I/O error on log file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

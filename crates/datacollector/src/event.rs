// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Typed view of one telemetry payload.

use serde::Deserialize;

use crate::errors::DecodeError;
use crate::point::ticks_to_unix_nanos;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Snapshot of a single player inside one event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSample {
    /// Raw display name. Personally identifying, never stored as is.
    #[serde(rename = "display name")]
    pub display_name: String,
    #[serde(rename = "player id")]
    pub player_id: i64,
    pub position: Position,
    /// Yaw in degrees.
    pub rotation: f64,
    pub size: f64,
    pub vr: bool,
    #[serde(rename = "is grounded")]
    pub is_grounded: bool,
    pub fps: f64,
    #[serde(rename = "head position")]
    pub head_position: Position,
    #[serde(rename = "head rotation")]
    pub head_rotation: Rotation,
    #[serde(rename = "right hand position")]
    pub right_hand_position: Position,
    #[serde(rename = "right hand rotation")]
    pub right_hand_rotation: Rotation,
    #[serde(rename = "left hand position")]
    pub left_hand_position: Position,
    #[serde(rename = "left hand rotation")]
    pub left_hand_rotation: Rotation,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEvent {
    /// .NET ticks, UTC.
    #[serde(rename = "utc time")]
    pub timestamp_ticks: i64,
    #[serde(rename = "total players")]
    pub total_players: i64,
    #[serde(rename = "world id")]
    pub world_id: String,
    #[serde(rename = "player data collected")]
    pub players: Vec<RawSample>,
}

impl RawEvent {
    /// Event time in unix nanoseconds. Always `Some` for events produced by [`decode`].
    pub fn timestamp_ns(&self) -> Option<i64> {
        ticks_to_unix_nanos(self.timestamp_ticks)
    }
}

/// Parses an extracted payload into an event.
pub fn decode(payload: &str) -> Result<RawEvent, DecodeError> {
    let event: RawEvent = serde_json::from_str(payload)?;
    if event.world_id.is_empty() {
        return Err(DecodeError::EmptyDestination);
    }
    if event.timestamp_ns().is_none() {
        return Err(DecodeError::TimestampOutOfRange(event.timestamp_ticks));
    }
    Ok(event)
}

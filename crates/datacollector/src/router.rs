// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns decoded events into points and queues them per destination.

use std::sync::Arc;
use tracing::trace;

use crate::constants::SYSTEM_DESTINATION;
use crate::errors::RouteError;
use crate::event::{Position, RawEvent, RawSample, Rotation};
use crate::point::MetricPoint;
use crate::pseudonymizer::IdentityTokenizer;
use crate::registry::DestinationRegistry;

const USER_TAG: &str = "user";
const MACHINE_TAG: &str = "machine";

#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<DestinationRegistry>,
    tokenizer: Arc<dyn IdentityTokenizer>,
    machine: String,
}

impl Router {
    pub fn new(
        registry: Arc<DestinationRegistry>,
        tokenizer: Arc<dyn IdentityTokenizer>,
        machine: String,
    ) -> Self {
        Router {
            registry,
            tokenizer,
            machine,
        }
    }

    pub fn registry(&self) -> &Arc<DestinationRegistry> {
        &self.registry
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }

    /// Queues every point derived from `event`.
    ///
    /// All players are pseudonymized before anything is queued, so a failure leaves no partial
    /// event behind. Returns the number of points queued for the event's world.
    pub fn route(&self, event: RawEvent) -> Result<usize, RouteError> {
        let Some(time) = event.timestamp_ns() else {
            return Err(RouteError::Timestamp {
                world_id: event.world_id,
                ticks: event.timestamp_ticks,
            });
        };

        let tokens = event
            .players
            .iter()
            .map(|p| self.tokenizer.tokenize(&p.display_name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| RouteError::Pseudonymize {
                world_id: event.world_id.clone(),
                source,
            })?;

        self.route_system(
            MetricPoint::measurement("players_in_world")
                .tag(MACHINE_TAG, self.machine.as_str())
                .field("value", event.total_players)
                .timestamp(time),
        );
        self.route_system(
            MetricPoint::measurement("players_collected")
                .tag(MACHINE_TAG, self.machine.as_str())
                .field("value", event.players.len())
                .timestamp(time),
        );

        let mut queued = 0;
        for (player, token) in event.players.iter().zip(tokens) {
            for point in player_points(player, &token, time) {
                self.registry.enqueue(&event.world_id, point);
                queued += 1;
            }
        }
        trace!("Queued {queued} points for {}", event.world_id);
        Ok(queued)
    }

    /// Queues a point about the collector itself.
    pub fn route_system(&self, point: MetricPoint) {
        self.registry.enqueue(SYSTEM_DESTINATION, point);
    }
}

fn player_points(player: &RawSample, user: &str, time: i64) -> Vec<MetricPoint> {
    let scalar = |name: &str, value: crate::point::FieldValue| {
        MetricPoint::measurement(name)
            .tag(USER_TAG, user)
            .field("value", value)
            .timestamp(time)
    };

    vec![
        scalar("fps", player.fps.into()),
        scalar("rotation", player.rotation.into()),
        scalar("size", player.size.into()),
        scalar("vr", player.vr.into()),
        scalar("is_grounded", player.is_grounded.into()),
        position_point("position", user, &player.position, time),
        position_point("head_position", user, &player.head_position, time),
        rotation_point("head_rotation", user, &player.head_rotation, time),
        position_point(
            "right_hand_position",
            user,
            &player.right_hand_position,
            time,
        ),
        rotation_point(
            "right_hand_rotation",
            user,
            &player.right_hand_rotation,
            time,
        ),
        position_point("left_hand_position", user, &player.left_hand_position, time),
        rotation_point("left_hand_rotation", user, &player.left_hand_rotation, time),
    ]
}

fn position_point(name: &str, user: &str, position: &Position, time: i64) -> MetricPoint {
    MetricPoint::measurement(name)
        .tag(USER_TAG, user)
        .field("x", position.x)
        .field("y", position.y)
        .field("z", position.z)
        .timestamp(time)
}

fn rotation_point(name: &str, user: &str, rotation: &Rotation, time: i64) -> MetricPoint {
    MetricPoint::measurement(name)
        .tag(USER_TAG, user)
        .field("x", rotation.x)
        .field("y", rotation.y)
        .field("z", rotation.z)
        .field("w", rotation.w)
        .timestamp(time)
}

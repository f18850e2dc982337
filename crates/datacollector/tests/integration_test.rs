// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use datacollector::{
    collector::{Collector, LineOutcome, LineReader},
    constants::SYSTEM_DESTINATION,
    errors::StorageError,
    flusher::{FlushOutcome, FlushWorker, FlushWorkerConfig, FlushWorkerPool},
    point::{FieldValue, MetricPoint},
    pseudonymizer::Pseudonymizer,
    registry::DestinationRegistry,
    router::Router,
    storage::{Provisioning, StorageClient},
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SECRET: &str = "integration-secret";

const ALICE_LINE: &str = r#"2023.2.3 12:34:56.789 Debug      -  DATACOLLECTOR_JSON: {"utc time":638000000000000000,"total players":1,"world id":"w1","player data collected":[{"display name":"Alice","player id":1,"position":{"x":1,"y":2,"z":3},"rotation":90,"size":1.6,"vr":true,"is grounded":true,"fps":72,"head position":{"x":0,"y":1.6,"z":0},"head rotation":{"x":0,"y":0,"z":0,"w":1},"right hand position":{"x":0.3,"y":1.2,"z":0},"right hand rotation":{"x":0,"y":0,"z":0,"w":1},"left hand position":{"x":-0.3,"y":1.2,"z":0},"left hand rotation":{"x":0,"y":0,"z":0,"w":1}}]}"#;

/// Records writes and flags any two writes to one destination that overlap in time.
#[derive(Default)]
struct RecordingStorage {
    provisioned: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, usize)>>,
    in_flight: Mutex<HashSet<String>>,
    overlaps: AtomicUsize,
}

impl RecordingStorage {
    fn written_to(&self, destination: &str) -> usize {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == destination)
            .map(|(_, n)| n)
            .sum()
    }
}

#[async_trait]
impl StorageClient for RecordingStorage {
    async fn ensure_destination(&self, name: &str) -> Result<Provisioning, StorageError> {
        let mut provisioned = self.provisioned.lock().unwrap();
        if provisioned.iter().any(|p| p == name) {
            return Ok(Provisioning::AlreadyExists);
        }
        provisioned.push(name.to_string());
        Ok(Provisioning::Created)
    }

    async fn write_batch(
        &self,
        destination: &str,
        points: &[MetricPoint],
    ) -> Result<(), StorageError> {
        if !self.in_flight.lock().unwrap().insert(destination.to_string()) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        self.in_flight.lock().unwrap().remove(destination);
        self.writes
            .lock()
            .unwrap()
            .push((destination.to_string(), points.len()));
        Ok(())
    }
}

fn pipeline() -> (Arc<DestinationRegistry>, Router) {
    let registry = Arc::new(DestinationRegistry::new(None));
    let router = Router::new(
        Arc::clone(&registry),
        Arc::new(Pseudonymizer::new(SECRET).unwrap()),
        "rig-1".to_string(),
    );
    (registry, router)
}

fn collector(router: Router) -> Collector {
    Collector::new(
        router,
        LineReader::MirrorTest(Default::default()),
        CancellationToken::new(),
    )
}

fn fps(i: i64) -> MetricPoint {
    MetricPoint::measurement("fps")
        .tag("user", "u")
        .field("value", 60.0)
        .timestamp(i)
}

#[test]
fn test_event_line_is_pseudonymized_and_queued() {
    let (registry, router) = pipeline();
    let outcome = collector(router).consume_line(ALICE_LINE);
    assert_eq!(outcome, LineOutcome::Routed(12));

    let points = registry.try_drain_if_threshold("w1", 1).unwrap();
    let expected_user = Pseudonymizer::new(SECRET).unwrap().pseudonymize("Alice").unwrap();
    assert_eq!(points.len(), 12);
    for point in &points {
        assert_eq!(point.tags()["user"], expected_user);
        assert_eq!(point.timestamp_ns(), 1_664_403_200_000_000_000);
    }

    let transforms: Vec<&str> = points
        .iter()
        .filter(|p| p.fields().contains_key("x"))
        .map(MetricPoint::name)
        .collect();
    assert_eq!(
        transforms,
        vec![
            "position",
            "head_position",
            "head_rotation",
            "right_hand_position",
            "right_hand_rotation",
            "left_hand_position",
            "left_hand_rotation",
        ]
    );

    let system = registry
        .try_drain_if_threshold(SYSTEM_DESTINATION, 1)
        .unwrap();
    let players_in_world = system
        .iter()
        .find(|p| p.name() == "players_in_world")
        .unwrap();
    assert_eq!(players_in_world.fields()["value"], FieldValue::Integer(1));
}

#[test]
fn test_line_without_sentinel_produces_nothing() {
    let (registry, router) = pipeline();
    let line = ALICE_LINE.replace("DATACOLLECTOR_JSON", "SOMETHING_ELSE");
    assert_eq!(collector(router).consume_line(&line), LineOutcome::NotAnEvent);
    assert_eq!(registry.total_queued(), 0);
}

#[test]
fn test_payload_without_world_is_rejected() {
    let (registry, router) = pipeline();
    let line = ALICE_LINE.replace(r#""world id":"w1","#, "");
    assert_eq!(collector(router).consume_line(&line), LineOutcome::Malformed);
    assert_eq!(registry.total_queued(), 0);
}

#[tokio::test]
async fn test_threshold_flush_drains_exactly_once() {
    let (registry, _) = pipeline();
    let storage = Arc::new(RecordingStorage::default());
    let worker = FlushWorker::new(
        0,
        Arc::clone(&registry),
        Arc::clone(&storage) as Arc<dyn StorageClient>,
        1000,
        Duration::from_millis(1),
    );

    for i in 0..1000 {
        registry.enqueue("w2", fps(i));
    }
    assert_eq!(worker.flush_pass().await, vec![FlushOutcome::Flushed(1000)]);
    assert_eq!(*storage.writes.lock().unwrap(), vec![("w2".to_string(), 1000)]);
    assert_eq!(*storage.provisioned.lock().unwrap(), vec!["w2".to_string()]);

    registry.enqueue("w2", fps(1000));
    assert_eq!(worker.flush_pass().await, vec![FlushOutcome::Skipped]);
    assert_eq!(registry.queue_len("w2"), 1);
    assert_eq!(storage.writes.lock().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_workers_never_overlap_on_one_destination() {
    const PRODUCED: usize = 20_000;
    const THRESHOLD: usize = 50;

    let (registry, _) = pipeline();
    let storage = Arc::new(RecordingStorage::default());
    let cancel_token = CancellationToken::new();
    let handles = FlushWorkerPool::new(
        &FlushWorkerConfig {
            workers: 16,
            threshold: THRESHOLD,
            scan_interval: Duration::from_millis(1),
        },
        Arc::clone(&registry),
        Arc::clone(&storage) as Arc<dyn StorageClient>,
    )
    .spawn(&cancel_token);

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for i in 0..PRODUCED / 4 {
                    registry.enqueue("hot", fps((p * PRODUCED + i) as i64));
                    registry.enqueue("cold", fps(i as i64));
                    if i % 500 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(10), async {
        while registry.queue_len("hot") >= THRESHOLD || registry.queue_len("cold") >= THRESHOLD {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("queues drained below threshold");

    cancel_token.cancel();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(storage.overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(
        storage.written_to("hot") + registry.queue_len("hot"),
        PRODUCED
    );
    assert_eq!(
        storage.written_to("cold") + registry.queue_len("cold"),
        PRODUCED
    );
    let provisioned = storage.provisioned.lock().unwrap();
    assert_eq!(provisioned.iter().filter(|p| *p == "hot").count(), 1);
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-destination point queues.
//!
//! The registry is the only owner of queued points. Each [`Destination`] holds a FIFO queue,
//! a provisioning flag and an exclusive flush section. Enqueueing only ever takes the queue
//! lock for a push, so the tailer is never held up by a worker that is busy writing.
//!
//! # Memory
//!
//! Queues are unbounded by default and grow for as long as the backend is unavailable.
//! With `max_queue_len` set, the oldest point is evicted instead.

use hashbrown::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::MutexGuard;
use tracing::{debug, warn};

use crate::point::MetricPoint;

#[derive(Debug)]
pub struct Destination {
    id: String,
    queue: Mutex<VecDeque<MetricPoint>>,
    provisioned: AtomicBool,
    flush_section: tokio::sync::Mutex<()>,
}

impl Destination {
    fn new(id: String) -> Self {
        Destination {
            id,
            queue: Mutex::new(VecDeque::new()),
            provisioned: AtomicBool::new(false),
            flush_section: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        let queue = self.queue.lock().expect("lock poisoned");
        queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_provisioned(&self) -> bool {
        self.provisioned.load(Ordering::Acquire)
    }

    /// Records that the bucket exists. The flag never goes back to unknown.
    pub fn mark_provisioned(&self) {
        self.provisioned.store(true, Ordering::Release);
    }

    /// Enters the flush section for this destination, unless another worker is in it.
    ///
    /// Drain, provisioning and write all happen while the returned guard is held.
    pub fn try_enter_flush(&self) -> Option<MutexGuard<'_, ()>> {
        self.flush_section.try_lock().ok()
    }

    /// Appends a point. Returns `true` if the oldest point had to be evicted to make room.
    fn push(&self, point: MetricPoint, max_len: Option<usize>) -> bool {
        #[allow(clippy::expect_used)]
        let mut queue = self.queue.lock().expect("lock poisoned");
        let evicted = match max_len {
            Some(max) if max > 0 && queue.len() >= max => queue.pop_front().is_some(),
            _ => false,
        };
        queue.push_back(point);
        evicted
    }

    /// Takes every queued point if there are at least `threshold` of them.
    ///
    /// Points pushed after this returns stay queued for the next drain.
    pub fn drain_if_threshold(&self, threshold: usize) -> Option<Vec<MetricPoint>> {
        #[allow(clippy::expect_used)]
        let mut queue = self.queue.lock().expect("lock poisoned");
        if queue.is_empty() || queue.len() < threshold {
            return None;
        }
        Some(Vec::from(std::mem::take(&mut *queue)))
    }
}

#[derive(Debug, Default)]
pub struct DestinationRegistry {
    destinations: RwLock<HashMap<String, Arc<Destination>>>,
    max_queue_len: Option<usize>,
}

impl DestinationRegistry {
    #[must_use]
    pub fn new(max_queue_len: Option<usize>) -> Self {
        DestinationRegistry {
            destinations: RwLock::new(HashMap::new()),
            max_queue_len,
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Destination>> {
        #[allow(clippy::expect_used)]
        let destinations = self.destinations.read().expect("lock poisoned");
        destinations.get(id).cloned()
    }

    /// Returns the destination for `id`, creating it on first reference.
    pub fn get_or_create(&self, id: &str) -> Arc<Destination> {
        if let Some(destination) = self.get(id) {
            return destination;
        }
        #[allow(clippy::expect_used)]
        let mut destinations = self.destinations.write().expect("lock poisoned");
        Arc::clone(destinations.entry(id.to_string()).or_insert_with(|| {
            debug!("New destination {id}");
            Arc::new(Destination::new(id.to_string()))
        }))
    }

    pub fn enqueue(&self, id: &str, point: MetricPoint) {
        let destination = self.get_or_create(id);
        if destination.push(point, self.max_queue_len) {
            warn!(
                "Queue for {} full ({} points), dropping oldest point",
                id,
                self.max_queue_len.unwrap_or_default()
            );
        }
    }

    pub fn try_drain_if_threshold(&self, id: &str, threshold: usize) -> Option<Vec<MetricPoint>> {
        self.get(id)?.drain_if_threshold(threshold)
    }

    pub fn queue_len(&self, id: &str) -> usize {
        self.get(id).map_or(0, |d| d.len())
    }

    pub fn total_queued(&self) -> usize {
        self.snapshot().iter().map(|d| d.len()).sum()
    }

    pub fn destination_ids(&self) -> Vec<String> {
        #[allow(clippy::expect_used)]
        let destinations = self.destinations.read().expect("lock poisoned");
        destinations.keys().cloned().collect()
    }

    /// Destinations known right now. Ones created afterwards are picked up by the next call.
    pub fn snapshot(&self) -> Vec<Arc<Destination>> {
        #[allow(clippy::expect_used)]
        let destinations = self.destinations.read().expect("lock poisoned");
        destinations.values().cloned().collect()
    }
}

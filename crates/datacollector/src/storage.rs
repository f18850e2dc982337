// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::point::MetricPoint;

/// How a destination came to exist. Both outcomes confirm it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    Created,
    AlreadyExists,
}

/// The two storage capabilities the pipeline needs.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Creates the destination if it is missing. Must be idempotent.
    async fn ensure_destination(&self, name: &str) -> Result<Provisioning, StorageError>;

    /// Writes the batch in full, or fails in full.
    async fn write_batch(&self, destination: &str, points: &[MetricPoint])
        -> Result<(), StorageError>;
}

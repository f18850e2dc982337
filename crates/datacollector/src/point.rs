// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Time-series points and their InfluxDB line protocol encoding.
//!
//! A point is built once, fluently, and never changes afterwards:
//!
//! ```
//! use datacollector::point::MetricPoint;
//!
//! let point = MetricPoint::measurement("fps")
//!     .tag("user", "abc")
//!     .field("value", 72.0)
//!     .timestamp(1_664_403_200_000_000_000);
//! assert_eq!(point.to_line_protocol(), "fps,user=abc value=72 1664403200000000000");
//! ```

use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{NANOS_PER_TICK, UNIX_EPOCH_TICKS};

/// A field value as understood by the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display)]
pub enum FieldValue {
    #[display("{_0}")]
    Float(f64),
    #[display("{_0}i")]
    Integer(i64),
    #[display("{_0}")]
    Boolean(bool),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// One timestamped observation, stored at nanosecond precision.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp_ns: i64,
}

impl MetricPoint {
    #[must_use]
    pub fn measurement(name: impl Into<String>) -> Self {
        MetricPoint {
            measurement: name.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp_ns: 0,
        }
    }

    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Nanoseconds since the unix epoch.
    #[must_use]
    pub fn timestamp(mut self, timestamp_ns: i64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    pub fn name(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    /// Encodes the point as a single line of InfluxDB line protocol.
    ///
    /// Tags and fields come out sorted by key, which is what the backend prefers for
    /// series indexing.
    pub fn to_line_protocol(&self) -> String {
        let mut line = String::with_capacity(64);
        escape_into(&mut line, &self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            line.push(',');
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            escape_into(&mut line, value, &[',', '=', ' ']);
        }
        let mut first = true;
        for (key, value) in &self.fields {
            line.push(if first { ' ' } else { ',' });
            first = false;
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            let _ = write!(line, "{value}");
        }
        let _ = write!(line, " {}", self.timestamp_ns);
        line
    }
}

fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Converts .NET ticks (100ns since 0001-01-01 UTC) to unix nanoseconds.
///
/// Returns `None` when the result does not fit in an `i64`.
pub fn ticks_to_unix_nanos(ticks: i64) -> Option<i64> {
    ticks
        .checked_sub(UNIX_EPOCH_TICKS)?
        .checked_mul(NANOS_PER_TICK)
}

/// Current wall-clock time in unix nanoseconds.
pub fn now_unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

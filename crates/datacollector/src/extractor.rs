// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Recognises the log lines that carry a telemetry payload.
//!
//! The game client writes lines shaped like
//! `2023.1.1 12:34:56.789 Debug      -  DATACOLLECTOR_JSON: {...}`. Everything else in the
//! log is noise and is skipped without complaint.

use regex::Regex;
use std::sync::OnceLock;

use crate::constants::SENTINEL;

fn payload_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        let pattern = Regex::new(&format!(
            r"[0-9]+(?:\.[0-9]+)+ [0-9]{{2}}:[0-9]{{2}}:[0-9]{{2}}(?:\.[0-9]{{1,3}})? Debug\s+-\s+{}: (?P<payload>\{{.*\}})",
            regex::escape(SENTINEL)
        ))
        .expect("payload pattern is valid");
        pattern
    })
}

/// Returns the JSON payload embedded in `line`, or `None` if the line is not a telemetry line.
pub fn extract_payload(line: &str) -> Option<&str> {
    payload_line()
        .captures(line)
        .and_then(|caps| caps.name("payload"))
        .map(|m| m.as_str())
}

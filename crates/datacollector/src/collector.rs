// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The ingestion loop: log lines in, queued points out.
//!
//! Lines that do not carry a payload are skipped quietly, payloads that fail to decode or
//! pseudonymize are logged and dropped. Nothing coming from the log can stop the loop.

use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::errors::TailerError;
use crate::event::decode;
use crate::extractor::extract_payload;
use crate::router::Router;
use crate::tailer::LogTailer;

// LineReader abstracts where log lines come from.
pub enum LineReader {
    /// Live log file (default source)
    Tail(LogTailer),

    /// Replays fixed lines, then reports exhaustion - for tests
    MirrorTest(VecDeque<String>),
}

impl LineReader {
    /// `Ok(None)` only ever comes from an exhausted mirror reader.
    async fn read(&mut self) -> Result<Option<String>, TailerError> {
        match self {
            LineReader::Tail(tailer) => tailer.next_line().await.map(Some),
            LineReader::MirrorTest(lines) => Ok(lines.pop_front()),
        }
    }
}

/// What happened to a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    NotAnEvent,
    Malformed,
    Rejected,
    /// Number of points queued for the event's world.
    Routed(usize),
}

pub struct Collector {
    cancel_token: CancellationToken,
    router: Router,
    line_reader: LineReader,
}

impl Collector {
    #[must_use]
    pub fn new(router: Router, line_reader: LineReader, cancel_token: CancellationToken) -> Self {
        Collector {
            cancel_token,
            router,
            line_reader,
        }
    }

    /// Main loop: reads and processes lines until cancelled.
    pub async fn spin(mut self) {
        loop {
            tokio::select! {
                line = self.line_reader.read() => match line {
                    Ok(Some(line)) => {
                        self.consume_line(&line);
                    }
                    Ok(None) => {
                        debug!("Line source exhausted");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read log line: {e}");
                        tokio::time::sleep(crate::constants::TAIL_POLL_INTERVAL).await;
                    }
                },
                () = self.cancel_token.cancelled() => {
                    debug!("Collector shutting down");
                    break;
                }
            }
        }
    }

    /// Extracts, decodes and routes one line.
    pub fn consume_line(&self, line: &str) -> LineOutcome {
        let Some(payload) = extract_payload(line) else {
            trace!("Skipping line without payload");
            return LineOutcome::NotAnEvent;
        };

        let event = match decode(payload) {
            Ok(event) => event,
            Err(e) => {
                error!("Failed to parse payload: {e}");
                return LineOutcome::Malformed;
            }
        };

        match self.router.route(event) {
            Ok(queued) => LineOutcome::Routed(queued),
            Err(e) => {
                warn!("{e}");
                LineOutcome::Rejected
            }
        }
    }
}

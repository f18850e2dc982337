// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Follows the newest game-client log as it grows.
//!
//! The tailer binds to one file for its whole life and starts at its end, so history is never
//! replayed. When the client rotates to a new file the tailer keeps reading the old one; a
//! restart of the collector is needed to pick up the new log.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info};

use crate::constants::{LOG_FILE_PREFIX, LOG_FILE_SUFFIX, TAIL_POLL_INTERVAL};
use crate::errors::TailerError;

/// Picks the log with the greatest file name in `dir`; the client embeds a sortable
/// timestamp in it, so that is the newest one.
pub fn find_newest_log(dir: &Path) -> Result<PathBuf, TailerError> {
    let mut newest: Option<PathBuf> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with(LOG_FILE_PREFIX) || !name.ends_with(LOG_FILE_SUFFIX) {
            continue;
        }
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if newest.as_ref().map_or(true, |n| path.file_name() > n.file_name()) {
            newest = Some(path);
        }
    }
    newest.ok_or_else(|| TailerError::NoLogFile {
        dir: dir.display().to_string(),
        pattern: format!("{LOG_FILE_PREFIX}*{LOG_FILE_SUFFIX}"),
    })
}

pub struct LogTailer {
    path: PathBuf,
    reader: BufReader<File>,
    pending: Vec<u8>,
    poll_interval: Duration,
}

impl LogTailer {
    /// Opens `path` read-only, leaving the writer free to keep appending, and moves to its end.
    pub async fn open(path: &Path) -> Result<Self, TailerError> {
        let mut file = File::open(path).await?;
        let position = file.seek(SeekFrom::End(0)).await?;
        info!("Tailing {} from byte {}", path.display(), position);
        Ok(LogTailer {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            pending: Vec::new(),
            poll_interval: TAIL_POLL_INTERVAL,
        })
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the next complete line and returns it without its terminator.
    ///
    /// Never reports end of stream; at the end of the file it sleeps and looks again. A line
    /// that is still being written is held back until its newline shows up.
    pub async fn next_line(&mut self) -> Result<String, TailerError> {
        loop {
            let read = self.reader.read_until(b'\n', &mut self.pending).await?;
            if read > 0 && self.pending.ends_with(b"\n") {
                let mut line = std::mem::take(&mut self.pending);
                line.pop();
                if line.ends_with(b"\r") {
                    line.pop();
                }
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            if read > 0 {
                debug!("Partial line of {} bytes, waiting for the rest", self.pending.len());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

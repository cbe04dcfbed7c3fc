//! Monitor mode
//!
//! Replays a recorded trace of stage samples (one JSON object per line)
//! through the pathway monitor.

use flowgate_core::{StageSample, SignalSource};
use std::io::BufRead;

/// Signal source backed by a JSON-lines trace
///
/// Lines that do not parse as a sample, including lines that are not valid
/// UTF-8, are skipped. The source closes at end of input or on a read error.
pub struct ReplaySource<R: BufRead> {
    lines: std::io::Split<R>,
    line_number: usize,
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.split(b'\n'),
            line_number: 0,
        }
    }
}

impl<R: BufRead> SignalSource for ReplaySource<R> {
    fn sample(&mut self) -> Option<StageSample> {
        loop {
            self.line_number += 1;
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    log::warn!("Trace read failed at line {}: {}", self.line_number, e);
                    return None;
                }
            };

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice(&line) {
                Ok(sample) => return Some(sample),
                Err(e) => log::debug!("Skipping trace line {}: {}", self.line_number, e),
            }
        }
    }
}

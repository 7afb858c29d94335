//! Newline-delimited JSON input, as read by the `kafka-output` binary.

use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::event::Event;
use crate::output::{BatchReport, KafkaOutput};
use crate::Result;

/// Totals for one [`ship_lines`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSummary {
    /// Events parsed and handed to the output.
    pub read: usize,
    pub malformed: usize,
    pub delivered: usize,
    pub dropped: usize,
    /// Input stopped because shutdown was requested, not at end of input.
    pub interrupted: bool,
}

impl InputSummary {
    fn record(&mut self, report: &BatchReport) {
        self.delivered += report.delivered();
        self.dropped += report.dropped();
    }
}

/// Reads one JSON event per line and hands them to `output` in batches of
/// `batch_size`, until the reader is exhausted or `shutdown` resolves.
///
/// `shutdown` is only observed while waiting for the next line. A batch
/// already handed to the output runs to completion, and events buffered when
/// shutdown is requested are still sent, so every event read ends up either
/// delivered or logged as dropped.
pub async fn ship_lines<R, S>(
    output: &KafkaOutput,
    reader: R,
    batch_size: usize,
    shutdown: S,
) -> Result<InputSummary>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let batch_size = batch_size.max(1);
    let mut lines = reader.lines();
    let mut batch = Vec::with_capacity(batch_size);
    let mut summary = InputSummary::default();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => {
                info!(buffered = batch.len(), "Shutdown requested, sending buffered events");
                summary.interrupted = true;
                break;
            }
        };

        let line = match line {
            Some(line) => line,
            None => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        match Event::from_json(&line) {
            Ok(event) => {
                summary.read += 1;
                batch.push(event);
            }
            Err(e) => {
                summary.malformed += 1;
                warn!("Skipping malformed event: {}", e);
            }
        }

        if batch.len() >= batch_size {
            summary.record(&output.multi_receive(&batch).await);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        summary.record(&output.multi_receive(&batch).await);
    }

    Ok(summary)
}

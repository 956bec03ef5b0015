//! # Stream Aggregator
//!
//! Buffers an incremental token stream and turns it into a debounced
//! sequence of updates: throttled partials carrying the full text so far,
//! then exactly one completion. A mid-stream failure still completes with
//! whatever text accumulated, so a half-generated rebuttal is never lost.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::llm::{LlmError, TokenReceiver};

/// Minimum time between successive partial updates
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(800);

/// Updates yielded while a generation is in flight
#[derive(Debug)]
pub enum StreamUpdate {
    /// Full trimmed buffer so far; at most one per debounce interval
    Partial(String),
    /// Hard stream error; at most one, and never the last word on its own
    Failed(LlmError),
    /// Final trimmed text; exactly once, unless the buffer ended up empty
    Complete(String),
}

pub struct StreamAggregator {
    debounce: Duration,
}

impl StreamAggregator {
    pub fn new() -> Self {
        StreamAggregator {
            debounce: DEBOUNCE_INTERVAL,
        }
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        StreamAggregator { debounce }
    }

    /// Consume the token channel on a worker task and return the update
    /// sequence. Dropping the returned receiver cancels the aggregation.
    pub fn run(&self, mut tokens: TokenReceiver) -> mpsc::Receiver<StreamUpdate> {
        let debounce = self.debounce;
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut buffer = String::new();
            let mut last_partial = Instant::now();

            loop {
                match tokens.recv().await {
                    Some(Ok(token)) => {
                        buffer.push_str(&token);
                        if last_partial.elapsed() >= debounce && !buffer.trim().is_empty() {
                            let update = StreamUpdate::Partial(buffer.trim().to_string());
                            if tx.send(update).await.is_err() {
                                return;
                            }
                            last_partial = Instant::now();
                        }
                    }
                    Some(Err(e)) => {
                        // Fail open: report the error, then complete below
                        // with whatever text accumulated
                        let _ = tx.send(StreamUpdate::Failed(e)).await;
                        break;
                    }
                    None => break,
                }
            }

            let text = buffer.trim();
            if !text.is_empty() {
                let _ = tx.send(StreamUpdate::Complete(text.to_string())).await;
            }
        });

        rx
    }
}

impl Default for StreamAggregator {
    fn default() -> Self {
        Self::new()
    }
}

//! Progress reporting for matching runs.
//!
//! The matcher publishes to a [`ProgressSink`]; a consumer drains the other
//! end of the channel. The buffered API passes no sink, the streaming API
//! wraps the receiver in a `Stream` via [`stream_match`].

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::error;

use super::coordinator::TrialMatcher;
use super::report::render_report;
use super::types::TrialMatch;

/// Capacity of the per-run progress channel.
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// One event in a matching run's progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    /// Short human-readable status line.
    Status { message: String },
    /// Final, sorted matches and the rendered report.
    Complete {
        matches: Vec<TrialMatch>,
        report: String,
    },
    /// The run could not produce a result.
    Error { message: String },
}

impl MatchEvent {
    /// Event name used for SSE framing.
    pub fn event_name(&self) -> &'static str {
        match self {
            MatchEvent::Status { .. } => "status",
            MatchEvent::Complete { .. } => "complete",
            MatchEvent::Error { .. } => "error",
        }
    }

    /// Complete and Error end a stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchEvent::Status { .. })
    }
}

/// Sending half of a progress channel.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<MatchEvent>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<MatchEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::Receiver<MatchEvent>) {
        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        (Self::new(tx), rx)
    }

    /// Publish a status line. A departed consumer is ignored.
    pub async fn status(&self, message: impl Into<String>) {
        self.send(MatchEvent::Status {
            message: message.into(),
        })
        .await;
    }

    /// Publish any event. A departed consumer is ignored.
    pub async fn send(&self, event: MatchEvent) {
        let _ = self.tx.send(event).await;
    }

    /// True once the consumer has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Run a match in the background and expose its progress as a stream.
///
/// The stream yields status events followed by exactly one `Complete` or
/// `Error`. Dropping the stream cancels the run at the next candidate.
pub fn stream_match(
    matcher: Arc<TrialMatcher>,
    patient_text: String,
    max_results: usize,
) -> impl Stream<Item = MatchEvent> + Send + 'static {
    let (sink, rx) = ProgressSink::channel();
    let watcher_sink = sink.clone();

    let run = tokio::spawn(async move {
        let run = matcher.run(&patient_text, max_results, Some(&sink)).await;
        let report = render_report(&run.matches);
        sink.send(MatchEvent::Complete {
            matches: run.matches,
            report,
        })
        .await;
    });

    tokio::spawn(async move {
        if let Err(e) = run.await {
            error!(error = %e, "Matching task failed");
            watcher_sink
                .send(MatchEvent::Error {
                    message: format!("Matching failed: {}", e),
                })
                .await;
        }
    });

    stream::unfold((rx, false), |(mut rx, finished)| async move {
        if finished {
            return None;
        }
        let event = rx.recv().await?;
        let terminal = event.is_terminal();
        Some((event, (rx, terminal)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tagged() {
        let event = MatchEvent::Status {
            message: "[Step 1/4] Analyzing".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["message"], "[Step 1/4] Analyzing");

        let event = MatchEvent::Complete {
            matches: vec![],
            report: "r".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "complete");
        assert!(json["matches"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_terminal_events() {
        assert!(!MatchEvent::Status { message: String::new() }.is_terminal());
        assert!(MatchEvent::Error { message: String::new() }.is_terminal());
        assert_eq!(
            MatchEvent::Error { message: String::new() }.event_name(),
            "error"
        );
    }

    #[tokio::test]
    async fn test_sink_ignores_closed_receiver() {
        let (sink, rx) = ProgressSink::channel();
        assert!(!sink.is_closed());
        drop(rx);
        assert!(sink.is_closed());
        sink.status("nobody listening").await;
    }
}

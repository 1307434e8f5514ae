//! Streaming relay. Forwards the writer's event stream to one HTTP client.
//!
//! Each decoded content event becomes exactly one message on the outbound
//! channel. The pump stops when the upstream sends its end marker, when the
//! client goes away (receiver dropped), or when the upstream ceiling elapses,
//! whichever comes first. The ceiling is independent of the client.

pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::generation_client::sse::{SseDecoder, SseFrame};
use crate::generation_client::types::WriteRequest;
use crate::generation_client::GenerationService;

/// Units buffered between the pump and the HTTP body.
const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Upstream sent its end marker.
    Completed,
    /// Upstream closed the connection without an end marker.
    UpstreamEnded,
    ClientGone,
    TimedOut,
    Failed(String),
}

#[derive(Clone)]
pub struct StreamRelay {
    generation: Arc<dyn GenerationService>,
    upstream_timeout: Duration,
}

impl StreamRelay {
    pub fn new(generation: Arc<dyn GenerationService>, upstream_timeout: Duration) -> Self {
        Self {
            generation,
            upstream_timeout,
        }
    }

    /// Starts pumping. Dropping the receiver cancels the upstream read.
    pub fn open(&self, request: WriteRequest) -> (mpsc::Receiver<String>, JoinHandle<RelayOutcome>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let relay = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = relay.pump(request, tx).await;
            match &outcome {
                RelayOutcome::Completed | RelayOutcome::UpstreamEnded => {
                    info!(outcome = ?outcome, "Write stream finished")
                }
                RelayOutcome::ClientGone => info!("Write stream abandoned by client"),
                RelayOutcome::TimedOut | RelayOutcome::Failed(_) => {
                    warn!(outcome = ?outcome, "Write stream aborted")
                }
            }
            outcome
        });
        (rx, handle)
    }

    async fn pump(&self, request: WriteRequest, tx: mpsc::Sender<String>) -> RelayOutcome {
        tokio::select! {
            _ = tx.closed() => RelayOutcome::ClientGone,
            forwarded = tokio::time::timeout(self.upstream_timeout, self.forward(&request, &tx)) => {
                forwarded.unwrap_or(RelayOutcome::TimedOut)
            }
        }
    }

    async fn forward(&self, request: &WriteRequest, tx: &mpsc::Sender<String>) -> RelayOutcome {
        let mut upstream = match self.generation.open_write_stream(request).await {
            Ok(stream) => stream,
            Err(e) => return RelayOutcome::Failed(e.to_string()),
        };
        let mut decoder = SseDecoder::new();
        let mut forwarded = 0usize;

        loop {
            let chunk = match upstream.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => return RelayOutcome::UpstreamEnded,
                Err(e) => return RelayOutcome::Failed(e.to_string()),
            };
            for frame in decoder.feed(&chunk) {
                match frame {
                    SseFrame::Data(unit) => {
                        if tx.send(unit).await.is_err() {
                            return RelayOutcome::ClientGone;
                        }
                        forwarded += 1;
                    }
                    SseFrame::End => {
                        debug!(forwarded, "Upstream end marker received");
                        return RelayOutcome::Completed;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::ResumeData;
    use crate::testing::{FakeGeneration, StreamTail};
    use bytes::Bytes;

    fn request() -> WriteRequest {
        WriteRequest {
            resume: ResumeData::default(),
            requirement: "r".into(),
            info: "i".into(),
        }
    }

    fn relay(fake: &Arc<FakeGeneration>, timeout: Duration) -> StreamRelay {
        StreamRelay::new(fake.clone(), timeout)
    }

    #[tokio::test]
    async fn test_add_then_end_forwards_one_unit_and_closes() {
        let fake = Arc::new(FakeGeneration::default());
        fake.set_write_stream(
            vec![
                Bytes::from_static(b"event: add\ndata: X\n\n"),
                Bytes::from_static(b"event: end\n\n"),
            ],
            StreamTail::Pending,
        );

        let (mut rx, handle) = relay(&fake, Duration::from_secs(60)).open(request());

        assert_eq!(rx.recv().await.as_deref(), Some("X"));
        assert_eq!(rx.recv().await, None);
        assert_eq!(handle.await.unwrap(), RelayOutcome::Completed);
    }

    #[tokio::test]
    async fn test_units_split_across_chunks_are_forwarded_whole() {
        let fake = Arc::new(FakeGeneration::default());
        fake.set_write_stream(
            vec![
                Bytes::from_static(b"event: add\nda"),
                Bytes::from_static(b"ta: hello\n\nevent: add\ndata: world\n\n"),
            ],
            StreamTail::Close,
        );

        let (mut rx, handle) = relay(&fake, Duration::from_secs(60)).open(request());

        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
        assert_eq!(rx.recv().await.as_deref(), Some("world"));
        assert_eq!(rx.recv().await, None);
        assert_eq!(handle.await.unwrap(), RelayOutcome::UpstreamEnded);
    }

    #[tokio::test]
    async fn test_client_disconnect_stops_upstream_consumption() {
        let fake = Arc::new(FakeGeneration::default());
        let dropped = fake.set_write_stream(
            vec![Bytes::from_static(b"event: add\ndata: first\n\n")],
            StreamTail::Pending,
        );

        let (mut rx, handle) = relay(&fake, Duration::from_secs(60)).open(request());
        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        drop(rx);

        let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("relay kept running after the client left")
            .unwrap();
        assert_eq!(outcome, RelayOutcome::ClientGone);
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_upstream_hits_ceiling() {
        let fake = Arc::new(FakeGeneration::default());
        let dropped = fake.set_write_stream(Vec::new(), StreamTail::Pending);

        let (mut rx, handle) = relay(&fake, Duration::from_secs(60)).open(request());

        assert_eq!(rx.recv().await, None);
        assert_eq!(handle.await.unwrap(), RelayOutcome::TimedOut);
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_upstream_error_fails_relay() {
        let fake = Arc::new(FakeGeneration::default());
        fake.fail_write_stream();

        let (mut rx, handle) = relay(&fake, Duration::from_secs(60)).open(request());

        assert_eq!(rx.recv().await, None);
        assert!(matches!(handle.await.unwrap(), RelayOutcome::Failed(_)));
    }
}

//! Streaming generation: turns the transport's lines into output units.

use futures::stream::{FusedStream, Stream};
use futures::ready;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, trace};

use crate::client::{ClientError, Result};
use crate::correlator::ResponseCorrelator;
use crate::model::{GeneratedContent, RequestId};
use crate::sse::STREAM_LINE_PREFIX;
use crate::transport::LineStream;
use crate::wire;

/// A lazy stream of [`GeneratedContent`] for one streamed call.
///
/// Lines of at most as many characters as the `data: ` prefix (blank
/// keep-alives and the like) are skipped; length counts characters, not
/// bytes. Every other line must carry the prefix followed by a JSON response;
/// its snapshot is recorded in the correlator before the unit is yielded.
/// The first error is yielded once and ends the stream, and the
/// underlying response is released at that point.
///
/// Each poll reads at most as far as the next data line.
pub struct GenerationStream {
    id: RequestId,
    correlator: Arc<ResponseCorrelator>,
    lines: Option<LineStream>,
}

impl GenerationStream {
    pub fn new(
        id: RequestId,
        correlator: Arc<ResponseCorrelator>,
        lines: impl Stream<Item = Result<String>> + Send + 'static,
    ) -> Self {
        Self {
            id,
            correlator,
            lines: Some(Box::pin(lines)),
        }
    }

    /// Id shared by every unit of this stream. Available before the first poll.
    pub fn id(&self) -> RequestId {
        self.id
    }

    fn process_line(&self, line: String) -> Result<Option<GeneratedContent>> {
        if line.chars().count() <= STREAM_LINE_PREFIX.len() {
            trace!(request_id = %self.id, "skipping short stream line");
            return Ok(None);
        }

        let payload = line
            .strip_prefix(STREAM_LINE_PREFIX)
            .ok_or_else(|| ClientError::malformed(line.as_str(), "missing `data: ` prefix"))?;

        let decoded = wire::decode(payload).map_err(|err| match err {
            ClientError::MalformedResponse { reason, .. } => {
                ClientError::malformed(line.as_str(), reason)
            }
            other => other,
        })?;

        self.correlator.put(self.id, decoded.response);
        debug!(request_id = %self.id, len = decoded.text.len(), "stream event");

        Ok(Some(GeneratedContent {
            id: self.id,
            text: decoded.text,
        }))
    }
}

impl Stream for GenerationStream {
    type Item = Result<GeneratedContent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            let Some(lines) = this.lines.as_mut() else {
                return Poll::Ready(None);
            };

            let outcome = match ready!(lines.as_mut().poll_next(cx)) {
                Some(Ok(line)) => this.process_line(line),
                Some(Err(err)) => Err(err),
                None => {
                    this.lines = None;
                    return Poll::Ready(None);
                }
            };

            match outcome {
                Ok(Some(unit)) => return Poll::Ready(Some(Ok(unit))),
                Ok(None) => continue,
                Err(err) => {
                    debug!(request_id = %this.id, error = %err, "stream failed");
                    this.lines = None;
                    return Poll::Ready(Some(Err(err)));
                }
            }
        }
    }
}

impl FusedStream for GenerationStream {
    fn is_terminated(&self) -> bool {
        self.lines.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::split_lines;
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(text: &str, total_tokens: u32) -> String {
        format!(
            r#"data: {{"candidates":[{{"content":{{"role":"model","parts":[{{"text":"{text}"}}]}}}}],"usageMetadata":{{"promptTokenCount":3,"totalTokenCount":{total_tokens}}}}}"#
        )
    }

    fn stream_of(lines: Vec<Result<String>>) -> (GenerationStream, Arc<ResponseCorrelator>) {
        let correlator = Arc::new(ResponseCorrelator::new());
        let stream = GenerationStream::new(
            RequestId::new(),
            Arc::clone(&correlator),
            stream::iter(lines),
        );
        (stream, correlator)
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let (stream, correlator) = stream_of(vec![Ok(event("Hi", 4)), Ok(String::new())]);
        let id = stream.id();

        let units: Vec<_> = stream.collect().await;
        assert_eq!(units.len(), 1);
        let unit = units[0].as_ref().unwrap();
        assert_eq!(unit.text, "Hi");
        assert_eq!(unit.id, id);
        assert_eq!(correlator.usage_metadata(id).unwrap().total_token_count, 4);
    }

    #[tokio::test]
    async fn test_prefix_only_line_is_skipped() {
        let (stream, _) = stream_of(vec![Ok("data: ".into()), Ok(event("ok", 1))]);
        let units: Vec<_> = stream.collect().await;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].as_ref().unwrap().text, "ok");
    }

    #[tokio::test]
    async fn test_bad_json_ends_stream() {
        let (mut stream, _) = stream_of(vec![Ok("data: not-json".into()), Ok(event("late", 1))]);

        match stream.next().await {
            Some(Err(ClientError::MalformedResponse { raw, .. })) => {
                assert_eq!(raw, "data: not-json")
            }
            other => panic!("unexpected item: {other:?}"),
        }
        assert!(stream.is_terminated());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_line_without_prefix_is_malformed() {
        let (mut stream, _) = stream_of(vec![Ok("event: ping-ping".into())]);
        assert!(matches!(
            stream.next().await,
            Some(Err(ClientError::MalformedResponse { .. }))
        ));
    }

    #[tokio::test]
    async fn test_latest_event_wins() {
        let (mut stream, correlator) = stream_of(vec![Ok(event("a", 2)), Ok(event("b", 7))]);
        let id = stream.id();

        assert_eq!(stream.next().await.unwrap().unwrap().text, "a");
        assert_eq!(correlator.usage_metadata(id).unwrap().total_token_count, 2);

        assert_eq!(stream.next().await.unwrap().unwrap().text, "b");
        assert_eq!(correlator.usage_metadata(id).unwrap().total_token_count, 7);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_is_yielded_once() {
        let (mut stream, correlator) = stream_of(vec![
            Ok(event("x", 1)),
            Err(ClientError::transport("reset")),
            Ok(event("y", 1)),
        ]);

        assert!(stream.next().await.unwrap().is_ok());
        assert!(matches!(
            stream.next().await,
            Some(Err(ClientError::Transport(_)))
        ));
        assert!(stream.next().await.is_none());
        assert_eq!(correlator.get(stream.id()).unwrap().text(), Some("x"));
    }

    #[tokio::test]
    async fn test_short_non_ascii_line_is_skipped() {
        // 4 characters, 8 bytes
        let (stream, _) = stream_of(vec![Ok("éééé".into()), Ok(event("ok", 1))]);
        let units: Vec<_> = stream.collect().await;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].as_ref().unwrap().text, "ok");
    }

    #[tokio::test]
    async fn test_invalid_utf8_event_fails() {
        let bytes = stream::iter(vec![Ok::<_, ClientError>(Bytes::from_static(
            b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ok\xFF\xFE\"}]}}]}\n",
        ))]);
        let correlator = Arc::new(ResponseCorrelator::new());
        let mut stream =
            GenerationStream::new(RequestId::new(), Arc::clone(&correlator), split_lines(bytes));

        assert!(matches!(
            stream.next().await,
            Some(Err(ClientError::MalformedResponse { .. }))
        ));
        assert!(stream.next().await.is_none());
        assert!(correlator.is_empty());
    }

    #[tokio::test]
    async fn test_lines_are_read_on_demand_and_not_after_drop() {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);
        let lines = stream::iter(0..100).map(move |n| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(event(&format!("unit {n}"), n + 1))
        });
        let correlator = Arc::new(ResponseCorrelator::new());
        let mut stream = GenerationStream::new(RequestId::new(), Arc::clone(&correlator), lines);
        let id = stream.id();

        assert_eq!(reads.load(Ordering::SeqCst), 0);

        assert_eq!(stream.next().await.unwrap().unwrap().text, "unit 0");
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert_eq!(stream.next().await.unwrap().unwrap().text, "unit 1");
        assert_eq!(reads.load(Ordering::SeqCst), 2);

        drop(stream);
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert_eq!(correlator.usage_metadata(id).unwrap().total_token_count, 2);
    }

    #[tokio::test]
    async fn test_clear_mid_stream_is_repopulated() {
        let (mut stream, correlator) = stream_of(vec![Ok(event("a", 1)), Ok(event("b", 2))]);
        let id = stream.id();

        stream.next().await.unwrap().unwrap();
        correlator.clear();
        assert!(correlator.get(id).is_none());

        stream.next().await.unwrap().unwrap();
        assert_eq!(correlator.usage_metadata(id).unwrap().total_token_count, 2);
    }

    #[test]
    fn test_id_before_polling() {
        let (stream, correlator) = stream_of(vec![]);
        assert!(correlator.get(stream.id()).is_none());
        assert!(!stream.is_terminated());
    }
}

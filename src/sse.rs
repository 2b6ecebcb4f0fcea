//! Server-Sent Events (SSE) line splitting.
//!
//! The streaming endpoint answers with one event per line:
//! ```text
//! data: {"candidates": [...]}
//!
//! data: {"candidates": [...], "usageMetadata": {...}}
//! ```
//!
//! This module only turns the response bytes into lines. Deciding which
//! lines carry data is left to [`GenerationStream`](crate::stream::GenerationStream).

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};

use crate::client::{ClientError, Result};

/// Prefix of every data-bearing event line.
pub const STREAM_LINE_PREFIX: &str = "data: ";

/// Extension trait for `reqwest::Response` to read the body line by line.
pub trait SseLinesExt {
    /// Convert the response into a stream of lines (blank lines included).
    fn sse_lines(self) -> impl Stream<Item = Result<String>> + Send;
}

impl SseLinesExt for reqwest::Response {
    fn sse_lines(self) -> impl Stream<Item = Result<String>> + Send {
        split_lines(self.bytes_stream())
    }
}

/// Split a byte stream into lines.
///
/// Bytes are buffered until a `\n` arrives, so a UTF-8 sequence split across
/// chunks is decoded whole. A trailing `\r` is removed, and a final line
/// without terminator is still emitted. Chunks are only read when the
/// consumer asks for the next line. A line that is not valid UTF-8 is a
/// [`ClientError::MalformedResponse`]. After an error the stream ends.
pub fn split_lines<S, E>(bytes: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    stream::unfold(
        (Box::pin(bytes), BytesMut::new(), false),
        |(mut bytes, mut buffer, mut stream_ended)| async move {
            loop {
                let line = match buffer.iter().position(|b| *b == b'\n') {
                    Some(pos) => {
                        let mut line = buffer.split_to(pos + 1);
                        line.truncate(pos);
                        Some(line)
                    }
                    // Unterminated last line
                    None if stream_ended && !buffer.is_empty() => Some(buffer.split()),
                    None if stream_ended => return None,
                    None => None,
                };

                if let Some(line) = line {
                    return match decode_line(&line) {
                        Ok(line) => Some((Ok(line), (bytes, buffer, stream_ended))),
                        Err(e) => {
                            buffer.clear();
                            Some((Err(e), (bytes, buffer, true)))
                        }
                    };
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        buffer.clear();
                        return Some((Err(e.into()), (bytes, buffer, true)));
                    }
                    None => stream_ended = true,
                }
            }
        },
    )
}

fn decode_line(raw: &[u8]) -> Result<String> {
    utf8_text(raw.strip_suffix(b"\r").unwrap_or(raw))
}

/// Decode `raw` as UTF-8, failing with the lossy rendering as the raw payload.
pub(crate) fn utf8_text(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|e| {
            ClientError::malformed(String::from_utf8_lossy(raw), format!("invalid UTF-8: {e}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(chunks: Vec<&'static [u8]>) -> Vec<String> {
        let chunks = chunks
            .into_iter()
            .map(|c| Ok::<_, ClientError>(Bytes::from_static(c)));
        split_lines(stream::iter(chunks))
            .map(|line| line.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_split_lines_keeps_blank_lines() {
        let lines = collect(vec![b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n".as_slice()]).await;
        assert_eq!(lines, ["data: {\"a\":1}", "", "data: {\"b\":2}", ""]);
    }

    #[tokio::test]
    async fn test_split_lines_across_chunks() {
        let lines = collect(vec![
            b"data: {\"te".as_slice(),
            b"xt\":\"hi\"}\r".as_slice(),
            b"\n".as_slice(),
            b"tail".as_slice(),
        ])
        .await;
        assert_eq!(lines, ["data: {\"text\":\"hi\"}", "tail"]);
    }

    #[tokio::test]
    async fn test_split_lines_multibyte_boundary() {
        // "é" is 0xC3 0xA9, split across two chunks
        let lines = collect(vec![b"caf\xC3".as_slice(), b"\xA9\n".as_slice()]).await;
        assert_eq!(lines, ["café"]);
    }

    #[tokio::test]
    async fn test_split_lines_stops_after_error() {
        let chunks = vec![
            Ok(Bytes::from_static(b"one\ntwo")),
            Err(ClientError::transport("reset")),
            Ok(Bytes::from_static(b"never\n")),
        ];
        let items: Vec<_> = split_lines(stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "one");
        assert!(matches!(items[1], Err(ClientError::Transport(_))));
    }

    #[tokio::test]
    async fn test_split_lines_rejects_invalid_utf8() {
        let chunks = vec![Ok::<_, ClientError>(Bytes::from_static(
            b"data: {\"text\":\"ok\xFF\xFE\"}\nnever\n",
        ))];
        let items: Vec<_> = split_lines(stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(ClientError::MalformedResponse { raw, reason }) => {
                assert!(raw.starts_with("data: {\"text\":\"ok"));
                assert!(reason.starts_with("invalid UTF-8"));
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_prefix_length() {
        assert_eq!(STREAM_LINE_PREFIX.len(), 6);
    }
}

//! Incremental newline-delimited JSON decoding.
//!
//! Network chunks rarely line up with JSON values: one value can be split over
//! several chunks and one chunk can carry several values. [`NdjsonDecoder`]
//! keeps the incomplete tail between chunks and only hands out root-level
//! objects once their segment is complete.
use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use serde_json::Value;
use tracing::debug;

use crate::errors::ChatError;

/// A decoded root-level JSON object.
pub type JsonObject = serde_json::Map<String, Value>;

/// Raw response body chunks, already mapped onto the transport error type.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, ChatError>> + Send + 'static>>;

/// Segment separator used by the chat backend.
pub const DEFAULT_SEPARATOR: &str = "\n";

/// Splits a byte stream on a separator and parses each segment as JSON.
///
/// Unparsable segments are discarded (values decoded before the syntax error
/// in the same segment are kept). Arrays and scalars at the root are dropped.
#[derive(Debug)]
pub struct NdjsonDecoder {
    buf: Vec<u8>,
    separator: Vec<u8>,
    scanned: usize,
}

impl Default for NdjsonDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl NdjsonDecoder {
    /// Creates a decoder splitting on `separator`. An empty separator falls
    /// back to a newline.
    pub fn new(separator: impl Into<String>) -> Self {
        let mut separator = separator.into();
        if separator.is_empty() {
            separator = DEFAULT_SEPARATOR.to_string();
        }
        Self {
            buf: Vec::new(),
            separator: separator.into_bytes(),
            scanned: 0,
        }
    }

    /// Feeds one chunk and returns every object completed by it, in order.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<JsonObject> {
        self.buf.extend_from_slice(chunk);
        let mut objects = Vec::new();
        let mut start = 0;
        let mut search_from = self.scanned;
        while let Some(idx) = find_separator(&self.buf[search_from..], &self.separator) {
            let end = search_from + idx;
            parse_segment(&self.buf[start..end], &mut objects);
            start = end + self.separator.len();
            search_from = start;
        }
        self.buf.drain(..start);
        // A separator may straddle the next chunk boundary, so rescan its
        // possible prefix next time.
        self.scanned = self
            .buf
            .len()
            .saturating_sub(self.separator.len().saturating_sub(1));
        objects
    }

    /// Flushes the trailing segment once the upstream has closed.
    pub fn finish(&mut self) -> Vec<JsonObject> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        let mut objects = Vec::new();
        parse_segment(&rest, &mut objects);
        objects
    }

    /// Number of bytes waiting for a separator.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

fn find_separator(haystack: &[u8], separator: &[u8]) -> Option<usize> {
    if separator.len() == 1 {
        return haystack.iter().position(|b| *b == separator[0]);
    }
    haystack
        .windows(separator.len())
        .position(|window| window == separator)
}

fn parse_segment(segment: &[u8], out: &mut Vec<JsonObject>) {
    if segment.iter().all(u8::is_ascii_whitespace) {
        return;
    }
    let mut values = serde_json::Deserializer::from_slice(segment).into_iter::<Value>();
    loop {
        match values.next() {
            Some(Ok(Value::Object(object))) => out.push(object),
            Some(Ok(other)) => {
                debug!(kind = json_kind(&other), "dropping non-object ndjson value");
            }
            Some(Err(e)) => {
                debug!(error = %e, len = segment.len(), "discarding unparsable ndjson segment");
                return;
            }
            None => return,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Lazily decodes a byte stream into root-level JSON objects.
///
/// The upstream is pulled only when no decoded object is pending. An upstream
/// error is yielded after every object decoded before it and ends the stream.
pub fn decode_json_stream(
    bytes_stream: ByteStream,
    decoder: NdjsonDecoder,
) -> impl futures::Stream<Item = Result<JsonObject, ChatError>> + Send + 'static {
    struct State {
        bytes_stream: ByteStream,
        decoder: NdjsonDecoder,
        pending: VecDeque<JsonObject>,
        done: bool,
    }

    stream::try_unfold(
        State {
            bytes_stream,
            decoder,
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(object) = state.pending.pop_front() {
                    return Ok(Some((object, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        state.pending.extend(state.decoder.push_chunk(&chunk));
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        state.pending.extend(state.decoder.finish());
                        state.done = true;
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt as _;

    const BODY: &str = concat!(
        "{\"type\":\"reasoning\",\"status\":\"in_progress\"}\n",
        "{\"type\":\"output\",\"status\":\"in_progress\",\"delta\":\"héllo\\n\"}\n",
        "[1,2,3]\n",
        "\n",
        "{\"type\":\"output\",\"status\":\"completed\",\"delta\":\"!\"}\n",
    );

    fn decode_all(chunks: &[&[u8]]) -> Vec<JsonObject> {
        let mut decoder = NdjsonDecoder::default();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(decoder.push_chunk(chunk));
        }
        out.extend(decoder.finish());
        out
    }

    #[test]
    fn value_split_across_chunks_is_reassembled() {
        let mut decoder = NdjsonDecoder::default();
        assert!(decoder.push_chunk(b"{\"type\":\"out").is_empty());
        assert!(decoder.push_chunk(b"put\",\"delta\":\"hi\"").is_empty());
        let objects = decoder.push_chunk(b"}\n{\"a\"");
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["delta"], "hi");
        assert_eq!(decoder.buffered_len(), 4);
    }

    #[test]
    fn every_split_point_yields_the_same_values() {
        let bytes = BODY.as_bytes();
        let whole = decode_all(&[bytes]);
        assert_eq!(whole.len(), 3);
        for i in 0..bytes.len() {
            for j in i..bytes.len() {
                let split = decode_all(&[&bytes[..i], &bytes[i..j], &bytes[j..]]);
                assert_eq!(split, whole, "split at {i}/{j}");
            }
        }
    }

    #[test]
    fn non_object_roots_and_garbage_are_dropped() {
        let objects = decode_all(&[b"42\n\"s\"\nnot json\n{\"ok\":true}\n"]);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["ok"], true);
    }

    #[test]
    fn concatenated_values_in_one_segment_are_all_decoded() {
        let objects = decode_all(&[b"{\"a\":1}{\"b\":2} {\"c\":\n"]);
        let keys: Vec<_> = objects
            .iter()
            .flat_map(|o| o.keys().cloned())
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn multi_byte_separator_straddling_chunks() {
        let mut decoder = NdjsonDecoder::new("\r\n");
        assert!(decoder.push_chunk(b"{\"a\":1}\r").is_empty());
        let objects = decoder.push_chunk(b"\n{\"b\":2}\r\n");
        assert_eq!(objects.len(), 2);
    }

    #[test]
    fn trailing_segment_without_separator_is_flushed() {
        let mut decoder = NdjsonDecoder::default();
        assert!(decoder.push_chunk(b"{\"last\":1}").is_empty());
        assert_eq!(decoder.finish().len(), 1);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[tokio::test]
    async fn stream_yields_values_before_upstream_error() {
        let chunks: Vec<Result<bytes::Bytes, ChatError>> = vec![
            Ok(bytes::Bytes::from_static(b"{\"a\":1}\n{\"b\"")),
            Ok(bytes::Bytes::from_static(b":2}\n")),
            Err(ChatError::TimedOut),
            Ok(bytes::Bytes::from_static(b"{\"c\":3}\n")),
        ];
        let mut decoded = Box::pin(decode_json_stream(
            Box::pin(stream::iter(chunks)),
            NdjsonDecoder::default(),
        ));
        assert_eq!(decoded.try_next().await.expect("a").expect("some")["a"], 1);
        assert_eq!(decoded.try_next().await.expect("b").expect("some")["b"], 2);
        assert_eq!(decoded.try_next().await, Err(ChatError::TimedOut));
        assert!(decoded.next().await.is_none());
    }
}

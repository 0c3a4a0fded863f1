//! Timed consumption of HTTP response bodies.
//!
//! The body is pulled one line at a time by the single consumer; each event is
//! stamped when its line arrives, so offsets reflect wire delivery.

use super::{Dialect, LineDecoder, StreamCapture, StreamEvent};
use crate::gateway::ProbeError;
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use std::time::{Duration, Instant};
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

/// Decode a response body lazily.
///
/// `started` is the instant the request was sent. `timeout` is only used to
/// describe a timeout error. The stream ends after the first end event; a
/// transport error is yielded once and ends it.
pub fn decode_response(
    response: reqwest::Response,
    dialect: Dialect,
    started: Instant,
    timeout: Duration,
) -> impl Stream<Item = Result<StreamEvent, ProbeError>> {
    try_stream! {
        let body = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(std::io::Error::other)),
        );
        let mut lines = StreamReader::new(body).lines();
        let mut decoder = LineDecoder::new(dialect);

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| ProbeError::from_body_io(e, timeout))?
        {
            let at = started.elapsed();
            for frame in decoder.push_line(&line) {
                yield frame.at(at);
            }
            if decoder.is_finished() {
                break;
            }
        }

        if let Some(frame) = decoder.finish() {
            yield frame.at(started.elapsed());
        }
    }
}

/// Consume a response body to completion.
///
/// On error the events collected so far are discarded.
pub async fn capture(
    response: reqwest::Response,
    dialect: Dialect,
    started: Instant,
    timeout: Duration,
) -> Result<StreamCapture, ProbeError> {
    let stream = decode_response(response, dialect, started, timeout);
    tokio::pin!(stream);

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event?);
    }

    let total_time = started.elapsed();
    tracing::debug!(
        dialect = ?dialect,
        events = events.len(),
        total_ms = total_time.as_millis() as u64,
        "captured response body"
    );

    Ok(StreamCapture {
        dialect,
        events,
        total_time,
    })
}

/// Decode lines that already carry arrival offsets.
pub fn decode_timed_lines<'a, I>(dialect: Dialect, lines: I) -> StreamCapture
where
    I: IntoIterator<Item = (Duration, &'a str)>,
{
    let mut decoder = LineDecoder::new(dialect);
    let mut events = Vec::new();
    let mut last = Duration::ZERO;

    for (at, line) in lines {
        last = at;
        events.extend(decoder.push_line(line).into_iter().map(|f| f.at(at)));
        if decoder.is_finished() {
            break;
        }
    }
    events.extend(decoder.finish().map(|f| f.at(last)));

    StreamCapture {
        dialect,
        events,
        total_time: last,
    }
}

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use log::{debug, trace};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;

use super::core::ConcourseClient;
use crate::error::{BuildLensError, Result};
use crate::providers::concourse::types::{Metadata, ResourceEvent};

/// Resource events of one build, ending when the build's event stream ends.
pub type ResourceEventStream = BoxStream<'static, Result<ResourceEvent>>;

const END_EVENT: &str = "end";
const RESOURCE_EVENT_TYPES: [&str; 2] = ["finish-get", "finish-put"];

impl ConcourseClient {
    /// Subscribes to the build's server-sent event stream.
    ///
    /// Only `finish-get` and `finish-put` events are yielded; the stream ends on
    /// the `end` event or when the server closes the connection.
    ///
    /// # Errors
    ///
    /// Fails when the subscription request itself fails. Errors while reading
    /// the stream are yielded as items.
    pub async fn resource_events(&self, build_id: &str) -> Result<ResourceEventStream> {
        let url = self.endpoint(&["builds", build_id, "events"])?;
        debug!("Subscribing to {url}");

        let response = self
            .send(self.http().get(url).header(ACCEPT, "text/event-stream"))
            .await?;

        Ok(decode_resource_events(response.bytes_stream()).boxed())
    }
}

/// One server-sent event frame.
#[derive(Debug, Default, PartialEq, Eq)]
struct SseFrame {
    event: Option<String>,
    data: String,
}

impl SseFrame {
    fn parse(raw: &str) -> Option<Self> {
        let mut frame = Self::default();
        let mut data_lines = Vec::new();

        for line in raw.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => frame.event = Some(value.to_string()),
                "data" => data_lines.push(value),
                _ => {}
            }
        }

        if frame.event.is_none() && data_lines.is_empty() {
            return None;
        }

        frame.data = data_lines.join("\n");
        Some(frame)
    }
}

/// Splits a byte stream into SSE frames separated by blank lines.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            frames.extend(SseFrame::parse(&String::from_utf8_lossy(&raw)));
        }
        frames
    }

    fn finish(&mut self) -> Option<SseFrame> {
        let raw = std::mem::take(&mut self.buffer);
        SseFrame::parse(&String::from_utf8_lossy(&raw))
    }
}

#[derive(Deserialize)]
struct EventEnvelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct ResourceEventData {
    origin: Origin,
    #[serde(default)]
    metadata: Option<Vec<MetadataField>>,
}

#[derive(Deserialize)]
struct Origin {
    id: String,
}

#[derive(Deserialize)]
struct MetadataField {
    name: String,
    value: String,
}

enum FrameOutcome {
    Event(ResourceEvent),
    End,
    Skip,
}

fn interpret_frame(frame: SseFrame) -> Result<FrameOutcome> {
    if frame.event.as_deref() == Some(END_EVENT) {
        return Ok(FrameOutcome::End);
    }

    if frame.data.is_empty() {
        return Ok(FrameOutcome::Skip);
    }

    let envelope: EventEnvelope = serde_json::from_str(&frame.data)?;
    if !RESOURCE_EVENT_TYPES.contains(&envelope.event.as_str()) {
        trace!("Ignoring {} event", envelope.event);
        return Ok(FrameOutcome::Skip);
    }

    let data: ResourceEventData = serde_json::from_value(envelope.data)?;
    let metadata: Metadata = data
        .metadata
        .unwrap_or_default()
        .into_iter()
        .map(|field| (field.name, field.value))
        .collect();

    Ok(FrameOutcome::Event(ResourceEvent {
        resource_id: data.origin.id,
        metadata,
    }))
}

struct DecodeState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    frames: VecDeque<SseFrame>,
    exhausted: bool,
}

/// Decodes a raw SSE byte stream into resource events.
pub(super) fn decode_resource_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<ResourceEvent>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<BuildLensError> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::default(),
        frames: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.frames.pop_front() {
                match interpret_frame(frame) {
                    Ok(FrameOutcome::Event(event)) => return Some((Ok(event), state)),
                    Ok(FrameOutcome::End) => return None,
                    Ok(FrameOutcome::Skip) => continue,
                    Err(e) => return Some((Err(e), state)),
                }
            }

            if state.exhausted {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(chunk.as_ref());
                    state.frames.extend(frames);
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.exhausted = true;
                    state.frames.extend(state.decoder.finish());
                }
            }
        }
    })
}

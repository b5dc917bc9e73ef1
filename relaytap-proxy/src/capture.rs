use relaytap_codec::decode_content;
use relaytap_net::HeaderMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::events::{CapturedRequest, CapturedResponse, ProxyEvent};

enum CaptureChunk {
    Data(Vec<u8>),
    End,
}

/// Second consumer of a body stream. Chunks go through an unbounded channel
/// to a spawned collector, so pushing never waits on the event consumer.
///
/// Dropping the sink without [`CaptureSink::finish`] discards the capture.
pub(crate) struct CaptureSink {
    sender: mpsc::UnboundedSender<CaptureChunk>,
}

pub(crate) struct RequestCapture {
    pub url: String,
    pub method: String,
    pub headers: HeaderMap,
}

pub(crate) struct ResponseCapture {
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub decompress: bool,
}

impl CaptureSink {
    pub fn request(events: mpsc::Sender<ProxyEvent>, capture: RequestCapture) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let Some(body) = collect(receiver).await else {
                debug!(url = %capture.url, "request capture aborted");
                return;
            };
            let event = ProxyEvent::RequestCaptured(CapturedRequest {
                url: capture.url,
                method: capture.method,
                headers: capture.headers,
                body,
            });
            let _ = events.send(event).await;
        });
        Self { sender }
    }

    pub fn response(events: mpsc::Sender<ProxyEvent>, capture: ResponseCapture) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let Some(raw) = collect(receiver).await else {
                debug!(url = %capture.url, "response capture aborted");
                return;
            };
            let (body, error) = if capture.decompress {
                let encoding = capture
                    .headers
                    .get("content-encoding")
                    .map(|value| value.joined().into_owned());
                match decode_content(&raw, encoding.as_deref()) {
                    Ok(decoded) => (decoded, None),
                    Err(err) => {
                        warn!(url = %capture.url, error = %err, "failed to decode captured body");
                        (raw, Some(err))
                    }
                }
            } else {
                (raw, None)
            };
            let event = ProxyEvent::ResponseCaptured(CapturedResponse {
                url: capture.url,
                status: capture.status,
                headers: capture.headers,
                body,
                error,
            });
            let _ = events.send(event).await;
        });
        Self { sender }
    }

    pub fn push(&self, data: Vec<u8>) {
        if !data.is_empty() {
            let _ = self.sender.send(CaptureChunk::Data(data));
        }
    }

    pub fn finish(self) {
        let _ = self.sender.send(CaptureChunk::End);
    }
}

async fn collect(mut receiver: mpsc::UnboundedReceiver<CaptureChunk>) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = receiver.recv().await {
        match chunk {
            CaptureChunk::Data(data) => body.extend_from_slice(&data),
            CaptureChunk::End => return Some(body),
        }
    }
    None
}

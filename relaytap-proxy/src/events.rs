use relaytap_codec::CodecError;
use relaytap_net::{HeaderMap, Request};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::reply::LocalResponse;

pub type ProxyEvents = ReceiverStream<ProxyEvent>;

pub fn event_channel() -> (mpsc::Sender<ProxyEvent>, ProxyEvents) {
    let (sender, receiver) = mpsc::channel(50_000);
    (sender, ReceiverStream::new(receiver))
}

#[derive(Debug)]
pub enum ProxyEvent {
    /// Sent once, after the listener is bound.
    Listening { port: u16 },
    LocalService(LocalServiceRequest),
    RequestCaptured(CapturedRequest),
    ResponseCaptured(CapturedResponse),
    Error { message: String },
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub url: String,
    pub method: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    /// Decoded body, or the raw bytes when decoding was off or failed.
    pub body: Vec<u8>,
    pub error: Option<CodecError>,
}

/// A request addressed to the proxy itself rather than to an origin.
#[derive(Debug)]
pub struct LocalServiceRequest {
    pub request: Request,
    responder: LocalResponder,
}

#[derive(Debug)]
pub struct LocalResponder(oneshot::Sender<LocalResponse>);

impl LocalServiceRequest {
    pub(crate) fn new(request: Request) -> (Self, oneshot::Receiver<LocalResponse>) {
        let (sender, receiver) = oneshot::channel();
        let request = Self {
            request,
            responder: LocalResponder(sender),
        };
        (request, receiver)
    }

    /// Path of the request target, without the query.
    pub fn path(&self) -> &str {
        let target = self.request.line.target.as_str();
        target.split_once('?').map_or(target, |(path, _)| path)
    }

    /// Returns false when the connection is already gone.
    pub fn respond(self, response: LocalResponse) -> bool {
        self.responder.0.send(response).is_ok()
    }
}

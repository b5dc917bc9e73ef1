use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use relaytap_net::{
    Limits, ParseError, ParseWarning, Request, RequestFrameInfo, RequestLine, RequestStreamEvent,
    RequestStreamParser, ResponseStreamEvent, ResponseStreamParser,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureSink, RequestCapture, ResponseCapture};
use crate::config::{PortSelection, ProxyConfig};
use crate::error::ProxyError;
use crate::events::{LocalServiceRequest, ProxyEvent, ProxyEvents, event_channel};
use crate::exchange::{InboundExchange, OutboundExchange, ResponseHead, Route, route};
use crate::inspect::InspectionGate;
use crate::ports::{ListeningPort, bind_listener};
use crate::reply::{LocalResponse, bad_gateway, bad_request};
use crate::tunnel;

const READ_BUFFER: usize = 8192;

/// A forward proxy. Configure it through the setters, then call [`Proxy::run`].
pub struct Proxy {
    config: ProxyConfig,
    gate: InspectionGate,
    sender: mpsc::Sender<ProxyEvent>,
    port: ListeningPort,
}

struct ProxyState {
    gate: InspectionGate,
    decompress: bool,
    limits: Limits,
    local_reply_timeout: Duration,
    sender: mpsc::Sender<ProxyEvent>,
}

impl ProxyState {
    fn report(&self, message: String) {
        let _ = self.sender.try_send(ProxyEvent::Error { message });
    }
}

impl Proxy {
    pub fn new(config: ProxyConfig) -> (Self, ProxyEvents) {
        let (sender, events) = event_channel();
        let proxy = Self {
            config,
            gate: InspectionGate::default(),
            sender,
            port: ListeningPort::default(),
        };
        (proxy, events)
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Requests for which this returns true have their bodies captured.
    pub fn set_request_inspector<F>(&mut self, predicate: F)
    where
        F: Fn(&InboundExchange) -> bool + Send + Sync + 'static,
    {
        self.gate.set_request(predicate);
    }

    /// Responses for which this returns true have their bodies captured.
    pub fn set_response_inspector<F>(&mut self, predicate: F)
    where
        F: Fn(&InboundExchange, &ResponseHead) -> bool + Send + Sync + 'static,
    {
        self.gate.set_response(predicate);
    }

    pub fn set_decompress(&mut self, decompress: bool) {
        self.config.decompress = decompress;
    }

    /// Switches to automatic port selection starting at `base`.
    pub fn set_base_port(&mut self, base: u16) {
        self.config.listen.port = PortSelection::Auto { base };
    }

    pub fn listening_port(&self) -> ListeningPort {
        self.port.clone()
    }

    pub async fn run(self) -> Result<(), ProxyError> {
        let (port, listener) = bind_listener(&self.config.listen).await?;
        self.port.set(port);
        info!(host = %self.config.listen.host, port, "proxy listening");

        let state = Arc::new(ProxyState {
            gate: self.gate,
            decompress: self.config.decompress,
            limits: self.config.limits.into(),
            local_reply_timeout: Duration::from_millis(self.config.local_reply_timeout_ms),
            sender: self.sender,
        });
        let _ = state.sender.send(ProxyEvent::Listening { port }).await;

        serve(state, listener).await
    }
}

async fn serve(state: Arc<ProxyState>, listener: TcpListener) -> Result<(), ProxyError> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                error!(error = %err, "accept failed");
                state.report(format!("accept failed: {err}"));
                continue;
            }
        };

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            match handle_connection(&state, stream).await {
                Ok(()) | Err(ProxyError::ClientClosed) => {}
                Err(err) => {
                    warn!(peer = %peer, error = %err, "connection failed");
                    state.report(err.to_string());
                }
            }
        });
    }
}

/// One client request head plus whatever arrived with it.
struct RequestHead {
    parser: RequestStreamParser,
    info: RequestFrameInfo,
    first: Fed,
}

/// A pushed slice, split into its parts.
struct Fed {
    head: Option<RequestFrameInfo>,
    /// Body bytes exactly as framed on the wire.
    raw: Vec<u8>,
    /// Body bytes with chunk framing removed.
    payload: Vec<u8>,
    finished: bool,
    /// Bytes belonging to the next request.
    leftover: Vec<u8>,
}

fn feed(parser: &mut RequestStreamParser, input: &[u8]) -> Result<Fed, ParseError> {
    let chunk = parser.push(input)?;
    log_warnings("request", &chunk.warnings);
    let mut fed = Fed {
        head: None,
        raw: chunk.body_bytes(input).to_vec(),
        payload: Vec::new(),
        finished: false,
        leftover: chunk.remainder(input).to_vec(),
    };
    for event in chunk.events {
        match event {
            RequestStreamEvent::Headers(info) => fed.head = Some(info),
            RequestStreamEvent::BodyData(data) => fed.payload.extend_from_slice(&data),
            RequestStreamEvent::EndOfMessage => fed.finished = true,
        }
    }
    Ok(fed)
}

fn log_warnings(message: &str, warnings: &[ParseWarning]) {
    for warning in warnings {
        debug!(kind = ?warning.kind, offset = warning.offset, "{message} parse warning");
    }
}

enum Outcome {
    KeepAlive { leftover: Vec<u8> },
    Close,
}

async fn handle_connection(state: &ProxyState, mut client: TcpStream) -> Result<(), ProxyError> {
    let mut pending = Vec::new();

    loop {
        let Some(head) = read_request_head(&mut client, &mut pending, state.limits).await? else {
            return Ok(());
        };
        let inbound = InboundExchange::from_frame(&head.info);

        if inbound.is_connect() {
            debug!(authority = %inbound.target, "tunnel requested");
            return tunnel::handle_connect(
                &mut client,
                &inbound.target,
                &inbound.version,
                &head.first.leftover,
            )
            .await;
        }

        match route(&inbound) {
            Route::Local => return serve_local(state, &mut client, head).await,
            Route::Unsupported { scheme } => {
                warn!(url = %inbound.target, scheme = %scheme, "unsupported scheme");
                client
                    .write_all(&bad_gateway(&format!("unsupported scheme {scheme}")))
                    .await?;
                let _ = client.shutdown().await;
                return Ok(());
            }
            Route::Forward(outbound) => {
                debug!(method = %inbound.method, url = %inbound.target, "forwarding request");
                match forward_exchange(state, &mut client, &inbound, &outbound, head).await? {
                    Outcome::KeepAlive { leftover } => pending = leftover,
                    Outcome::Close => {
                        let _ = client.shutdown().await;
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Reads until a request head is complete. `None` means the client closed
/// cleanly between requests.
async fn read_request_head(
    client: &mut TcpStream,
    pending: &mut Vec<u8>,
    limits: Limits,
) -> Result<Option<RequestHead>, ProxyError> {
    let mut parser = RequestStreamParser::with_limits(limits);
    let mut input = std::mem::take(pending);
    let mut buffer = vec![0u8; READ_BUFFER];

    loop {
        if input.is_empty() {
            let n = client.read(&mut buffer).await?;
            if n == 0 {
                return match parser.push_eof() {
                    Ok(_) => Ok(None),
                    Err(_) => Err(ProxyError::ClientClosed),
                };
            }
            input.extend_from_slice(&buffer[..n]);
        }

        let mut fed = match feed(&mut parser, &input) {
            Ok(fed) => fed,
            Err(err) => {
                let _ = client.write_all(&bad_request()).await;
                return Err(err.into());
            }
        };
        input.clear();

        if let Some(info) = fed.head.take() {
            return Ok(Some(RequestHead {
                parser,
                info,
                first: fed,
            }));
        }
    }
}

async fn serve_local(
    state: &ProxyState,
    client: &mut TcpStream,
    head: RequestHead,
) -> Result<(), ProxyError> {
    let RequestHead {
        mut parser,
        info,
        first,
    } = head;
    let mut body = first.payload;
    let mut finished = first.finished;
    let mut buffer = vec![0u8; READ_BUFFER];

    while !finished {
        let n = client.read(&mut buffer).await?;
        if n == 0 {
            return Err(ProxyError::ClientClosed);
        }
        let fed = feed(&mut parser, &buffer[..n])?;
        body.extend_from_slice(&fed.payload);
        if body.len() > state.limits.max_body_bytes {
            client
                .write_all(&LocalResponse::new(413, Vec::new()).to_bytes())
                .await?;
            return Err(ProxyError::Runtime(
                "local request body exceeds limit".to_string(),
            ));
        }
        finished = fed.finished;
    }

    let request = Request {
        line: RequestLine {
            method: info.method,
            target: info.target,
            version: info.version,
        },
        headers: info.headers,
        body,
    };
    let path = request.line.target.clone();
    debug!(path = %path, "local service request");

    let (event, reply) = LocalServiceRequest::new(request);
    let response = match state.sender.send(ProxyEvent::LocalService(event)).await {
        Ok(()) => match tokio::time::timeout(state.local_reply_timeout, reply).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => LocalResponse::not_found(),
            Err(_) => {
                warn!(path = %path, "local service did not reply in time");
                LocalResponse::not_found()
            }
        },
        Err(_) => LocalResponse::not_found(),
    };

    client.write_all(&response.to_bytes()).await?;
    let _ = client.shutdown().await;
    Ok(())
}

enum UploadEnd {
    Complete { leftover: Vec<u8> },
    /// The origin stopped accepting the body; its response decides the rest.
    OriginGone,
}

async fn forward_exchange(
    state: &ProxyState,
    client: &mut TcpStream,
    inbound: &InboundExchange,
    outbound: &OutboundExchange,
    head: RequestHead,
) -> Result<Outcome, ProxyError> {
    let RequestHead { parser, first, .. } = head;

    let mut origin = match TcpStream::connect((outbound.host.as_str(), outbound.port)).await {
        Ok(origin) => origin,
        Err(err) => return Err(fail_before_response(client, inbound, outbound, err).await),
    };

    let mut request_head = outbound.head_bytes();
    request_head.extend_from_slice(&first.raw);
    if let Err(err) = origin.write_all(&request_head).await {
        return Err(fail_before_response(client, inbound, outbound, err).await);
    }

    let request_capture = state.gate.inspect_request(inbound).then(|| {
        CaptureSink::request(
            state.sender.clone(),
            RequestCapture {
                url: inbound.target.clone(),
                method: inbound.method.clone(),
                headers: inbound.headers.clone(),
            },
        )
    });

    let (mut client_read, mut client_write) = client.split();
    let (mut origin_read, mut origin_write) = origin.split();

    let upload = upload_body(
        &mut client_read,
        &mut origin_write,
        parser,
        first,
        request_capture,
    );
    let relay = relay_response(state, inbound, &mut origin_read, &mut client_write);
    tokio::pin!(relay);

    let upload_end = tokio::select! {
        end = upload => end?,
        relayed = &mut relay => {
            relayed?;
            return Ok(Outcome::Close);
        }
    };

    let UploadEnd::Complete { mut leftover } = upload_end else {
        relay.await?;
        return Ok(Outcome::Close);
    };

    // The request is fully sent; the client socket is still watched so that
    // a client going away drops the origin connection.
    let watch = watch_client(&mut client_read, &mut leftover, state.limits.max_header_bytes);
    let relayed = tokio::select! {
        relayed = &mut relay => relayed?,
        closed = watch => {
            debug!(url = %inbound.target, "client left before the response completed");
            return Err(closed);
        }
    };

    if relayed.keep_alive && !outbound.wants_close() {
        Ok(Outcome::KeepAlive { leftover })
    } else {
        Ok(Outcome::Close)
    }
}

/// Resolves once the client closes or errors. Bytes read on the way are
/// pipelined requests and are appended to `pending`; past `limit` the client
/// is no longer read.
async fn watch_client<R>(client: &mut R, pending: &mut Vec<u8>, limit: usize) -> ProxyError
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; READ_BUFFER];
    while pending.len() < limit {
        match client.read(&mut buffer).await {
            Ok(0) | Err(_) => return ProxyError::ClientClosed,
            Ok(n) => pending.extend_from_slice(&buffer[..n]),
        }
    }
    std::future::pending().await
}

async fn fail_before_response(
    client: &mut TcpStream,
    inbound: &InboundExchange,
    outbound: &OutboundExchange,
    err: impl Display,
) -> ProxyError {
    warn!(
        url = %inbound.target,
        host = %outbound.host,
        port = outbound.port,
        error = %err,
        "origin unreachable"
    );
    if client.write_all(&bad_gateway(&err.to_string())).await.is_ok() {
        let _ = client.shutdown().await;
    }
    ProxyError::Upstream(format!("{}:{}: {err}", outbound.host, outbound.port))
}

/// Copies the rest of the request body to the origin, framing included.
async fn upload_body<R, W>(
    client: &mut R,
    origin: &mut W,
    mut parser: RequestStreamParser,
    first: Fed,
    capture: Option<CaptureSink>,
) -> Result<UploadEnd, ProxyError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if let Some(capture) = &capture {
        capture.push(first.payload);
    }
    let mut finished = first.finished;
    let mut leftover = first.leftover;
    let mut buffer = vec![0u8; READ_BUFFER];

    while !finished {
        let n = client
            .read(&mut buffer)
            .await
            .map_err(|_| ProxyError::ClientClosed)?;
        if n == 0 {
            return Err(ProxyError::ClientClosed);
        }
        let fed = feed(&mut parser, &buffer[..n])?;
        if origin.write_all(&fed.raw).await.is_err() {
            return Ok(UploadEnd::OriginGone);
        }
        if let Some(capture) = &capture {
            capture.push(fed.payload);
        }
        finished = fed.finished;
        leftover = fed.leftover;
    }

    if let Some(capture) = capture {
        capture.finish();
    }
    Ok(UploadEnd::Complete { leftover })
}

struct Relayed {
    keep_alive: bool,
}

/// Streams the origin response to the client. If the origin fails before the
/// final head went out, the client gets a 502 instead.
async fn relay_response<R, W>(
    state: &ProxyState,
    inbound: &InboundExchange,
    origin: &mut R,
    client: &mut W,
) -> Result<Relayed, ProxyError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut head_sent = false;
    let result = relay_response_inner(state, inbound, origin, client, &mut head_sent).await;
    if let Err(err) = &result {
        warn!(url = %inbound.target, error = %err, head_sent, "response relay failed");
        if let (false, ProxyError::Upstream(message)) = (head_sent, err) {
            let _ = client.write_all(&bad_gateway(message)).await;
        }
    }
    result
}

async fn relay_response_inner<R, W>(
    state: &ProxyState,
    inbound: &InboundExchange,
    origin: &mut R,
    client: &mut W,
    head_sent: &mut bool,
) -> Result<Relayed, ProxyError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut parser = ResponseStreamParser::for_method(&inbound.method);
    let mut capture: Option<CaptureSink> = None;
    let mut keep_alive = false;
    let mut input = Vec::new();
    let mut buffer = vec![0u8; READ_BUFFER];

    loop {
        if input.is_empty() {
            let n = origin
                .read(&mut buffer)
                .await
                .map_err(|err| ProxyError::Upstream(err.to_string()))?;
            if n == 0 {
                parser.push_eof().map_err(|_| {
                    ProxyError::Upstream("origin closed before the response completed".to_string())
                })?;
                if let Some(capture) = capture.take() {
                    capture.finish();
                }
                return Ok(Relayed { keep_alive: false });
            }
            input.extend_from_slice(&buffer[..n]);
        }

        let mut chunk = parser
            .push(&input)
            .map_err(|err| ProxyError::Upstream(format!("invalid response from origin: {err}")))?;
        log_warnings("response", &chunk.warnings);

        let mut informational = false;
        let mut ended = false;
        for event in std::mem::take(&mut chunk.events) {
            match event {
                ResponseStreamEvent::Headers(info) => {
                    let head = ResponseHead::from_frame(&info);
                    client
                        .write_all(&head.to_bytes())
                        .await
                        .map_err(|_| ProxyError::ClientClosed)?;
                    if info.is_informational() {
                        informational = true;
                        continue;
                    }
                    *head_sent = true;
                    keep_alive =
                        !info.connection_close && !info.close_delimited && info.status_code != 101;
                    debug!(url = %inbound.target, status = info.status_code, "response head relayed");
                    if state.gate.inspect_response(inbound, &head) {
                        capture = Some(CaptureSink::response(
                            state.sender.clone(),
                            ResponseCapture {
                                url: inbound.target.clone(),
                                status: head.status_code,
                                headers: head.headers,
                                decompress: state.decompress,
                            },
                        ));
                    }
                }
                ResponseStreamEvent::BodyData(data) => {
                    if let Some(capture) = &capture {
                        capture.push(data);
                    }
                }
                ResponseStreamEvent::EndOfMessage => ended = true,
            }
        }

        let body = chunk.body_bytes(&input);
        if !body.is_empty() {
            client
                .write_all(body)
                .await
                .map_err(|_| ProxyError::ClientClosed)?;
        }

        if !ended {
            input.clear();
            continue;
        }

        let remainder = chunk.remainder(&input).to_vec();
        if informational {
            parser = ResponseStreamParser::for_method(&inbound.method);
            input = remainder;
            continue;
        }
        if let Some(capture) = capture.take() {
            capture.finish();
        }
        return Ok(Relayed {
            keep_alive: keep_alive && remainder.is_empty(),
        });
    }
}

use super::{Header, HttpVersion, Limits, ParseError, ParseErrorKind, ParseWarning, ParseWarningKind};

const CRLF: &[u8] = b"\r\n";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const MAX_CHUNK_LINE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrameInfo {
    pub version: HttpVersion,
    pub status_code: u16,
    pub reason: String,
    pub headers: Vec<Header>,
    pub content_length: Option<usize>,
    pub chunked: bool,
    pub close_delimited: bool,
    pub connection_close: bool,
}

impl ResponseFrameInfo {
    /// 1xx responses other than `101 Switching Protocols` precede the final one.
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.status_code) && self.status_code != 101
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrameInfo {
    pub method: String,
    pub target: String,
    pub version: HttpVersion,
    pub headers: Vec<Header>,
    pub content_length: Option<usize>,
    pub chunked: bool,
    pub connection_close: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStreamEvent {
    Headers(ResponseFrameInfo),
    /// Payload bytes with any chunk framing removed.
    BodyData(Vec<u8>),
    EndOfMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStreamEvent {
    Headers(RequestFrameInfo),
    BodyData(Vec<u8>),
    EndOfMessage,
}

/// What one `push` made of the slice it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk<E> {
    pub events: Vec<E>,
    /// Index in the pushed slice where body bytes begin. Equals the slice
    /// length while the head is still incomplete.
    pub body_offset: usize,
    /// Bytes of the pushed slice that belong to the current message. Anything
    /// past this index starts the next message.
    pub consumed: usize,
    pub warnings: Vec<ParseWarning>,
}

impl<E> StreamChunk<E> {
    /// The body bytes of `input` exactly as they were framed on the wire.
    pub fn body_bytes<'a>(&self, input: &'a [u8]) -> &'a [u8] {
        &input[self.body_offset.min(self.consumed)..self.consumed]
    }

    /// Bytes of `input` past the end of the current message.
    pub fn remainder<'a>(&self, input: &'a [u8]) -> &'a [u8] {
        &input[self.consumed..]
    }
}

#[derive(Debug)]
pub struct ResponseStreamParser {
    core: StreamCore,
    head_request: bool,
}

#[derive(Debug)]
pub struct RequestStreamParser {
    core: StreamCore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageState {
    Headers,
    Body,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyMode {
    NoBody,
    Length(usize),
    Chunked,
    CloseDelimited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChunkState {
    Size { line: Vec<u8> },
    Data { remaining: usize },
    DataCrlf { seen: usize },
    Trailer { line: Vec<u8> },
    Done,
}

#[derive(Debug)]
struct BodyDecoder {
    mode: BodyMode,
    remaining: usize,
    chunk: ChunkState,
}

impl BodyDecoder {
    fn new(mode: BodyMode) -> Self {
        let mode = match mode {
            BodyMode::Length(0) => BodyMode::NoBody,
            other => other,
        };
        let remaining = match mode {
            BodyMode::Length(length) => length,
            _ => 0,
        };
        Self {
            mode,
            remaining,
            chunk: ChunkState::Size { line: Vec::new() },
        }
    }

    /// Returns how many bytes were used and whether the body is complete.
    fn decode(&mut self, bytes: &[u8], data: &mut Vec<Vec<u8>>) -> Result<(usize, bool), ParseError> {
        match self.mode {
            BodyMode::NoBody => Ok((0, true)),
            BodyMode::CloseDelimited => {
                if !bytes.is_empty() {
                    data.push(bytes.to_vec());
                }
                Ok((bytes.len(), false))
            }
            BodyMode::Length(_) => {
                let take = bytes.len().min(self.remaining);
                if take > 0 {
                    data.push(bytes[..take].to_vec());
                }
                self.remaining -= take;
                Ok((take, self.remaining == 0))
            }
            BodyMode::Chunked => self.decode_chunked(bytes, data),
        }
    }

    fn decode_chunked(
        &mut self,
        bytes: &[u8],
        data: &mut Vec<Vec<u8>>,
    ) -> Result<(usize, bool), ParseError> {
        let mut cursor = 0;
        while cursor < bytes.len() {
            match &mut self.chunk {
                ChunkState::Size { line } => {
                    line.push(bytes[cursor]);
                    cursor += 1;
                    if line.ends_with(CRLF) {
                        match parse_chunk_size(&line[..line.len() - CRLF.len()], cursor)? {
                            None => line.clear(),
                            Some(0) => self.chunk = ChunkState::Trailer { line: Vec::new() },
                            Some(size) => self.chunk = ChunkState::Data { remaining: size },
                        }
                    } else if line.len() > MAX_CHUNK_LINE {
                        return Err(ParseError::new(ParseErrorKind::InvalidChunkSize, cursor));
                    }
                }
                ChunkState::Data { remaining } => {
                    let take = (bytes.len() - cursor).min(*remaining);
                    data.push(bytes[cursor..cursor + take].to_vec());
                    cursor += take;
                    *remaining -= take;
                    if *remaining == 0 {
                        self.chunk = ChunkState::DataCrlf { seen: 0 };
                    }
                }
                ChunkState::DataCrlf { seen } => {
                    if bytes[cursor] != CRLF[*seen] {
                        return Err(ParseError::new(
                            ParseErrorKind::InvalidChunkTerminator,
                            cursor,
                        ));
                    }
                    cursor += 1;
                    *seen += 1;
                    if *seen == CRLF.len() {
                        self.chunk = ChunkState::Size { line: Vec::new() };
                    }
                }
                ChunkState::Trailer { line } => {
                    line.push(bytes[cursor]);
                    cursor += 1;
                    if line.ends_with(CRLF) {
                        if line.len() == CRLF.len() {
                            self.chunk = ChunkState::Done;
                            return Ok((cursor, true));
                        }
                        line.clear();
                    }
                }
                ChunkState::Done => return Ok((cursor, true)),
            }
        }
        Ok((cursor, false))
    }
}

struct CoreOutput<H> {
    head: Option<H>,
    data: Vec<Vec<u8>>,
    finished: bool,
    body_offset: usize,
    consumed: usize,
    warnings: Vec<ParseWarning>,
}

#[derive(Debug)]
struct StreamCore {
    state: MessageState,
    buffer: Vec<u8>,
    limits: Limits,
    body: BodyDecoder,
}

impl StreamCore {
    fn new(limits: Limits) -> Self {
        Self {
            state: MessageState::Headers,
            buffer: Vec::new(),
            limits,
            body: BodyDecoder::new(BodyMode::NoBody),
        }
    }

    fn push<H>(
        &mut self,
        bytes: &[u8],
        parse_head: impl FnOnce(&[u8], &mut Vec<ParseWarning>) -> Result<(H, BodyMode), ParseError>,
    ) -> Result<CoreOutput<H>, ParseError> {
        let mut out = CoreOutput {
            head: None,
            data: Vec::new(),
            finished: false,
            body_offset: 0,
            consumed: 0,
            warnings: Vec::new(),
        };

        let mut body_start = 0;
        match self.state {
            MessageState::Done => return Ok(out),
            MessageState::Body => {}
            MessageState::Headers => {
                let previous = self.buffer.len();
                let search_from = previous.saturating_sub(HEADER_TERMINATOR.len() - 1);
                self.buffer.extend_from_slice(bytes);
                let Some(header_end) = twoway::find_bytes(&self.buffer[search_from..], HEADER_TERMINATOR)
                    .map(|index| search_from + index)
                else {
                    if self.buffer.len() > self.limits.max_header_bytes {
                        return Err(ParseError::new(
                            ParseErrorKind::HeaderTooLarge,
                            self.limits.max_header_bytes,
                        ));
                    }
                    out.body_offset = bytes.len();
                    out.consumed = bytes.len();
                    return Ok(out);
                };
                if header_end > self.limits.max_header_bytes {
                    return Err(ParseError::new(
                        ParseErrorKind::HeaderTooLarge,
                        self.limits.max_header_bytes,
                    ));
                }

                body_start = header_end + HEADER_TERMINATOR.len() - previous;
                let (head, mode) = parse_head(&self.buffer[..header_end], &mut out.warnings)?;
                self.buffer.clear();
                out.head = Some(head);
                self.body = BodyDecoder::new(mode);
                self.state = MessageState::Body;
            }
        }

        out.body_offset = body_start;
        let (used, finished) = self.body.decode(&bytes[body_start..], &mut out.data)?;
        out.consumed = body_start + used;
        if finished {
            self.state = MessageState::Done;
            out.finished = true;
        }
        Ok(out)
    }

    fn is_idle(&self) -> bool {
        self.state == MessageState::Headers && self.buffer.is_empty()
    }
}

impl Default for ResponseStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseStreamParser {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            core: StreamCore::new(limits),
            head_request: false,
        }
    }

    /// Parser for the response to a request using `method`. Responses to
    /// `HEAD` never carry a body whatever their headers say.
    pub fn for_method(method: &str) -> Self {
        let mut parser = Self::new();
        parser.head_request = method.eq_ignore_ascii_case("HEAD");
        parser
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<StreamChunk<ResponseStreamEvent>, ParseError> {
        let head_request = self.head_request;
        let out = self
            .core
            .push(bytes, |head, warnings| parse_response_head(head, head_request, warnings))?;

        let mut events = Vec::new();
        if let Some(info) = out.head {
            events.push(ResponseStreamEvent::Headers(info));
        }
        events.extend(out.data.into_iter().map(ResponseStreamEvent::BodyData));
        if out.finished {
            events.push(ResponseStreamEvent::EndOfMessage);
        }

        Ok(StreamChunk {
            events,
            body_offset: out.body_offset,
            consumed: out.consumed,
            warnings: out.warnings,
        })
    }

    /// Signals that the origin closed its side. Completes close-delimited
    /// bodies and rejects anything else that is still open.
    pub fn push_eof(&mut self) -> Result<Vec<ResponseStreamEvent>, ParseError> {
        match self.core.state {
            MessageState::Done => Ok(Vec::new()),
            MessageState::Body if self.core.body.mode == BodyMode::CloseDelimited => {
                self.core.state = MessageState::Done;
                Ok(vec![ResponseStreamEvent::EndOfMessage])
            }
            _ => Err(ParseError::new(
                ParseErrorKind::UnexpectedEof,
                self.core.buffer.len(),
            )),
        }
    }

    pub fn is_done(&self) -> bool {
        self.core.state == MessageState::Done
    }
}

impl Default for RequestStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestStreamParser {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            core: StreamCore::new(limits),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<StreamChunk<RequestStreamEvent>, ParseError> {
        let out = self.core.push(bytes, parse_request_head)?;

        let mut events = Vec::new();
        if let Some(info) = out.head {
            events.push(RequestStreamEvent::Headers(info));
        }
        events.extend(out.data.into_iter().map(RequestStreamEvent::BodyData));
        if out.finished {
            events.push(RequestStreamEvent::EndOfMessage);
        }

        Ok(StreamChunk {
            events,
            body_offset: out.body_offset,
            consumed: out.consumed,
            warnings: out.warnings,
        })
    }

    /// Signals that the client closed its side. A close between messages is
    /// clean; a close inside a head or body is an error.
    pub fn push_eof(&mut self) -> Result<Vec<RequestStreamEvent>, ParseError> {
        if self.core.is_idle() || self.core.state == MessageState::Done {
            return Ok(Vec::new());
        }
        Err(ParseError::new(
            ParseErrorKind::UnexpectedEof,
            self.core.buffer.len(),
        ))
    }

    pub fn is_done(&self) -> bool {
        self.core.state == MessageState::Done
    }
}

fn parse_response_head(
    bytes: &[u8],
    head_request: bool,
    warnings: &mut Vec<ParseWarning>,
) -> Result<(ResponseFrameInfo, BodyMode), ParseError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ParseError::new(ParseErrorKind::InvalidStatusLine, 0))?;
    let (status_line, header_block) = text.split_once("\r\n").unwrap_or((text, ""));
    let (version, status_code, reason) = parse_status_line(status_line, warnings)?;
    let headers = parse_header_lines(header_block, status_line.len() + CRLF.len(), warnings);
    let content_length = parse_content_length(&headers);
    let chunked = header_has_token(&headers, "transfer-encoding", "chunked");
    let bodiless = head_request || status_has_no_body(status_code);
    let close_delimited = !bodiless && !chunked && content_length.is_none();
    let connection_close = message_should_close(&version, &headers);

    let body_mode = if bodiless {
        BodyMode::NoBody
    } else if chunked {
        BodyMode::Chunked
    } else if let Some(length) = content_length {
        BodyMode::Length(length)
    } else {
        BodyMode::CloseDelimited
    };

    let frame = ResponseFrameInfo {
        version,
        status_code,
        reason,
        headers,
        content_length,
        chunked,
        close_delimited,
        connection_close,
    };

    Ok((frame, body_mode))
}

fn parse_request_head(
    bytes: &[u8],
    warnings: &mut Vec<ParseWarning>,
) -> Result<(RequestFrameInfo, BodyMode), ParseError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ParseError::new(ParseErrorKind::InvalidStartLine, 0))?;
    let (request_line, header_block) = text.split_once("\r\n").unwrap_or((text, ""));
    let (method, target, version) = parse_request_line(request_line, warnings)?;
    let headers = parse_header_lines(header_block, request_line.len() + CRLF.len(), warnings);
    let content_length = parse_content_length(&headers);
    let chunked = header_has_token(&headers, "transfer-encoding", "chunked");
    let connection_close = message_should_close(&version, &headers);

    let body_mode = if chunked {
        BodyMode::Chunked
    } else if let Some(length) = content_length {
        BodyMode::Length(length)
    } else {
        BodyMode::NoBody
    };

    let frame = RequestFrameInfo {
        method,
        target,
        version,
        headers,
        content_length,
        chunked,
        connection_close,
    };

    Ok((frame, body_mode))
}

fn parse_request_line(
    line: &str,
    warnings: &mut Vec<ParseWarning>,
) -> Result<(String, String, HttpVersion), ParseError> {
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or(ParseError::new(ParseErrorKind::InvalidStartLine, 0))?;
    let target = parts
        .next()
        .ok_or(ParseError::new(ParseErrorKind::InvalidStartLine, 0))?;
    let version_raw = parts.next().unwrap_or("HTTP/1.1");
    if parts.next().is_some() {
        return Err(ParseError::new(ParseErrorKind::InvalidStartLine, 0));
    }
    let version = parse_http_version(version_raw, warnings);
    Ok((method.to_string(), target.to_string(), version))
}

fn parse_status_line(
    line: &str,
    warnings: &mut Vec<ParseWarning>,
) -> Result<(HttpVersion, u16, String), ParseError> {
    let mut parts = line.splitn(3, ' ');
    let version_raw = parts.next().unwrap_or("HTTP/1.1");
    let status_code = parts
        .next()
        .and_then(|status| status.parse::<u16>().ok())
        .ok_or(ParseError::new(ParseErrorKind::InvalidStatusLine, 0))?;
    let reason = parts.next().unwrap_or("").to_string();
    let version = parse_http_version(version_raw, warnings);
    Ok((version, status_code, reason))
}

fn parse_http_version(version_raw: &str, warnings: &mut Vec<ParseWarning>) -> HttpVersion {
    let version = HttpVersion::parse(version_raw);
    if let HttpVersion::Other(other) = &version {
        warnings.push(ParseWarning {
            kind: ParseWarningKind::UnknownVersion(other.clone()),
            offset: 0,
        });
    }
    version
}

fn parse_header_lines(
    block: &str,
    base_offset: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Vec<Header> {
    let mut headers: Vec<Header> = Vec::new();
    let mut offset = base_offset;

    for line in block.split("\r\n") {
        let line_len = line.len() + CRLF.len();
        if line.is_empty() {
            offset += line_len;
            continue;
        }

        if line.starts_with([' ', '\t']) {
            warnings.push(ParseWarning {
                kind: ParseWarningKind::ObsFoldDetected,
                offset,
            });
            if let Some(last) = headers.last_mut() {
                last.value.push(' ');
                last.value.push_str(line.trim());
                offset += line_len;
                continue;
            }
        }

        let (raw_name, value) = line.split_once(':').unwrap_or((line, ""));
        if raw_name.trim().is_empty() {
            warnings.push(ParseWarning {
                kind: ParseWarningKind::InvalidHeaderName,
                offset,
            });
        }

        headers.push(Header {
            name: raw_name.trim().to_string(),
            value: value.trim().to_string(),
            raw_name: raw_name.to_string(),
        });
        offset += line_len;
    }

    headers
}

fn parse_chunk_size(line: &[u8], offset: usize) -> Result<Option<usize>, ParseError> {
    let line = std::str::from_utf8(line)
        .map_err(|_| ParseError::new(ParseErrorKind::InvalidChunkSize, offset))?;
    let size = line
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches("0x");
    if size.is_empty() {
        return Ok(None);
    }
    usize::from_str_radix(size, 16)
        .map(Some)
        .map_err(|_| ParseError::new(ParseErrorKind::InvalidChunkSize, offset))
}

fn parse_content_length(headers: &[Header]) -> Option<usize> {
    headers.iter().find_map(|header| {
        if header.name.eq_ignore_ascii_case("content-length") {
            header.value.trim().parse::<usize>().ok()
        } else {
            None
        }
    })
}

fn header_has_token(headers: &[Header], name: &str, token: &str) -> bool {
    headers.iter().any(|header| {
        header.name.eq_ignore_ascii_case(name)
            && header
                .value
                .split(',')
                .any(|value| value.trim().eq_ignore_ascii_case(token))
    })
}

fn status_has_no_body(status_code: u16) -> bool {
    status_code / 100 == 1 || status_code == 204 || status_code == 304
}

fn message_should_close(version: &HttpVersion, headers: &[Header]) -> bool {
    match version {
        HttpVersion::Http10 => !header_has_token(headers, "connection", "keep-alive"),
        _ => header_has_token(headers, "connection", "close"),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        RequestStreamEvent, RequestStreamParser, ResponseStreamEvent, ResponseStreamParser,
    };
    use crate::http1::{Limits, ParseErrorKind, ParseWarningKind};

    fn response_body(events: &[ResponseStreamEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|event| match event {
                ResponseStreamEvent::BodyData(data) => Some(data.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    #[test]
    fn request_head_split_across_pushes() {
        let mut parser = RequestStreamParser::new();
        let first = parser.push(b"GET http://example.com/ HTTP/1.1\r\nHo").unwrap();
        assert!(first.events.is_empty());
        assert_eq!(first.body_offset, first.consumed);

        let second = parser.push(b"st: example.com\r\n\r").unwrap();
        assert!(second.events.is_empty());

        let input = b"\n";
        let third = parser.push(input).unwrap();
        assert_eq!(third.body_offset, 1);
        assert_eq!(third.consumed, 1);
        match &third.events[..] {
            [RequestStreamEvent::Headers(info), RequestStreamEvent::EndOfMessage] => {
                assert_eq!(info.method, "GET");
                assert_eq!(info.target, "http://example.com/");
                assert_eq!(info.headers[0].name, "Host");
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn content_length_body_stops_at_message_end() {
        let mut parser = RequestStreamParser::new();
        let input = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET / HTTP/1.1\r\n";
        let chunk = parser.push(input).unwrap();
        assert_eq!(chunk.body_bytes(input), b"hello");
        assert_eq!(chunk.remainder(input), b"GET / HTTP/1.1\r\n");
        assert!(matches!(
            chunk.events.last(),
            Some(RequestStreamEvent::EndOfMessage)
        ));
        assert!(parser.is_done());
    }

    #[test]
    fn chunked_response_keeps_wire_framing_and_decodes_payload() {
        let mut parser = ResponseStreamParser::new();
        let head = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhel";
        let first = parser.push(head).unwrap();
        assert_eq!(first.body_bytes(head), b"5\r\nhel");

        let tail = b"lo\r\n0\r\n\r\n";
        let second = parser.push(tail).unwrap();
        assert_eq!(second.body_bytes(tail), tail);

        let mut events = first.events;
        events.extend(second.events);
        assert_eq!(response_body(&events), b"hello");
        assert!(matches!(
            events.last(),
            Some(ResponseStreamEvent::EndOfMessage)
        ));
    }

    #[test]
    fn chunked_trailers_are_consumed() {
        let mut parser = ResponseStreamParser::new();
        let input =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nok\r\n0\r\nX-Trailer: 1\r\n\r\n";
        let chunk = parser.push(input).unwrap();
        assert_eq!(chunk.consumed, input.len());
        assert!(parser.is_done());
    }

    #[test]
    fn bad_chunk_terminator_is_an_error() {
        let mut parser = ResponseStreamParser::new();
        let error = parser
            .push(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nokXX")
            .unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::InvalidChunkTerminator);
    }

    #[test]
    fn head_response_has_no_body() {
        let mut parser = ResponseStreamParser::for_method("HEAD");
        let input = b"HTTP/1.1 200 OK\r\nContent-Length: 42\r\n\r\n";
        let chunk = parser.push(input).unwrap();
        assert!(matches!(
            chunk.events.last(),
            Some(ResponseStreamEvent::EndOfMessage)
        ));
        assert_eq!(chunk.consumed, input.len());
    }

    #[test]
    fn close_delimited_body_ends_on_eof() {
        let mut parser = ResponseStreamParser::new();
        let chunk = parser.push(b"HTTP/1.0 200 OK\r\n\r\npartial").unwrap();
        match &chunk.events[0] {
            ResponseStreamEvent::Headers(info) => {
                assert!(info.close_delimited);
                assert!(info.connection_close);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(response_body(&chunk.events), b"partial");
        assert_eq!(
            parser.push_eof().unwrap(),
            vec![ResponseStreamEvent::EndOfMessage]
        );
    }

    #[test]
    fn truncated_length_body_fails_on_eof() {
        let mut parser = ResponseStreamParser::new();
        parser
            .push(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc")
            .unwrap();
        let error = parser.push_eof().unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::UnexpectedEof);
    }

    #[test]
    fn informational_response_is_its_own_message() {
        let mut parser = ResponseStreamParser::new();
        let input = b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";
        let chunk = parser.push(input).unwrap();
        match &chunk.events[0] {
            ResponseStreamEvent::Headers(info) => assert!(info.is_informational()),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(
            chunk.remainder(input),
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[test]
    fn request_eof_between_messages_is_clean() {
        let mut parser = RequestStreamParser::new();
        assert!(parser.push_eof().unwrap().is_empty());

        let mut parser = RequestStreamParser::new();
        parser
            .push(b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nab")
            .unwrap();
        assert!(parser.push_eof().is_err());
    }

    #[test]
    fn raw_header_case_is_preserved() {
        let mut parser = ResponseStreamParser::new();
        let chunk = parser
            .push(b"HTTP/1.1 204 No Content\r\nX-MiXeD-Case: yes\r\n\r\n")
            .unwrap();
        match &chunk.events[0] {
            ResponseStreamEvent::Headers(info) => {
                assert_eq!(info.reason, "No Content");
                assert_eq!(info.headers[0].name, "X-MiXeD-Case");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn obs_fold_is_joined_with_a_warning() {
        let mut parser = RequestStreamParser::new();
        let chunk = parser
            .push(b"GET / HTTP/1.1\r\nHeader: one\r\n\tcontinued\r\n\r\n")
            .unwrap();
        match &chunk.events[0] {
            RequestStreamEvent::Headers(info) => assert_eq!(info.headers[0].value, "one continued"),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(
            chunk
                .warnings
                .iter()
                .any(|warning| warning.kind == ParseWarningKind::ObsFoldDetected)
        );
    }

    #[test]
    fn unknown_version_is_a_warning() {
        let mut parser = ResponseStreamParser::new();
        let chunk = parser
            .push(b"HTTP/9.9 200 OK\r\nContent-Length: 0\r\n\r\n")
            .unwrap();
        assert!(
            chunk
                .warnings
                .iter()
                .any(|warning| matches!(warning.kind, ParseWarningKind::UnknownVersion(_)))
        );
    }

    #[test]
    fn oversized_head_is_rejected() {
        let mut parser = RequestStreamParser::with_limits(Limits {
            max_header_bytes: 10,
            max_body_bytes: 1024,
        });
        let error = parser
            .push(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::HeaderTooLarge);
    }
}

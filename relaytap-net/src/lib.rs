//! HTTP/1.x wire handling for the proxy: incremental parsers plus the header
//! reconstructor.

mod http1;

pub use http1::{
    Header, HeaderMap, HeaderValue, HttpVersion, Limits, ParseError, ParseErrorKind,
    ParseWarning, ParseWarningKind, Request, RequestFrameInfo, RequestLine, RequestStreamEvent,
    RequestStreamParser, ResponseFrameInfo, ResponseStreamEvent, ResponseStreamParser,
    StreamChunk,
};

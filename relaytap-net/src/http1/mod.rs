mod headers;
mod stream;
mod types;

pub use headers::{HeaderMap, HeaderValue};
pub use stream::{
    RequestFrameInfo, RequestStreamEvent, RequestStreamParser, ResponseFrameInfo,
    ResponseStreamEvent, ResponseStreamParser, StreamChunk,
};
pub use types::{
    Header, HttpVersion, Limits, ParseError, ParseErrorKind, ParseWarning, ParseWarningKind,
    Request, RequestLine,
};

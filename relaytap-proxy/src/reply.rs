//! Responses the proxy writes itself.

/// Reply from the embedding application to a [`LocalServiceRequest`].
///
/// `Content-Length` and `Connection: close` are always set by the proxy.
///
/// [`LocalServiceRequest`]: crate::LocalServiceRequest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl LocalResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn not_found() -> Self {
        Self::new(404, Vec::new())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status,
            reason_phrase(self.status)
        )
        .into_bytes();
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("connection")
            {
                continue;
            }
            push_header(&mut out, name, &strip_line_breaks(value));
        }
        push_header(&mut out, "Content-Length", &self.body.len().to_string());
        push_header(&mut out, "Connection", "close");
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// The synthetic 502 sent when the origin cannot be reached or fails early.
pub fn bad_gateway(message: &str) -> Vec<u8> {
    let mut out = b"HTTP/1.1 502 Bad Gateway\r\n".to_vec();
    push_header(&mut out, "Proxy-Error", "true");
    push_header(&mut out, "Proxy-Error-Message", &strip_line_breaks(message));
    push_header(&mut out, "Content-Type", "text/html");
    push_header(&mut out, "Content-Length", "0");
    push_header(&mut out, "Connection", "close");
    out.extend_from_slice(b"\r\n");
    out
}

pub(crate) fn bad_request() -> Vec<u8> {
    b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec()
}

fn push_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn strip_line_breaks(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

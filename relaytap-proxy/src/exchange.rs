use relaytap_net::{Header, HeaderMap, HttpVersion, RequestFrameInfo, ResponseFrameInfo};
use url::{Host, Url};

/// One request as the client sent it.
#[derive(Debug, Clone)]
pub struct InboundExchange {
    pub method: String,
    /// Absolute URL for proxy requests, `host:port` for `CONNECT`, a path for
    /// local requests.
    pub target: String,
    pub version: HttpVersion,
    pub raw_headers: Vec<Header>,
    pub headers: HeaderMap,
}

impl InboundExchange {
    pub fn from_frame(info: &RequestFrameInfo) -> Self {
        Self {
            method: info.method.clone(),
            target: info.target.clone(),
            version: info.version.clone(),
            raw_headers: info.headers.clone(),
            headers: HeaderMap::from_headers(&info.headers),
        }
    }

    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }
}

/// The origin's response head, as seen by the response inspector.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status_code: u16,
    pub reason: String,
    pub version: HttpVersion,
    pub raw_headers: Vec<Header>,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn from_frame(info: &ResponseFrameInfo) -> Self {
        Self {
            status_code: info.status_code,
            reason: info.reason.clone(),
            version: info.version.clone(),
            raw_headers: info.headers.clone(),
            headers: HeaderMap::from_headers(&info.headers),
        }
    }

    /// Status line plus reconstructed headers, ready for the client.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "{} {} {}\r\n",
            self.version, self.status_code, self.reason
        )
        .into_bytes();
        self.headers.write_to(&mut out);
        out.extend_from_slice(b"\r\n");
        out
    }
}

/// The request as it will be sent to the origin.
#[derive(Debug, Clone)]
pub struct OutboundExchange {
    pub method: String,
    pub host: String,
    pub port: u16,
    /// Origin-form target, `path?query`.
    pub path: String,
    pub version: HttpVersion,
    pub headers: HeaderMap,
}

impl OutboundExchange {
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.method, self.path, self.version).into_bytes();
        self.headers.write_to(&mut out);
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Whether the client asked for the connection to end after this exchange.
    pub fn wants_close(&self) -> bool {
        let connection = self
            .headers
            .get("connection")
            .map(|value| value.joined().to_ascii_lowercase());
        let has = |token: &str| {
            connection
                .as_deref()
                .is_some_and(|value| value.split(',').any(|part| part.trim() == token))
        };
        match self.version {
            HttpVersion::Http10 => !has("keep-alive"),
            _ => has("close"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Route {
    Forward(OutboundExchange),
    /// Not an absolute URL: answered by the embedding application.
    Local,
    /// Absolute URL this proxy cannot forward in the clear.
    Unsupported { scheme: String },
}

pub fn route(inbound: &InboundExchange) -> Route {
    let Ok(url) = Url::parse(&inbound.target) else {
        return Route::Local;
    };
    let Some(host) = url.host() else {
        return Route::Local;
    };
    if url.scheme() != "http" {
        return Route::Unsupported {
            scheme: url.scheme().to_string(),
        };
    }

    let connect_host = match host {
        Host::Ipv6(addr) => addr.to_string(),
        other => other.to_string(),
    };
    let port = url.port_or_known_default().unwrap_or(80);

    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    let mut headers = inbound.headers.clone();
    headers.rename("Proxy-Connection", "Connection");
    if !headers.contains("host") {
        let authority = match url.port() {
            Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
            None => url.host_str().unwrap_or_default().to_string(),
        };
        headers.insert("Host", authority);
    }

    Route::Forward(OutboundExchange {
        method: inbound.method.clone(),
        host: connect_host,
        port,
        path,
        version: inbound.version.clone(),
        headers,
    })
}

#[cfg(test)]
mod tests {
    use relaytap_net::{HeaderValue, RequestStreamEvent, RequestStreamParser};

    use super::{InboundExchange, Route, route};

    fn inbound(raw: &[u8]) -> InboundExchange {
        let mut parser = RequestStreamParser::new();
        let chunk = parser.push(raw).unwrap();
        match &chunk.events[0] {
            RequestStreamEvent::Headers(info) => InboundExchange::from_frame(info),
            other => panic!("unexpected event {other:?}"),
        }
    }

    fn forward(raw: &[u8]) -> super::OutboundExchange {
        match route(&inbound(raw)) {
            Route::Forward(outbound) => outbound,
            other => panic!("unexpected route {other:?}"),
        }
    }

    #[test]
    fn absolute_url_becomes_origin_form() {
        let outbound =
            forward(b"GET http://example.com:8080/a/b?x=1 HTTP/1.1\r\nHost: example.com:8080\r\n\r\n");
        assert_eq!(outbound.host, "example.com");
        assert_eq!(outbound.port, 8080);
        assert_eq!(outbound.path, "/a/b?x=1");
        assert_eq!(
            outbound.head_bytes(),
            b"GET /a/b?x=1 HTTP/1.1\r\nHost: example.com:8080\r\n\r\n".to_vec()
        );
    }

    #[test]
    fn default_port_and_path() {
        let outbound = forward(b"GET http://example.com HTTP/1.1\r\n\r\n");
        assert_eq!(outbound.port, 80);
        assert_eq!(outbound.path, "/");
    }

    #[test]
    fn proxy_connection_is_renamed() {
        let outbound = forward(
            b"GET http://example.com/ HTTP/1.1\r\nHost: example.com\r\nproxy-connection: keep-alive\r\n\r\n",
        );
        assert!(!outbound.headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("proxy-connection")));
        assert_eq!(
            outbound.headers.get("Connection"),
            Some(&HeaderValue::Single("keep-alive".to_string()))
        );
        assert!(!outbound.wants_close());
    }

    #[test]
    fn missing_host_is_added() {
        let outbound = forward(b"GET http://127.0.0.1:9000/ HTTP/1.1\r\n\r\n");
        assert_eq!(
            outbound.headers.get("host").and_then(HeaderValue::as_single),
            Some("127.0.0.1:9000")
        );
    }

    #[test]
    fn ipv6_host_has_no_brackets_for_connect() {
        let outbound = forward(b"GET http://[::1]:8080/ HTTP/1.1\r\n\r\n");
        assert_eq!(outbound.host, "::1");
        assert_eq!(
            outbound.headers.get("host").and_then(HeaderValue::as_single),
            Some("[::1]:8080")
        );
    }

    #[test]
    fn relative_target_is_local() {
        assert!(matches!(
            route(&inbound(b"GET /proxy.pac HTTP/1.1\r\nHost: localhost\r\n\r\n")),
            Route::Local
        ));
    }

    #[test]
    fn https_absolute_url_is_unsupported() {
        match route(&inbound(b"GET https://example.com/ HTTP/1.1\r\n\r\n")) {
            Route::Unsupported { scheme } => assert_eq!(scheme, "https"),
            other => panic!("unexpected route {other:?}"),
        }
    }

    #[test]
    fn http10_closes_without_keep_alive() {
        let outbound = forward(b"GET http://example.com/ HTTP/1.0\r\n\r\n");
        assert!(outbound.wants_close());
    }
}

use std::fmt;
use std::sync::Arc;

use crate::exchange::{InboundExchange, ResponseHead};

pub type RequestPredicate = Arc<dyn Fn(&InboundExchange) -> bool + Send + Sync>;
pub type ResponsePredicate = Arc<dyn Fn(&InboundExchange, &ResponseHead) -> bool + Send + Sync>;

/// Decides which bodies get captured. Both sides default to never inspecting.
#[derive(Clone, Default)]
pub struct InspectionGate {
    request: Option<RequestPredicate>,
    response: Option<ResponsePredicate>,
}

impl InspectionGate {
    pub fn set_request<F>(&mut self, predicate: F)
    where
        F: Fn(&InboundExchange) -> bool + Send + Sync + 'static,
    {
        self.request = Some(Arc::new(predicate));
    }

    pub fn set_response<F>(&mut self, predicate: F)
    where
        F: Fn(&InboundExchange, &ResponseHead) -> bool + Send + Sync + 'static,
    {
        self.response = Some(Arc::new(predicate));
    }

    pub fn inspect_request(&self, exchange: &InboundExchange) -> bool {
        self.request
            .as_ref()
            .is_some_and(|predicate| predicate(exchange))
    }

    pub fn inspect_response(&self, exchange: &InboundExchange, head: &ResponseHead) -> bool {
        self.response
            .as_ref()
            .is_some_and(|predicate| predicate(exchange, head))
    }
}

impl fmt::Debug for InspectionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InspectionGate")
            .field("request", &self.request.is_some())
            .field("response", &self.response.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use relaytap_net::{ResponseStreamEvent, ResponseStreamParser};

    use super::InspectionGate;
    use crate::exchange::{InboundExchange, ResponseHead};

    fn exchange() -> InboundExchange {
        InboundExchange {
            method: "GET".to_string(),
            target: "http://example.com/".to_string(),
            version: relaytap_net::HttpVersion::Http11,
            raw_headers: Vec::new(),
            headers: relaytap_net::HeaderMap::new(),
        }
    }

    fn head(raw: &[u8]) -> ResponseHead {
        let mut parser = ResponseStreamParser::new();
        match parser.push(raw).unwrap().events.remove(0) {
            ResponseStreamEvent::Headers(info) => ResponseHead::from_frame(&info),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn default_never_inspects() {
        let gate = InspectionGate::default();
        let head = head(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        assert!(!gate.inspect_request(&exchange()));
        assert!(!gate.inspect_response(&exchange(), &head));
    }

    #[test]
    fn predicates_are_independent() {
        let mut gate = InspectionGate::default();
        gate.set_response(|_, head| {
            head.headers
                .get("content-type")
                .is_some_and(|value| value.joined().contains("application/json"))
        });

        let json = head(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n");
        let image = head(b"HTTP/1.1 200 OK\r\nContent-Type: image/png\r\n\r\n");
        assert!(gate.inspect_response(&exchange(), &json));
        assert!(!gate.inspect_response(&exchange(), &image));
        assert!(!gate.inspect_request(&exchange()));

        gate.set_request(|exchange| exchange.method == "GET");
        assert!(gate.inspect_request(&exchange()));
    }
}

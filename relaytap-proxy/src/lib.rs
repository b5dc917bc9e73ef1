mod capture;
mod config;
mod error;
mod events;
mod exchange;
mod inspect;
mod ports;
mod proxy;
mod reply;
mod tunnel;

pub use config::{
    ConfigError, DEFAULT_BASE_PORT, DEFAULT_LOCAL_REPLY_TIMEOUT_MS, ListenConfig, ParserLimits,
    PortSelection, ProxyConfig,
};
pub use error::ProxyError;
pub use events::{
    CapturedRequest, CapturedResponse, LocalResponder, LocalServiceRequest, ProxyEvent,
    ProxyEvents, event_channel,
};
pub use exchange::{InboundExchange, OutboundExchange, ResponseHead, Route, route};
pub use inspect::{InspectionGate, RequestPredicate, ResponsePredicate};
pub use ports::{ListeningPort, bind_listener, find_available_port};
pub use proxy::Proxy;
pub use reply::{LocalResponse, bad_gateway};
pub use tunnel::{TunnelState, split_host_port};

pub use relaytap_codec::CodecError;
pub use relaytap_net::{HeaderMap, HeaderValue, HttpVersion, Request};

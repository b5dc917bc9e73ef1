use relaytap_net::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("proxy configuration error: {0}")]
    Config(String),
    #[error("proxy runtime error: {0}")]
    Runtime(String),
    #[error("proxy IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed HTTP message: {0}")]
    Parse(#[from] ParseError),
    #[error("no bindable port at or above {base}")]
    PortExhausted { base: u16 },
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("client closed the connection")]
    ClientClosed,
}

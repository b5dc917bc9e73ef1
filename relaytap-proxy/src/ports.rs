use std::sync::{Arc, OnceLock};

use tokio::net::TcpListener;
use tracing::debug;

use crate::config::{ListenConfig, PortSelection};
use crate::error::ProxyError;

/// The port the proxy ended up listening on. Empty until the listener is bound.
#[derive(Debug, Clone, Default)]
pub struct ListeningPort(Arc<OnceLock<u16>>);

impl ListeningPort {
    pub fn get(&self) -> Option<u16> {
        self.0.get().copied()
    }

    pub(crate) fn set(&self, port: u16) {
        let _ = self.0.set(port);
    }
}

/// Binds the first free port in `base..=65535`, returning it with its listener.
pub async fn find_available_port(host: &str, base: u16) -> Result<(u16, TcpListener), ProxyError> {
    for candidate in base..=u16::MAX {
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => {
                let port = listener.local_addr()?.port();
                return Ok((port, listener));
            }
            Err(err) => debug!(port = candidate, error = %err, "port unavailable"),
        }
    }
    Err(ProxyError::PortExhausted { base })
}

pub async fn bind_listener(listen: &ListenConfig) -> Result<(u16, TcpListener), ProxyError> {
    if listen.host.trim().is_empty() {
        return Err(ProxyError::Config("listen host is empty".to_string()));
    }
    match listen.port {
        PortSelection::Fixed(port) => {
            let listener = TcpListener::bind((listen.host.as_str(), port)).await?;
            let port = listener.local_addr()?.port();
            Ok((port, listener))
        }
        PortSelection::Auto { base } => find_available_port(&listen.host, base).await,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::net::TcpListener;

    use super::{ListeningPort, bind_listener, find_available_port};
    use crate::config::{ListenConfig, PortSelection};
    use crate::error::ProxyError;

    /// Holds two adjacent ports so the probe has to skip both.
    async fn occupy_pair() -> (u16, TcpListener, TcpListener) {
        loop {
            let first = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
            let port = first.local_addr().unwrap().port();
            if port >= u16::MAX - 2 {
                continue;
            }
            if let Ok(second) = TcpListener::bind(("127.0.0.1", port + 1)).await {
                return (port, first, second);
            }
        }
    }

    #[tokio::test]
    async fn skips_occupied_ports() {
        let (base, _first, _second) = occupy_pair().await;
        let (port, listener) = find_available_port("127.0.0.1", base).await.unwrap();
        assert!(port >= base + 2);
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn last_port_exhausts() {
        let Ok(_held) = TcpListener::bind(("127.0.0.1", u16::MAX)).await else {
            return;
        };
        let err = find_available_port("127.0.0.1", u16::MAX).await.unwrap_err();
        assert_matches!(err, ProxyError::PortExhausted { base: u16::MAX });
    }

    #[tokio::test]
    async fn fixed_zero_reports_assigned_port() {
        let listen = ListenConfig {
            host: "127.0.0.1".to_string(),
            port: PortSelection::Fixed(0),
        };
        let (port, listener) = bind_listener(&listen).await.unwrap();
        assert_ne!(port, 0);
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn empty_host_is_a_config_error() {
        let listen = ListenConfig {
            host: " ".to_string(),
            port: PortSelection::Fixed(0),
        };
        let err = bind_listener(&listen).await.unwrap_err();
        assert_matches!(err, ProxyError::Config(_));
    }

    #[test]
    fn listening_port_is_set_once() {
        let handle = ListeningPort::default();
        let shared = handle.clone();
        assert_eq!(shared.get(), None);
        handle.set(8000);
        handle.set(9000);
        assert_eq!(shared.get(), Some(8000));
    }
}

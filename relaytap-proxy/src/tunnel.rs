use relaytap_net::HttpVersion;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::ProxyError;
use crate::reply::bad_gateway;

const DEFAULT_TUNNEL_PORT: u16 = 443;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    Received,
    Connecting,
    Established,
    ConnectFailed,
    Closed,
}

struct Tunnel {
    host: String,
    port: u16,
    state: TunnelState,
}

impl Tunnel {
    fn transition(&mut self, next: TunnelState) {
        debug!(
            host = %self.host,
            port = self.port,
            from = ?self.state,
            to = ?next,
            "tunnel state"
        );
        self.state = next;
    }
}

/// Serves a `CONNECT` request. The origin is dialled before the client is told
/// the tunnel is up; after that bytes are spliced untouched in both directions.
///
/// `early` holds bytes the client pipelined after the CONNECT head.
pub(crate) async fn handle_connect(
    client: &mut TcpStream,
    target: &str,
    version: &HttpVersion,
    early: &[u8],
) -> Result<(), ProxyError> {
    let (host, port) = split_host_port(target);
    let mut tunnel = Tunnel {
        host,
        port,
        state: TunnelState::Received,
    };

    tunnel.transition(TunnelState::Connecting);
    let mut origin = match TcpStream::connect((tunnel.host.as_str(), tunnel.port)).await {
        Ok(origin) => origin,
        Err(err) => {
            tunnel.transition(TunnelState::ConnectFailed);
            warn!(host = %tunnel.host, port = tunnel.port, error = %err, "tunnel connect failed");
            client.write_all(&bad_gateway(&err.to_string())).await?;
            let _ = client.shutdown().await;
            return Err(ProxyError::Upstream(format!(
                "CONNECT {}:{} failed: {err}",
                tunnel.host, tunnel.port
            )));
        }
    };

    client
        .write_all(format!("{version} 200 OK\r\n\r\n").as_bytes())
        .await?;
    tunnel.transition(TunnelState::Established);

    if !early.is_empty() {
        origin.write_all(early).await?;
    }

    let result = tokio::io::copy_bidirectional(client, &mut origin).await;
    tunnel.transition(TunnelState::Closed);
    let (sent, received) = result?;
    debug!(host = %tunnel.host, sent, received, "tunnel finished");
    Ok(())
}

/// Splits a CONNECT authority. The port falls back to 443 when missing or not
/// a number; IPv6 literals must be bracketed to carry a port.
pub fn split_host_port(target: &str) -> (String, u16) {
    if let Some(rest) = target.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail
                .strip_prefix(':')
                .and_then(|port| port.parse().ok())
                .unwrap_or(DEFAULT_TUNNEL_PORT);
            return (host.to_string(), port);
        }
    }

    match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => (
            host.to_string(),
            port.parse().unwrap_or(DEFAULT_TUNNEL_PORT),
        ),
        _ => (target.to_string(), DEFAULT_TUNNEL_PORT),
    }
}

#[cfg(test)]
mod tests {
    use super::split_host_port;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(split_host_port("example.com:8443"), ("example.com".to_string(), 8443));
    }

    #[test]
    fn port_defaults_to_443() {
        assert_eq!(split_host_port("example.com"), ("example.com".to_string(), 443));
        assert_eq!(split_host_port("example.com:https"), ("example.com".to_string(), 443));
    }

    #[test]
    fn bracketed_ipv6() {
        assert_eq!(split_host_port("[::1]:9443"), ("::1".to_string(), 9443));
        assert_eq!(split_host_port("[2001:db8::1]"), ("2001:db8::1".to_string(), 443));
    }

    #[test]
    fn bare_ipv6_is_all_host() {
        assert_eq!(split_host_port("::1"), ("::1".to_string(), 443));
    }
}

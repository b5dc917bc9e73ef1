use std::path::PathBuf;

use clap::Parser;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relaytap_proxy::{
    CapturedRequest, CapturedResponse, PortSelection, Proxy, ProxyConfig, ProxyEvent,
};

mod pac;

const DEMO_BASE_PORT: u16 = 55688;
const PREVIEW_BYTES: usize = 2048;

#[derive(Debug, Parser)]
#[command(name = "relaytap", about = "Forward HTTP proxy with body capture")]
struct Cli {
    /// TOML config file. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    /// Listen on exactly this port.
    #[arg(long, conflicts_with = "base_port")]
    port: Option<u16>,
    /// Search for a free port starting here.
    #[arg(long = "base-port")]
    base_port: Option<u16>,
    /// Hand out captured bodies without gzip/deflate decoding.
    #[arg(long = "raw-bodies")]
    raw_bodies: bool,
    /// Capture every request body.
    #[arg(long = "inspect-requests")]
    inspect_requests: bool,
    /// Capture responses whose content type contains this text.
    #[arg(
        long = "inspect-content-type",
        default_values_t = vec!["text/html".to_string(), "application/json".to_string()]
    )]
    inspect_content_types: Vec<String>,
    /// Host routed through the proxy by the served PAC file.
    #[arg(long = "pac-host")]
    pac_hosts: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relaytap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let (mut proxy, mut events) = Proxy::new(config);
    let content_types = cli.inspect_content_types.clone();
    proxy.set_response_inspector(move |_, head| {
        let Some(content_type) = head.headers.get("content-type") else {
            return false;
        };
        let content_type = content_type.joined();
        content_types
            .iter()
            .any(|needle| content_type.contains(needle.as_str()))
    });
    if cli.inspect_requests {
        proxy.set_request_inspector(|_| true);
    }

    let listening = proxy.listening_port();
    let proxy_task = tokio::spawn(proxy.run());

    while let Some(event) = events.next().await {
        match event {
            ProxyEvent::Listening { port } => info!(port, "proxy listening on port {port}"),
            ProxyEvent::LocalService(request) => {
                pac::respond(request, listening.get(), &cli.pac_hosts)
            }
            ProxyEvent::RequestCaptured(captured) => log_request(&captured),
            ProxyEvent::ResponseCaptured(captured) => log_response(&captured),
            ProxyEvent::Error { message } => warn!(error = %message, "proxy error"),
        }
    }

    proxy_task
        .await
        .map_err(|err| err.to_string())?
        .map_err(|err| err.to_string())
}

fn build_config(cli: &Cli) -> Result<ProxyConfig, String> {
    let mut config = match &cli.config {
        Some(path) => ProxyConfig::load(path).map_err(|err| err.to_string())?,
        None => {
            let mut config = ProxyConfig::default();
            config.listen.port = PortSelection::Auto {
                base: DEMO_BASE_PORT,
            };
            config
        }
    };

    if let Some(host) = &cli.host {
        config.listen.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.listen.port = PortSelection::Fixed(port);
    }
    if let Some(base) = cli.base_port {
        config.listen.port = PortSelection::Auto { base };
    }
    if cli.raw_bodies {
        config.decompress = false;
    }
    Ok(config)
}

fn log_request(captured: &CapturedRequest) {
    info!(
        method = %captured.method,
        url = %captured.url,
        bytes = captured.body.len(),
        body = %preview(&captured.body),
        "request captured"
    );
}

fn log_response(captured: &CapturedResponse) {
    if let Some(err) = &captured.error {
        warn!(url = %captured.url, error = %err, "captured body could not be decoded");
    }
    info!(
        status = captured.status,
        url = %captured.url,
        bytes = captured.body.len(),
        body = %preview(&captured.body),
        "response captured"
    );
}

fn preview(body: &[u8]) -> String {
    let end = body.len().min(PREVIEW_BYTES);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

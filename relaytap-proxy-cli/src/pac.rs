use relaytap_proxy::{LocalResponse, LocalServiceRequest};

pub const PAC_PATH: &str = "/proxy.pac";
pub const PAC_CONTENT_TYPE: &str = "application/x-ns-proxy-autoconfig";

/// Routes the listed hosts through the proxy and everything else direct.
pub fn proxy_auto_config(port: u16, hosts: &[String]) -> String {
    let mut script = String::from("function FindProxyForURL(url, host) {\n");
    if !hosts.is_empty() {
        let condition = hosts
            .iter()
            .map(|host| format!("host === '{}'", host.replace(['\\', '\''], "")))
            .collect::<Vec<_>>()
            .join(" || ");
        script.push_str(&format!(
            "  if ({condition}) {{\n    return 'PROXY localhost:{port}';\n  }}\n"
        ));
    }
    script.push_str("  return 'DIRECT';\n}\n");
    script
}

/// Answers a request made to the proxy itself.
pub fn respond(request: LocalServiceRequest, port: Option<u16>, hosts: &[String]) {
    let response = match (request.path(), port) {
        (PAC_PATH, Some(port)) => LocalResponse::new(200, proxy_auto_config(port, hosts))
            .with_header("Content-Type", PAC_CONTENT_TYPE),
        _ => LocalResponse::new(200, "Service OK!"),
    };
    if !request.respond(response) {
        tracing::debug!("local client went away before the reply");
    }
}

#[cfg(test)]
mod tests {
    use super::proxy_auto_config;

    #[test]
    fn listed_hosts_use_the_proxy() {
        let script = proxy_auto_config(
            55688,
            &["example.com".to_string(), "whatismyipaddress.com".to_string()],
        );
        assert!(script.contains(
            "if (host === 'example.com' || host === 'whatismyipaddress.com') {"
        ));
        assert!(script.contains("return 'PROXY localhost:55688';"));
        assert!(script.trim_end().ends_with("return 'DIRECT';\n}"));
    }

    #[test]
    fn no_hosts_is_always_direct() {
        let script = proxy_auto_config(8000, &[]);
        assert!(!script.contains("PROXY"));
        assert!(script.contains("return 'DIRECT';"));
    }

    #[test]
    fn quotes_are_stripped_from_hosts() {
        let script = proxy_auto_config(8000, &["evil.com'; alert(1); '".to_string()]);
        assert!(script.contains("host === 'evil.com; alert(1); '"));
    }
}

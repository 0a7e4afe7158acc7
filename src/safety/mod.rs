use std::net::IpAddr;

use reqwest::Url;

use crate::errors::{GenError, Result};

/// Reject any inference server address that does not point at this machine.
///
/// Accepted hosts:
/// - `localhost`
/// - any IPv4 loopback address (`127.0.0.0/8`)
/// - the IPv6 loopback `::1`
pub fn ensure_loopback(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url)
        .map_err(|e| GenError::Config(format!("invalid inference server URL '{base_url}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(GenError::Config(format!(
            "inference server URL must use http or https, got '{}'",
            url.scheme()
        )));
    }

    let host = url.host_str().unwrap_or_default();
    if !host_is_loopback(host) {
        return Err(GenError::Config(format!(
            "inference server must be local (localhost or 127.0.0.1), refusing '{base_url}'"
        )));
    }
    Ok(url)
}

fn host_is_loopback(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback(),
        Err(_) => false,
    }
}

/// Exact, case-sensitive membership in the configured allow-list.
pub fn model_is_allowed(model: &str, allowlist: &[String]) -> bool {
    allowlist.iter().any(|m| m == model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_hosts_pass() {
        for url in [
            "http://localhost:11434",
            "http://LOCALHOST:11434/",
            "http://127.0.0.1:11434",
            "http://127.0.0.2:11434",
            "http://[::1]:11434",
        ] {
            assert!(ensure_loopback(url).is_ok(), "{url}");
        }
    }

    #[test]
    fn remote_hosts_are_refused() {
        for url in [
            "http://10.0.0.5:11434",
            "http://ollama.example.com",
            "http://localhost.example.com:11434",
            "http://0.0.0.0:11434",
        ] {
            let err = ensure_loopback(url).unwrap_err();
            assert!(matches!(err, GenError::Config(_)), "{url}");
        }
    }

    #[test]
    fn garbage_and_odd_schemes_are_refused() {
        assert!(ensure_loopback("not a url").is_err());
        assert!(ensure_loopback("ftp://localhost/").is_err());
    }

    #[test]
    fn model_allowlist_is_exact() {
        let allow = vec!["llama3.2:3b".to_string()];
        assert!(model_is_allowed("llama3.2:3b", &allow));
        assert!(!model_is_allowed("llama3.2", &allow));
        assert!(!model_is_allowed("LLAMA3.2:3B", &allow));
    }
}

//! Refuses fetches that would reach loopback, private, or link-local hosts.
//!
//! Search providers hand back arbitrary URLs, so every page fetch is checked
//! both on the literal host and on what its name resolves to.

use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use reqwest::redirect::Policy;
use tracing::warn;
use url::{Host, Url};

use super::FetchError;

const DNS_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

const BLOCKED_SUFFIXES: [&str; 4] = [".localhost", ".local", ".internal", ".arpa"];

/// Name resolution used by the host guard; swapped for a stub in tests.
pub(crate) trait DnsResolver {
    async fn lookup(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, FetchError>;
}

pub(crate) struct TokioDnsResolver;

impl DnsResolver for TokioDnsResolver {
    async fn lookup(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, FetchError> {
        let addrs = tokio::time::timeout(
            DNS_LOOKUP_TIMEOUT,
            tokio::net::lookup_host((host, port)),
        )
        .await
        .map_err(|_| FetchError::DnsResolution("DNS lookup timed out".to_string()))?
        .map_err(|e| FetchError::DnsResolution(e.to_string()))?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

/// Drops `user:pass@` from a URL so it can be logged.
pub(super) fn redact(raw: &str) -> Cow<'_, str> {
    if !raw.contains('@') {
        return Cow::Borrowed(raw);
    }
    match Url::parse(raw) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            Cow::Owned(parsed.to_string())
        }
        _ => Cow::Borrowed(raw),
    }
}

/// Full check: scheme, literal host, then every resolved address.
pub(super) async fn check_url(raw: &str, resolver: &impl DnsResolver) -> Result<(), FetchError> {
    let parsed = check_literal(raw).inspect_err(|e| {
        if matches!(e, FetchError::InternalHost) {
            warn!(url = %redact(raw), "refusing fetch of internal host");
        }
    })?;

    let Some(Host::Domain(domain)) = parsed.host() else {
        return Ok(());
    };
    let port = parsed.port_or_known_default().unwrap_or(80);

    for ip in resolver.lookup(domain, port).await? {
        if is_internal_ip(ip) {
            warn!(host = %domain, %ip, "host resolves to internal address");
            return Err(FetchError::InternalHost);
        }
    }
    Ok(())
}

/// Redirect policy that refuses any hop onto an internal host before it is requested.
pub(crate) fn redirect_policy(max_redirects: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            return attempt.error(format!("too many redirects (max {max_redirects})"));
        }
        match check_literal(attempt.url().as_str()) {
            Ok(_) => attempt.follow(),
            Err(e) => {
                warn!(url = %redact(attempt.url().as_str()), "refusing redirect: {e}");
                attempt.error(e)
            }
        }
    })
}

fn check_literal(raw: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(raw)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidScheme);
    }
    let internal = match parsed.host() {
        Some(Host::Ipv4(v4)) => is_internal_ip(IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => is_internal_ip(IpAddr::V6(v6)),
        Some(Host::Domain(domain)) => {
            let lower = domain.to_ascii_lowercase();
            lower == "localhost" || BLOCKED_SUFFIXES.iter().any(|s| lower.ends_with(s))
        }
        None => true,
    };
    if internal {
        return Err(FetchError::InternalHost);
    }
    Ok(parsed)
}

fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => is_internal_v6(v6),
    }
}

fn is_internal_v4(v4: Ipv4Addr) -> bool {
    let [a, b, ..] = v4.octets();
    v4.is_loopback()
        || v4.is_private()
        || v4.is_link_local()
        || v4.is_broadcast()
        || a == 0
        // carrier-grade NAT, 100.64.0.0/10
        || (a == 100 && (64..=127).contains(&b))
}

fn is_internal_v6(v6: Ipv6Addr) -> bool {
    let first = v6.segments()[0];
    v6.is_loopback()
        || v6.is_unspecified()
        || (first & 0xffc0) == 0xfe80
        || (first & 0xfe00) == 0xfc00
        || v6.to_ipv4_mapped().is_some_and(is_internal_v4)
}

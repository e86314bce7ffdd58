//! Pure URL policy checks.
//!
//! Everything here is synchronous and I/O-free: no DNS lookups, no
//! sockets. Fail-closed, first failing check wins and carries the
//! reason.

use crate::error::{EgressError, EgressResult};
use palisade_core::is_public_ip;
use palisade_policy::NetworkPolicy;
use std::net::IpAddr;
use url::{Host, Url};

/// Hostnames that resolve to cloud instance-metadata services.
const METADATA_HOSTS: &[&str] = &["metadata.google.internal"];

fn denied(reason: impl Into<String>) -> EgressError {
    EgressError::Denied {
        reason: reason.into(),
    }
}

/// Check a raw URL against the network policy.
///
/// SSRF defenses are applied after the allow-list on purpose: a
/// wildcard allow-list entry must never accidentally admit an internal
/// or metadata address, so passing the allow-list is necessary but not
/// sufficient.
pub(crate) fn check_url(policy: &NetworkPolicy, raw: &str) -> EgressResult<Url> {
    let url = Url::parse(raw)?;

    let scheme = url.scheme();
    if !policy.allowed_schemes.iter().any(|s| s == scheme) {
        return Err(denied(format!("scheme '{scheme}' is not allowed")));
    }

    match url.host() {
        None => return Err(denied("URL has no host")),
        Some(Host::Domain(domain)) => check_domain(policy, &domain.to_ascii_lowercase())?,
        Some(Host::Ipv4(ip)) => return Err(deny_literal_ip(policy, IpAddr::V4(ip))),
        Some(Host::Ipv6(ip)) => return Err(deny_literal_ip(policy, IpAddr::V6(ip))),
    }

    if raw.len() > policy.max_url_length {
        return Err(denied(format!(
            "URL exceeds maximum length {}",
            policy.max_url_length
        )));
    }

    Ok(url)
}

fn check_domain(policy: &NetworkPolicy, domain: &str) -> EgressResult<()> {
    if !policy.allowed_domains.is_empty() && !policy.domain_allowed(domain) {
        return Err(denied(format!("domain '{domain}' is not in the allowlist")));
    }
    if policy.blocklist_matches_all() || policy.domain_blocked(domain) {
        return Err(denied(format!("domain '{domain}' is blocked")));
    }
    if domain == "localhost" || domain.ends_with(".localhost") {
        return Err(denied(format!("host '{domain}' is loopback")));
    }
    if METADATA_HOSTS.contains(&domain) {
        return Err(denied(format!(
            "host '{domain}' targets a cloud metadata service"
        )));
    }
    Ok(())
}

/// Check a redirect target against the non-negotiable SSRF rules.
///
/// Redirects come from the remote server, after the original URL has
/// already been admitted, so a compromised or malicious endpoint could
/// bounce the client toward an internal address. Each hop must stay
/// clear of loopback hosts, metadata services, and non-public IPs; the
/// full policy (allow/block lists, schemes) is not re-applied here.
pub(crate) fn redirect_hop_allowed(url: &Url) -> bool {
    match url.host() {
        None => false,
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            domain != "localhost"
                && !domain.ends_with(".localhost")
                && !METADATA_HOSTS.contains(&domain.as_str())
        }
        Some(Host::Ipv4(ip)) => is_public_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_public_ip(IpAddr::V6(ip)),
    }
}

/// Literal IP hosts are always rejected; the reason distinguishes
/// internal addresses from the general domain-name requirement.
fn deny_literal_ip(policy: &NetworkPolicy, ip: IpAddr) -> EgressError {
    if !is_public_ip(ip) {
        return denied(format!(
            "IP address {ip} is in a private or reserved range"
        ));
    }
    if policy.ip_blocked(ip) {
        return denied(format!("IP address {ip} is blocked"));
    }
    denied("literal IP addresses are not allowed; use a domain name")
}

//! IP-level SSRF classification.
//!
//! The egress guard rejects any request whose host resolves to (or
//! literally is) a loopback, private, link-local, or otherwise
//! non-public address. This check takes precedence over domain
//! allowlists: a wildcard allowlist entry must never whitelist an
//! internal address.

use std::net::IpAddr;

/// Checks if an IP address is publicly routable (not loopback, private,
/// link-local, CGNAT, multicast, or unspecified).
#[must_use]
pub fn is_public_ip(mut ip: IpAddr) -> bool {
    if let IpAddr::V6(ipv6) = ip {
        // IPv4-mapped and IPv4-compatible IPv6 addresses bypass naive
        // checks; normalize to the embedded IPv4 address first.
        if let Some(ipv4) = ipv6.to_ipv4_mapped() {
            ip = IpAddr::V4(ipv4);
        } else if let Some(ipv4) = ipv6.to_ipv4() {
            ip = IpAddr::V4(ipv4);
        }
    }

    if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() {
        return false;
    }

    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            let is_private = octets[0] == 10
                || octets[0] == 0 // 0.0.0.0/8
                || octets[0] == 255 // broadcast
                || octets[0] == 127
                || (octets[0] == 172 && octets[1] >= 16 && octets[1] <= 31)
                || (octets[0] == 192 && octets[1] == 168)
                || (octets[0] == 169 && octets[1] == 254)
                || (octets[0] == 100 && octets[1] >= 64 && octets[1] <= 127);
            !is_private
        },
        IpAddr::V6(ipv6) => {
            let segments = ipv6.segments();
            // fc00::/7 unique-local, fe80::/10 link-local
            let is_private = (segments[0] & 0xfe00) == 0xfc00 || (segments[0] & 0xffc0) == 0xfe80;
            !is_private
        },
    }
}

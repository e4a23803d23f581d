use std::net::IpAddr;

/// True when `host` already is an IP literal (v4 or v6), i.e. no name
/// resolution is needed for the caller's own purposes.
pub fn is_ip_literal(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok()
}

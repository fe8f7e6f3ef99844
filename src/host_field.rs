use std::net::{Ipv4Addr, Ipv6Addr};

use once_cell::sync::Lazy;
use regex::Regex;

static DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^((?:[A-Za-z0-9][A-Za-z0-9-]{0,61}[A-Za-z0-9]\.)+[A-Za-z]{2,})(:[0-9]+)?$").unwrap()
});
static IPV4_REGEX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^([0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3})(:[0-9]+)?$").unwrap());
static IPV6_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[([0-9a-fA-F:]+)\](:[0-9]+)?$").unwrap());

/// A parsed `Host:` header value, classified as a domain, an IPv4 address,
/// or a bracketed IPv6 address, each paired with a port.
///
/// Invariant: `port()` is always in `1..=65535`. A host string with no
/// explicit port inherits the server's listening port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostField {
	Domain { domain: String, port: u16 },
	V4 { ip: Ipv4Addr, port: u16 },
	V6 { ip: Ipv6Addr, port: u16 },
}

#[derive(Debug, thiserror::Error)]
#[error("invalid host field: {0}")]
pub struct InvalidHostField(pub String);

impl HostField {
	pub fn port(&self) -> u16 {
		match self {
			HostField::Domain { port, .. } => *port,
			HostField::V4 { port, .. } => *port,
			HostField::V6 { port, .. } => *port,
		}
	}
}

impl std::fmt::Display for HostField {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			HostField::Domain { domain, port } => write!(f, "{domain}:{port}"),
			HostField::V4 { ip, port } => write!(f, "{ip}:{port}"),
			HostField::V6 { ip, port } => write!(f, "[{ip}]:{port}"),
		}
	}
}

fn port_or_default(captured: Option<regex::Match<'_>>, default_port: u16) -> Result<u16, InvalidHostField> {
	match captured {
		Some(m) => {
			// capture includes the leading ':'
			let digits = &m.as_str()[1..];
			digits
				.parse::<u16>()
				.map_err(|_| InvalidHostField(digits.to_string()))
		}
		None => Ok(default_port),
	}
}

/// Parse a `Host:` header value, trying domain, then IPv4, then bracketed
/// IPv6 in order. `default_port` is used when the host string has no
/// explicit port (normally the server's own listening port).
pub fn parse_host_field(host: &str, default_port: u16) -> Result<HostField, InvalidHostField> {
	if let Some(caps) = DOMAIN_REGEX.captures(host) {
		let domain = caps.get(1).unwrap().as_str().to_string();
		let port = port_or_default(caps.get(2), default_port)?;
		return Ok(HostField::Domain { domain, port });
	}

	if let Some(caps) = IPV4_REGEX.captures(host) {
		let ip: Ipv4Addr = caps
			.get(1)
			.unwrap()
			.as_str()
			.parse()
			.map_err(|_| InvalidHostField(host.to_string()))?;
		let port = port_or_default(caps.get(2), default_port)?;
		return Ok(HostField::V4 { ip, port });
	}

	if let Some(caps) = IPV6_REGEX.captures(host) {
		let ip: Ipv6Addr = caps
			.get(1)
			.unwrap()
			.as_str()
			.parse()
			.map_err(|_| InvalidHostField(host.to_string()))?;
		let port = port_or_default(caps.get(2), default_port)?;
		return Ok(HostField::V6 { ip, port });
	}

	Err(InvalidHostField(host.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_domain_with_explicit_port() {
		let h = parse_host_field("example.com:8080", 443).unwrap();
		assert_eq!(h, HostField::Domain { domain: "example.com".into(), port: 8080 });
	}

	#[test]
	fn parses_domain_without_port_uses_default() {
		let h = parse_host_field("example.com", 443).unwrap();
		assert_eq!(h, HostField::Domain { domain: "example.com".into(), port: 443 });
	}

	#[test]
	fn parses_ipv4_with_port() {
		let h = parse_host_field("127.0.0.1:9000", 80).unwrap();
		assert_eq!(h, HostField::V4 { ip: Ipv4Addr::new(127, 0, 0, 1), port: 9000 });
	}

	#[test]
	fn parses_bracketed_ipv6_with_port() {
		let h = parse_host_field("[::1]:9000", 80).unwrap();
		assert_eq!(h, HostField::V6 { ip: "::1".parse().unwrap(), port: 9000 });
	}

	#[test]
	fn unbracketed_ipv6_is_rejected() {
		assert!(parse_host_field("::1", 80).is_err());
	}

	#[test]
	fn garbage_is_rejected() {
		assert!(parse_host_field("not a host!!", 80).is_err());
		assert!(parse_host_field("", 80).is_err());
	}

	#[test]
	fn round_trip_to_canonical_string() {
		let h = parse_host_field("[2001:db8::1]:443", 80).unwrap();
		assert_eq!(h.to_string(), "[2001:db8::1]:443");

		let h = parse_host_field("10.0.0.1", 443).unwrap();
		assert_eq!(h.to_string(), "10.0.0.1:443");
	}
}

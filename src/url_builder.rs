//! A small helper for building the base URL of an HTTP/HTTPS endpoint
//! from either a hostname or a literal IP address, used by integration
//! tests and any client-side code that needs to address a server this
//! crate started on an OS-assigned port.

use std::net::IpAddr;

use url::Url;

/// Either a DNS hostname or a literal IP address to address an endpoint
/// by. An IPv6 address is bracketed in the resulting authority; an IPv4
/// address or hostname is not.
#[derive(Debug, Clone)]
pub enum HostSpec {
	Hostname(String),
	Ip(IpAddr),
}

impl HostSpec {
	fn authority_host(&self) -> String {
		match self {
			HostSpec::Hostname(h) => h.clone(),
			HostSpec::Ip(IpAddr::V4(v4)) => v4.to_string(),
			HostSpec::Ip(IpAddr::V6(v6)) => format!("[{v6}]"),
		}
	}
}

/// Build a `scheme://host[:port]` URL, with no path or query attached.
pub fn gen_url_prefix(scheme: &str, host: &HostSpec, port: Option<u16>) -> Result<Url, url::ParseError> {
	let authority = match port {
		Some(p) => format!("{}:{p}", host.authority_host()),
		None => host.authority_host(),
	};
	Url::parse(&format!("{scheme}://{authority}"))
}

pub fn gen_http_url_prefix(host: &HostSpec, port: Option<u16>) -> Result<Url, url::ParseError> {
	gen_url_prefix("http", host, port)
}

pub fn gen_https_url_prefix(host: &HostSpec, port: Option<u16>) -> Result<Url, url::ParseError> {
	gen_url_prefix("https", host, port)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hostname_with_port() {
		let url = gen_http_url_prefix(&HostSpec::Hostname("example.local".into()), Some(8080)).unwrap();
		assert_eq!(url.as_str(), "http://example.local:8080/");
	}

	#[test]
	fn ipv4_without_port() {
		let url = gen_https_url_prefix(&HostSpec::Ip("127.0.0.1".parse().unwrap()), None).unwrap();
		assert_eq!(url.as_str(), "https://127.0.0.1/");
	}

	#[test]
	fn ipv6_is_bracketed() {
		let url = gen_https_url_prefix(&HostSpec::Ip("::1".parse().unwrap()), Some(443)).unwrap();
		assert_eq!(url.as_str(), "https://[::1]:443/");
	}
}

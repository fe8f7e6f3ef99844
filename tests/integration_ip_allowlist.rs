//! IP allow-list, scenario 2 of the testable-properties list: the first
//! network in the list that contains the client's address decides the
//! outcome, and an address matching nothing is denied by default.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use netframe::chain::NotFoundHandler;
use netframe::middleware::IpNetworkPolicy;
use netframe::server::http::{HttpConfig, HttpHandler};
use netframe::server::tcp::TcpServer;

fn status_for(networks: Vec<(&str, bool)>) -> String {
	let networks = networks.into_iter().map(|(cidr, allow)| (cidr.parse().unwrap(), allow)).collect();
	let policy = Arc::new(IpNetworkPolicy::new(networks, Arc::new(NotFoundHandler)));
	let handler = Arc::new(HttpHandler::new(policy, HttpConfig::default()));
	let server = TcpServer::bind("[::1]:0".parse().unwrap(), handler).unwrap();
	server.start();

	let mut stream = TcpStream::connect(("::1", server.port())).unwrap();
	stream.write_all(b"GET / HTTP/1.1\r\nHost: [::1]\r\n\r\n").unwrap();
	let mut buf = [0u8; 256];
	let n = stream.read(&mut buf).unwrap();
	server.terminate();
	String::from_utf8_lossy(&buf[..n]).lines().next().unwrap_or_default().to_string()
}

#[test]
fn matching_allow_rule_permits_the_request() {
	let line = status_for(vec![("::1/128", true)]);
	// NotFoundHandler still answers 404, but the allow-list must have let
	// the request through to it instead of rejecting with 403.
	assert!(line.contains("404"), "expected the request to reach downstream, got {line:?}");
}

#[test]
fn no_matching_rule_denies_by_default() {
	let line = status_for(vec![]);
	assert!(line.contains("403"), "expected default-deny with no rules, got {line:?}");
}

#[test]
fn first_matching_rule_wins_over_a_later_allow() {
	let line = status_for(vec![("::1/128", false), ("::1/128", true)]);
	assert!(line.contains("403"), "expected the first (deny) rule to win, got {line:?}");
}

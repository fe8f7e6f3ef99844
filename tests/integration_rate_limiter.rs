//! Rate limiter, scenario 3 of the testable-properties list: with
//! `maxReq=1, timePeriodSec=600`, a first GET succeeds and a second within
//! the window is rejected.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use netframe::chain::NotFoundHandler;
use netframe::middleware::RateLimiter;
use netframe::server::http::{HttpConfig, HttpHandler};
use netframe::server::tcp::TcpServer;

fn status_line(stream: &mut TcpStream) -> String {
	let mut buf = [0u8; 256];
	let n = stream.read(&mut buf).unwrap();
	String::from_utf8_lossy(&buf[..n]).lines().next().unwrap_or_default().to_string()
}

#[test]
fn second_request_within_the_window_is_rejected() {
	let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(600), Arc::new(NotFoundHandler)));
	let handler = Arc::new(HttpHandler::new(limiter, HttpConfig::default()));
	let server = TcpServer::bind("127.0.0.1:0".parse().unwrap(), handler).unwrap();
	server.start();
	let port = server.port();

	let mut first = TcpStream::connect(("127.0.0.1", port)).unwrap();
	first.write_all(b"GET / HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n").unwrap();
	let line1 = status_line(&mut first);
	assert!(line1.contains("404"), "first request should reach downstream, got {line1:?}");

	let mut second = TcpStream::connect(("127.0.0.1", port)).unwrap();
	second.write_all(b"GET / HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n").unwrap();
	let line2 = status_line(&mut second);
	assert!(line2.contains("403"), "second request within the window should be rejected, got {line2:?}");

	server.terminate();
}

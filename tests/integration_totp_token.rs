//! TOTP bearer token, scenario 6 of the testable-properties list: a
//! correctly hashed `TOTP_TOKEN <salt>:sha512(salt + ":" + T.now())` header
//! is accepted and makes the current code available to the downstream
//! handler; a missing header, wrong scheme, or tampered token is rejected.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use netframe::chain::{DownstreamHandler, RequestContext};
use netframe::middleware::TotpToken;
use netframe::server::http::{HttpConfig, HttpHandler};
use netframe::server::tcp::TcpServer;
use netframe::totp::{gen_totp_token, Digest, Totp};

const SECRET: &str = "JBSWY3DPEHPK3PXP";

struct EchoCurrentTotp;

impl DownstreamHandler for EchoCurrentTotp {
	fn handle_request(&self, ctx: &mut RequestContext<'_>) {
		let body = ctx.req_state.current_totp.clone().unwrap_or_default();
		ctx.handler.set_code_and_text(200, &body);
	}
}

fn send(port: u16, auth_header: Option<&str>) -> (u16, String) {
	let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
	let mut req = String::from("GET / HTTP/1.1\r\nHost: 127.0.0.1\r\n");
	if let Some(v) = auth_header {
		req.push_str(&format!("Authorization: {v}\r\n"));
	}
	req.push_str("\r\n");
	stream.write_all(req.as_bytes()).unwrap();
	let mut buf = Vec::new();
	stream.read_to_end(&mut buf).unwrap();
	let text = String::from_utf8_lossy(&buf).to_string();
	let code: u16 = text.split_whitespace().nth(1).and_then(|s| s.parse().ok()).unwrap_or(0);
	let body = text.rsplit("\r\n\r\n").next().unwrap_or_default().to_string();
	(code, body)
}

fn start_server() -> (Arc<TcpServer<HttpHandler>>, Totp) {
	let totp = Totp::new(SECRET.to_string(), 30, 6, Digest::Sha1).unwrap();
	let stage = Arc::new(TotpToken::new(totp.clone(), Arc::new(EchoCurrentTotp)));
	let handler = Arc::new(HttpHandler::new(stage, HttpConfig::default()));
	let server = TcpServer::bind("127.0.0.1:0".parse().unwrap(), handler).unwrap();
	server.start();
	(server, totp)
}

#[test]
fn valid_token_is_accepted_and_exposes_the_current_code() {
	let (server, totp) = start_server();
	let current = totp.now().unwrap();
	let token = gen_totp_token(&current);

	let (code, body) = send(server.port(), Some(&format!("TOTP_TOKEN {token}")));
	assert_eq!(code, 200);
	assert_eq!(body, current);

	server.terminate();
}

#[test]
fn missing_header_is_rejected() {
	let (server, _totp) = start_server();
	let (code, _) = send(server.port(), None);
	assert_eq!(code, 403);
	server.terminate();
}

#[test]
fn wrong_scheme_is_rejected() {
	let (server, totp) = start_server();
	let current = totp.now().unwrap();
	let token = gen_totp_token(&current);
	let (code, _) = send(server.port(), Some(&format!("Bearer {token}")));
	assert_eq!(code, 403);
	server.terminate();
}

#[test]
fn tampered_salt_is_rejected() {
	let (server, totp) = start_server();
	let current = totp.now().unwrap();
	let token = gen_totp_token(&current);
	let (salt, digest) = token.split_once(':').unwrap();
	let tampered = format!("{}ff:{digest}", salt);
	let (code, _) = send(server.port(), Some(&format!("TOTP_TOKEN {tampered}")));
	assert_eq!(code, 403);
	server.terminate();
}

#[test]
fn tampered_digest_is_rejected() {
	let (server, totp) = start_server();
	let current = totp.now().unwrap();
	let token = gen_totp_token(&current);
	let (salt, digest) = token.split_once(':').unwrap();
	let mut tampered_digest = digest.to_string();
	let flipped = if tampered_digest.starts_with('0') { '1' } else { '0' };
	tampered_digest.replace_range(0..1, &flipped.to_string());
	let tampered = format!("{salt}:{tampered_digest}");
	let (code, _) = send(server.port(), Some(&format!("TOTP_TOKEN {tampered}")));
	assert_eq!(code, 403);
	server.terminate();
}

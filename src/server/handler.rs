use std::io::{BufRead, BufReader, Read, Write};
use std::net::SocketAddr;

use crate::error::{NetFrameError, Result};
use crate::response::{HeaderMap, Response};

use super::stream::{Connection, IoStream};

/// The per-connection handler object passed down the chain, standing in
/// for the original library's request handler: it owns the socket, the
/// parsed request line and headers, and the in-progress `Response`, and
/// exposes the same small set of mutators the downstream stages use to
/// shape that response.
pub struct RequestHandler {
	reader: BufReader<Box<dyn IoStream>>,
	pub peer_addr: SocketAddr,
	/// The peer's presented TLS certificate chain (DER, leaf-first), if
	/// this connection was accepted off a TLS listener requesting one.
	pub peer_cert_chain_der: Option<Vec<Vec<u8>>>,
	pub method: String,
	/// The raw request-target, including any query string.
	pub raw_target: String,
	pub path: String,
	pub query: String,
	pub http_version: String,
	pub request_headers: HeaderMap,
	pub response: Response,
	/// Set only by an explicit `allow_keep_alive()` call from business
	/// handler code; never implied by the pre-handler itself.
	keep_alive_allowed: bool,
}

impl RequestHandler {
	pub fn new(conn: Connection) -> Self {
		Self {
			peer_addr: conn.peer_addr,
			peer_cert_chain_der: conn.peer_cert_chain_der,
			reader: BufReader::new(conn.stream),
			method: String::new(),
			raw_target: String::new(),
			path: String::new(),
			query: String::new(),
			http_version: String::new(),
			request_headers: HeaderMap::new(),
			response: Response::new(),
			keep_alive_allowed: false,
		}
	}

	pub fn reader(&mut self) -> &mut BufReader<Box<dyn IoStream>> {
		&mut self.reader
	}

	// -- response mutators, mirroring the original's PyHandlerBase --

	pub fn add_response_header(&mut self, key: &str, value: impl Into<String>) {
		self.response.headers.add(key, value);
	}

	pub fn set_response_header(&mut self, key: &str, values: Vec<String>) {
		self.response.headers.set(key, values);
	}

	pub fn get_response_header(&self, key: &str) -> Option<&[String]> {
		self.response.headers.get(key)
	}

	pub fn set_response_body(&mut self, body: Vec<u8>) {
		self.response.body = Some(body);
	}

	pub fn set_status_code(&mut self, code: u16) {
		self.response.status_code = code;
	}

	pub fn status_code(&self) -> u16 {
		self.response.status_code
	}

	pub fn has_response_sent(&self) -> bool {
		self.response.was_sent
	}

	pub fn reset_response(&mut self) {
		self.response.reset();
		self.keep_alive_allowed = false;
	}

	pub fn set_json_body(&mut self, data: &serde_json::Value, indent: Option<usize>, status_code: Option<u16>) -> Result<()> {
		self.response
			.set_json_body(data, indent, status_code)
			.map_err(|e| NetFrameError::ClientProtocol(format!("failed to serialize JSON body: {e}")))
	}

	pub fn set_code_and_text(&mut self, code: u16, message: &str) {
		self.response.set_code_and_text(code, message);
	}

	/// Write the status line, headers, and body to the wire. Mirrors the
	/// original's `DoResponse`: logs at request-completion granularity,
	/// then flips `was_sent` so the caller never double-sends.
	pub fn do_response(&mut self) -> Result<()> {
		if self.get_request_keep_alive() {
			self.response.headers.set("Connection", vec!["keep-alive".to_string()]);
		}

		let status_line = format!("HTTP/1.1 {} {}\r\n", self.response.status_code, reason_phrase(self.response.status_code));
		self.reader.get_mut().write_all(status_line.as_bytes())?;

		for (name, value) in self.response.headers.lines() {
			let line = format!("{name}: {value}\r\n");
			self.reader.get_mut().write_all(line.as_bytes())?;
		}
		self.reader.get_mut().write_all(b"\r\n")?;

		if let Some(body) = &self.response.body {
			self.reader.get_mut().write_all(body)?;
		}
		self.reader.get_mut().flush()?;

		self.response.was_sent = true;
		log::info!("[{}] \"{} {}\" {}", self.peer_addr, self.method, self.raw_target, self.response.status_code);
		Ok(())
	}

	pub fn get_request_query(&self) -> &str {
		&self.query
	}

	/// True iff the client asked for `Connection: keep-alive` *and* business
	/// handler code opted in via `allow_keep_alive()`. Neither condition
	/// alone is sufficient: the pre-handler never keeps a connection alive
	/// on the client's say-so alone.
	pub fn get_request_keep_alive(&self) -> bool {
		if !self.keep_alive_allowed {
			return false;
		}
		match self.request_headers.get("Connection") {
			Some(values) => values.iter().any(|v| v.eq_ignore_ascii_case("keep-alive")),
			None => false,
		}
	}

	/// Opt this response into keep-alive. Must be called by the business
	/// handler itself; the pre-handler never calls this on a handler's
	/// behalf. Has no effect unless the client also sent
	/// `Connection: keep-alive`.
	pub fn allow_keep_alive(&mut self) {
		self.keep_alive_allowed = true;
	}

	pub fn get_request_content_length(&self) -> Result<usize> {
		let values = self
			.request_headers
			.get("Content-Length")
			.ok_or_else(|| NetFrameError::ClientProtocol("missing Content-Length header".into()))?;
		values
			.first()
			.and_then(|v| v.parse::<usize>().ok())
			.ok_or_else(|| NetFrameError::ClientProtocol("invalid Content-Length header".into()))
	}

	pub fn read_request_body(&mut self, content_length: usize) -> Result<Vec<u8>> {
		let mut content = vec![0u8; content_length];
		self.reader.read_exact(&mut content).map_err(|_| {
			NetFrameError::ClientProtocol("connection closed before Content-Length bytes were read".into())
		})?;
		Ok(content)
	}

	pub fn assert_request_content_type(&self, expected: &str) -> Result<()> {
		let matches = self
			.request_headers
			.get("Content-Type")
			.map(|values| values.iter().any(|v| v.eq_ignore_ascii_case(expected)))
			.unwrap_or(false);
		if matches {
			Ok(())
		} else {
			Err(NetFrameError::ClientProtocol(format!("Content-Type is not {expected}")))
		}
	}

	pub fn get_request_json(&mut self) -> Result<serde_json::Value> {
		self.assert_request_content_type("application/json")?;
		let content_length = self.get_request_content_length()?;
		let body = self.read_request_body(content_length)?;
		serde_json::from_slice(&body).map_err(|_| NetFrameError::ClientProtocol("failed to decode JSON data".into()))
	}

	pub fn read_line(&mut self, buf: &mut String) -> std::io::Result<usize> {
		self.reader.read_line(buf)
	}
}

fn reason_phrase(code: u16) -> &'static str {
	match code {
		200 => "OK",
		204 => "No Content",
		400 => "Bad Request",
		403 => "Forbidden",
		404 => "Not Found",
		414 => "URI Too Long",
		500 => "Internal Server Error",
		_ => "Unknown",
	}
}

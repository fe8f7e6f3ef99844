use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chain::{DownstreamHandler, RequestContext};
use crate::error::NetFrameError;
use crate::event::TerminateEvent;
use crate::host_field::parse_host_field;
use crate::response::HeaderMap;
use crate::state::{HandlerState, RequestState};
use crate::valid_chars::is_path_query_char;

use super::handler::RequestHandler;
use super::stream::Connection;
use super::tcp::TcpHandler;

/// Request-target and request-line size cap, matching the original
/// library's `readline(65537)` + length check.
const MAX_REQUEST_LINE_LEN: usize = 65536;

pub struct HttpConfig {
	pub enabled_methods: Vec<String>,
	pub default_port: u16,
	pub request_line_deadline: Duration,
	pub socket_poll_interval: Duration,
}

impl Default for HttpConfig {
	fn default() -> Self {
		Self {
			enabled_methods: vec!["GET".into(), "POST".into()],
			default_port: 80,
			request_line_deadline: Duration::from_secs(2),
			socket_poll_interval: Duration::from_millis(500),
		}
	}
}

/// The HTTP layer of the chain: reads one request line and header block
/// at a time off a `Connection` (raw TCP or TLS-wrapped), builds a
/// `RequestContext`, and dispatches it into the configured downstream
/// handler chain. Loops for as long as the client asks to keep the
/// connection alive.
pub struct HttpHandler {
	config: HttpConfig,
	downstream: Arc<dyn DownstreamHandler>,
}

impl HttpHandler {
	pub fn new(downstream: Arc<dyn DownstreamHandler>, config: HttpConfig) -> Self {
		Self { config, downstream }
	}

	/// Read one line with a bounded total wait, polling the terminate
	/// event at the granularity of the connection's socket read timeout.
	/// Returns `Ok(None)` on a clean EOF, a terminate signal, or the
	/// deadline elapsing with nothing read yet.
	fn read_line_with_deadline(&self, handler: &mut RequestHandler, terminate: &Arc<TerminateEvent>) -> std::io::Result<Option<String>> {
		let mut line = String::new();
		let start = Instant::now();
		loop {
			if terminate.is_set() {
				return Ok(None);
			}
			match handler.read_line(&mut line) {
				Ok(0) => return Ok(None),
				Ok(_) => return Ok(Some(line)),
				Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
					if start.elapsed() >= self.config.request_line_deadline {
						return Ok(None);
					}
				}
				Err(e) => return Err(e),
			}
		}
	}

	fn read_headers(&self, handler: &mut RequestHandler, terminate: &Arc<TerminateEvent>) -> Result<HeaderMap, NetFrameError> {
		let mut headers = HeaderMap::new();
		loop {
			let line = self
				.read_line_with_deadline(handler, terminate)?
				.ok_or_else(|| NetFrameError::ClientProtocol("connection closed while reading headers".into()))?;
			let trimmed = line.trim_end_matches(['\r', '\n']);
			if trimmed.is_empty() {
				return Ok(headers);
			}
			let (name, value) = trimmed
				.split_once(':')
				.ok_or_else(|| NetFrameError::ClientProtocol(format!("malformed header line: {trimmed}")))?;
			headers.add(name.trim(), value.trim());
		}
	}

	fn handle_one_request(
		&self,
		handler: &mut RequestHandler,
		handler_state: &Arc<HandlerState>,
		terminate: &Arc<TerminateEvent>,
		peer_port: u16,
	) -> Result<bool, NetFrameError> {
		let Some(line) = self.read_line_with_deadline(handler, terminate).map_err(NetFrameError::Io)? else {
			return Ok(false);
		};

		if line.len() > MAX_REQUEST_LINE_LEN {
			handler.set_code_and_text(414, "URI Too Long");
			return Ok(false);
		}

		let trimmed = line.trim_end_matches(['\r', '\n']);
		let mut parts = trimmed.splitn(3, ' ');
		let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
			(Some(m), Some(t), Some(v)) if !m.is_empty() && !t.is_empty() => (m, t, v),
			_ => return Err(NetFrameError::ClientProtocol("malformed request line".into())),
		};

		if !self.config.enabled_methods.iter().any(|m| m == method) {
			return Err(NetFrameError::ClientProtocol(format!("unsupported method {method}")));
		}

		let (path, query) = match target.split_once('?') {
			Some((p, q)) => (p, q),
			None => (target, ""),
		};
		if !path.chars().all(|c| c == '/' || is_path_query_char(c)) || !query.chars().all(is_path_query_char) {
			return Err(NetFrameError::ClientProtocol("request target contains invalid characters".into()));
		}

		handler.method = method.to_string();
		handler.raw_target = target.to_string();
		handler.path = path.to_string();
		handler.query = query.to_string();
		handler.http_version = version.to_string();
		handler.request_headers = self.read_headers(handler, terminate)?;

		let host_header = handler
			.request_headers
			.get("Host")
			.and_then(|v| v.first())
			.ok_or_else(|| NetFrameError::ClientProtocol("missing Host header".into()))?
			.clone();
		let host = parse_host_field(&host_header, self.config.default_port)
			.map_err(|e| NetFrameError::ClientProtocol(e.to_string()))?;

		let mut req_state = RequestState::new();
		req_state.client_ip = Some(handler.peer_addr.ip());
		req_state.client_port = Some(peer_port);

		let mut ctx = RequestContext {
			host,
			rel_path: path.to_string(),
			handler,
			handler_state: handler_state.clone(),
			req_state,
			terminate: terminate.clone(),
		};

		let downstream = self.downstream.clone();
		if catch_unwind(AssertUnwindSafe(|| downstream.handle_request(&mut ctx))).is_err() {
			ctx.handler.set_code_and_text(500, "Internal Server Error");
		}

		if !terminate.is_set() && !ctx.handler.has_response_sent() {
			ctx.handler.do_response().map_err(|e| NetFrameError::Io(std::io::Error::other(e.to_string())))?;
		}

		Ok(ctx.handler.get_request_keep_alive())
	}
}

impl TcpHandler for HttpHandler {
	fn handle_connection(&self, conn: Connection, handler_state: &Arc<HandlerState>, terminate: &Arc<TerminateEvent>) {
		let peer_addr = conn.peer_addr;
		let mut handler = RequestHandler::new(conn);
		loop {
			if terminate.is_set() {
				return;
			}
			match self.handle_one_request(&mut handler, handler_state, terminate, peer_addr.port()) {
				Ok(true) => handler.reset_response(),
				Ok(false) => return,
				Err(e) => {
					log::debug!("[{peer_addr}] {e}");
					if !handler.has_response_sent() {
						handler.set_code_and_text(e.status_code(), &e.to_string());
						let _ = handler.do_response();
					}
					return;
				}
			}
		}
	}
}

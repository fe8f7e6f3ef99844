use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{NetFrameError, Result};
use crate::event::TerminateEvent;
use crate::state::HandlerState;

use super::base::Lifecycle;
use super::stream::Connection;

/// How often the accept loop polls the terminate event while the
/// listening socket is in non-blocking mode. Mirrors the 0.5s poll
/// granularity used by the HTTP pre-handler's request-line deadline.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The raw-TCP layer of the chain: accepts connections and hands each one
/// to `handler` on its own thread, with no framing beyond the bytes
/// themselves. The TLS and HTTP layers are built on top of this by
/// wrapping a `TcpServer` (TLS) or by driving a `Connection` obtained from
/// one (HTTP).
pub trait TcpHandler: Send + Sync + 'static {
	fn handle_connection(&self, conn: Connection, handler_state: &Arc<HandlerState>, terminate: &Arc<TerminateEvent>);
}

pub struct TcpServer<H: TcpHandler> {
	listener: TcpListener,
	addr: SocketAddr,
	lifecycle: Lifecycle,
	handler_state: Arc<HandlerState>,
	handler: Arc<H>,
}

impl<H: TcpHandler> TcpServer<H> {
	pub fn bind(addr: SocketAddr, handler: Arc<H>) -> Result<Arc<Self>> {
		let listener = TcpListener::bind(addr).map_err(NetFrameError::Io)?;
		listener.set_nonblocking(true).map_err(NetFrameError::Io)?;
		let addr = listener.local_addr().map_err(NetFrameError::Io)?;
		Ok(Arc::new(Self {
			listener,
			addr,
			lifecycle: Lifecycle::new(),
			handler_state: Arc::new(HandlerState::new()),
			handler,
		}))
	}

	pub fn port(&self) -> u16 {
		self.addr.port()
	}

	pub fn terminate_event(&self) -> Arc<TerminateEvent> {
		self.lifecycle.terminate_event()
	}

	pub fn handler_state(&self) -> Arc<HandlerState> {
		self.handler_state.clone()
	}

	/// Start the accept loop on a detached thread. Idempotent: a second
	/// call while already running is a no-op.
	pub fn start(self: &Arc<Self>) {
		let this = self.clone();
		self.lifecycle.start_threaded(move || this.serve_forever());
	}

	pub fn serve_until_terminate(&self) {
		log::info!("TCP server on {} started to serve", self.addr);
		self.serve_forever();
	}

	fn serve_forever(&self) {
		let terminate = self.lifecycle.terminate_event();
		loop {
			if terminate.is_set() {
				return;
			}
			match self.listener.accept() {
				Ok((stream, _)) => {
					let handler = self.handler.clone();
					let handler_state = self.handler_state.clone();
					let terminate = terminate.clone();
					let conn = match Connection::new(stream) {
						Ok(c) => c,
						Err(e) => {
							log::debug!("failed to read peer address: {e}");
							continue;
						}
					};
					std::thread::spawn(move || {
						handler.handle_connection(conn, &handler_state, &terminate);
					});
				}
				Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
					terminate.wait_timeout(ACCEPT_POLL_INTERVAL);
				}
				Err(e) => {
					log::debug!("accept() failed: {e}");
				}
			}
		}
	}

	/// Set the terminate flag and join the accept-loop thread, if one was
	/// started. The listener is polled rather than relied upon to
	/// interrupt on close, so no extra shutdown action is needed here
	/// beyond flipping the flag the loop already checks.
	pub fn terminate(&self) {
		self.lifecycle.terminate(|| {}, || {});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Read, Write};
	use std::net::TcpStream;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct EchoHandler(Arc<AtomicUsize>);

	impl TcpHandler for EchoHandler {
		fn handle_connection(&self, mut conn: Connection, _hs: &Arc<HandlerState>, _term: &Arc<TerminateEvent>) {
			self.0.fetch_add(1, Ordering::SeqCst);
			let mut buf = [0u8; 5];
			if conn.stream.read_exact(&mut buf).is_ok() {
				let _ = conn.stream.write_all(&buf);
			}
		}
	}

	#[test]
	fn accepts_and_dispatches_connections() {
		let hits = Arc::new(AtomicUsize::new(0));
		let server = TcpServer::bind("127.0.0.1:0".parse().unwrap(), Arc::new(EchoHandler(hits.clone()))).unwrap();
		server.start();

		let mut stream = TcpStream::connect(("127.0.0.1", server.port())).unwrap();
		stream.write_all(b"hello").unwrap();
		let mut buf = [0u8; 5];
		stream.read_exact(&mut buf).unwrap();
		assert_eq!(&buf, b"hello");

		server.terminate();
		assert_eq!(hits.load(Ordering::SeqCst), 1);
	}
}

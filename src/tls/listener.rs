use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{NetFrameError, Result};
use crate::event::TerminateEvent;
use crate::server::base::Lifecycle;
use crate::server::stream::Connection;
use crate::server::tcp::TcpHandler;
use crate::state::HandlerState;

use super::context::TlsContext;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A TLS-wrapping listening socket. On every `accept()` it first gives
/// the `TlsContext` a chance to reload an expiring certificate, then
/// performs the handshake before handing a ready-to-read `Connection`
/// off to the configured handler -- the same "magic" the original
/// library's `ListenSocket.accept()` performs.
pub struct TlsListener<H: TcpHandler> {
	listener: TcpListener,
	addr: SocketAddr,
	tls: Arc<TlsContext>,
	lifecycle: Lifecycle,
	handler_state: Arc<HandlerState>,
	handler: Arc<H>,
}

impl<H: TcpHandler> TlsListener<H> {
	pub fn bind(addr: SocketAddr, tls: Arc<TlsContext>, handler: Arc<H>) -> Result<Arc<Self>> {
		let listener = TcpListener::bind(addr).map_err(NetFrameError::Io)?;
		listener.set_nonblocking(true).map_err(NetFrameError::Io)?;
		let addr = listener.local_addr().map_err(NetFrameError::Io)?;
		Ok(Arc::new(Self {
			listener,
			addr,
			tls,
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

	pub fn start(self: &Arc<Self>) {
		let this = self.clone();
		self.lifecycle.start_threaded(move || this.serve_forever());
	}

	pub fn serve_until_terminate(&self) {
		log::info!("TLS listener on {} started to serve", self.addr);
		self.serve_forever();
	}

	fn accept_and_wrap(&self, sock: TcpStream, peer_addr: SocketAddr) -> Result<Connection> {
		self.tls.reload_if_expired();
		let (stream, peer_cert_chain_der) = self.tls.wrap(sock)?;
		Ok(Connection::tls(stream, peer_addr, peer_cert_chain_der))
	}

	fn serve_forever(&self) {
		let terminate = self.lifecycle.terminate_event();
		loop {
			if terminate.is_set() {
				return;
			}
			match self.listener.accept() {
				Ok((sock, peer_addr)) => match self.accept_and_wrap(sock, peer_addr) {
					Ok(conn) => {
						let handler = self.handler.clone();
						let handler_state = self.handler_state.clone();
						let terminate = terminate.clone();
						std::thread::spawn(move || {
							handler.handle_connection(conn, &handler_state, &terminate);
						});
					}
					Err(e) => log::debug!("TLS handshake with {peer_addr} failed: {e}"),
				},
				Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
					terminate.wait_timeout(ACCEPT_POLL_INTERVAL);
				}
				Err(e) => log::debug!("accept() failed: {e}"),
			}
		}
	}

	pub fn terminate(&self) {
		self.lifecycle.terminate(|| {}, || {});
	}
}

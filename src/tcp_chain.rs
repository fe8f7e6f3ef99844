//! The raw-TCP layer of the downstream chain, the "TCP Pre-Handler":
//! per-connection entry point that builds an initial connection-scoped
//! request state (peer IP/port, nothing more) and invokes a configured
//! root handler, with no HTTP framing involved.
//!
//! This mirrors the original library's distinct TCP-layer handler
//! protocol, `HandleRequest(pyHandler, handlerState, reqState,
//! terminateEvent)` -- deliberately without `host`/`relPath`, since those
//! are HTTP-only concepts that don't exist before a single byte of HTTP
//! has been parsed. `crate::chain::DownstreamHandler` is the HTTP-layer
//! counterpart, which does carry them.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::event::TerminateEvent;
use crate::server::stream::Connection;
use crate::server::tcp::TcpHandler;
use crate::state::{HandlerState, RequestState};

/// The mutable bundle threaded through the raw-TCP chain. `conn` is taken
/// by a terminal stage once the chain decides to hand the connection off
/// to a protocol built on top of raw TCP (see [`ToHttp`]); earlier stages
/// only need `peer_addr` and `req_state`.
pub struct TcpRequestContext {
	pub peer_addr: SocketAddr,
	pub conn: Option<Connection>,
	pub handler_state: Arc<HandlerState>,
	pub req_state: RequestState,
	pub terminate: Arc<TerminateEvent>,
}

/// A single stage in the raw-TCP chain. A stage either drops the
/// connection by returning without forwarding (there is no response
/// object at this layer to write a rejection into -- the connection is
/// simply not served), or calls the next configured stage, optionally
/// after mutating `ctx.req_state`.
pub trait TcpDownstreamHandler: Send + Sync {
	fn handle_request(&self, ctx: &mut TcpRequestContext);
}

/// Adapts a raw-TCP downstream chain into a [`TcpHandler`] so it can be
/// bound directly by `TcpServer`/`TlsListener`, the same way an
/// `HttpHandler` can. This is the TCP Pre-Handler itself.
pub struct TcpChainHandler {
	downstream: Arc<dyn TcpDownstreamHandler>,
}

impl TcpChainHandler {
	pub fn new(downstream: Arc<dyn TcpDownstreamHandler>) -> Self {
		Self { downstream }
	}
}

impl TcpHandler for TcpChainHandler {
	fn handle_connection(&self, conn: Connection, handler_state: &Arc<HandlerState>, terminate: &Arc<TerminateEvent>) {
		let peer_addr = conn.peer_addr;
		let mut req_state = RequestState::new();
		req_state.client_ip = Some(peer_addr.ip());
		req_state.client_port = Some(peer_addr.port());

		let mut ctx = TcpRequestContext {
			peer_addr,
			conn: Some(conn),
			handler_state: handler_state.clone(),
			req_state,
			terminate: terminate.clone(),
		};
		self.downstream.handle_request(&mut ctx);
	}
}

/// A terminal raw-TCP stage that hands the connection off to HTTP
/// framing, reached once the connection has passed every configured
/// connection-level stage (IP allow-listing, rate/concurrency/block-by-
/// rate limiting). Whatever HTTP-layer chain `http` was built with runs
/// from here exactly as if it had been bound to the listener directly.
pub struct ToHttp<H: TcpHandler> {
	http: Arc<H>,
}

impl<H: TcpHandler> ToHttp<H> {
	pub fn new(http: Arc<H>) -> Self {
		Self { http }
	}
}

impl<H: TcpHandler> TcpDownstreamHandler for ToHttp<H> {
	fn handle_request(&self, ctx: &mut TcpRequestContext) {
		if let Some(conn) = ctx.conn.take() {
			self.http.handle_connection(conn, &ctx.handler_state, &ctx.terminate);
		}
	}
}

pub mod chain;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod host_field;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod server;
pub mod state;
pub mod tcp_chain;
pub mod tls;
pub mod totp;
pub mod url_builder;
pub mod valid_chars;
pub mod x509;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use chain::NotFoundHandler;
use config::Settings;
use middleware::{TcpBlockByRate, TcpConcurrentLimiter, TcpRateLimiter};
use server::http::{HttpConfig, HttpHandler};
use server::tcp::TcpServer;
use tcp_chain::{TcpChainHandler, TcpDownstreamHandler, ToHttp};
use tls::{TlsContext, TlsListener};

/// Assemble the default connection-level chain: the persistent rate-based
/// IP blocker outermost, then the two connection-volume guards
/// (`TcpRateLimiter`, `TcpConcurrentLimiter`), terminating in a handoff to
/// the HTTP layer, which itself terminates in a 404 since this framework
/// ships no built-in application routes of its own.
///
/// These three guards operate on raw connections rather than parsed HTTP
/// requests, so they run ahead of HTTP framing and apply equally to a
/// plain-TCP or TLS-wrapped listener. This is the composition the
/// `netframed` binary starts with; embedders linking against the library
/// build their own chain out of `netframe::middleware`,
/// `netframe::chain::DownstreamHandler`, and `netframe::tcp_chain`
/// instead, the same way the original library was consumed as a toolkit
/// rather than a turnkey server (`IpNetworkPolicy`, `MutualTls`, and
/// `TotpToken` all need allow-lists, trust roots, or a TOTP secret that
/// have no sane process-wide default, so they are left for callers to
/// wire in explicitly).
fn build_chain(settings: &Settings) -> Result<Arc<dyn TcpDownstreamHandler>> {
	let http_handler = Arc::new(HttpHandler::new(Arc::new(NotFoundHandler), HttpConfig::default()));
	let mut chain: Arc<dyn TcpDownstreamHandler> = Arc::new(ToHttp::new(http_handler));

	chain = Arc::new(
		TcpBlockByRate::new(
			settings.block_max_requests,
			Duration::from_secs(settings.block_window_secs),
			chain,
			settings.block_state_path.as_ref().map(PathBuf::from),
			settings.block_global_state_path.as_ref().map(PathBuf::from),
		)
		.context("failed to initialize rate-based IP blocker")?,
	);

	chain = Arc::new(TcpRateLimiter::new(
		settings.rate_limit_max,
		Duration::from_secs(settings.rate_limit_period_secs),
		chain,
	));

	chain = Arc::new(TcpConcurrentLimiter::new(settings.rate_limit_max, chain));

	Ok(chain)
}

/// Start the configured listener and serve until the process is killed.
/// Chooses a TLS or plain-TCP listener depending on whether `tls_cert`
/// and `tls_key` are both set, mirroring the original library's
/// `ListenSocket` construction, which picks its wrapping based on
/// whether an `SSLContext` was supplied. Either way the listener is bound
/// to a `TcpChainHandler`, the TCP-layer pre-handler, with HTTP framing
/// as just its terminal stage rather than the only thing a listener can
/// ever be bound to.
pub fn run(settings: Settings) -> Result<()> {
	let chain = build_chain(&settings)?;
	let handler = Arc::new(TcpChainHandler::new(chain));

	let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
		.parse()
		.with_context(|| format!("invalid listen address {}:{}", settings.host, settings.port))?;

	match (&settings.tls_cert, &settings.tls_key) {
		(Some(cert), Some(key)) => {
			let request_client_cert = settings.tls_ca.is_some();
			let tls = Arc::new(
				TlsContext::new(cert.clone(), key.clone(), request_client_cert, true, Duration::from_secs(86400))
					.context("failed to initialize TLS context")?,
			);
			let listener = TlsListener::bind(addr, tls, handler).context("failed to bind TLS listener")?;
			log::info!("netframed listening on https://{addr}");
			listener.serve_until_terminate();
			Ok(())
		}
		_ => {
			let server = TcpServer::bind(addr, handler).context("failed to bind TCP listener")?;
			log::info!("netframed listening on http://{addr}");
			server.serve_until_terminate();
			Ok(())
		}
	}
}

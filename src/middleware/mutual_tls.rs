use std::sync::Arc;

use crate::chain::{DownstreamHandler, RequestContext};
use crate::x509::verify_peer_chain;

/// Verifies the peer's TLS certificate chain against a fixed set of
/// trusted roots, independent of rustls's own (disabled) client
/// certificate verification. On success, populates `peer_cert`,
/// `peer_intermediate_cert`, `peer_root_cert`, `peer_common_name`, and
/// `peer_alt_name` on the request state before forwarding; on any
/// failure -- not a TLS connection, no chain presented, chain doesn't
/// verify against a trusted root -- rejects with 403.
pub struct MutualTls {
	trusted_roots_der: Vec<Vec<u8>>,
	downstream: Arc<dyn DownstreamHandler>,
}

impl MutualTls {
	pub fn new(trusted_roots_der: Vec<Vec<u8>>, downstream: Arc<dyn DownstreamHandler>) -> Self {
		Self {
			trusted_roots_der,
			downstream,
		}
	}
}

impl DownstreamHandler for MutualTls {
	fn handle_request(&self, ctx: &mut RequestContext<'_>) {
		let Some(peer_chain) = ctx.handler.peer_cert_chain_der.clone() else {
			log::debug!("MutualTls: not a TLS request, or no peer certificate chain presented");
			ctx.handler.set_code_and_text(403, "Forbidden");
			return;
		};

		let verified = match verify_peer_chain(&peer_chain, &self.trusted_roots_der) {
			Ok(v) => v,
			Err(e) => {
				log::debug!("MutualTls: failed to verify peer certificate chain: {e}");
				ctx.handler.set_code_and_text(403, "Forbidden");
				return;
			}
		};

		ctx.req_state.peer_cert = Some(verified.leaf);
		ctx.req_state.peer_intermediate_cert = Some(verified.intermediates);
		ctx.req_state.peer_root_cert = Some(verified.root);
		ctx.req_state.peer_common_name = verified.common_name;
		ctx.req_state.peer_alt_name = Some(verified.alt_names);

		self.downstream.handle_request(ctx);
	}
}

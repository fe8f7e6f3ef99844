use std::net::IpAddr;
use std::sync::Arc;

use ipnetwork::IpNetwork;

use crate::chain::{DownstreamHandler, RequestContext};
use crate::tcp_chain::{TcpDownstreamHandler, TcpRequestContext};

/// Restricts the source IP to an ordered list of CIDR networks, each
/// paired with an allow/deny policy. The first network containing the
/// client's IP decides the outcome; an IP matching no configured network
/// is denied by default.
///
/// Shared by [`IpNetworkPolicy`] (HTTP-layer) and [`TcpIpNetworkPolicy`]
/// (TCP-layer, evaluated once per connection rather than once per
/// request).
struct IpNetworkPolicyCore {
	networks: Vec<(IpNetwork, bool)>,
}

impl IpNetworkPolicyCore {
	fn is_allowed(&self, ip: IpAddr) -> bool {
		for (network, allow) in &self.networks {
			if network.contains(ip) {
				return *allow;
			}
		}
		false
	}
}

pub struct IpNetworkPolicy {
	core: IpNetworkPolicyCore,
	downstream: Arc<dyn DownstreamHandler>,
}

impl IpNetworkPolicy {
	pub fn new(networks: Vec<(IpNetwork, bool)>, downstream: Arc<dyn DownstreamHandler>) -> Self {
		Self {
			core: IpNetworkPolicyCore { networks },
			downstream,
		}
	}

	fn is_allowed(&self, ip: IpAddr) -> bool {
		self.core.is_allowed(ip)
	}
}

impl DownstreamHandler for IpNetworkPolicy {
	fn handle_request(&self, ctx: &mut RequestContext<'_>) {
		let src_ip = ctx.handler.peer_addr.ip();

		if !self.is_allowed(src_ip) {
			log::debug!("IPNetwork: IP {src_ip} is not allowed; access denied");
			ctx.handler.set_code_and_text(403, "Forbidden");
			return;
		}

		self.downstream.handle_request(ctx);
	}
}

/// The raw-TCP-layer counterpart of [`IpNetworkPolicy`], rejecting a
/// connection outright rather than a request on one already accepted.
pub struct TcpIpNetworkPolicy {
	core: IpNetworkPolicyCore,
	downstream: Arc<dyn TcpDownstreamHandler>,
}

impl TcpIpNetworkPolicy {
	pub fn new(networks: Vec<(IpNetwork, bool)>, downstream: Arc<dyn TcpDownstreamHandler>) -> Self {
		Self {
			core: IpNetworkPolicyCore { networks },
			downstream,
		}
	}
}

impl TcpDownstreamHandler for TcpIpNetworkPolicy {
	fn handle_request(&self, ctx: &mut TcpRequestContext) {
		let src_ip = ctx.peer_addr.ip();

		if !self.core.is_allowed(src_ip) {
			log::debug!("TcpIpNetworkPolicy: IP {src_ip} is not allowed; connection dropped");
			return;
		}

		self.downstream.handle_request(ctx);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chain::NotFoundHandler;

	#[test]
	fn first_matching_network_decides_policy() {
		let policy = IpNetworkPolicy::new(
			vec![
				("10.0.0.0/8".parse().unwrap(), false),
				("10.1.0.0/16".parse().unwrap(), true),
			],
			Arc::new(NotFoundHandler),
		);
		// 10.1.x.x matches the broader deny rule first.
		assert!(!policy.is_allowed("10.1.2.3".parse().unwrap()));
		assert!(!policy.is_allowed("10.2.2.3".parse().unwrap()));
	}

	#[test]
	fn unmatched_ip_is_denied_by_default() {
		let policy = IpNetworkPolicy::new(vec![("192.168.0.0/16".parse().unwrap(), true)], Arc::new(NotFoundHandler));
		assert!(!policy.is_allowed("8.8.8.8".parse().unwrap()));
	}
}

use std::net::IpAddr;

use crate::x509::PeerCertificate;

/// Per-request scratch space. Created empty when a request begins, mutated
/// by middleware stages as derived facts are established, discarded when
/// the request completes.
///
/// The key set is fixed and enumerated (not an open map) per the data
/// model: `clientIP`, `clientPort`, `peer_cert`, `peer_intermediate_cert`,
/// `peer_root_cert`, `peer_common_name`, `peer_alt_name`, `current_totp`.
#[derive(Debug, Default, Clone)]
pub struct RequestState {
	pub client_ip: Option<IpAddr>,
	pub client_port: Option<u16>,
	pub peer_cert: Option<PeerCertificate>,
	pub peer_intermediate_cert: Option<Vec<PeerCertificate>>,
	pub peer_root_cert: Option<PeerCertificate>,
	pub peer_common_name: Option<String>,
	pub peer_alt_name: Option<Vec<String>>,
	pub current_totp: Option<String>,
}

impl RequestState {
	pub fn new() -> Self {
		Self::default()
	}
}

/// A type-erased view over one `RequestState` field, used where callers
/// want to log or inspect a field without matching on every variant.
#[derive(Debug, Clone)]
pub enum RequestStateValue {
	Ip(IpAddr),
	Port(u16),
	Cert(PeerCertificate),
	CertChain(Vec<PeerCertificate>),
	Text(String),
	TextList(Vec<String>),
}

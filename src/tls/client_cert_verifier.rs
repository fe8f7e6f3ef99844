use std::time::SystemTime;

use rustls::server::{ClientCertVerified, ClientCertVerifier};
use rustls::{Certificate, DistinguishedName, Error};

/// A rustls `ClientCertVerifier` that accepts any certificate the peer
/// presents -- or none at all, if `optional` -- without performing chain
/// verification at the transport layer.
///
/// This mirrors the original library's use of `ssl.CERT_OPTIONAL`: rustls
/// is only asked to *collect* the peer's chain during the handshake, not
/// to validate it. Real validation (root-finding, signature checks,
/// CN/SAN extraction) happens afterwards in the `TLS` downstream handler
/// stage, which has access to the application's own trusted-root set
/// rather than whatever rustls was configured with.
#[derive(Debug)]
pub struct AcceptAnyClientCert {
	optional: bool,
}

impl AcceptAnyClientCert {
	pub fn new(optional: bool) -> Self {
		Self { optional }
	}
}

impl ClientCertVerifier for AcceptAnyClientCert {
	fn offer_client_auth(&self) -> bool {
		true
	}

	fn client_auth_mandatory(&self) -> bool {
		!self.optional
	}

	fn client_auth_root_subjects(&self) -> Option<Vec<DistinguishedName>> {
		Some(Vec::new())
	}

	fn verify_client_cert(
		&self,
		_end_entity: &Certificate,
		_intermediates: &[Certificate],
		_now: SystemTime,
	) -> Result<ClientCertVerified, Error> {
		Ok(ClientCertVerified::assertion())
	}
}

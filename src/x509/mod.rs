//! Peer certificate representation and the custom chain-verification
//! algorithm used by the mutual-TLS middleware stage, independent of
//! rustls's own (disabled) client certificate verification.

mod chain_verifier;

pub use chain_verifier::{verify_peer_chain, ChainVerifyError, VerifiedChain};

use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};

/// An owned, DER-encoded peer certificate. Parsing is re-done on demand
/// (via [`PeerCertificate::parse`]) rather than cached, since the parsed
/// `X509Certificate` borrows from the DER bytes and this type needs to be
/// stored in `RequestState` for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate {
	der: Vec<u8>,
}

impl PeerCertificate {
	pub fn from_der(der: Vec<u8>) -> Self {
		Self { der }
	}

	pub fn der(&self) -> &[u8] {
		&self.der
	}

	pub fn parse(&self) -> Result<X509Certificate<'_>, ChainVerifyError> {
		chain_verifier::parse(&self.der)
	}

	pub fn common_name(&self) -> Result<Option<String>, ChainVerifyError> {
		let cert = self.parse()?;
		Ok(cert
			.subject()
			.iter_common_name()
			.next()
			.and_then(|cn| cn.as_str().ok())
			.map(|s| s.to_string()))
	}

	pub fn subject_alt_names(&self) -> Result<Vec<String>, ChainVerifyError> {
		let cert = self.parse()?;
		subject_alt_names(&cert)
	}
}

pub(crate) fn subject_alt_names(cert: &X509Certificate<'_>) -> Result<Vec<String>, ChainVerifyError> {
	let mut out = Vec::new();
	for ext in cert.extensions() {
		if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
			for name in san.general_names.iter() {
				if let GeneralName::DNSName(d) = name {
					out.push(d.to_string());
				}
			}
		}
	}
	Ok(out)
}

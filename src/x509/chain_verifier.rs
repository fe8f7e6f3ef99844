use thiserror::Error;
use x509_parser::certificate::X509Certificate;
use x509_parser::time::ASN1Time;

use super::{subject_alt_names, PeerCertificate};

/// Errors produced while verifying a peer's presented certificate chain
/// against a fixed set of trusted root certificates.
#[derive(Debug, Error)]
pub enum ChainVerifyError {
	#[error("peer presented an empty certificate chain")]
	EmptyChain,
	#[error("failed to parse certificate: {0}")]
	Parse(String),
	#[error("no trusted root certificate matches this chain")]
	NoRoot,
	#[error("certificate chain is broken: cannot find the next level")]
	BrokenChain,
}

pub(crate) fn parse(der: &[u8]) -> Result<X509Certificate<'_>, ChainVerifyError> {
	x509_parser::parse_x509_certificate(der)
		.map(|(_, cert)| cert)
		.map_err(|e| ChainVerifyError::Parse(e.to_string()))
}

fn spki<'a>(cert: &'a X509Certificate<'a>) -> &'a [u8] {
	cert.tbs_certificate.subject_pki.raw
}

/// The outcome of a successful chain verification: the leaf certificate,
/// the (possibly empty) intermediates between leaf and root in order, the
/// trusted root that anchored the chain, and the leaf's identity fields.
pub struct VerifiedChain {
	pub leaf: PeerCertificate,
	pub intermediates: Vec<PeerCertificate>,
	pub root: PeerCertificate,
	pub common_name: Option<String>,
	pub alt_names: Vec<String>,
}

/// Find which trusted root anchors `chain`, searching each root against
/// the chain from the leaf end backwards, either by raw public-key match
/// (the root itself is present in the chain) or by issuer/subject match
/// (the root issued the last cert in the chain).
fn find_root_index(chain: &[Vec<u8>], trusted: &[Vec<u8>]) -> Result<usize, ChainVerifyError> {
	for (idx, root_der) in trusted.iter().enumerate() {
		let root = parse(root_der)?;
		for cert_der in chain.iter().rev() {
			let cert = parse(cert_der)?;
			if spki(&cert) == spki(&root) || cert.issuer() == root.subject() {
				return Ok(idx);
			}
		}
	}
	Err(ChainVerifyError::NoRoot)
}

/// Verify `subject`'s signature was produced by `issuer`'s key and that
/// `subject` is within its validity window.
fn verify_certificate(subject: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> bool {
	if subject
		.verify_signature(Some(&issuer.tbs_certificate.subject_pki))
		.is_err()
	{
		return false;
	}
	let now = ASN1Time::now();
	let validity = subject.validity();
	!(now < validity.not_before || now > validity.not_after)
}

/// Pull the certificate one level above `trusted` out of `chain`, removing
/// it (and any redundant copy of `trusted` itself) as it goes. Returns
/// `Ok(None)` when the chain contained a redundant copy of the trusted
/// cert with nothing above it, or the next cert on success.
fn next_level(chain: &mut Vec<Vec<u8>>, trusted_der: &[u8]) -> Result<Option<Vec<u8>>, ChainVerifyError> {
	let trusted = parse(trusted_der)?;
	for i in (0..chain.len()).rev() {
		let cert = parse(&chain[i])?;
		if spki(&cert) == spki(&trusted) {
			chain.remove(i);
			return Ok(None);
		}
		if cert.issuer() == trusted.subject() && verify_certificate(&cert, &trusted) {
			let der = chain.remove(i);
			return Ok(Some(der));
		}
	}
	Err(ChainVerifyError::BrokenChain)
}

/// Walk `chain` tail-to-head starting from `root_der`, verifying each
/// cert's signature against the one below it, returning the verified
/// chain ordered leaf-first.
fn verify_chain(mut chain: Vec<Vec<u8>>, root_der: Vec<u8>) -> Result<Vec<Vec<u8>>, ChainVerifyError> {
	let mut verified: Vec<Vec<u8>> = Vec::new();
	let mut trusted = root_der;
	while !chain.is_empty() {
		match next_level(&mut chain, &trusted)? {
			None => {}
			Some(der) => {
				trusted = der.clone();
				verified.insert(0, der);
			}
		}
	}
	Ok(verified)
}

/// Verify a peer-presented certificate chain against a set of trusted
/// root certificates, returning the verified leaf/intermediates/root and
/// the leaf's common name and subject alternative names.
pub fn verify_peer_chain(
	peer_chain_der: &[Vec<u8>],
	trusted_roots_der: &[Vec<u8>],
) -> Result<VerifiedChain, ChainVerifyError> {
	if peer_chain_der.is_empty() {
		return Err(ChainVerifyError::EmptyChain);
	}

	let chain: Vec<Vec<u8>> = peer_chain_der.to_vec();
	let root_idx = find_root_index(&chain, trusted_roots_der)?;
	let root_der = trusted_roots_der[root_idx].clone();

	let verified = verify_chain(chain, root_der.clone())?;
	if verified.is_empty() {
		return Err(ChainVerifyError::BrokenChain);
	}

	let leaf_der = verified[0].clone();
	let leaf = parse(&leaf_der)?;
	let common_name = leaf
		.subject()
		.iter_common_name()
		.next()
		.and_then(|cn| cn.as_str().ok())
		.map(|s| s.to_string());
	let alt_names = subject_alt_names(&leaf)?;

	Ok(VerifiedChain {
		leaf: PeerCertificate::from_der(leaf_der),
		intermediates: verified[1..].iter().map(|d| PeerCertificate::from_der(d.clone())).collect(),
		root: PeerCertificate::from_der(root_der),
		common_name,
		alt_names,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_chain_is_rejected() {
		let err = verify_peer_chain(&[], &[]);
		assert!(matches!(err, Err(ChainVerifyError::EmptyChain)));
	}

	#[test]
	fn garbage_der_fails_to_parse() {
		let err = verify_peer_chain(&[vec![0u8; 4]], &[vec![0u8; 4]]);
		assert!(matches!(err, Err(ChainVerifyError::Parse(_))));
	}
}

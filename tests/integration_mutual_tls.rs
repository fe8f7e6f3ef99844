//! Mutual TLS, scenario 5 of the testable-properties list: a peer chain
//! rooted at a configured CA must verify, and the verified leaf's common
//! name and subject alternative names must be exposed correctly.
//!
//! Exercises `netframe::x509::verify_peer_chain` directly against real
//! certificates built with `rcgen`, across the key algorithms rcgen can
//! generate on its own (ECDSA P-256 and Ed25519). RSA is part of the same
//! scenario in the original library's test suite, but rcgen 0.9 cannot
//! generate an RSA keypair itself -- it can only sign with one supplied
//! externally -- so it is left out here rather than hard-coding a
//! fixture key.

use rcgen::{BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, SignatureAlgorithm};

use netframe::x509::verify_peer_chain;

fn make_ca(alg: &'static SignatureAlgorithm) -> Certificate {
	let mut params = CertificateParams::new(vec![]);
	params.alg = alg;
	params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
	let mut dn = DistinguishedName::new();
	dn.push(DnType::CommonName, "netframe test root CA");
	params.distinguished_name = dn;
	Certificate::from_params(params).unwrap()
}

fn make_leaf(alg: &'static SignatureAlgorithm, common_name: &str, sans: Vec<String>) -> Certificate {
	let mut params = CertificateParams::new(sans);
	params.alg = alg;
	let mut dn = DistinguishedName::new();
	dn.push(DnType::CommonName, common_name);
	params.distinguished_name = dn;
	Certificate::from_params(params).unwrap()
}

fn check_chain_verifies(alg: &'static SignatureAlgorithm) {
	let ca = make_ca(alg);
	let leaf = make_leaf(alg, "sample2.local", vec!["sample2.local".to_string(), "test2.local".to_string()]);

	let ca_der = ca.serialize_der().unwrap();
	let leaf_der = leaf.serialize_der_with_signer(&ca).unwrap();

	let verified = verify_peer_chain(&[leaf_der], &[ca_der.clone()]).expect("chain rooted at the trusted CA should verify");

	assert_eq!(verified.common_name.as_deref(), Some("sample2.local"));
	assert!(verified.alt_names.contains(&"sample2.local".to_string()));
	assert!(verified.alt_names.contains(&"test2.local".to_string()));
	assert_eq!(verified.root.der(), ca_der.as_slice());
}

#[test]
fn ecdsa_p256_chain_verifies_and_exposes_identity() {
	check_chain_verifies(&rcgen::PKCS_ECDSA_P256_SHA256);
}

#[test]
fn ed25519_chain_verifies_and_exposes_identity() {
	check_chain_verifies(&rcgen::PKCS_ED25519);
}

#[test]
fn chain_rooted_at_an_untrusted_ca_is_rejected() {
	let ca = make_ca(&rcgen::PKCS_ECDSA_P256_SHA256);
	let other_ca = make_ca(&rcgen::PKCS_ECDSA_P256_SHA256);
	let leaf = make_leaf(&rcgen::PKCS_ECDSA_P256_SHA256, "sample2.local", vec!["sample2.local".to_string()]);

	let other_ca_der = other_ca.serialize_der().unwrap();
	let leaf_der = leaf.serialize_der_with_signer(&ca).unwrap();

	assert!(verify_peer_chain(&[leaf_der], &[other_ca_der]).is_err());
}

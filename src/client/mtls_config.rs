use std::path::Path;
use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use rustls_pemfile::certs as pem_certs;

use crate::error::{NetFrameError, Result};
use crate::tls::context::{load_certs, load_private_key};

/// Builds a client-side `rustls::ClientConfig` trusting a single CA
/// bundle, optionally presenting a client certificate chain for
/// mutual-TLS. Mirrors the original library's `HTTPSAdapter`: a thin
/// wrapper that always verifies the server (no client-side `CERT_NONE`
/// downgrade is exposed here, since this helper exists for tests driving
/// a real handshake against the mutual-TLS middleware, not for general
/// client use) and optionally loads a client key/cert pair from files.
pub struct MtlsClientConfig;

impl MtlsClientConfig {
	/// Build a config trusting `ca_cert_path`'s certificates, presenting
	/// the `client_cert_path`/`client_key_path` pair as the client
	/// certificate when both are given.
	pub fn build(ca_cert_path: &Path, client_cert_path: Option<&Path>, client_key_path: Option<&Path>, allow_tls1_2: bool) -> Result<Arc<ClientConfig>> {
		let roots = load_root_store(ca_cert_path)?;

		let versions: Vec<&'static rustls::SupportedProtocolVersion> = if allow_tls1_2 {
			vec![&rustls::version::TLS13, &rustls::version::TLS12]
		} else {
			vec![&rustls::version::TLS13]
		};

		let builder = ClientConfig::builder()
			.with_safe_default_cipher_suites()
			.with_safe_default_kx_groups()
			.with_protocol_versions(&versions)
			.map_err(|e| NetFrameError::Tls(e.to_string()))?
			.with_root_certificates(roots);

		let config = match (client_cert_path, client_key_path) {
			(Some(cert_path), Some(key_path)) => {
				let certs = load_certs(&cert_path.to_path_buf())?;
				let key = load_private_key(&key_path.to_path_buf())?;
				builder.with_client_auth_cert(certs, key).map_err(|e| NetFrameError::Tls(e.to_string()))?
			}
			_ => builder.with_no_client_auth(),
		};

		Ok(Arc::new(config))
	}
}

fn load_root_store(ca_cert_path: &Path) -> Result<RootCertStore> {
	let raw = std::fs::read(ca_cert_path).map_err(NetFrameError::Io)?;
	let mut reader = std::io::Cursor::new(raw);
	let der_certs = pem_certs(&mut reader).map_err(|e| NetFrameError::Tls(format!("failed to parse CA bundle {}: {e}", ca_cert_path.display())))?;

	let mut store = RootCertStore::empty();
	for der in der_certs {
		store
			.add(&rustls::Certificate(der))
			.map_err(|e| NetFrameError::Tls(format!("failed to add CA certificate to trust store: {e}")))?;
	}
	Ok(store)
}

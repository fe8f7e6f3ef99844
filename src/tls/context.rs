use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rand::Rng;
use rustls::{Certificate, PrivateKey, ServerConfig};
use rustls_pemfile::{certs as pem_certs, pkcs8_private_keys, rsa_private_keys};
use x509_parser::time::ASN1Time;

use crate::error::{NetFrameError, Result};
use crate::server::stream::IoStream;

use super::client_cert_verifier::AcceptAnyClientCert;

struct Loaded {
	config: Arc<ServerConfig>,
	not_after: ASN1Time,
}

/// Server-side TLS configuration with hot reload. `reload_if_expired` is
/// meant to be called on every `accept()`: if the currently-loaded leaf
/// certificate is within `reload_margin` of expiring (or already has),
/// it re-reads the cert/key files from disk. A reload failure is logged
/// and the stale config kept in service rather than propagated -- a
/// server should never stop accepting connections because a cert
/// rotation job hiccupped.
pub struct TlsContext {
	cert_path: PathBuf,
	key_path: PathBuf,
	request_client_cert: bool,
	client_cert_optional: bool,
	allow_tls1_2: std::sync::atomic::AtomicBool,
	reload_margin: Duration,
	loaded: RwLock<Loaded>,
}

impl TlsContext {
	pub fn new(
		cert_path: impl Into<PathBuf>,
		key_path: impl Into<PathBuf>,
		request_client_cert: bool,
		client_cert_optional: bool,
		reload_margin: Duration,
	) -> Result<Self> {
		let cert_path = cert_path.into();
		let key_path = key_path.into();
		let loaded = build_config(&cert_path, &key_path, request_client_cert, client_cert_optional, false)?;
		Ok(Self {
			cert_path,
			key_path,
			request_client_cert,
			client_cert_optional,
			allow_tls1_2: std::sync::atomic::AtomicBool::new(false),
			reload_margin,
			loaded: RwLock::new(loaded),
		})
	}

	/// Load a certificate chain and private key supplied in memory rather
	/// than read from pre-existing files on disk.
	///
	/// The underlying TLS stack (`rustls`, loaded here via
	/// `rustls-pemfile`) only accepts file paths, so this writes both PEM
	/// blocks to freshly created files under `tmp_dir`, restricted to
	/// owner read/write, named with a freshly generated high-entropy
	/// suffix rather than a predictable name; `new` is then used to load
	/// them, and the temp files are removed again before returning,
	/// regardless of whether loading succeeded.
	pub fn load_chain_from_memory(
		priv_key: &[u8],
		chain: &[u8],
		tmp_dir: &Path,
		request_client_cert: bool,
		client_cert_optional: bool,
		reload_margin: Duration,
	) -> Result<Self> {
		let suffix = generate_passphrase();
		let key_path = tmp_dir.join(format!("netframe-key-{suffix}.pem"));
		let cert_path = tmp_dir.join(format!("netframe-chain-{suffix}.pem"));

		write_restricted(&key_path, priv_key)?;
		write_restricted(&cert_path, chain)?;

		let result = TlsContext::new(&cert_path, &key_path, request_client_cert, client_cert_optional, reload_margin);

		let _ = fs::remove_file(&key_path);
		let _ = fs::remove_file(&cert_path);

		result
	}

	/// Lower the minimum negotiated protocol version to TLSv1.2, for
	/// compatibility with older peers. Takes effect on the next reload;
	/// call before the server starts accepting connections.
	pub fn enable_tlsv1_2(&self) -> Result<()> {
		self.allow_tls1_2.store(true, std::sync::atomic::Ordering::SeqCst);
		let loaded = build_config(&self.cert_path, &self.key_path, self.request_client_cert, self.client_cert_optional, true)?;
		*self.loaded.write().unwrap() = loaded;
		Ok(())
	}

	/// Re-read the certificate and key from disk if the currently-loaded
	/// leaf certificate is within `reload_margin` of `notAfter`. Failures
	/// are logged and swallowed; the previous config keeps serving.
	pub fn reload_if_expired(&self) {
		let needs_reload = {
			let loaded = self.loaded.read().unwrap();
			let now = ASN1Time::now();
			let margin_secs = self.reload_margin.as_secs() as i64;
			now.timestamp() > loaded.not_after.timestamp() - margin_secs
		};
		if !needs_reload {
			return;
		}

		let allow_tls1_2 = self.allow_tls1_2.load(std::sync::atomic::Ordering::SeqCst);
		match build_config(&self.cert_path, &self.key_path, self.request_client_cert, self.client_cert_optional, allow_tls1_2) {
			Ok(loaded) => {
				*self.loaded.write().unwrap() = loaded;
				log::info!("reloaded TLS certificate from {}", self.cert_path.display());
			}
			Err(e) => {
				log::warn!("failed to reload TLS certificate from {}: {e}; continuing with the stale one", self.cert_path.display());
			}
		}
	}

	/// Complete a TLS handshake over `sock` using the currently-loaded
	/// config and return a boxed, owned stream ready for the HTTP layer,
	/// along with the peer's presented certificate chain (DER, leaf-first)
	/// if the client offered one.
	pub fn wrap(&self, mut sock: TcpStream) -> Result<(Box<dyn IoStream>, Option<Vec<Vec<u8>>>)> {
		let config = self.loaded.read().unwrap().config.clone();
		let mut conn = rustls::ServerConnection::new(config).map_err(|e| NetFrameError::Tls(e.to_string()))?;
		while conn.is_handshaking() {
			conn.complete_io(&mut sock).map_err(NetFrameError::Io)?;
		}
		let peer_certs = conn
			.peer_certificates()
			.map(|certs| certs.iter().map(|c| c.0.clone()).collect());
		Ok((Box::new(rustls::StreamOwned::new(conn, sock)), peer_certs))
	}
}

fn build_config(
	cert_path: &PathBuf,
	key_path: &PathBuf,
	request_client_cert: bool,
	client_cert_optional: bool,
	allow_tls1_2: bool,
) -> Result<Loaded> {
	let certs = load_certs(cert_path)?;
	let key = load_private_key(key_path)?;
	let not_after = leaf_not_after(&certs[0])?;

	let versions: Vec<&'static rustls::SupportedProtocolVersion> = if allow_tls1_2 {
		vec![&rustls::version::TLS13, &rustls::version::TLS12]
	} else {
		vec![&rustls::version::TLS13]
	};

	let builder = ServerConfig::builder()
		.with_safe_default_cipher_suites()
		.with_safe_default_kx_groups()
		.with_protocol_versions(&versions)
		.map_err(|e| NetFrameError::Tls(e.to_string()))?;

	let config = if request_client_cert {
		let verifier = Arc::new(AcceptAnyClientCert::new(client_cert_optional));
		builder
			.with_client_cert_verifier(verifier)
			.with_single_cert(certs, key)
			.map_err(|e| NetFrameError::Tls(e.to_string()))?
	} else {
		builder
			.with_no_client_auth()
			.with_single_cert(certs, key)
			.map_err(|e| NetFrameError::Tls(e.to_string()))?
	};

	Ok(Loaded {
		config: Arc::new(config),
		not_after,
	})
}

pub(crate) fn load_certs(path: &PathBuf) -> Result<Vec<Certificate>> {
	let f = File::open(path).map_err(NetFrameError::Io)?;
	let mut reader = BufReader::new(f);
	let raw = pem_certs(&mut reader).map_err(|e| NetFrameError::Tls(format!("failed to parse PEM certs: {e}")))?;
	if raw.is_empty() {
		return Err(NetFrameError::Tls(format!("no certificates found in {}", path.display())));
	}
	Ok(raw.into_iter().map(Certificate).collect())
}

pub(crate) fn load_private_key(path: &PathBuf) -> Result<PrivateKey> {
	let f = File::open(path).map_err(NetFrameError::Io)?;
	let mut reader = BufReader::new(&f);
	let pkcs8 = pkcs8_private_keys(&mut reader).map_err(|e| NetFrameError::Tls(format!("failed to parse PKCS#8 key: {e}")))?;
	if let Some(k) = pkcs8.into_iter().next() {
		return Ok(PrivateKey(k));
	}

	let f = File::open(path).map_err(NetFrameError::Io)?;
	let mut reader = BufReader::new(f);
	let rsa = rsa_private_keys(&mut reader).map_err(|e| NetFrameError::Tls(format!("failed to parse RSA key: {e}")))?;
	if let Some(k) = rsa.into_iter().next() {
		return Ok(PrivateKey(k));
	}

	Err(NetFrameError::Tls(format!("no private key found in {}", path.display())))
}

/// A high-entropy hex string, used as an unguessable temp file name
/// component for `load_chain_from_memory`.
fn generate_passphrase() -> String {
	let bytes: [u8; 32] = rand::thread_rng().gen();
	hex::encode(bytes)
}

/// Write `data` to a newly created file at `path`, restricted to owner
/// read/write where the platform supports it.
fn write_restricted(path: &Path, data: &[u8]) -> Result<()> {
	let mut file = File::create(path).map_err(NetFrameError::Io)?;
	file.write_all(data).map_err(NetFrameError::Io)?;

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		let mut perms = file.metadata().map_err(NetFrameError::Io)?.permissions();
		perms.set_mode(0o600);
		fs::set_permissions(path, perms).map_err(NetFrameError::Io)?;
	}

	Ok(())
}

fn leaf_not_after(cert: &Certificate) -> Result<ASN1Time> {
	let (_, parsed) = x509_parser::parse_x509_certificate(&cert.0).map_err(|e| NetFrameError::Tls(format!("failed to parse leaf certificate: {e:?}")))?;
	Ok(parsed.validity().not_after)
}

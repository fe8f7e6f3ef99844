use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};

/// Blanket trait object bound for anything a connection handler can read
/// from and write to, whether that is a raw `TcpStream` or a TLS-wrapped
/// one.
pub trait IoStream: Read + Write + Send {}
impl<T: Read + Write + Send> IoStream for T {}

/// A live connection handed to a pre-handler, carrying the peer address
/// alongside the boxed stream so handlers don't need a second syscall to
/// learn who they're talking to.
pub struct Connection {
	pub stream: Box<dyn IoStream>,
	pub peer_addr: SocketAddr,
	/// The peer's presented certificate chain, DER-encoded leaf-first, if
	/// this connection came off a TLS listener configured to request one.
	/// `None` for plain TCP connections or when the peer presented nothing.
	pub peer_cert_chain_der: Option<Vec<Vec<u8>>>,
}

impl Connection {
	pub fn new(stream: TcpStream) -> std::io::Result<Self> {
		let peer_addr = stream.peer_addr()?;
		Ok(Self {
			stream: Box::new(stream),
			peer_addr,
			peer_cert_chain_der: None,
		})
	}

	pub fn tls(stream: Box<dyn IoStream>, peer_addr: SocketAddr, peer_cert_chain_der: Option<Vec<Vec<u8>>>) -> Self {
		Self {
			stream,
			peer_addr,
			peer_cert_chain_der,
		}
	}
}

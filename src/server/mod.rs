//! Thread-per-connection server primitives: a raw-TCP acceptor
//! (`tcp::TcpServer`), the per-connection request object handed down the
//! chain (`handler::RequestHandler`), and the HTTP framing layer
//! (`http::HttpHandler`) that can sit directly on a `TcpServer` or on top
//! of a `crate::tls::TlsListener` to form an HTTPS server.

pub mod base;
pub mod handler;
pub mod http;
pub mod stream;
pub mod tcp;

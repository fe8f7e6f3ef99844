//! Client-side TLS helpers used by integration tests to drive a real
//! handshake (including presenting a client certificate chain for
//! mutual-TLS) against this crate's own server.

mod mtls_config;

pub use mtls_config::MtlsClientConfig;

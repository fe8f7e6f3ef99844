//! Downstream-handler chain stages: each implements [`crate::chain::DownstreamHandler`]
//! and either rejects a request or forwards it to the next configured stage.

mod block_by_rate;
mod concurrent_limiter;
mod handler_by_path;
mod ip_network;
mod mutual_tls;
mod rate_limiter;
mod totp_token;

pub use block_by_rate::{BlockByRate, TcpBlockByRate};
pub use concurrent_limiter::{ConcurrentLimiter, TcpConcurrentLimiter};
pub use handler_by_path::{EndPointHandler, HandlerByPath, InvalidPathError};
pub use ip_network::{IpNetworkPolicy, TcpIpNetworkPolicy};
pub use mutual_tls::MutualTls;
pub use rate_limiter::{RateLimiter, TcpRateLimiter};
pub use totp_token::TotpToken;

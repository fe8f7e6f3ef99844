//! HOTP/TOTP primitive (RFC 4226 / RFC 6238) and the bearer-token envelope
//! built on top of it for the `TotpToken` middleware stage.

mod generator;
mod token;

pub use generator::{Digest, Totp, TotpError};
pub use token::{calc_hashed_totp_token, gen_totp_token, verify_totp_token};

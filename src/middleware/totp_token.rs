use std::sync::Arc;

use crate::chain::{DownstreamHandler, RequestContext};
use crate::totp::{verify_totp_token, Totp};

/// Scheme prefix for the `Authorization` header this stage expects, e.g.
/// `Authorization: TOTP_TOKEN <salt>:<sha512-of-salt-and-current-totp>`.
/// The match on this prefix is exact -- no scheme without the trailing
/// space, and no other scheme name, is accepted.
const SCHEME_PREFIX: &str = "TOTP_TOKEN ";

/// Validates a bearer token carrying a hash of the current TOTP code
/// rather than the code itself, so the secret's output never appears
/// directly on the wire. Rejects with 403 on a missing header, a header
/// not matching the exact scheme prefix, or a token whose hash doesn't
/// match the current code. On success, stores the current TOTP value in
/// `req_state.current_totp` before forwarding.
pub struct TotpToken {
	totp: Totp,
	downstream: Arc<dyn DownstreamHandler>,
}

impl TotpToken {
	pub fn new(totp: Totp, downstream: Arc<dyn DownstreamHandler>) -> Self {
		Self { totp, downstream }
	}

	/// Returns the current TOTP code if `auth_header` carries a valid
	/// `TOTP_TOKEN` bearer token for it, `None` otherwise.
	fn check(&self, auth_header: Option<&str>) -> Option<String> {
		let token = auth_header?.strip_prefix(SCHEME_PREFIX)?;
		let current_totp = self.totp.now().ok()?;
		if verify_totp_token(token, &current_totp) {
			Some(current_totp)
		} else {
			None
		}
	}
}

impl DownstreamHandler for TotpToken {
	fn handle_request(&self, ctx: &mut RequestContext<'_>) {
		let auth_header = ctx
			.handler
			.request_headers
			.get("Authorization")
			.and_then(|values| values.first())
			.map(String::as_str);

		match self.check(auth_header) {
			Some(current_totp) => {
				ctx.req_state.current_totp = Some(current_totp);
				self.downstream.handle_request(ctx);
			}
			None => {
				log::debug!("TotpToken: missing, malformed, or stale TOTP_TOKEN bearer token");
				ctx.handler.set_code_and_text(403, "Forbidden");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chain::NotFoundHandler;
	use crate::totp::{gen_totp_token, Digest};

	fn stage() -> (TotpToken, String) {
		let totp = Totp::new("JBSWY3DPEHPK3PXP".to_string(), 30, 6, Digest::Sha1).unwrap();
		let current = totp.now().unwrap();
		(TotpToken::new(totp, Arc::new(NotFoundHandler)), current)
	}

	#[test]
	fn missing_header_is_rejected() {
		let (stage, _) = stage();
		assert!(stage.check(None).is_none());
	}

	#[test]
	fn wrong_scheme_is_rejected() {
		let (stage, current) = stage();
		let token = gen_totp_token(&current);
		assert!(stage.check(Some(&format!("TOTP {token}"))).is_none());
		assert!(stage.check(Some(&format!("TOTP_TOKEN{token}"))).is_none());
	}

	#[test]
	fn tampered_token_is_rejected() {
		let (stage, current) = stage();
		let token = gen_totp_token(&current).replace(':', "_");
		assert!(stage.check(Some(&format!("TOTP_TOKEN {token}"))).is_none());
	}

	#[test]
	fn valid_token_is_accepted_and_returns_current_code() {
		let (stage, current) = stage();
		let token = gen_totp_token(&current);
		assert_eq!(stage.check(Some(&format!("TOTP_TOKEN {token}"))), Some(current));
	}
}

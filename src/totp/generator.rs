use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TotpError {
	#[error("invalid base32 secret: {0}")]
	InvalidSecret(String),
	#[error("digits must be 6 or 8")]
	InvalidDigits,
}

/// Which hash the HMAC in the HOTP computation uses. RFC 6238 allows all
/// three; SHA-1 remains the default for compatibility with most
/// authenticator apps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Digest {
	Sha1,
	Sha256,
	Sha512,
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, TotpError> {
	let upper = secret.to_uppercase();
	let pad_len = (8 - upper.len() % 8) % 8;
	let padded = format!("{upper}{}", "=".repeat(pad_len));
	data_encoding::BASE32
		.decode(padded.as_bytes())
		.map_err(|e| TotpError::InvalidSecret(e.to_string()))
}

fn hmac_digest(digest: Digest, key: &[u8], msg: &[u8]) -> Vec<u8> {
	match digest {
		Digest::Sha1 => {
			let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
			mac.update(msg);
			mac.finalize().into_bytes().to_vec()
		}
		Digest::Sha256 => {
			let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
			mac.update(msg);
			mac.finalize().into_bytes().to_vec()
		}
		Digest::Sha512 => {
			let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts any key length");
			mac.update(msg);
			mac.finalize().into_bytes().to_vec()
		}
	}
}

/// HOTP per RFC 4226: dynamic truncation of the HMAC of a big-endian
/// counter, taken mod 10^digits and zero-padded.
fn hotp(secret: &str, counter: u64, digits: u32, digest: Digest) -> Result<String, TotpError> {
	let key = decode_secret(secret)?;
	let mac = hmac_digest(digest, &key, &counter.to_be_bytes());

	let offset = (mac[mac.len() - 1] & 0x0f) as usize;
	let binary = (u32::from(mac[offset] & 0x7f) << 24)
		| (u32::from(mac[offset + 1]) << 16)
		| (u32::from(mac[offset + 2]) << 8)
		| u32::from(mac[offset + 3]);

	let modulus = 10u32.pow(digits);
	Ok(format!("{:0width$}", binary % modulus, width = digits as usize))
}

/// A configured TOTP generator (RFC 6238): HOTP evaluated at the counter
/// derived from the current Unix time divided by `time_step`.
#[derive(Debug, Clone)]
pub struct Totp {
	secret: String,
	time_step: u64,
	digits: u32,
	digest: Digest,
	account_name: Option<String>,
	issuer: Option<String>,
}

impl Totp {
	pub fn new(secret: String, time_step: u64, digits: u32, digest: Digest) -> Result<Self, TotpError> {
		if digits != 6 && digits != 8 {
			return Err(TotpError::InvalidDigits);
		}
		Ok(Self {
			secret,
			time_step,
			digits,
			digest,
			account_name: None,
			issuer: None,
		})
	}

	pub fn with_identity(mut self, account_name: impl Into<String>, issuer: impl Into<String>) -> Self {
		self.account_name = Some(account_name.into());
		self.issuer = Some(issuer.into());
		self
	}

	/// The current TOTP code, evaluated against `now`.
	pub fn at(&self, now: std::time::SystemTime) -> Result<String, TotpError> {
		let counter = now
			.duration_since(std::time::UNIX_EPOCH)
			.unwrap_or_default()
			.as_secs()
			/ self.time_step;
		hotp(&self.secret, counter, self.digits, self.digest)
	}

	pub fn now(&self) -> Result<String, TotpError> {
		self.at(std::time::SystemTime::now())
	}

	/// A `otpauth://totp/...` URI suitable for a QR code, per the
	/// Google Authenticator key URI format.
	pub fn otp_auth_uri(&self) -> Option<String> {
		let issuer = self.issuer.as_ref()?;
		let account = self.account_name.as_ref()?;
		let digest_name = match self.digest {
			Digest::Sha1 => "SHA1",
			Digest::Sha256 => "SHA256",
			Digest::Sha512 => "SHA512",
		};
		Some(format!(
			"otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&digits={digits}&period={period}&algorithm={digest_name}",
			issuer = issuer,
			account = account,
			secret = self.secret,
			digits = self.digits,
			period = self.time_step,
		))
	}
}

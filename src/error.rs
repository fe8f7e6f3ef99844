use thiserror::Error;

/// The error taxonomy for the framework (see design doc §7).
///
/// Every variant maps to exactly one HTTP status code via [`NetFrameError::status_code`].
/// Middleware stages do not normally construct these directly for the
/// reject path (they write the response themselves, per the tagged-result
/// design replacing exception-driven control flow) -- this type exists for
/// genuine failures: construction-time misconfiguration, I/O errors, and
/// the `HandlerCrash` case caught at the pre-handler boundary.
#[derive(Debug, Error)]
pub enum NetFrameError {
	#[error("malformed request: {0}")]
	ClientProtocol(String),

	#[error("request rejected: {0}")]
	AuthRejection(String),

	#[error("not found")]
	NotFound,

	#[error("request-target too large")]
	RequestTooLarge,

	#[error("handler crashed: {0}")]
	HandlerCrash(String),

	#[error("operation invalid in current lifecycle state: {0}")]
	LifecycleMisuse(String),

	#[error("configuration error: {0}")]
	Config(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("TLS error: {0}")]
	Tls(String),
}

impl NetFrameError {
	/// The HTTP status code this error maps to, per the error taxonomy.
	pub fn status_code(&self) -> u16 {
		match self {
			NetFrameError::ClientProtocol(_) => 400,
			NetFrameError::AuthRejection(_) => 403,
			NetFrameError::NotFound => 404,
			NetFrameError::RequestTooLarge => 414,
			NetFrameError::HandlerCrash(_) => 500,
			NetFrameError::LifecycleMisuse(_) => 500,
			NetFrameError::Config(_) => 500,
			NetFrameError::Io(_) => 500,
			NetFrameError::Tls(_) => 403,
		}
	}
}

pub type Result<T> = std::result::Result<T, NetFrameError>;

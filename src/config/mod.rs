use anyhow::Result;
use serde::Deserialize;

/// Runtime configuration for `netframed`.
///
/// Values are loaded from (in order): a `config` file (optional), then
/// environment variables prefixed with `NETFRAME_` (e.g. `NETFRAME_PORT`),
/// then an explicit direct-environment-variable pass for robustness in
/// harnesses that don't route through the `config` crate's env source.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Settings {
	pub host: String,
	pub port: u16,
	pub tls_cert: Option<String>,
	pub tls_key: Option<String>,
	pub tls_ca: Option<String>,
	pub log_level: String,
	pub rate_limit_max: usize,
	pub rate_limit_period_secs: u64,
	pub block_max_requests: usize,
	pub block_window_secs: u64,
	pub block_state_path: Option<String>,
	pub block_global_state_path: Option<String>,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			host: "127.0.0.1".to_string(),
			port: 8443,
			tls_cert: None,
			tls_key: None,
			tls_ca: None,
			log_level: "info".to_string(),
			rate_limit_max: 100,
			rate_limit_period_secs: 60,
			block_max_requests: 1000,
			block_window_secs: 3600,
			block_state_path: None,
			block_global_state_path: None,
		}
	}
}

/// Partial settings used to overlay environment/file values on top of defaults.
#[derive(Debug, Deserialize)]
struct PartialSettings {
	host: Option<String>,
	port: Option<u16>,
	tls_cert: Option<String>,
	tls_key: Option<String>,
	tls_ca: Option<String>,
	log_level: Option<String>,
	rate_limit_max: Option<usize>,
	rate_limit_period_secs: Option<u64>,
	block_max_requests: Option<usize>,
	block_window_secs: Option<u64>,
	block_state_path: Option<String>,
	block_global_state_path: Option<String>,
}

/// Load settings from an optional config file and environment variables.
///
/// The config file's base name defaults to `config` (searched by the
/// `config` crate's usual extension probing); set `NETFRAME_CONFIG` to
/// point at a different path before calling this, e.g. from the CLI's
/// `--config` flag.
pub fn load() -> Result<Settings> {
	let config_name = std::env::var("NETFRAME_CONFIG").unwrap_or_else(|_| "config".to_string());
	let builder = config::Config::builder()
		.add_source(config::File::with_name(&config_name).required(false))
		// Double-underscore separator so single-underscore env names like
		// `NETFRAME_RATE_LIMIT_MAX` map to `rate_limit_max` instead of a
		// nested `rate.limit.max`.
		.add_source(config::Environment::with_prefix("NETFRAME").separator("__"));

	let cfg = builder.build()?;
	let partial: PartialSettings = cfg.try_deserialize()?;

	let mut s = Settings::default();
	if let Some(v) = partial.host {
		s.host = v;
	}
	if let Some(v) = partial.port {
		s.port = v;
	}
	if let Some(v) = partial.tls_cert {
		s.tls_cert = Some(v);
	}
	if let Some(v) = partial.tls_key {
		s.tls_key = Some(v);
	}
	if let Some(v) = partial.tls_ca {
		s.tls_ca = Some(v);
	}
	if let Some(v) = partial.log_level {
		s.log_level = v;
	}
	if let Some(v) = partial.rate_limit_max {
		s.rate_limit_max = v;
	}
	if let Some(v) = partial.rate_limit_period_secs {
		s.rate_limit_period_secs = v;
	}
	if let Some(v) = partial.block_max_requests {
		s.block_max_requests = v;
	}
	if let Some(v) = partial.block_window_secs {
		s.block_window_secs = v;
	}
	if let Some(v) = partial.block_state_path {
		s.block_state_path = Some(v);
	}
	if let Some(v) = partial.block_global_state_path {
		s.block_global_state_path = Some(v);
	}

	// Explicit overrides: some harnesses set env vars in ways the `config`
	// crate's env source doesn't map as expected; read them directly too.
	if let Ok(v) = std::env::var("NETFRAME_HOST") {
		if !v.is_empty() {
			s.host = v;
		}
	}
	if let Ok(v) = std::env::var("NETFRAME_PORT") {
		if let Ok(p) = v.parse() {
			s.port = p;
		}
	}
	if let Ok(v) = std::env::var("NETFRAME_TLS_CERT") {
		if !v.is_empty() {
			s.tls_cert = Some(v);
		}
	}
	if let Ok(v) = std::env::var("NETFRAME_TLS_KEY") {
		if !v.is_empty() {
			s.tls_key = Some(v);
		}
	}
	if let Ok(v) = std::env::var("NETFRAME_TLS_CA") {
		if !v.is_empty() {
			s.tls_ca = Some(v);
		}
	}
	if let Ok(v) = std::env::var("NETFRAME_LOG_LEVEL") {
		if !v.is_empty() {
			s.log_level = v;
		}
	}
	if let Ok(v) = std::env::var("NETFRAME_RATE_LIMIT_MAX") {
		if let Ok(n) = v.parse() {
			s.rate_limit_max = n;
		}
	}
	if let Ok(v) = std::env::var("NETFRAME_RATE_LIMIT_PERIOD_SECS") {
		if let Ok(n) = v.parse() {
			s.rate_limit_period_secs = n;
		}
	}
	if let Ok(v) = std::env::var("NETFRAME_BLOCK_MAX_REQUESTS") {
		if let Ok(n) = v.parse() {
			s.block_max_requests = n;
		}
	}
	if let Ok(v) = std::env::var("NETFRAME_BLOCK_WINDOW_SECS") {
		if let Ok(n) = v.parse() {
			s.block_window_secs = n;
		}
	}
	if let Ok(v) = std::env::var("NETFRAME_BLOCK_STATE_PATH") {
		if !v.is_empty() {
			s.block_state_path = Some(v);
		}
	}
	if let Ok(v) = std::env::var("NETFRAME_BLOCK_GLOBAL_STATE_PATH") {
		if !v.is_empty() {
			s.block_global_state_path = Some(v);
		}
	}

	Ok(s)
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;
	use std::env;

	#[test]
	fn load_defaults_and_env_overlay() {
		let saved: Vec<(&str, Option<std::ffi::OsString>)> = [
			"NETFRAME_HOST",
			"NETFRAME_PORT",
			"NETFRAME_TLS_CERT",
			"NETFRAME_LOG_LEVEL",
			"NETFRAME_RATE_LIMIT_MAX",
		]
		.iter()
		.map(|k| (*k, env::var_os(k)))
		.collect();

		for (k, _) in &saved {
			unsafe { env::remove_var(k) };
		}

		let s = load().expect("load should succeed with defaults");
		let d = Settings::default();
		assert_eq!(s.host, d.host);
		assert_eq!(s.port, d.port);
		assert_eq!(s.log_level, d.log_level);

		unsafe { env::set_var("NETFRAME_HOST", "0.0.0.0") };
		unsafe { env::set_var("NETFRAME_PORT", "9443") };
		unsafe { env::set_var("NETFRAME_LOG_LEVEL", "debug") };
		unsafe { env::set_var("NETFRAME_RATE_LIMIT_MAX", "5") };

		let s2 = load().expect("load should succeed with env overlay");
		assert_eq!(s2.host, "0.0.0.0");
		assert_eq!(s2.port, 9443);
		assert_eq!(s2.log_level, "debug");
		assert_eq!(s2.rate_limit_max, 5);

		for (k, v) in saved {
			match v {
				Some(v) => unsafe { env::set_var(k, v) },
				None => unsafe { env::remove_var(k) },
			}
		}
	}
}
